use std::io::{self, BufRead};

use crate::errors::Result;
use crate::parsing::BufReadParsing;
use crate::ser::Serialize;
use crate::types::Tag;

/// User Attribute Packet
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-user-attribute-packet-type->
///
/// Carried opaquely: the subpacket contents (typically an image) are not
/// interpreted, but the packet can be certified and revoked like a User ID.
#[derive(Clone, PartialEq, Eq, Hash, derive_more::Debug)]
#[debug("UserAttribute({} bytes)", data.len())]
pub struct UserAttribute {
    data: Vec<u8>,
}

impl UserAttribute {
    pub fn from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        Ok(UserAttribute { data: i.rest()? })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn tag(&self) -> Tag {
        Tag::UserAttribute
    }
}

impl Serialize for UserAttribute {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.data.len()
    }
}
