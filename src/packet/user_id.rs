use std::io::{self, BufRead};

use crate::errors::Result;
use crate::parsing::BufReadParsing;
use crate::ser::Serialize;
use crate::types::Tag;

/// User ID Packet
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-user-id-packet-type-id-13>
#[derive(Clone, PartialEq, Eq, Hash, derive_more::Debug)]
#[debug("UserId({:?})", String::from_utf8_lossy(id))]
pub struct UserId {
    id: Vec<u8>,
}

impl UserId {
    pub fn from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        Ok(UserId { id: i.rest()? })
    }

    pub fn from_str(id: &str) -> Self {
        UserId {
            id: id.as_bytes().to_vec(),
        }
    }

    /// The raw octets; by convention UTF-8 text of the form
    /// `Name (Comment) <email>`, but not guaranteed to be valid UTF-8.
    pub fn as_bytes(&self) -> &[u8] {
        &self.id
    }

    pub fn id(&self) -> String {
        String::from_utf8_lossy(&self.id).to_string()
    }

    pub fn tag(&self) -> Tag {
        Tag::UserId
    }
}

impl Serialize for UserId {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.id)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let id = UserId::from_str("Alice <a@x>");
        let buf = id.to_bytes().unwrap();
        let back = UserId::from_reader(&mut &buf[..]).unwrap();
        assert_eq!(id, back);
        assert_eq!(back.id(), "Alice <a@x>");
    }
}
