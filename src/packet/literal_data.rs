use std::io::{self, BufRead};

use byteorder::{BigEndian, WriteBytesExt};
use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::errors::Result;
use crate::parsing::BufReadParsing;
use crate::ser::Serialize;
use crate::types::Tag;

/// The format octet of a literal data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DataMode {
    Binary = b'b',
    Text = b't',
    Utf8 = b'u',

    #[num_enum(catch_all)]
    Other(u8),
}

/// Literal Data Packet
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-literal-data-packet-type-id>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct LiteralData {
    mode: DataMode,
    /// The filename, may contain non utf-8 bytes.
    file_name: Vec<u8>,
    created: DateTime<Utc>,
    #[debug("{}", hex::encode(data))]
    data: Vec<u8>,
}

impl LiteralData {
    /// Creates a literal data packet from the given bytes.
    pub fn from_bytes(file_name: &[u8], data: Vec<u8>) -> Self {
        LiteralData {
            mode: DataMode::Binary,
            file_name: file_name.to_vec(),
            created: Utc::now().trunc_subsecs(0),
            data,
        }
    }

    /// Creates a literal data packet from the given string, in text mode.
    pub fn from_str(file_name: &[u8], text: &str) -> Self {
        LiteralData {
            mode: DataMode::Utf8,
            file_name: file_name.to_vec(),
            created: Utc::now().trunc_subsecs(0),
            data: text.as_bytes().to_vec(),
        }
    }

    pub fn from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let mode = DataMode::from(i.read_u8()?);
        let name_len = i.read_u8()?;
        let file_name = i.take_bytes(name_len.into())?;
        let created = i.read_be_u32()?;
        let data = i.rest()?;

        Ok(LiteralData {
            mode,
            file_name,
            created: Utc.timestamp_opt(created.into(), 0)
                .single()
                .ok_or_else(|| format_err!("invalid literal data timestamp"))?,
            data,
        })
    }

    pub fn mode(&self) -> DataMode {
        self.mode
    }

    /// Is the format octet one of the text modes?
    pub fn is_text(&self) -> bool {
        matches!(self.mode, DataMode::Text | DataMode::Utf8)
    }

    pub fn file_name(&self) -> &[u8] {
        &self.file_name
    }

    pub fn created(&self) -> &DateTime<Utc> {
        &self.created
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn tag(&self) -> Tag {
        Tag::LiteralData
    }
}

impl Serialize for LiteralData {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_u8(self.mode.into())?;
        w.write_u8(self.file_name.len().try_into()?)?;
        w.write_all(&self.file_name)?;
        w.write_u32::<BigEndian>(self.created.timestamp().try_into()?)?;
        w.write_all(&self.data)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + 1 + self.file_name.len() + 4 + self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let literal = LiteralData::from_bytes(b"file.bin", vec![1, 2, 3, 4]);
        let buf = literal.to_bytes().unwrap();
        assert_eq!(buf.len(), literal.write_len());

        let back = LiteralData::from_reader(&mut &buf[..]).unwrap();
        assert_eq!(literal, back);
        assert!(!back.is_text());
    }

    #[test]
    fn text_mode() {
        let literal = LiteralData::from_str(b"", "hello\n");
        assert!(literal.is_text());
        assert_eq!(literal.data(), b"hello\n");
    }
}
