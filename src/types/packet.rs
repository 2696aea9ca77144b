use std::io::{self, BufRead};

use byteorder::{BigEndian, WriteBytesExt};
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::errors::Result;
use crate::parsing::BufReadParsing;

/// Packet Type ID, see <https://www.rfc-editor.org/rfc/rfc9580.html#packet-types>
///
/// Called "Packet Tag" in RFC 4880 (Section 4.3 "Packet Tags").
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Tag {
    /// Public-Key Encrypted Session Key Packet
    PublicKeyEncryptedSessionKey = 1,
    /// Signature Packet
    Signature = 2,
    /// Symmetric-Key Encrypted Session Key Packet
    SymKeyEncryptedSessionKey = 3,
    /// One-Pass Signature Packet
    OnePassSignature = 4,
    /// Secret-Key Packet
    SecretKey = 5,
    /// Public-Key Packet
    PublicKey = 6,
    /// Secret-Subkey Packet
    SecretSubkey = 7,
    /// Compressed Data Packet
    CompressedData = 8,
    /// Symmetrically Encrypted Data Packet
    SymEncryptedData = 9,
    /// Marker Packet
    Marker = 10,
    /// Literal Data Packet
    LiteralData = 11,
    /// Trust Packet
    Trust = 12,
    /// User ID Packet
    UserId = 13,
    /// Public-Subkey Packet
    PublicSubkey = 14,
    /// User Attribute Packet
    UserAttribute = 17,
    /// Sym. Encrypted and Integrity Protected Data Packet
    SymEncryptedProtectedData = 18,
    /// Modification Detection Code Packet
    ModDetectionCode = 19,
    /// Padding Packet
    Padding = 21,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Tag {
    /// Packet Type ID encoded in OpenPGP format
    /// (bits 7 and 6 set, bits 5-0 carry the packet type ID).
    pub fn encode(self) -> u8 {
        0b1100_0000 | u8::from(self)
    }
}

/// Represents the length component of a packet header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PacketLength {
    Fixed(u32),
    Indeterminate,
    Partial(u32),
}

impl PacketLength {
    /// Reads a new-format packet length.
    /// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-packet-lengths>
    pub fn try_from_reader<R: BufRead>(mut r: R) -> io::Result<Self> {
        let olen = r.read_u8()?;
        let len = match olen {
            // One-Octet Lengths
            0..=191 => PacketLength::Fixed(olen.into()),
            // Two-Octet Lengths
            192..=223 => {
                let a = r.read_u8()?;
                PacketLength::Fixed(((u32::from(olen) - 192) << 8) + 192 + u32::from(a))
            }
            // Partial Body Lengths
            224..=254 => PacketLength::Partial(1 << (olen & 0x1F)),
            // Five-Octet Lengths
            255 => PacketLength::Fixed(r.read_be_u32()?),
        };
        Ok(len)
    }
}

/// The version of the packet framing format.
///
/// 1) the (current) OpenPGP packet format specified by RFC 9580 and its
///    predecessors RFC 4880 and RFC 2440 and
/// 2) the Legacy packet format as used by implementations predating any IETF
///    specification of OpenPGP.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum PacketHeaderVersion {
    /// Old Packet Format ("Legacy packet format")
    Old = 0,
    /// New Packet Format ("OpenPGP packet format")
    #[default]
    New = 1,
}

impl PacketHeaderVersion {
    /// Writes a packet header with a single fixed length.
    pub fn write_header(self, writer: &mut impl io::Write, tag: Tag, len: usize) -> Result<()> {
        let tag: u8 = tag.into();
        match self {
            PacketHeaderVersion::Old => {
                if len < 256 {
                    // one octet
                    writer.write_u8(0b1000_0000 | (tag << 2))?;
                    writer.write_u8(len as u8)?;
                } else if len < 65536 {
                    // two octets
                    writer.write_u8(0b1000_0001 | (tag << 2))?;
                    writer.write_u16::<BigEndian>(len as u16)?;
                } else {
                    // four octets
                    writer.write_u8(0b1000_0010 | (tag << 2))?;
                    writer.write_u32::<BigEndian>(len.try_into()?)?;
                }
            }
            PacketHeaderVersion::New => {
                writer.write_u8(0b1100_0000 | tag)?;
                if len < 192 {
                    writer.write_u8(len as u8)?;
                } else if len < 8384 {
                    writer.write_u8((((len - 192) >> 8) + 192) as u8)?;
                    writer.write_u8(((len - 192) & 0xFF) as u8)?;
                } else {
                    writer.write_u8(255)?;
                    writer.write_u32::<BigEndian>(len.try_into()?)?;
                }
            }
        }

        Ok(())
    }

    /// Length of the header, in bytes.
    pub fn header_len(self, len: usize) -> usize {
        match self {
            PacketHeaderVersion::Old => {
                if len < 256 {
                    2
                } else if len < 65536 {
                    3
                } else {
                    5
                }
            }
            PacketHeaderVersion::New => {
                if len < 192 {
                    2
                } else if len < 8384 {
                    3
                } else {
                    6
                }
            }
        }
    }
}

/// Key packet versions. Treated as data everywhere; only v4 and v6 keys can
/// be generated.
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Hash, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum KeyVersion {
    V2 = 2,
    V3 = 3,
    V4 = 4,
    V5 = 5,
    V6 = 6,

    #[num_enum(catch_all)]
    Other(u8),
}

impl KeyVersion {
    /// Size of the OpenPGP fingerprint in bytes
    /// (returns `None` for unknown versions).
    pub const fn fingerprint_len(&self) -> Option<usize> {
        match self {
            KeyVersion::V2 | KeyVersion::V3 => Some(16), // MD5
            KeyVersion::V4 => Some(20),                  // SHA1
            KeyVersion::V5 | KeyVersion::V6 => Some(32), // SHA256
            KeyVersion::Other(_) => None,
        }
    }
}

impl Default for KeyVersion {
    fn default() -> Self {
        Self::V4
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_write_header() {
        let mut buf = Vec::new();
        PacketHeaderVersion::New
            .write_header(&mut buf, Tag::UserAttribute, 12875)
            .unwrap();
        assert_eq!(hex::encode(&buf), "d1ff0000324b");

        let mut buf = Vec::new();
        PacketHeaderVersion::New
            .write_header(&mut buf, Tag::Signature, 302)
            .unwrap();
        assert_eq!(hex::encode(&buf), "c2c06e");

        let mut buf = Vec::new();
        PacketHeaderVersion::New
            .write_header(&mut buf, Tag::Signature, 303)
            .unwrap();
        assert_eq!(hex::encode(&buf), "c2c06f");
    }

    #[test]
    fn new_format_length_roundtrip() {
        for len in [0u32, 1, 191, 192, 8383, 8384, 100_000] {
            let mut buf = Vec::new();
            PacketHeaderVersion::New
                .write_header(&mut buf, Tag::LiteralData, len as usize)
                .unwrap();
            // skip the tag octet
            let parsed = PacketLength::try_from_reader(&mut &buf[1..]).unwrap();
            assert_eq!(parsed, PacketLength::Fixed(len));
        }
    }

    #[test]
    fn partial_length_decoding() {
        // 224 encodes a partial chunk of 2^0 .. this is the smallest exponent
        let parsed = PacketLength::try_from_reader(&mut &[224u8][..]).unwrap();
        assert_eq!(parsed, PacketLength::Partial(1));

        let parsed = PacketLength::try_from_reader(&mut &[0xE9u8][..]).unwrap();
        assert_eq!(parsed, PacketLength::Partial(512));
    }

    proptest! {
        #[test]
        fn header_len_matches(len in 0usize..100_000) {
            for version in [PacketHeaderVersion::Old, PacketHeaderVersion::New] {
                let mut buf = Vec::new();
                version.write_header(&mut buf, Tag::Signature, len).unwrap();
                prop_assert_eq!(buf.len(), version.header_len(len));
            }
        }
    }
}
