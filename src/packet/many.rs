use log::{debug, warn};

use crate::errors::{Error, Result};
use crate::packet::Packet;
use crate::parsing::BufReadParsing;
use crate::types::{PacketLength, Tag};

/// Parses a packet stream into its packets.
///
/// Packets of unsupported type or version are logged and skipped; malformed
/// framing aborts the parse.
pub fn from_bytes(input: &[u8]) -> Result<Vec<Packet>> {
    let mut i = input;
    let mut packets = Vec::new();

    while i.has_remaining()? {
        let (tag, body) = read_packet(&mut i)?;
        debug!("packet {:?} ({} bytes)", tag, body.len());

        match body_parser(tag, &body) {
            Ok(packet) => packets.push(packet),
            Err(err @ Error::Unsupported { .. }) => {
                warn!("skipping unsupported packet {:?}: {:?}", tag, err);
            }
            Err(err) => {
                warn!("invalid packet {:?}: {:?}", tag, err);
                return Err(Error::InvalidPacketContent {
                    source: Box::new(err),
                });
            }
        }
    }

    Ok(packets)
}

/// Reads a single packet header (old or new format) and its body,
/// reassembling partial-length chunks.
fn read_packet(i: &mut &[u8]) -> Result<(Tag, Vec<u8>)> {
    let header = i.read_u8()?;
    ensure!(header & 0x80 != 0, "invalid packet header {:#04x}", header);

    if header & 0x40 == 0 {
        // old format: 4 bit tag, 2 bit length type
        let tag = Tag::from((header >> 2) & 0x0F);
        let body = match header & 0x03 {
            0 => {
                let len = i.read_u8()?;
                i.take_bytes(len.into())?
            }
            1 => {
                let len = i.read_be_u16()?;
                i.take_bytes(len.into())?
            }
            2 => {
                let len = i.read_be_u32()?;
                i.take_bytes(len.try_into()?)?
            }
            _ => {
                // indeterminate length: the body extends to the end of input
                i.rest()?
            }
        };
        Ok((tag, body))
    } else {
        // new format: 6 bit tag, variable length encoding
        let tag = Tag::from(header & 0x3F);
        let length = PacketLength::try_from_reader(&mut *i)?;

        let body = match length {
            PacketLength::Fixed(len) => i.take_bytes(len.try_into()?)?,
            PacketLength::Indeterminate => i.rest()?,
            PacketLength::Partial(len) => {
                // a partial chunk must be followed by more chunks, ending in
                // a fixed-length one
                let mut body = i.take_bytes(len.try_into()?)?;
                loop {
                    let next = PacketLength::try_from_reader(&mut *i).map_err(|_| {
                        format_err!("partial-length chunk without terminating length")
                    })?;
                    match next {
                        PacketLength::Partial(len) => {
                            body.extend_from_slice(&i.take_bytes(len.try_into()?)?);
                        }
                        PacketLength::Fixed(len) => {
                            body.extend_from_slice(&i.take_bytes(len.try_into()?)?);
                            break;
                        }
                        PacketLength::Indeterminate => {
                            bail!("invalid indeterminate length after partial chunk");
                        }
                    }
                }
                body
            }
        };
        Ok((tag, body))
    }
}

/// Dispatches to the tag specific body parser.
fn body_parser(tag: Tag, body: &[u8]) -> Result<Packet> {
    use crate::packet::*;

    let mut i = body;
    match tag {
        Tag::PublicKeyEncryptedSessionKey => {
            PublicKeyEncryptedSessionKey::from_reader(&mut i).map(Into::into)
        }
        Tag::Signature => Signature::from_reader(&mut i).map(Into::into),
        Tag::SymKeyEncryptedSessionKey => {
            SymKeyEncryptedSessionKey::from_reader(&mut i).map(Into::into)
        }
        Tag::OnePassSignature => OnePassSignature::from_reader(&mut i).map(Into::into),
        Tag::SecretKey => SecretKey::from_reader(&mut i).map(Into::into),
        Tag::PublicKey => PublicKey::from_reader(&mut i).map(Into::into),
        Tag::SecretSubkey => SecretSubkey::from_reader(&mut i).map(Into::into),
        Tag::CompressedData => CompressedData::from_reader(&mut i).map(Into::into),
        Tag::SymEncryptedData => SymEncryptedData::from_reader(&mut i).map(Into::into),
        Tag::LiteralData => LiteralData::from_reader(&mut i).map(Into::into),
        Tag::UserId => UserId::from_reader(&mut i).map(Into::into),
        Tag::PublicSubkey => PublicSubkey::from_reader(&mut i).map(Into::into),
        Tag::UserAttribute => UserAttribute::from_reader(&mut i).map(Into::into),
        Tag::SymEncryptedProtectedData => {
            SymEncryptedProtectedData::from_reader(&mut i).map(Into::into)
        }
        _ => unsupported_err!("packet tag {:?}", tag),
    }
}

#[cfg(test)]
mod tests {
    use crate::packet::{filter_by_tag, LiteralData, UserId};
    use crate::ser::Serialize;

    use super::*;

    #[test]
    fn stream_roundtrip() {
        let packets: Vec<Packet> = vec![
            LiteralData::from_bytes(b"f", vec![1, 2, 3]).into(),
            UserId::from_str("Alice <a@x>").into(),
            LiteralData::from_bytes(b"g", vec![4, 5]).into(),
        ];

        let mut buf = Vec::new();
        for p in &packets {
            p.to_writer(&mut buf).unwrap();
        }

        let back = from_bytes(&buf).unwrap();
        assert_eq!(packets, back);

        let literals = filter_by_tag(&back, Tag::LiteralData);
        assert_eq!(literals.len(), 2);
        assert_eq!(literals[0], &packets[0]);
        assert_eq!(literals[1], &packets[2]);
    }

    #[test]
    fn old_format_header() {
        // old format literal data packet: tag 11, one-octet length
        let literal = LiteralData::from_bytes(b"", vec![9, 9]);
        let body = literal.to_bytes().unwrap();

        let mut buf = vec![0x80 | (11 << 2), body.len() as u8];
        buf.extend_from_slice(&body);

        let packets = from_bytes(&buf).unwrap();
        assert_eq!(packets, vec![literal.into()]);
    }

    #[test]
    fn partial_lengths_reassemble() {
        // literal data with at least 512 bytes of content so it can be
        // split into a 512 byte partial chunk plus a fixed remainder
        let literal = LiteralData::from_bytes(b"file", vec![7u8; 900]);
        let body = literal.to_bytes().unwrap();
        assert!(body.len() > 512);

        let mut buf = vec![0xC0 | 11];
        // partial chunk of 512 (224 + 9 encodes 2^9)
        buf.push(0xE9);
        buf.extend_from_slice(&body[..512]);
        // remainder as a two-octet fixed length
        let rest = &body[512..];
        assert!(rest.len() >= 192 && rest.len() < 8384);
        buf.push((((rest.len() - 192) >> 8) + 192) as u8);
        buf.push(((rest.len() - 192) & 0xFF) as u8);
        buf.extend_from_slice(rest);

        let packets = from_bytes(&buf).unwrap();
        assert_eq!(packets, vec![literal.into()]);
    }

    #[test]
    fn partial_length_without_terminator() {
        let mut buf = vec![0xC0 | 11, 0xE9];
        buf.extend_from_slice(&[0u8; 512]);
        // ends without a terminating fixed-length chunk
        assert!(from_bytes(&buf).is_err());
    }

    #[test]
    fn unknown_tag_is_skipped() {
        let mut buf = Vec::new();
        // marker packet (tag 10) is intentionally unsupported
        buf.extend_from_slice(&[0xC0 | 10, 3, b'P', b'G', b'P']);
        let literal = LiteralData::from_bytes(b"", vec![1]);
        Packet::from(literal.clone()).to_writer(&mut buf).unwrap();

        let packets = from_bytes(&buf).unwrap();
        assert_eq!(packets, vec![literal.into()]);
    }
}
