//! ASCII Armor
//!
//! Radix-64 framing with a CRC-24 checksum.
//! Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-forming-ascii-armor>

use std::collections::BTreeMap;
use std::io::Write;

use base64::engine::{general_purpose, Engine as _};

use crate::errors::{Error, Result};
use crate::line_writer::{LineBreak, LineWriter};
use crate::ser::Serialize;

/// Number of base64 characters per armor line.
const LINE_LENGTH: usize = 76;

/// Armor header keys to lists of values.
pub type Headers = BTreeMap<String, Vec<String>>;

/// The type of an armor frame, spelled out in the BEGIN and END lines.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BlockType {
    Message,
    PublicKey,
    PrivateKey,
    Signature,
    CleartextMessage,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Message => "PGP MESSAGE",
            BlockType::PublicKey => "PGP PUBLIC KEY BLOCK",
            BlockType::PrivateKey => "PGP PRIVATE KEY BLOCK",
            BlockType::Signature => "PGP SIGNATURE",
            BlockType::CleartextMessage => "PGP SIGNED MESSAGE",
        }
    }

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PGP MESSAGE" => Ok(BlockType::Message),
            "PGP PUBLIC KEY BLOCK" => Ok(BlockType::PublicKey),
            "PGP PRIVATE KEY BLOCK" => Ok(BlockType::PrivateKey),
            "PGP SIGNATURE" => Ok(BlockType::Signature),
            "PGP SIGNED MESSAGE" => Ok(BlockType::CleartextMessage),
            _ => Err(Error::InvalidArmorWrappers { backtrace: None }),
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The CRC-24 as specified for ASCII armor
/// (poly `0x864CFB`, init `0xB704CE`).
pub fn crc24(data: &[u8]) -> u32 {
    crc24::hash_raw(data)
}

/// Writes `source` as an armored block.
pub fn write(
    source: &impl Serialize,
    typ: BlockType,
    writer: &mut impl Write,
    headers: Option<&Headers>,
    include_checksum: bool,
) -> Result<()> {
    let body = source.to_bytes()?;

    write_header(writer, typ, headers)?;

    {
        let mut line_wrapper = LineWriter::new(writer, LINE_LENGTH, LineBreak::Lf);
        let encoded = general_purpose::STANDARD.encode(&body);
        line_wrapper.write_all(encoded.as_bytes())?;
        line_wrapper.finish()?;
    }

    if include_checksum {
        let crc = crc24(&body);
        let crc_buf = [(crc >> 16) as u8, (crc >> 8) as u8, crc as u8];

        writer.write_all(b"=")?;
        writer.write_all(general_purpose::STANDARD.encode(crc_buf).as_bytes())?;
        writer.write_all(b"\n")?;
    }

    write_footer(writer, typ)?;

    Ok(())
}

pub(crate) fn write_header(
    writer: &mut impl Write,
    typ: BlockType,
    headers: Option<&Headers>,
) -> Result<()> {
    writer.write_all(b"-----BEGIN ")?;
    writer.write_all(typ.as_str().as_bytes())?;
    writer.write_all(b"-----\n")?;

    if let Some(headers) = headers {
        for (key, values) in headers.iter() {
            for value in values {
                writer.write_all(key.as_bytes())?;
                writer.write_all(b": ")?;
                writer.write_all(value.as_bytes())?;
                writer.write_all(b"\n")?;
            }
        }
    }

    writer.write_all(b"\n")?;

    Ok(())
}

pub(crate) fn write_footer(writer: &mut impl Write, typ: BlockType) -> Result<()> {
    writer.write_all(b"-----END ")?;
    writer.write_all(typ.as_str().as_bytes())?;
    writer.write_all(b"-----\n")?;
    Ok(())
}

/// A decoded armor frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dearmored {
    pub typ: BlockType,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// Decodes a single armored block.
///
/// Whitespace inside the base64 body is ignored; a present CRC-24 line is
/// verified.
pub fn parse(input: &str) -> Result<Dearmored> {
    let mut lines = input.lines();

    // find the BEGIN line
    let typ = loop {
        let Some(line) = lines.next() else {
            return Err(Error::InvalidArmorWrappers { backtrace: None });
        };
        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix("-----BEGIN ") {
            let Some(name) = rest.strip_suffix("-----") else {
                return Err(Error::InvalidArmorWrappers { backtrace: None });
            };
            break BlockType::from_str(name)?;
        }
    };

    // headers until the empty separator line
    let mut headers = Headers::new();
    let mut first_body_line: Option<&str> = None;
    for line in lines.by_ref() {
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(": ") {
            headers
                .entry(key.to_string())
                .or_default()
                .push(value.to_string());
        } else {
            // tolerate a missing blank line before the body
            first_body_line = Some(line);
            break;
        }
    }

    // base64 body, optional checksum line, END line
    let mut b64 = String::new();
    let mut checksum: Option<String> = None;
    let mut footer: Option<&str> = None;

    if let Some(line) = first_body_line {
        b64.extend(line.split_whitespace());
    }

    for line in lines {
        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix("-----END ") {
            let Some(name) = rest.strip_suffix("-----") else {
                return Err(Error::InvalidArmorWrappers { backtrace: None });
            };
            if BlockType::from_str(name)? != typ {
                return Err(Error::InvalidArmorWrappers { backtrace: None });
            }
            footer = Some(line);
            break;
        } else if let Some(rest) = line.strip_prefix('=') {
            checksum = Some(rest.trim().to_string());
        } else {
            b64.extend(line.split_whitespace());
        }
    }

    if footer.is_none() {
        return Err(Error::InvalidArmorWrappers { backtrace: None });
    }

    let body = general_purpose::STANDARD.decode(b64.as_bytes())?;

    if let Some(checksum) = checksum {
        let crc_bytes = general_purpose::STANDARD.decode(checksum.as_bytes())?;
        ensure_eq!(crc_bytes.len(), 3, "invalid crc24 length");
        let expected =
            (u32::from(crc_bytes[0]) << 16) | (u32::from(crc_bytes[1]) << 8) | u32::from(crc_bytes[2]);

        if crc24(&body) != expected {
            return Err(Error::InvalidChecksum { backtrace: None });
        }
    }

    Ok(Dearmored { typ, headers, body })
}

#[cfg(test)]
mod tests {
    use std::str;

    use super::*;

    #[test]
    fn roundtrip() {
        let data: Vec<u8> = (0..255).collect();

        let mut headers = Headers::new();
        headers.insert("Comment".to_string(), vec!["test armor".to_string()]);

        let mut out = Vec::new();
        write(&data, BlockType::Message, &mut out, Some(&headers), true).unwrap();

        let text = str::from_utf8(&out).unwrap();
        assert!(text.starts_with("-----BEGIN PGP MESSAGE-----\n"));
        assert!(text.ends_with("-----END PGP MESSAGE-----\n"));
        assert!(text.contains("Comment: test armor\n"));
        for line in text.lines() {
            assert!(line.len() <= LINE_LENGTH);
        }

        let parsed = parse(text).unwrap();
        assert_eq!(parsed.typ, BlockType::Message);
        assert_eq!(parsed.headers, headers);
        assert_eq!(parsed.body, data);
    }

    #[test]
    fn crc_mismatch_is_detected() {
        let data = b"some data".to_vec();
        let mut out = Vec::new();
        write(&data, BlockType::Message, &mut out, None, true).unwrap();

        let text = str::from_utf8(&out).unwrap();

        // swap the checksum line for a different valid base64 value
        let idx = text.rfind("\n=").unwrap();
        let mut corrupted = text.to_string();
        let existing = &text[idx + 2..idx + 6];
        let replacement = if existing == "AAAA" { "BBBB" } else { "AAAA" };
        corrupted.replace_range(idx + 2..idx + 6, replacement);

        assert!(matches!(
            parse(&corrupted),
            Err(Error::InvalidChecksum { .. })
        ));
    }

    #[test]
    fn known_crc24_value() {
        // crc24 of the empty string is the init vector
        assert_eq!(crc24(b""), 0xB704CE);
    }

    #[test]
    fn missing_wrappers() {
        assert!(parse("not armor at all").is_err());
    }
}
