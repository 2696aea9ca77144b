use std::io::{self, BufRead, Read, Write};

use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::Compression;

use crate::errors::Result;
use crate::parsing::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{CompressionAlgorithm, Tag};

/// Compressed Data Packet
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-compressed-data-packet-type>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct CompressedData {
    alg: CompressionAlgorithm,
    #[debug("{} bytes", compressed.len())]
    compressed: Vec<u8>,
}

impl CompressedData {
    pub fn from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let alg = CompressionAlgorithm::from(i.read_u8()?);
        let compressed = i.rest()?;

        Ok(CompressedData { alg, compressed })
    }

    /// Compresses the given bytes.
    pub fn compress(alg: CompressionAlgorithm, data: &[u8]) -> Result<Self> {
        let compressed = match alg {
            CompressionAlgorithm::Uncompressed => data.to_vec(),
            CompressionAlgorithm::Zip => {
                let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
                enc.write_all(data)?;
                enc.finish()?
            }
            CompressionAlgorithm::Zlib => {
                let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
                enc.write_all(data)?;
                enc.finish()?
            }
            _ => unsupported_err!("compression with {:?}", alg),
        };

        Ok(CompressedData { alg, compressed })
    }

    /// Decompresses the contained data.
    pub fn decompress(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        match self.alg {
            CompressionAlgorithm::Uncompressed => out.extend_from_slice(&self.compressed),
            CompressionAlgorithm::Zip => {
                DeflateDecoder::new(&self.compressed[..]).read_to_end(&mut out)?;
            }
            CompressionAlgorithm::Zlib => {
                ZlibDecoder::new(&self.compressed[..]).read_to_end(&mut out)?;
            }
            _ => unsupported_err!("decompression with {:?}", self.alg),
        }
        Ok(out)
    }

    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.alg
    }

    pub fn tag(&self) -> Tag {
        Tag::CompressedData
    }
}

impl Serialize for CompressedData {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&[u8::from(self.alg)])?;
        w.write_all(&self.compressed)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + self.compressed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_roundtrip() {
        let data = b"hello hello hello hello compression".repeat(10);
        for alg in [
            CompressionAlgorithm::Uncompressed,
            CompressionAlgorithm::Zip,
            CompressionAlgorithm::Zlib,
        ] {
            let packet = CompressedData::compress(alg, &data).unwrap();
            assert_eq!(packet.decompress().unwrap(), data);

            let buf = packet.to_bytes().unwrap();
            let back = CompressedData::from_reader(&mut &buf[..]).unwrap();
            assert_eq!(packet, back);
        }
    }

    #[test]
    fn bzip2_unsupported() {
        assert!(CompressedData::compress(CompressionAlgorithm::Bzip2, b"data").is_err());
    }
}
