use num_enum::{FromPrimitive, IntoPrimitive};

/// Available compression algorithms.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-compression-algorithms>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive, Hash)]
#[repr(u8)]
pub enum CompressionAlgorithm {
    Uncompressed = 0,
    /// DEFLATE, RFC 1951
    Zip = 1,
    /// ZLIB, RFC 1950
    Zlib = 2,
    Bzip2 = 3,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Default for CompressionAlgorithm {
    fn default() -> Self {
        Self::Uncompressed
    }
}
