use std::{fmt::Display, str::FromStr};

use digest::Digest;
use md5::Md5;
use num_enum::{FromPrimitive, IntoPrimitive};
use ripemd::Ripemd160;
use sha1::Sha1;

use crate::errors::{Error, Result};

/// Available hash algorithms.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-hash-algorithms>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive, Hash)]
#[repr(u8)]
pub enum HashAlgorithm {
    None = 0,
    Md5 = 1,
    Sha1 = 2,
    Ripemd160 = 3,

    Sha256 = 8,
    Sha384 = 9,
    Sha512 = 10,
    Sha224 = 11,
    Sha3_256 = 12,
    Sha3_512 = 14,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Sha256
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "MD5" => Ok(Self::Md5),
            "SHA1" => Ok(Self::Sha1),
            "RIPEMD160" => Ok(Self::Ripemd160),
            "SHA256" => Ok(Self::Sha256),
            "SHA384" => Ok(Self::Sha384),
            "SHA512" => Ok(Self::Sha512),
            "SHA224" => Ok(Self::Sha224),
            "SHA3-256" => Ok(Self::Sha3_256),
            "SHA3-512" => Ok(Self::Sha3_512),
            _ => bail!("unknown hash algorithm {:?}", s),
        }
    }
}

impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "None",
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA1",
            Self::Ripemd160 => "RIPEMD160",
            Self::Sha256 => "SHA256",
            Self::Sha384 => "SHA384",
            Self::Sha512 => "SHA512",
            Self::Sha224 => "SHA224",
            Self::Sha3_256 => "SHA3-256",
            Self::Sha3_512 => "SHA3-512",
            Self::Other(v) => return write!(f, "Other({})", v),
        };
        write!(f, "{}", s)
    }
}

/// Trait to work around the fact that the `Digest` trait from rustcrypto can not
/// be used as `Box<dyn Digest>`.
pub trait Hasher {
    /// Update the hash with the given value.
    fn update(&mut self, _: &[u8]);
    /// Finalize the hash and return the result.
    fn finish(self: Box<Self>) -> Vec<u8>;
}

macro_rules! derive_hasher {
    ($name:ident, $struct:path) => {
        #[derive(Clone, Default)]
        pub struct $name {
            inner: $struct,
        }

        impl Hasher for $name {
            fn update(&mut self, data: &[u8]) {
                self.inner.update(data);
            }

            fn finish(self: Box<Self>) -> Vec<u8> {
                self.inner.finalize().as_slice().to_vec()
            }
        }
    };
}

derive_hasher!(Md5Hasher, Md5);
derive_hasher!(Sha1Hasher, Sha1);
derive_hasher!(Ripemd160Hasher, Ripemd160);
derive_hasher!(Sha256Hasher, sha2::Sha256);
derive_hasher!(Sha384Hasher, sha2::Sha384);
derive_hasher!(Sha512Hasher, sha2::Sha512);
derive_hasher!(Sha224Hasher, sha2::Sha224);
derive_hasher!(Sha3_256Hasher, sha3::Sha3_256);
derive_hasher!(Sha3_512Hasher, sha3::Sha3_512);

impl HashAlgorithm {
    /// Create a new hasher.
    pub fn new_hasher(self) -> Result<Box<dyn Hasher>> {
        match self {
            HashAlgorithm::Md5 => Ok(Box::<Md5Hasher>::default()),
            HashAlgorithm::Sha1 => Ok(Box::<Sha1Hasher>::default()),
            HashAlgorithm::Ripemd160 => Ok(Box::<Ripemd160Hasher>::default()),
            HashAlgorithm::Sha256 => Ok(Box::<Sha256Hasher>::default()),
            HashAlgorithm::Sha384 => Ok(Box::<Sha384Hasher>::default()),
            HashAlgorithm::Sha512 => Ok(Box::<Sha512Hasher>::default()),
            HashAlgorithm::Sha224 => Ok(Box::<Sha224Hasher>::default()),
            HashAlgorithm::Sha3_256 => Ok(Box::<Sha3_256Hasher>::default()),
            HashAlgorithm::Sha3_512 => Ok(Box::<Sha3_512Hasher>::default()),
            _ => unsupported_err!("hasher {:?}", self),
        }
    }

    /// Calculate the digest of the given input data.
    pub fn digest(self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(match self {
            HashAlgorithm::Md5 => Md5::digest(data).to_vec(),
            HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            HashAlgorithm::Ripemd160 => Ripemd160::digest(data).to_vec(),
            HashAlgorithm::Sha256 => sha2::Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => sha2::Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => sha2::Sha512::digest(data).to_vec(),
            HashAlgorithm::Sha224 => sha2::Sha224::digest(data).to_vec(),
            HashAlgorithm::Sha3_256 => sha3::Sha3_256::digest(data).to_vec(),
            HashAlgorithm::Sha3_512 => sha3::Sha3_512::digest(data).to_vec(),
            _ => unsupported_err!("hasher {:?}", self),
        })
    }

    /// Returns the expected digest size for the given algorithm, in bytes.
    pub fn digest_size(self) -> usize {
        match self {
            HashAlgorithm::Md5 => Md5::output_size(),
            HashAlgorithm::Sha1 => Sha1::output_size(),
            HashAlgorithm::Ripemd160 => Ripemd160::output_size(),
            HashAlgorithm::Sha256 => sha2::Sha256::output_size(),
            HashAlgorithm::Sha384 => sha2::Sha384::output_size(),
            HashAlgorithm::Sha512 => sha2::Sha512::output_size(),
            HashAlgorithm::Sha224 => sha2::Sha224::output_size(),
            HashAlgorithm::Sha3_256 => sha3::Sha3_256::output_size(),
            HashAlgorithm::Sha3_512 => sha3::Sha3_512::output_size(),
            _ => 0,
        }
    }

    /// Salt length for v6 signatures.
    /// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#hash-algorithms-registry>
    pub fn salt_len(self) -> Option<usize> {
        match self {
            HashAlgorithm::Sha256 | HashAlgorithm::Sha224 | HashAlgorithm::Sha3_256 => Some(16),
            HashAlgorithm::Sha384 => Some(24),
            HashAlgorithm::Sha512 | HashAlgorithm::Sha3_512 => Some(32),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_sizes() {
        assert_eq!(HashAlgorithm::Sha1.digest_size(), 20);
        assert_eq!(HashAlgorithm::Sha256.digest_size(), 32);
        assert_eq!(HashAlgorithm::Sha512.digest_size(), 64);
        assert_eq!(HashAlgorithm::Other(99).digest_size(), 0);
    }

    #[test]
    fn known_answer_sha256() {
        let digest = HashAlgorithm::Sha256.digest(b"abc").unwrap();
        assert_eq!(
            hex::encode(digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
