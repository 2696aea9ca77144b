use std::io::{self, BufRead};

use byteorder::WriteBytesExt;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::packet::signature::SignatureType;
use crate::parsing::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{Fingerprint, KeyId, KeyVersion, Tag};

/// One-Pass Signature Packet
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-one-pass-signature-packet-t>
///
/// Announces an upcoming signature so the data can be hashed in a single
/// pass. v3 pairs with v4 signatures, v6 with v6 signatures.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub enum OnePassSignature {
    V3 {
        typ: SignatureType,
        hash_algorithm: HashAlgorithm,
        pub_algorithm: PublicKeyAlgorithm,
        key_id: KeyId,
        last: u8,
    },
    V6 {
        typ: SignatureType,
        hash_algorithm: HashAlgorithm,
        pub_algorithm: PublicKeyAlgorithm,
        #[debug("{}", hex::encode(salt))]
        salt: Vec<u8>,
        fingerprint: Fingerprint,
        last: u8,
    },
}

impl OnePassSignature {
    pub fn from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        match version {
            3 => {
                let typ = SignatureType::from(i.read_u8()?);
                let hash_algorithm = HashAlgorithm::from(i.read_u8()?);
                let pub_algorithm = PublicKeyAlgorithm::from(i.read_u8()?);
                let key_id = KeyId::from_slice(&i.take_bytes(8)?)?;
                let last = i.read_u8()?;

                Ok(OnePassSignature::V3 {
                    typ,
                    hash_algorithm,
                    pub_algorithm,
                    key_id,
                    last,
                })
            }
            6 => {
                let typ = SignatureType::from(i.read_u8()?);
                let hash_algorithm = HashAlgorithm::from(i.read_u8()?);
                let pub_algorithm = PublicKeyAlgorithm::from(i.read_u8()?);
                let salt_len = i.read_u8()?;
                let salt = i.take_bytes(salt_len.into())?;
                let fingerprint = Fingerprint::new(KeyVersion::V6, &i.read_array::<32>()?)?;
                let last = i.read_u8()?;

                Ok(OnePassSignature::V6 {
                    typ,
                    hash_algorithm,
                    pub_algorithm,
                    salt,
                    fingerprint,
                    last,
                })
            }
            _ => unsupported_err!("one pass signature version {}", version),
        }
    }

    pub fn v3(
        typ: SignatureType,
        hash_algorithm: HashAlgorithm,
        pub_algorithm: PublicKeyAlgorithm,
        key_id: KeyId,
    ) -> Self {
        OnePassSignature::V3 {
            typ,
            hash_algorithm,
            pub_algorithm,
            key_id,
            last: 1,
        }
    }

    pub fn v6(
        typ: SignatureType,
        hash_algorithm: HashAlgorithm,
        pub_algorithm: PublicKeyAlgorithm,
        salt: Vec<u8>,
        fingerprint: Fingerprint,
    ) -> Self {
        OnePassSignature::V6 {
            typ,
            hash_algorithm,
            pub_algorithm,
            salt,
            fingerprint,
            last: 1,
        }
    }

    pub fn typ(&self) -> SignatureType {
        match self {
            Self::V3 { typ, .. } | Self::V6 { typ, .. } => *typ,
        }
    }

    /// Is this the last one-pass header before the literal data?
    pub fn is_last(&self) -> bool {
        match self {
            Self::V3 { last, .. } | Self::V6 { last, .. } => *last != 0,
        }
    }

    /// Marks this header as nested (not the last before the data).
    pub fn set_nested(&mut self) {
        match self {
            Self::V3 { last, .. } | Self::V6 { last, .. } => *last = 0,
        }
    }

    pub fn tag(&self) -> Tag {
        Tag::OnePassSignature
    }
}

impl Serialize for OnePassSignature {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        match self {
            OnePassSignature::V3 {
                typ,
                hash_algorithm,
                pub_algorithm,
                key_id,
                last,
            } => {
                w.write_u8(0x03)?;
                w.write_u8((*typ).into())?;
                w.write_u8((*hash_algorithm).into())?;
                w.write_u8((*pub_algorithm).into())?;
                w.write_all(key_id.as_ref())?;
                w.write_u8(*last)?;
            }
            OnePassSignature::V6 {
                typ,
                hash_algorithm,
                pub_algorithm,
                salt,
                fingerprint,
                last,
            } => {
                w.write_u8(0x06)?;
                w.write_u8((*typ).into())?;
                w.write_u8((*hash_algorithm).into())?;
                w.write_u8((*pub_algorithm).into())?;
                w.write_u8(salt.len().try_into()?)?;
                w.write_all(salt)?;
                w.write_all(fingerprint.as_bytes())?;
                w.write_u8(*last)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v3_roundtrip() {
        let mut ops = OnePassSignature::v3(
            SignatureType::Binary,
            HashAlgorithm::Sha256,
            PublicKeyAlgorithm::Ed25519,
            KeyId::from([1, 2, 3, 4, 5, 6, 7, 8]),
        );
        assert!(ops.is_last());
        ops.set_nested();
        assert!(!ops.is_last());

        let buf = ops.to_bytes().unwrap();
        let back = OnePassSignature::from_reader(&mut &buf[..]).unwrap();
        assert_eq!(ops, back);
    }
}
