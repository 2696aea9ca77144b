use std::io::{self, BufRead};

use byteorder::{BigEndian, WriteBytesExt};
use chrono::{DateTime, TimeZone, Utc};
use rand::{CryptoRng, Rng};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::parsing::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{
    Fingerprint, KeyId, KeyVersion, PkeskBytes, PublicKeyTrait, PublicParams, SignatureBytes, Tag,
};

/// The shared contents of public key and public subkey packets.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-public-key-packet-type-id-6>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubKeyInner {
    version: KeyVersion,
    algorithm: PublicKeyAlgorithm,
    created_at: DateTime<Utc>,
    public_params: PublicParams,
}

impl PubKeyInner {
    pub fn new(
        version: KeyVersion,
        algorithm: PublicKeyAlgorithm,
        created_at: DateTime<Utc>,
        public_params: PublicParams,
    ) -> Result<Self> {
        ensure!(
            matches!(version, KeyVersion::V4 | KeyVersion::V6),
            "unsupported key version {:?}",
            version
        );
        Ok(PubKeyInner {
            version,
            algorithm,
            created_at,
            public_params,
        })
    }

    fn from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let version = KeyVersion::from(i.read_u8()?);
        match version {
            KeyVersion::V4 => {
                let created_at = i.read_be_u32()?;
                let algorithm = PublicKeyAlgorithm::from(i.read_u8()?);
                let public_params = PublicParams::try_from_reader(algorithm, &mut i)?;

                Ok(PubKeyInner {
                    version,
                    algorithm,
                    created_at: timestamp(created_at)?,
                    public_params,
                })
            }
            KeyVersion::V6 => {
                let created_at = i.read_be_u32()?;
                let algorithm = PublicKeyAlgorithm::from(i.read_u8()?);
                let material_len = i.read_be_u32()?;
                let material = i.take_bytes(material_len.try_into()?)?;
                let public_params = PublicParams::try_from_reader(algorithm, &mut &material[..])?;

                Ok(PubKeyInner {
                    version,
                    algorithm,
                    created_at: timestamp(created_at)?,
                    public_params,
                })
            }
            _ => unsupported_err!("key version {:?}", version),
        }
    }

    /// The packet body, without any hashing frame.
    fn body_to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_u8(self.version.into())?;
        w.write_u32::<BigEndian>(self.created_at.timestamp().try_into()?)?;
        w.write_u8(self.algorithm.into())?;

        let material = self.public_params.to_bytes()?;
        if self.version == KeyVersion::V6 {
            w.write_u32::<BigEndian>(material.len().try_into()?)?;
        }
        w.write_all(&material)?;

        Ok(())
    }

    fn serialize_for_hashing<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let body = self.body_to_bytes()?;
        match self.version {
            KeyVersion::V4 => {
                writer.write_u8(0x99)?;
                writer.write_u16::<BigEndian>(body.len().try_into()?)?;
            }
            KeyVersion::V6 => {
                writer.write_u8(0x9B)?;
                writer.write_u32::<BigEndian>(body.len().try_into()?)?;
            }
            _ => unsupported_err!("hashing serialization for {:?}", self.version),
        }
        writer.write_all(&body)?;
        Ok(())
    }

    fn body_to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.body_to_writer(&mut buf)?;
        Ok(buf)
    }

    fn fingerprint(&self) -> Fingerprint {
        let hash = match self.version {
            KeyVersion::V4 => HashAlgorithm::Sha1,
            _ => HashAlgorithm::Sha256,
        };

        let mut buf = Vec::new();
        self.serialize_for_hashing(&mut buf)
            .expect("writing to a vec");
        let digest = hash.digest(&buf).expect("fingerprint hash is available");

        Fingerprint::new(self.version, &digest).expect("digest length matches version")
    }

    fn key_id(&self) -> KeyId {
        let fingerprint = self.fingerprint();
        let bytes = fingerprint.as_bytes();
        let id = match self.version {
            // low 64 bits of the fingerprint
            KeyVersion::V4 => &bytes[bytes.len() - 8..],
            // high 64 bits of the fingerprint
            _ => &bytes[..8],
        };
        KeyId::from_slice(id).expect("fixed size slice")
    }
}

fn timestamp(ts: u32) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(ts.into(), 0)
        .single()
        .ok_or_else(|| format_err!("invalid key creation timestamp"))
}

macro_rules! impl_public_key {
    ($name:ident, $tag:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(PubKeyInner);

        impl $name {
            pub fn new(
                version: KeyVersion,
                algorithm: PublicKeyAlgorithm,
                created_at: DateTime<Utc>,
                public_params: PublicParams,
            ) -> Result<Self> {
                Ok($name(PubKeyInner::new(
                    version,
                    algorithm,
                    created_at,
                    public_params,
                )?))
            }

            pub fn from_inner(inner: PubKeyInner) -> Self {
                $name(inner)
            }

            pub fn from_reader<B: BufRead>(i: B) -> Result<Self> {
                Ok($name(PubKeyInner::from_reader(i)?))
            }

            pub fn tag(&self) -> Tag {
                $tag
            }
        }

        impl Serialize for $name {
            fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
                self.0.body_to_writer(w)
            }
        }

        impl PublicKeyTrait for $name {
            fn version(&self) -> KeyVersion {
                self.0.version
            }

            fn fingerprint(&self) -> Fingerprint {
                self.0.fingerprint()
            }

            fn key_id(&self) -> KeyId {
                self.0.key_id()
            }

            fn algorithm(&self) -> PublicKeyAlgorithm {
                self.0.algorithm
            }

            fn created_at(&self) -> &DateTime<Utc> {
                &self.0.created_at
            }

            fn public_params(&self) -> &PublicParams {
                &self.0.public_params
            }

            fn serialize_for_hashing<W: io::Write>(&self, writer: &mut W) -> Result<()> {
                self.0.serialize_for_hashing(writer)
            }

            fn verify_signature(
                &self,
                hash: HashAlgorithm,
                data: &[u8],
                sig: &SignatureBytes,
            ) -> Result<()> {
                self.0.public_params.verify_signature(hash, data, sig)
            }

            fn encrypt_session_key<R: CryptoRng + Rng>(
                &self,
                rng: &mut R,
                plain: &[u8],
            ) -> Result<PkeskBytes> {
                let fingerprint = self.fingerprint();
                self.0
                    .public_params
                    .encrypt_session_key(rng, plain, fingerprint.as_bytes())
            }
        }
    };
}

impl_public_key!(PublicKey, Tag::PublicKey);
impl_public_key!(PublicSubkey, Tag::PublicSubkey);

impl PublicKey {
    /// Reframe as a subkey packet, as used in transferable key serialization.
    pub fn into_subkey(self) -> PublicSubkey {
        PublicSubkey(self.0)
    }
}

impl PublicSubkey {
    pub fn into_primary(self) -> PublicKey {
        PublicKey(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Mpi;

    fn key() -> PublicKey {
        PublicKey::new(
            KeyVersion::V4,
            PublicKeyAlgorithm::RSA,
            timestamp(1_500_000_000).unwrap(),
            PublicParams::Rsa {
                n: Mpi::from_slice(&[0xAB; 256]),
                e: Mpi::from_slice(&[0x01, 0x00, 0x01]),
            },
        )
        .unwrap()
    }

    #[test]
    fn roundtrip() {
        let key = key();
        let buf = key.to_bytes().unwrap();
        let back = PublicKey::from_reader(&mut &buf[..]).unwrap();
        assert_eq!(key, back);
    }

    #[test]
    fn fingerprint_is_stable() {
        let key = key();
        assert_eq!(key.fingerprint(), key.fingerprint());
        assert_eq!(key.fingerprint().len(), 20);

        let buf = key.to_bytes().unwrap();
        let back = PublicKey::from_reader(&mut &buf[..]).unwrap();
        assert_eq!(key.key_id(), back.key_id());
    }

    #[test]
    fn v2_key_is_rejected() {
        let mut buf = key().to_bytes().unwrap();
        buf[0] = 2;
        assert!(PublicKey::from_reader(&mut &buf[..]).is_err());
    }
}
