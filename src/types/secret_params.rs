use std::io::{self, BufRead};

use crate::crypto::aead::AeadAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::parsing::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{KeyVersion, PlainSecretParams, StringToKey};

/// The protection mode of serialized secret key material,
/// stored in the s2k usage octet.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum S2kUsage {
    /// Plaintext secret material (v4: followed by a two-octet checksum).
    Unprotected,
    /// CFB encryption with a SHA-1 integrity trailer (usage octet 254).
    Cfb,
    /// AEAD protection with an HKDF-derived key (usage octet 253).
    AeadProtect,
    /// CFB encryption with a malleable two-octet checksum (usage octet 255).
    MalleableCfb,
}

impl S2kUsage {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(S2kUsage::Unprotected),
            253 => Ok(S2kUsage::AeadProtect),
            254 => Ok(S2kUsage::Cfb),
            255 => Ok(S2kUsage::MalleableCfb),
            _ => unsupported_err!("legacy s2k usage {}", v),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            S2kUsage::Unprotected => 0,
            S2kUsage::AeadProtect => 253,
            S2kUsage::Cfb => 254,
            S2kUsage::MalleableCfb => 255,
        }
    }
}

/// Secret key material that is still encrypted under a passphrase.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct EncryptedSecretParams {
    pub usage: S2kUsage,
    pub sym_alg: SymmetricKeyAlgorithm,
    pub aead: Option<AeadAlgorithm>,
    pub s2k: StringToKey,
    #[debug("{}", hex::encode(iv))]
    pub iv: Vec<u8>,
    /// The ciphertext (with integrated SHA-1 trailer for CFB protection,
    /// trailing AEAD tag for AEAD protection).
    #[debug("{}", hex::encode(data))]
    pub data: Vec<u8>,
}

/// The secret parameters of a key packet, plaintext or locked.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SecretParams {
    Plain(PlainSecretParams),
    Encrypted(EncryptedSecretParams),
}

impl SecretParams {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, SecretParams::Encrypted(_))
    }

    /// Parses the secret part of a key packet body.
    pub fn try_from_reader<B: BufRead>(
        alg: PublicKeyAlgorithm,
        version: KeyVersion,
        mut i: B,
    ) -> Result<Self> {
        let usage = S2kUsage::from_u8(i.read_u8()?)?;

        if usage == S2kUsage::Unprotected {
            let params = PlainSecretParams::try_from_reader(alg, &mut i)?;
            if version != KeyVersion::V6 {
                let checksum = i.read_array::<2>()?;
                crate::crypto::checksum::simple(&checksum, &params.to_bytes()?)?;
            }
            return Ok(SecretParams::Plain(params));
        }

        if version == KeyVersion::V6 {
            ensure!(
                usage != S2kUsage::MalleableCfb,
                "v6 keys may not use the malleable CFB protection"
            );
            // octet count of the conditional fields, only used for framing
            let _params_len = i.read_u8()?;
        }

        let sym_alg = SymmetricKeyAlgorithm::from(i.read_u8()?);

        let aead = if usage == S2kUsage::AeadProtect {
            Some(AeadAlgorithm::from(i.read_u8()?))
        } else {
            None
        };

        if version == KeyVersion::V6 {
            let _s2k_len = i.read_u8()?;
        }
        let s2k = StringToKey::try_from_reader(&mut i)?;
        ensure!(
            !s2k.is_argon2() || aead.is_some(),
            "Argon2 s2k requires AEAD protection"
        );

        let iv_len = match (usage, aead) {
            (S2kUsage::AeadProtect, Some(aead)) => aead.iv_size(),
            _ => sym_alg.block_size(),
        };
        let iv = i.take_bytes(iv_len)?;
        let data = i.rest()?;

        Ok(SecretParams::Encrypted(EncryptedSecretParams {
            usage,
            sym_alg,
            aead,
            s2k,
            iv,
            data,
        }))
    }

    /// Serializes the secret part of a key packet body.
    pub fn to_writer_version<W: io::Write>(&self, version: KeyVersion, w: &mut W) -> Result<()> {
        match self {
            SecretParams::Plain(params) => {
                w.write_all(&[S2kUsage::Unprotected.as_u8()])?;
                params.to_writer(w)?;
                if version != KeyVersion::V6 {
                    w.write_all(&params.checksum_simple()?)?;
                }
            }
            SecretParams::Encrypted(enc) => {
                ensure!(
                    !(version == KeyVersion::V6 && enc.usage == S2kUsage::MalleableCfb),
                    "v6 keys may not use the malleable CFB protection"
                );

                w.write_all(&[enc.usage.as_u8()])?;

                let s2k_len = enc.s2k.write_len();
                if version == KeyVersion::V6 {
                    // conditional field framing: sym, [aead], s2k len octet, s2k, iv
                    let params_len =
                        1 + usize::from(enc.aead.is_some()) + 1 + s2k_len + enc.iv.len();
                    w.write_all(&[params_len.try_into()?])?;
                }

                w.write_all(&[u8::from(enc.sym_alg)])?;
                if let Some(aead) = enc.aead {
                    w.write_all(&[u8::from(aead)])?;
                }
                if version == KeyVersion::V6 {
                    w.write_all(&[s2k_len.try_into()?])?;
                }
                enc.s2k.to_writer(w)?;
                w.write_all(&enc.iv)?;
                w.write_all(&enc.data)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::HashAlgorithm;
    use crate::types::Mpi;

    #[test]
    fn v4_plain_roundtrip_with_checksum() {
        let params = PlainSecretParams::Dsa {
            x: Mpi::from_slice(&[5; 20]),
        };

        let secret = SecretParams::Plain(params);
        let mut buf = Vec::new();
        secret
            .to_writer_version(KeyVersion::V4, &mut buf)
            .unwrap();

        let back =
            SecretParams::try_from_reader(PublicKeyAlgorithm::DSA, KeyVersion::V4, &mut &buf[..])
                .unwrap();
        assert_eq!(secret, back);

        // corrupting the checksum must fail the parse
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        assert!(SecretParams::try_from_reader(
            PublicKeyAlgorithm::DSA,
            KeyVersion::V4,
            &mut &buf[..]
        )
        .is_err());
    }

    #[test]
    fn encrypted_v4_roundtrip() {
        let enc = EncryptedSecretParams {
            usage: S2kUsage::Cfb,
            sym_alg: SymmetricKeyAlgorithm::Aes128,
            aead: None,
            s2k: StringToKey::IteratedAndSalted {
                hash: HashAlgorithm::Sha256,
                salt: [1; 8],
                count: 224,
            },
            iv: vec![2; 16],
            data: vec![3; 40],
        };
        let secret = SecretParams::Encrypted(enc);

        let mut buf = Vec::new();
        secret
            .to_writer_version(KeyVersion::V4, &mut buf)
            .unwrap();
        let back = SecretParams::try_from_reader(
            PublicKeyAlgorithm::Ed25519,
            KeyVersion::V4,
            &mut &buf[..],
        )
        .unwrap();
        assert_eq!(secret, back);
    }

    #[test]
    fn encrypted_v6_aead_roundtrip() {
        let enc = EncryptedSecretParams {
            usage: S2kUsage::AeadProtect,
            sym_alg: SymmetricKeyAlgorithm::Aes256,
            aead: Some(AeadAlgorithm::Ocb),
            s2k: StringToKey::Argon2 {
                salt: [9; 16],
                t: 1,
                p: 4,
                m_enc: 10,
            },
            iv: vec![4; 15],
            data: vec![5; 48],
        };
        let secret = SecretParams::Encrypted(enc);

        let mut buf = Vec::new();
        secret
            .to_writer_version(KeyVersion::V6, &mut buf)
            .unwrap();
        let back = SecretParams::try_from_reader(
            PublicKeyAlgorithm::Ed25519,
            KeyVersion::V6,
            &mut &buf[..],
        )
        .unwrap();
        assert_eq!(secret, back);
    }

    #[test]
    fn argon2_without_aead_rejected() {
        // usage 254 (CFB) + argon2 s2k (type 4)
        let mut buf = vec![254u8, u8::from(SymmetricKeyAlgorithm::Aes128), 4];
        buf.extend_from_slice(&[1; 16]); // salt
        buf.extend_from_slice(&[1, 4, 10]); // t, p, m
        buf.extend_from_slice(&[0; 16]); // iv

        assert!(SecretParams::try_from_reader(
            PublicKeyAlgorithm::Ed25519,
            KeyVersion::V4,
            &mut &buf[..]
        )
        .is_err());
    }
}
