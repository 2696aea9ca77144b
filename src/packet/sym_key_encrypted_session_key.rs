use std::io::{self, BufRead};

use byteorder::WriteBytesExt;
use hkdf::Hkdf;
use log::debug;
use rand::{CryptoRng, Rng};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::crypto::aead::AeadAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::parsing::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{SessionKey, StringToKey, Tag};

/// Symmetric-Key Encrypted Session Key Packet
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-symmetric-key-encrypted-ses>
#[derive(derive_more::Debug, Clone, PartialEq, Eq)]
pub enum SymKeyEncryptedSessionKey {
    V4 {
        sym_algorithm: SymmetricKeyAlgorithm,
        s2k: StringToKey,
        #[debug("{:?}", encrypted_key.as_ref().map(hex::encode))]
        encrypted_key: Option<Vec<u8>>,
    },
    V6 {
        sym_algorithm: SymmetricKeyAlgorithm,
        s2k: StringToKey,
        aead: AeadAlgorithm,
        #[debug("{}", hex::encode(iv))]
        iv: Vec<u8>,
        #[debug("{}", hex::encode(auth_tag))]
        auth_tag: Vec<u8>,
        #[debug("{}", hex::encode(encrypted_key))]
        encrypted_key: Vec<u8>,
    },
}

impl SymKeyEncryptedSessionKey {
    /// Parses a `SymKeyEncryptedSessionKey` packet body.
    pub fn from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        match version {
            4 => {
                let sym_algorithm = SymmetricKeyAlgorithm::from(i.read_u8()?);
                let s2k = StringToKey::try_from_reader(&mut i)?;
                let rest = i.rest()?;
                let encrypted_key = if rest.is_empty() { None } else { Some(rest) };

                Ok(SymKeyEncryptedSessionKey::V4 {
                    sym_algorithm,
                    s2k,
                    encrypted_key,
                })
            }
            6 => {
                let _count = i.read_u8()?;
                let sym_algorithm = SymmetricKeyAlgorithm::from(i.read_u8()?);
                let aead = AeadAlgorithm::from(i.read_u8()?);
                let _s2k_len = i.read_u8()?;
                let s2k = StringToKey::try_from_reader(&mut i)?;
                let iv = i.take_bytes(aead.iv_size())?;
                let rest = i.rest()?;
                ensure!(rest.len() > aead.tag_size(), "SKESK v6 too short");
                let (esk, auth_tag) = rest.split_at(rest.len() - aead.tag_size());

                Ok(SymKeyEncryptedSessionKey::V6 {
                    sym_algorithm,
                    s2k,
                    aead,
                    iv,
                    auth_tag: auth_tag.to_vec(),
                    encrypted_key: esk.to_vec(),
                })
            }
            _ => unsupported_err!("SKESK version {}", version),
        }
    }

    pub fn version(&self) -> u8 {
        match self {
            Self::V4 { .. } => 4,
            Self::V6 { .. } => 6,
        }
    }

    pub fn sym_algorithm(&self) -> SymmetricKeyAlgorithm {
        match self {
            Self::V4 { sym_algorithm, .. } | Self::V6 { sym_algorithm, .. } => *sym_algorithm,
        }
    }

    pub fn s2k(&self) -> &StringToKey {
        match self {
            Self::V4 { s2k, .. } | Self::V6 { s2k, .. } => s2k,
        }
    }

    pub fn tag(&self) -> Tag {
        Tag::SymKeyEncryptedSessionKey
    }

    fn hkdf_info(sym_algorithm: SymmetricKeyAlgorithm, aead: AeadAlgorithm) -> [u8; 4] {
        [
            Tag::SymKeyEncryptedSessionKey.encode(),
            0x06,
            sym_algorithm.into(),
            aead.into(),
        ]
    }

    /// Recover the session key with the given passphrase.
    pub fn decrypt(&self, passphrase: &str) -> Result<SessionKey> {
        debug!("decrypt session key V{}", self.version());

        match self {
            Self::V4 {
                sym_algorithm,
                s2k,
                encrypted_key,
            } => {
                let key = s2k.derive_key(passphrase, sym_algorithm.key_size())?;

                match encrypted_key {
                    None => {
                        // the derived key is the session key
                        Ok(SessionKey::new(key.to_vec(), *sym_algorithm))
                    }
                    Some(enc) => {
                        let mut decrypted = enc.clone();
                        sym_algorithm.decrypt_regular(&key, &mut decrypted)?;

                        ensure!(decrypted.len() > 1, "invalid SKESK payload");
                        let nested = SymmetricKeyAlgorithm::from(decrypted[0]);
                        ensure_eq!(
                            decrypted.len() - 1,
                            nested.key_size(),
                            "invalid SKESK session key length"
                        );

                        Ok(SessionKey::new(decrypted[1..].to_vec(), nested))
                    }
                }
            }
            Self::V6 {
                sym_algorithm,
                s2k,
                aead,
                iv,
                auth_tag,
                encrypted_key,
            } => {
                let ikm = s2k.derive_key(passphrase, sym_algorithm.key_size())?;
                let info = Self::hkdf_info(*sym_algorithm, *aead);

                let hk = Hkdf::<Sha256>::new(None, &ikm);
                let mut okm = Zeroizing::new(vec![0u8; sym_algorithm.key_size()]);
                hk.expand(&info, &mut okm)
                    .map_err(|_| format_err!("hkdf expand failed"))?;

                let mut decrypted = encrypted_key.clone();
                aead.decrypt_in_place(*sym_algorithm, &okm, iv, &info, auth_tag, &mut decrypted)?;

                Ok(SessionKey::new(decrypted, *sym_algorithm))
            }
        }
    }

    /// Encrypts a session key under a passphrase, v4 style.
    pub fn encrypt(
        msg_pw: &str,
        session_key: &SessionKey,
        s2k: StringToKey,
    ) -> Result<Self> {
        ensure!(
            s2k.uses_salt(),
            "can not use an s2k algorithm without a salt: {:?}",
            s2k
        );
        ensure!(!s2k.is_argon2(), "v4 SKESK can not use Argon2");

        let alg = session_key.sym_alg();
        let key = s2k.derive_key(msg_pw, alg.key_size())?;

        let mut encrypted_key = Vec::with_capacity(session_key.as_bytes().len() + 1);
        encrypted_key.push(u8::from(alg));
        encrypted_key.extend_from_slice(session_key.as_bytes());
        alg.encrypt_regular(&key, &mut encrypted_key)?;

        Ok(SymKeyEncryptedSessionKey::V4 {
            sym_algorithm: alg,
            s2k,
            encrypted_key: Some(encrypted_key),
        })
    }

    /// Encrypts a session key under a passphrase with AEAD, v6 style.
    pub fn encrypt_v6<R: CryptoRng + Rng>(
        rng: &mut R,
        msg_pw: &str,
        session_key: &SessionKey,
        s2k: StringToKey,
        aead: AeadAlgorithm,
    ) -> Result<Self> {
        ensure!(
            s2k.uses_salt(),
            "can not use an s2k algorithm without a salt: {:?}",
            s2k
        );

        let sym_algorithm = session_key.sym_alg();
        let ikm = s2k.derive_key(msg_pw, sym_algorithm.key_size())?;
        let info = Self::hkdf_info(sym_algorithm, aead);

        let hk = Hkdf::<Sha256>::new(None, &ikm);
        let mut okm = Zeroizing::new(vec![0u8; sym_algorithm.key_size()]);
        hk.expand(&info, &mut okm)
            .map_err(|_| format_err!("hkdf expand failed"))?;

        let mut iv = vec![0u8; aead.iv_size()];
        rng.fill_bytes(&mut iv);

        let mut encrypted_key = session_key.as_bytes().to_vec();
        let auth_tag =
            aead.encrypt_in_place(sym_algorithm, &okm, &iv, &info, &mut encrypted_key)?;

        Ok(SymKeyEncryptedSessionKey::V6 {
            sym_algorithm,
            s2k,
            aead,
            iv,
            auth_tag,
            encrypted_key,
        })
    }
}

impl Serialize for SymKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            SymKeyEncryptedSessionKey::V4 {
                sym_algorithm,
                s2k,
                encrypted_key,
            } => {
                writer.write_u8(0x04)?;
                writer.write_u8((*sym_algorithm).into())?;
                s2k.to_writer(writer)?;
                if let Some(ref key) = encrypted_key {
                    writer.write_all(key)?;
                }
            }
            SymKeyEncryptedSessionKey::V6 {
                sym_algorithm,
                s2k,
                aead,
                iv,
                auth_tag,
                encrypted_key,
            } => {
                writer.write_u8(0x06)?;

                let mut first_buf = vec![u8::from(*sym_algorithm), u8::from(*aead)];
                let s2k_buf = s2k.to_bytes()?;
                first_buf.push(s2k_buf.len().try_into()?);
                first_buf.extend(s2k_buf);
                first_buf.extend_from_slice(iv);

                writer.write_u8(first_buf.len().try_into()?)?;
                writer.write_all(&first_buf)?;

                writer.write_all(encrypted_key)?;
                writer.write_all(auth_tag)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::crypto::hash::HashAlgorithm;

    #[test]
    fn v4_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(51);
        let session_key = SessionKey::generate(&mut rng, SymmetricKeyAlgorithm::Aes128);
        let s2k = StringToKey::new_iterated(&mut rng, HashAlgorithm::Sha256, 224);

        let skesk = SymKeyEncryptedSessionKey::encrypt("secret", &session_key, s2k).unwrap();

        let buf = skesk.to_bytes().unwrap();
        let back = SymKeyEncryptedSessionKey::from_reader(&mut &buf[..]).unwrap();
        assert_eq!(skesk, back);

        let recovered = back.decrypt("secret").unwrap();
        assert_eq!(recovered, session_key);
    }

    #[test]
    fn v4_wrong_passphrase() {
        let mut rng = ChaCha8Rng::seed_from_u64(52);
        let session_key = SessionKey::generate(&mut rng, SymmetricKeyAlgorithm::Aes128);
        let s2k = StringToKey::new_iterated(&mut rng, HashAlgorithm::Sha256, 224);

        let skesk = SymKeyEncryptedSessionKey::encrypt("secret", &session_key, s2k).unwrap();

        // a wrong passphrase fails the nested algorithm/size plausibility check
        // (or, in the worst case, yields a wrong key that fails at the SEIPD layer)
        match skesk.decrypt("wrong") {
            Ok(recovered) => assert_ne!(recovered, session_key),
            Err(_) => {}
        }
    }

    #[test]
    fn v6_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(53);
        let session_key = SessionKey::generate(&mut rng, SymmetricKeyAlgorithm::Aes256);
        let s2k = StringToKey::new_argon2(&mut rng);
        let s2k = match s2k {
            StringToKey::Argon2 { salt, t, p, .. } => StringToKey::Argon2 {
                salt,
                t,
                p,
                // keep the test cheap
                m_enc: 10,
            },
            other => other,
        };

        let skesk = SymKeyEncryptedSessionKey::encrypt_v6(
            &mut rng,
            "secret",
            &session_key,
            s2k,
            AeadAlgorithm::Ocb,
        )
        .unwrap();

        let buf = skesk.to_bytes().unwrap();
        let back = SymKeyEncryptedSessionKey::from_reader(&mut &buf[..]).unwrap();
        assert_eq!(skesk, back);

        let recovered = back.decrypt("secret").unwrap();
        assert_eq!(recovered, session_key);

        assert!(back.decrypt("wrong").is_err());
    }
}
