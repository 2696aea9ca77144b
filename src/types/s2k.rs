use std::io::{self, BufRead};

use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::hash::HashAlgorithm;
use crate::errors::Result;
use crate::parsing::BufReadParsing;
use crate::ser::Serialize;

const EXPBIAS: u32 = 6;

/// Decodes the coded iteration count.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-iterated-and-salted-s2k>
#[inline]
fn decode_count(coded: u8) -> usize {
    ((16u32 + u32::from(coded & 15)) << (u32::from(coded >> 4) + EXPBIAS)) as usize
}

/// String-to-Key specifier: derives a symmetric key from a passphrase.
///
/// Each variant has a fixed, self-describing octet length on the wire.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-string-to-key-s2k-specifier>
#[derive(derive_more::Debug, Clone, PartialEq, Eq)]
pub enum StringToKey {
    Simple {
        hash: HashAlgorithm,
    },
    Salted {
        hash: HashAlgorithm,
        #[debug("{}", hex::encode(salt))]
        salt: [u8; 8],
    },
    IteratedAndSalted {
        hash: HashAlgorithm,
        #[debug("{}", hex::encode(salt))]
        salt: [u8; 8],
        count: u8,
    },
    Argon2 {
        #[debug("{}", hex::encode(salt))]
        salt: [u8; 16],
        t: u8,
        p: u8,
        /// Memory usage exponent, memory is `2^m_enc` KiB.
        m_enc: u8,
    },
}

impl StringToKey {
    pub fn new_default<R: CryptoRng + Rng>(rng: &mut R) -> Self {
        StringToKey::new_iterated(rng, HashAlgorithm::default(), 224)
    }

    pub fn new_iterated<R: CryptoRng + Rng>(rng: &mut R, hash: HashAlgorithm, count: u8) -> Self {
        let mut salt = [0u8; 8];
        rng.fill(&mut salt[..]);

        StringToKey::IteratedAndSalted { hash, salt, count }
    }

    /// Argon2id with the RFC 9580 recommended parameters (t=1, p=4, 2 GiB).
    pub fn new_argon2<R: CryptoRng + Rng>(rng: &mut R) -> Self {
        let mut salt = [0u8; 16];
        rng.fill(&mut salt[..]);

        StringToKey::Argon2 {
            salt,
            t: 1,
            p: 4,
            m_enc: 21,
        }
    }

    pub fn type_id(&self) -> u8 {
        match self {
            StringToKey::Simple { .. } => 0,
            StringToKey::Salted { .. } => 1,
            StringToKey::IteratedAndSalted { .. } => 3,
            StringToKey::Argon2 { .. } => 4,
        }
    }

    /// Does key derivation use a salt? Required for message encryption.
    pub fn uses_salt(&self) -> bool {
        !matches!(self, StringToKey::Simple { .. })
    }

    /// Is this an AEAD-only specifier?
    pub fn is_argon2(&self) -> bool {
        matches!(self, StringToKey::Argon2 { .. })
    }

    pub fn try_from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let typ = i.read_u8()?;
        match typ {
            0 => {
                let hash = HashAlgorithm::from(i.read_u8()?);
                Ok(StringToKey::Simple { hash })
            }
            1 => {
                let hash = HashAlgorithm::from(i.read_u8()?);
                let salt = i.read_array::<8>()?;
                Ok(StringToKey::Salted { hash, salt })
            }
            3 => {
                let hash = HashAlgorithm::from(i.read_u8()?);
                let salt = i.read_array::<8>()?;
                let count = i.read_u8()?;
                Ok(StringToKey::IteratedAndSalted { hash, salt, count })
            }
            4 => {
                let salt = i.read_array::<16>()?;
                let t = i.read_u8()?;
                let p = i.read_u8()?;
                let m_enc = i.read_u8()?;
                Ok(StringToKey::Argon2 { salt, t, p, m_enc })
            }
            _ => unsupported_err!("S2K type {}", typ),
        }
    }

    /// String-To-Key methods are used to convert a given passphrase into a key
    /// of `key_size` bytes.
    /// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-string-to-key-usage>
    pub fn derive_key(&self, passphrase: &str, key_size: usize) -> Result<Zeroizing<Vec<u8>>> {
        ensure!(!passphrase.is_empty(), "empty passphrase is not allowed");

        if let StringToKey::Argon2 { salt, t, p, m_enc } = self {
            ensure!(!salt.iter().all(|b| *b == 0), "all zero argon2 salt");

            let params = argon2::Params::new(
                1u32.checked_shl(u32::from(*m_enc))
                    .ok_or_else(|| format_err!("argon2 memory exponent too large"))?,
                u32::from(*t),
                u32::from(*p),
                Some(key_size),
            )?;
            let argon2 =
                argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

            let mut key = Zeroizing::new(vec![0u8; key_size]);
            argon2.hash_password_into(passphrase.as_bytes(), &salt[..], &mut key)?;

            return Ok(key);
        }

        let hash = match self {
            StringToKey::Simple { hash }
            | StringToKey::Salted { hash, .. }
            | StringToKey::IteratedAndSalted { hash, .. } => *hash,
            StringToKey::Argon2 { .. } => unreachable!("handled above"),
        };
        let digest_size = hash.digest_size();
        ensure!(digest_size > 0, "invalid hash algorithm for S2K");
        let rounds = key_size.div_ceil(digest_size);

        let mut key = Zeroizing::new(Vec::with_capacity(key_size));

        for round in 0..rounds {
            let mut hasher = hash.new_hasher()?;

            // preload with `round` zero octets, so each round produces
            // an independent digest
            if round > 0 {
                hasher.update(&vec![0u8; round]);
            }

            match self {
                StringToKey::Simple { .. } => {
                    hasher.update(passphrase.as_bytes());
                }
                StringToKey::Salted { salt, .. } => {
                    hasher.update(salt);
                    hasher.update(passphrase.as_bytes());
                }
                StringToKey::IteratedAndSalted { salt, count, .. } => {
                    let pw = passphrase.as_bytes();
                    let data_size = salt.len() + pw.len();
                    // how many bytes are supposed to be hashed, never less
                    // than one full set
                    let mut todo = decode_count(*count).max(data_size);

                    while todo > data_size {
                        hasher.update(salt);
                        hasher.update(pw);
                        todo -= data_size;
                    }

                    if todo < salt.len() {
                        hasher.update(&salt[..todo]);
                    } else {
                        hasher.update(salt);
                        hasher.update(&pw[..todo - salt.len()]);
                    }
                }
                StringToKey::Argon2 { .. } => unreachable!("handled above"),
            }

            let digest = hasher.finish();
            let missing = key_size - key.len();
            key.extend_from_slice(&digest[..missing.min(digest_size)]);
        }

        Ok(key)
    }
}

impl Serialize for StringToKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.type_id()])?;

        match self {
            StringToKey::Simple { hash } => {
                writer.write_all(&[u8::from(*hash)])?;
            }
            StringToKey::Salted { hash, salt } => {
                writer.write_all(&[u8::from(*hash)])?;
                writer.write_all(salt)?;
            }
            StringToKey::IteratedAndSalted { hash, salt, count } => {
                writer.write_all(&[u8::from(*hash)])?;
                writer.write_all(salt)?;
                writer.write_all(&[*count])?;
            }
            StringToKey::Argon2 { salt, t, p, m_enc } => {
                writer.write_all(salt)?;
                writer.write_all(&[*t, *p, *m_enc])?;
            }
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            StringToKey::Simple { .. } => 2,
            StringToKey::Salted { .. } => 10,
            StringToKey::IteratedAndSalted { .. } => 11,
            StringToKey::Argon2 { .. } => 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coded_count() {
        assert_eq!(decode_count(0), 1024);
        assert_eq!(decode_count(96), 65536);
        assert_eq!(decode_count(255), 65011712);
    }

    #[test]
    fn wire_roundtrip() {
        let specs = [
            StringToKey::Simple {
                hash: HashAlgorithm::Sha256,
            },
            StringToKey::Salted {
                hash: HashAlgorithm::Sha256,
                salt: [1; 8],
            },
            StringToKey::IteratedAndSalted {
                hash: HashAlgorithm::Sha512,
                salt: [2; 8],
                count: 224,
            },
            StringToKey::Argon2 {
                salt: [3; 16],
                t: 1,
                p: 4,
                m_enc: 10,
            },
        ];

        for s2k in specs {
            let buf = s2k.to_bytes().unwrap();
            assert_eq!(buf.len(), s2k.write_len());
            let back = StringToKey::try_from_reader(&mut &buf[..]).unwrap();
            assert_eq!(s2k, back);
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(StringToKey::try_from_reader(&mut &[2u8, 8][..]).is_err());
        assert!(StringToKey::try_from_reader(&mut &[100u8, 8][..]).is_err());
    }

    #[test]
    fn iterated_derivation_is_deterministic() {
        let s2k = StringToKey::IteratedAndSalted {
            hash: HashAlgorithm::Sha256,
            salt: *b"saltsalt",
            count: 96,
        };

        let k1 = s2k.derive_key("password", 16).unwrap();
        let k2 = s2k.derive_key("password", 16).unwrap();
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 16);

        let k3 = s2k.derive_key("other", 16).unwrap();
        assert_ne!(k1, k3);

        // longer keys span multiple digest rounds
        let k4 = s2k.derive_key("password", 40).unwrap();
        assert_eq!(k4.len(), 40);
        assert_eq!(&k4[..16], &k1[..]);
    }

    #[test]
    fn empty_passphrase_rejected() {
        let s2k = StringToKey::Simple {
            hash: HashAlgorithm::Sha256,
        };
        assert!(s2k.derive_key("", 16).is_err());
    }

    #[test]
    fn argon2_zero_salt_rejected() {
        let s2k = StringToKey::Argon2 {
            salt: [0; 16],
            t: 1,
            p: 4,
            m_enc: 10,
        };
        assert!(s2k.derive_key("password", 16).is_err());
    }

    #[test]
    fn argon2_derivation() {
        let s2k = StringToKey::Argon2 {
            salt: [7; 16],
            t: 1,
            p: 4,
            m_enc: 10,
        };
        let k1 = s2k.derive_key("password", 32).unwrap();
        let k2 = s2k.derive_key("password", 32).unwrap();
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 32);
    }
}
