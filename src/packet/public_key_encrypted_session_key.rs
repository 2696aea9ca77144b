use std::io::{self, BufRead};

use byteorder::WriteBytesExt;
use rand::{CryptoRng, Rng};

use crate::crypto::checksum;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::parsing::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{KeyId, PkeskBytes, PublicKeyTrait, SessionKey, Tag};

/// Public-Key Encrypted Session Key Packet, version 3.
/// <https://www.rfc-editor.org/rfc/rfc4880#section-5.1>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct PublicKeyEncryptedSessionKey {
    id: KeyId,
    pk_algo: PublicKeyAlgorithm,
    values: PkeskBytes,
}

impl PublicKeyEncryptedSessionKey {
    /// Parses a `PublicKeyEncryptedSessionKey` packet body.
    pub fn from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        ensure!(version == 3, "unsupported PKESK version {}", version);

        let id = KeyId::from_slice(&i.take_bytes(8)?)?;
        let pk_algo = PublicKeyAlgorithm::from(i.read_u8()?);
        let values = PkeskBytes::try_from_reader(pk_algo, &mut i)?;

        Ok(PublicKeyEncryptedSessionKey {
            id,
            pk_algo,
            values,
        })
    }

    /// Encrypts the given session key to `key`.
    pub fn from_session_key<R: CryptoRng + Rng, K>(
        rng: &mut R,
        session_key: &SessionKey,
        key: &K,
    ) -> Result<Self>
    where
        K: PublicKeyTrait,
    {
        // the payload is algorithm dependent: X25519 carries the raw session
        // key, everything else `sym_alg || session_key || checksum`
        let values = match key.public_params().algorithm() {
            PublicKeyAlgorithm::X25519 => {
                let mut values = key.encrypt_session_key(rng, session_key.as_bytes())?;
                if let PkeskBytes::X25519 {
                    ref mut sym_alg, ..
                } = values
                {
                    *sym_alg = Some(session_key.sym_alg());
                }
                values
            }
            _ => {
                let mut plain =
                    Vec::with_capacity(1 + session_key.as_bytes().len() + 2);
                plain.push(u8::from(session_key.sym_alg()));
                plain.extend_from_slice(session_key.as_bytes());
                checksum::simple_to_writer(session_key.as_bytes(), &mut plain)?;

                key.encrypt_session_key(rng, &plain)?
            }
        };

        Ok(PublicKeyEncryptedSessionKey {
            id: key.key_id(),
            pk_algo: key.algorithm(),
            values,
        })
    }

    /// Interprets the decrypted payload `m`, verifying the checksum.
    pub fn session_key_from_plain(&self, m: &[u8]) -> Result<SessionKey> {
        match self.pk_algo {
            PublicKeyAlgorithm::X25519 => {
                let PkeskBytes::X25519 { sym_alg, .. } = &self.values else {
                    bail!("inconsistent PKESK state");
                };
                let sym_alg = sym_alg.ok_or_else(|| format_err!("missing sym algorithm"))?;
                ensure_eq!(m.len(), sym_alg.key_size(), "invalid session key length");

                Ok(SessionKey::new(m.to_vec(), sym_alg))
            }
            _ => {
                ensure!(m.len() > 3, "session key payload too short");
                let sym_alg = SymmetricKeyAlgorithm::from(m[0]);
                let (key, chk) = m[1..].split_at(m.len() - 3);
                checksum::simple(chk, key)?;
                ensure_eq!(key.len(), sym_alg.key_size(), "invalid session key length");

                Ok(SessionKey::new(key.to_vec(), sym_alg))
            }
        }
    }

    pub fn id(&self) -> &KeyId {
        &self.id
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.pk_algo
    }

    pub fn values(&self) -> &PkeskBytes {
        &self.values
    }

    /// Does this packet address the given key?
    pub fn matches<K: PublicKeyTrait>(&self, key: &K) -> bool {
        (self.id.is_wildcard() || self.id == key.key_id()) && self.pk_algo == key.algorithm()
    }

    pub fn tag(&self) -> Tag {
        Tag::PublicKeyEncryptedSessionKey
    }
}

impl Serialize for PublicKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_u8(0x03)?;
        w.write_all(self.id.as_ref())?;
        w.write_u8(self.pk_algo.into())?;
        self.values.to_writer(w)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{SubsecRound, Utc};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::crypto::x25519;
    use crate::packet::key::{PubKeyInner, PublicKey};
    use crate::types::{KeyVersion, PublicParams};

    #[test]
    fn x25519_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(41);
        let (public, secret) = x25519::generate_key(&mut rng);

        let key = PublicKey::from_inner(
            PubKeyInner::new(
                KeyVersion::V4,
                PublicKeyAlgorithm::X25519,
                Utc::now().trunc_subsecs(0),
                PublicParams::X25519 { public },
            )
            .unwrap(),
        );

        let session_key = SessionKey::generate(&mut rng, SymmetricKeyAlgorithm::Aes128);
        let pkesk =
            PublicKeyEncryptedSessionKey::from_session_key(&mut rng, &session_key, &key).unwrap();
        assert!(pkesk.matches(&key));

        let buf = pkesk.to_bytes().unwrap();
        let back = PublicKeyEncryptedSessionKey::from_reader(&mut &buf[..]).unwrap();
        assert_eq!(pkesk, back);

        // unwrap by hand using the secret part
        let PkeskBytes::X25519 {
            ephemeral,
            session_key: wrapped,
            ..
        } = back.values()
        else {
            panic!("wrong values")
        };
        let m = x25519::decrypt(&secret[..], ephemeral, wrapped).unwrap();
        let recovered = back.session_key_from_plain(&m).unwrap();
        assert_eq!(recovered, session_key);
    }
}
