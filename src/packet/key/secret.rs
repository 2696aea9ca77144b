use std::io::{self, BufRead};

use chrono::{DateTime, Utc};
use hkdf::Hkdf;
use rand::{CryptoRng, Rng};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::crypto::aead::AeadAlgorithm;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::key::public::{PublicKey, PublicSubkey};
use crate::ser::Serialize;
use crate::types::{
    EncryptedSecretParams, Fingerprint, KeyId, KeyVersion, PkeskBytes, PlainSecretParams,
    PublicKeyTrait, PublicParams, S2kUsage, SecretKeyTrait, SecretParams, SignatureBytes,
    StringToKey, Tag,
};

/// How secret key material is protected under a passphrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyProtection {
    /// CFB encryption with a SHA-1 trailer and an iterated-salted S2K.
    Cfb {
        sym_alg: SymmetricKeyAlgorithm,
    },
    /// AEAD protection with an HKDF-derived key. v6 keys only.
    Aead {
        sym_alg: SymmetricKeyAlgorithm,
        aead: AeadAlgorithm,
        /// Argon2 instead of iterated-salted key derivation.
        argon2: bool,
    },
}

/// Derives the KEK for AEAD-protected secret key material.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-secret-key-packet-formats>
fn aead_kek(
    derived: &[u8],
    tag: Tag,
    version: KeyVersion,
    sym_alg: SymmetricKeyAlgorithm,
    aead: AeadAlgorithm,
) -> Result<Zeroizing<Vec<u8>>> {
    let info = [
        tag.encode(),
        u8::from(version),
        u8::from(sym_alg),
        u8::from(aead),
    ];

    let hk = Hkdf::<Sha256>::new(None, derived);
    let mut kek = Zeroizing::new(vec![0u8; sym_alg.key_size()]);
    hk.expand(&info, &mut kek)
        .map_err(|_| format_err!("hkdf expand failed"))?;

    Ok(kek)
}

macro_rules! impl_secret_key {
    ($name:ident, $tag:expr, $details:ident) => {
        #[derive(derive_more::Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            details: $details,
            #[debug("..")]
            secret_params: SecretParams,
        }

        impl $name {
            pub fn new(details: $details, secret_params: SecretParams) -> Result<Self> {
                if let SecretParams::Encrypted(ref enc) = secret_params {
                    ensure!(
                        !(details.version() == KeyVersion::V6
                            && enc.usage == S2kUsage::MalleableCfb),
                        "v6 keys may not use the malleable CFB protection"
                    );
                    ensure!(
                        !enc.s2k.is_argon2() || enc.aead.is_some(),
                        "Argon2 s2k requires AEAD protection"
                    );
                }
                Ok($name {
                    details,
                    secret_params,
                })
            }

            pub fn from_reader<B: BufRead>(mut i: B) -> Result<Self> {
                let details = $details::from_reader(&mut i)?;
                let secret_params =
                    SecretParams::try_from_reader(details.algorithm(), details.version(), &mut i)?;

                $name::new(details, secret_params)
            }

            pub fn tag(&self) -> Tag {
                $tag
            }

            pub fn public_key(&self) -> &$details {
                &self.details
            }

            pub fn secret_params(&self) -> &SecretParams {
                &self.secret_params
            }

            pub fn is_locked(&self) -> bool {
                self.secret_params.is_encrypted()
            }

            /// Returns the plaintext secret material, deriving it from the
            /// passphrase when locked.
            pub fn unlocked_params<F>(&self, key_pw: F) -> Result<PlainSecretParams>
            where
                F: FnOnce() -> String,
            {
                match &self.secret_params {
                    SecretParams::Plain(plain) => Ok(plain.clone()),
                    SecretParams::Encrypted(enc) => self.unlock_params(enc, &key_pw()),
                }
            }

            fn unlock_params(
                &self,
                enc: &EncryptedSecretParams,
                passphrase: &str,
            ) -> Result<PlainSecretParams> {
                let derived = enc.s2k.derive_key(passphrase, enc.sym_alg.key_size())?;

                match enc.usage {
                    S2kUsage::Unprotected => unreachable!("plain material is not encrypted"),
                    S2kUsage::Cfb => {
                        let mut data = enc.data.clone();
                        enc.sym_alg
                            .decrypt_with_iv_regular(&derived, &enc.iv, &mut data)?;

                        ensure!(data.len() > 20, "missing SHA1 trailer");
                        let (material, trailer) = data.split_at(data.len() - 20);
                        let expected = crate::crypto::checksum::calculate_sha1([material])?;
                        if trailer != expected {
                            return Err(Error::IncorrectPassphrase { backtrace: None });
                        }

                        PlainSecretParams::try_from_reader(
                            self.details.algorithm(),
                            &mut &material[..],
                        )
                    }
                    S2kUsage::MalleableCfb => {
                        let mut data = enc.data.clone();
                        enc.sym_alg
                            .decrypt_with_iv_regular(&derived, &enc.iv, &mut data)?;

                        ensure!(data.len() > 2, "missing checksum");
                        let (material, checksum) = data.split_at(data.len() - 2);
                        if crate::crypto::checksum::simple(checksum, material).is_err() {
                            return Err(Error::IncorrectPassphrase { backtrace: None });
                        }

                        PlainSecretParams::try_from_reader(
                            self.details.algorithm(),
                            &mut &material[..],
                        )
                    }
                    S2kUsage::AeadProtect => {
                        let aead = enc
                            .aead
                            .ok_or_else(|| format_err!("missing AEAD algorithm"))?;
                        let kek =
                            aead_kek(&derived, $tag, self.details.version(), enc.sym_alg, aead)?;

                        ensure!(enc.data.len() > aead.tag_size(), "missing AEAD tag");
                        let (ct, tag) = enc.data.split_at(enc.data.len() - aead.tag_size());

                        let mut aad = vec![$tag.encode()];
                        self.details.to_writer(&mut aad)?;

                        let mut data = ct.to_vec();
                        if aead
                            .decrypt_in_place(enc.sym_alg, &kek, &enc.iv, &aad, tag, &mut data)
                            .is_err()
                        {
                            return Err(Error::IncorrectPassphrase { backtrace: None });
                        }

                        PlainSecretParams::try_from_reader(
                            self.details.algorithm(),
                            &mut &data[..],
                        )
                    }
                }
            }

            /// Locks the secret material under the given passphrase,
            /// returning the protected copy. The input is unchanged.
            pub fn set_password<R: CryptoRng + Rng>(
                &self,
                rng: &mut R,
                passphrase: &str,
            ) -> Result<Self> {
                let protection = if self.details.version() == KeyVersion::V6 {
                    KeyProtection::Aead {
                        sym_alg: SymmetricKeyAlgorithm::Aes256,
                        aead: AeadAlgorithm::Ocb,
                        argon2: true,
                    }
                } else {
                    KeyProtection::Cfb {
                        sym_alg: SymmetricKeyAlgorithm::Aes128,
                    }
                };
                self.set_password_with_protection(rng, passphrase, protection)
            }

            /// Locks the secret material with an explicit protection setup.
            pub fn set_password_with_protection<R: CryptoRng + Rng>(
                &self,
                rng: &mut R,
                passphrase: &str,
                protection: KeyProtection,
            ) -> Result<Self> {
                ensure!(!passphrase.is_empty(), "empty passphrase is not allowed");
                let SecretParams::Plain(ref plain) = self.secret_params else {
                    bail!("secret params are already encrypted");
                };

                let enc = match protection {
                    KeyProtection::Cfb { sym_alg } => {
                        ensure!(
                            sym_alg != SymmetricKeyAlgorithm::Plaintext,
                            "invalid protection cipher"
                        );
                        let s2k = StringToKey::new_default(rng);
                        let derived = s2k.derive_key(passphrase, sym_alg.key_size())?;

                        let mut iv = vec![0u8; sym_alg.block_size()];
                        rng.fill_bytes(&mut iv);

                        let material = plain.to_bytes()?;
                        let mut data = material.clone();
                        data.extend_from_slice(&crate::crypto::checksum::calculate_sha1([
                            &material,
                        ])?);
                        sym_alg.encrypt_with_iv_regular(&derived, &iv, &mut data)?;

                        EncryptedSecretParams {
                            usage: S2kUsage::Cfb,
                            sym_alg,
                            aead: None,
                            s2k,
                            iv,
                            data,
                        }
                    }
                    KeyProtection::Aead {
                        sym_alg,
                        aead,
                        argon2,
                    } => {
                        ensure!(
                            self.details.version() == KeyVersion::V6,
                            "AEAD protection requires a v6 key"
                        );
                        ensure!(
                            sym_alg != SymmetricKeyAlgorithm::Plaintext,
                            "invalid protection cipher"
                        );

                        let s2k = if argon2 {
                            StringToKey::new_argon2(rng)
                        } else {
                            StringToKey::new_default(rng)
                        };
                        let derived = s2k.derive_key(passphrase, sym_alg.key_size())?;
                        let kek = aead_kek(&derived, $tag, self.details.version(), sym_alg, aead)?;

                        let mut iv = vec![0u8; aead.iv_size()];
                        rng.fill_bytes(&mut iv);

                        let mut aad = vec![$tag.encode()];
                        self.details.to_writer(&mut aad)?;

                        let mut data = plain.to_bytes()?;
                        let tag = aead.encrypt_in_place(sym_alg, &kek, &iv, &aad, &mut data)?;
                        data.extend_from_slice(&tag);

                        EncryptedSecretParams {
                            usage: S2kUsage::AeadProtect,
                            sym_alg,
                            aead: Some(aead),
                            s2k,
                            iv,
                            data,
                        }
                    }
                };

                $name::new(self.details.clone(), SecretParams::Encrypted(enc))
            }

            /// Unlocks the secret material, returning the plaintext copy.
            /// The input is unchanged.
            pub fn remove_password<F>(&self, key_pw: F) -> Result<Self>
            where
                F: FnOnce() -> String,
            {
                let plain = self.unlocked_params(key_pw)?;
                $name::new(self.details.clone(), SecretParams::Plain(plain))
            }
        }

        impl Serialize for $name {
            fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
                self.details.to_writer(w)?;
                self.secret_params
                    .to_writer_version(self.details.version(), w)?;
                Ok(())
            }
        }

        impl PublicKeyTrait for $name {
            fn version(&self) -> KeyVersion {
                self.details.version()
            }

            fn fingerprint(&self) -> Fingerprint {
                self.details.fingerprint()
            }

            fn key_id(&self) -> KeyId {
                self.details.key_id()
            }

            fn algorithm(&self) -> PublicKeyAlgorithm {
                self.details.algorithm()
            }

            fn created_at(&self) -> &DateTime<Utc> {
                self.details.created_at()
            }

            fn public_params(&self) -> &PublicParams {
                self.details.public_params()
            }

            fn serialize_for_hashing<W: io::Write>(&self, writer: &mut W) -> Result<()> {
                self.details.serialize_for_hashing(writer)
            }

            fn verify_signature(
                &self,
                hash: HashAlgorithm,
                data: &[u8],
                sig: &SignatureBytes,
            ) -> Result<()> {
                self.details.verify_signature(hash, data, sig)
            }

            fn encrypt_session_key<R: CryptoRng + Rng>(
                &self,
                rng: &mut R,
                plain: &[u8],
            ) -> Result<PkeskBytes> {
                self.details.encrypt_session_key(rng, plain)
            }
        }

        impl SecretKeyTrait for $name {
            fn create_signature<F>(
                &self,
                key_pw: F,
                hash: HashAlgorithm,
                prehashed_data: &[u8],
            ) -> Result<SignatureBytes>
            where
                F: FnOnce() -> String,
            {
                let plain = self.unlocked_params(key_pw)?;
                plain.create_signature(self.details.public_params(), hash, prehashed_data)
            }
        }
    };
}

impl_secret_key!(SecretKey, Tag::SecretKey, PublicKey);
impl_secret_key!(SecretSubkey, Tag::SecretSubkey, PublicSubkey);

impl SecretKey {
    pub fn into_subkey(self) -> SecretSubkey {
        SecretSubkey {
            details: self.details.into_subkey(),
            secret_params: self.secret_params,
        }
    }
}

impl SecretSubkey {
    /// Recover the session key payload from PKESK values addressed to this key.
    pub fn decrypt_session_key<F>(
        &self,
        key_pw: F,
        values: &PkeskBytes,
    ) -> Result<Vec<u8>>
    where
        F: FnOnce() -> String,
    {
        let plain = self.unlocked_params(key_pw)?;
        let fingerprint = self.fingerprint();
        plain.decrypt_session_key(self.public_params(), values, fingerprint.as_bytes())
    }
}

impl SecretKey {
    /// Recover the session key payload from PKESK values addressed to this key.
    pub fn decrypt_session_key<F>(
        &self,
        key_pw: F,
        values: &PkeskBytes,
    ) -> Result<Vec<u8>>
    where
        F: FnOnce() -> String,
    {
        let plain = self.unlocked_params(key_pw)?;
        let fingerprint = self.fingerprint();
        plain.decrypt_session_key(self.public_params(), values, fingerprint.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{SubsecRound, Utc};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::crypto::eddsa;
    use crate::packet::key::public::PubKeyInner;

    fn ed25519_key(rng: &mut ChaCha8Rng, version: KeyVersion) -> SecretKey {
        let (public, secret) = eddsa::generate_key(rng);
        let details = PublicKey::from_inner(
            PubKeyInner::new(
                version,
                PublicKeyAlgorithm::Ed25519,
                Utc::now().trunc_subsecs(0),
                PublicParams::Ed25519 { public },
            )
            .unwrap(),
        );
        SecretKey::new(
            details,
            SecretParams::Plain(PlainSecretParams::Ed25519 { secret: *secret }),
        )
        .unwrap()
    }

    #[test]
    fn lock_unlock_cfb() {
        let mut rng = ChaCha8Rng::seed_from_u64(31);
        let key = ed25519_key(&mut rng, KeyVersion::V4);

        let locked = key.set_password(&mut rng, "correct horse").unwrap();
        assert!(locked.is_locked());

        let unlocked = locked.remove_password(|| "correct horse".into()).unwrap();
        assert_eq!(key, unlocked);

        let err = locked
            .remove_password(|| "wrong".into())
            .unwrap_err();
        assert!(matches!(err, Error::IncorrectPassphrase { .. }));
    }

    #[test]
    fn lock_unlock_aead_argon2() {
        let mut rng = ChaCha8Rng::seed_from_u64(32);
        let key = ed25519_key(&mut rng, KeyVersion::V6);

        let locked = key
            .set_password_with_protection(
                &mut rng,
                "pw",
                KeyProtection::Aead {
                    sym_alg: SymmetricKeyAlgorithm::Aes256,
                    aead: AeadAlgorithm::Ocb,
                    argon2: true,
                },
            )
            .unwrap();
        assert!(locked.is_locked());

        // wire roundtrip keeps the ciphertext intact
        let buf = locked.to_bytes().unwrap();
        let back = SecretKey::from_reader(&mut &buf[..]).unwrap();
        assert_eq!(locked, back);

        let unlocked = back.remove_password(|| "pw".into()).unwrap();
        assert_eq!(key, unlocked);

        let err = back.remove_password(|| "nope".into()).unwrap_err();
        assert!(matches!(err, Error::IncorrectPassphrase { .. }));
    }

    #[test]
    fn aead_protection_requires_v6() {
        let mut rng = ChaCha8Rng::seed_from_u64(33);
        let key = ed25519_key(&mut rng, KeyVersion::V4);

        assert!(key
            .set_password_with_protection(
                &mut rng,
                "pw",
                KeyProtection::Aead {
                    sym_alg: SymmetricKeyAlgorithm::Aes256,
                    aead: AeadAlgorithm::Ocb,
                    argon2: true,
                },
            )
            .is_err());
    }

    #[test]
    fn empty_passphrase_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(34);
        let key = ed25519_key(&mut rng, KeyVersion::V4);
        assert!(key.set_password(&mut rng, "").is_err());
    }
}
