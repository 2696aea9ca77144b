use chrono::{DateTime, SubsecRound, Utc};
use derive_builder::Builder;
use num_bigint::ModInverse;
use rand::{CryptoRng, Rng};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use smallvec::{smallvec, SmallVec};

use crate::composed::key::secret::{SecretKey, SecretSubkeyWithFlags};
use crate::composed::key::shared::KeyDetails;
use crate::crypto::ecc_curve::ECCCurve;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::{ecdh, ecdsa, eddsa, rsa as rsa_ops, x25519};
use crate::errors::Result;
use crate::packet::{self, KeyFlags, PubKeyInner, UserId};
use crate::types::{
    CompressionAlgorithm, KeyVersion, Mpi, PlainSecretParams, PublicParams, SecretParams,
};

/// The asymmetric algorithm (and parameters) of a key to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyType {
    /// RSA with the given bit size.
    Rsa(u32),
    /// ECDSA over the given curve (signing).
    Ecdsa(ECCCurve),
    /// ECDH over the given curve (encryption).
    Ecdh(ECCCurve),
    /// EdDSA with the legacy MPI framing. v4 keys only.
    EdDSALegacy,
    /// Ed25519, RFC 9580 framing.
    Ed25519,
    /// X25519, RFC 9580 framing.
    X25519,
}

impl KeyType {
    pub fn to_alg(&self) -> PublicKeyAlgorithm {
        match self {
            KeyType::Rsa(_) => PublicKeyAlgorithm::RSA,
            KeyType::Ecdsa(_) => PublicKeyAlgorithm::ECDSA,
            KeyType::Ecdh(_) => PublicKeyAlgorithm::ECDH,
            KeyType::EdDSALegacy => PublicKeyAlgorithm::EdDSALegacy,
            KeyType::Ed25519 => PublicKeyAlgorithm::Ed25519,
            KeyType::X25519 => PublicKeyAlgorithm::X25519,
        }
    }

    pub fn is_signing(&self) -> bool {
        self.to_alg().is_signing()
    }

    /// Generates fresh key material.
    pub fn generate<R: Rng + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<(PublicParams, PlainSecretParams)> {
        match self {
            KeyType::Rsa(bit_size) => {
                let key = rsa_ops::generate_key(rng, *bit_size as usize)?;

                let p = &key.primes()[0];
                let q = &key.primes()[1];
                let u = p
                    .clone()
                    .mod_inverse(q)
                    .and_then(|u| u.to_biguint())
                    .ok_or_else(|| format_err!("invalid RSA primes"))?;

                Ok((
                    PublicParams::Rsa {
                        n: Mpi::from_slice(&key.n().to_bytes_be()),
                        e: Mpi::from_slice(&key.e().to_bytes_be()),
                    },
                    PlainSecretParams::Rsa {
                        d: Mpi::from_slice(&key.d().to_bytes_be()),
                        p: Mpi::from_slice(&p.to_bytes_be()),
                        q: Mpi::from_slice(&q.to_bytes_be()),
                        u: Mpi::from_slice(&u.to_bytes_be()),
                    },
                ))
            }
            KeyType::Ecdsa(curve) => {
                let (public, secret) = ecdsa::generate_key(rng, curve)?;
                Ok((
                    PublicParams::Ecdsa {
                        curve: *curve,
                        p: Mpi::from_slice(&public),
                    },
                    PlainSecretParams::Ecdsa {
                        d: Mpi::from_slice(&secret),
                    },
                ))
            }
            KeyType::Ecdh(curve) => {
                let (public, secret) = ecdh::generate_key(rng, curve)?;
                Ok((
                    PublicParams::Ecdh {
                        curve: *curve,
                        p: Mpi::from_slice(&public),
                        hash: curve.hash_algo(),
                        alg_sym: curve.sym_algo(),
                    },
                    PlainSecretParams::Ecdh {
                        d: Mpi::from_slice(&secret),
                    },
                ))
            }
            KeyType::EdDSALegacy => {
                let (public, secret) = eddsa::generate_key(rng);

                let mut q = Vec::with_capacity(33);
                q.push(0x40);
                q.extend_from_slice(&public);

                Ok((
                    PublicParams::EddsaLegacy {
                        curve: ECCCurve::Ed25519,
                        q: Mpi::from_slice(&q),
                    },
                    PlainSecretParams::EddsaLegacy {
                        d: Mpi::from_slice(&secret[..]),
                    },
                ))
            }
            KeyType::Ed25519 => {
                let (public, secret) = eddsa::generate_key(rng);
                Ok((
                    PublicParams::Ed25519 { public },
                    PlainSecretParams::Ed25519 { secret: *secret },
                ))
            }
            KeyType::X25519 => {
                let (public, secret) = x25519::generate_key(rng);
                Ok((
                    PublicParams::X25519 { public },
                    PlainSecretParams::X25519 { secret: *secret },
                ))
            }
        }
    }

    /// The matching encryption subkey type for a primary of this type.
    fn default_encryption_subkey(&self) -> KeyType {
        match self {
            KeyType::Rsa(bits) => KeyType::Rsa(*bits),
            KeyType::Ecdsa(curve) => KeyType::Ecdh(*curve),
            KeyType::EdDSALegacy => KeyType::Ecdh(ECCCurve::Curve25519),
            KeyType::Ed25519 | KeyType::X25519 => KeyType::X25519,
            KeyType::Ecdh(curve) => KeyType::Ecdh(*curve),
        }
    }
}

/// Parameters for one generated subkey.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct SubkeyParams {
    pub key_type: KeyType,
    /// Signing instead of encryption capability.
    #[builder(default)]
    pub signing: bool,
}

/// Parameters for key generation.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(build_fn(error = "crate::errors::Error"))]
pub struct SecretKeyParams {
    pub key_type: KeyType,

    #[builder(default)]
    pub version: KeyVersion,

    pub primary_user_id: String,

    #[builder(default)]
    pub user_ids: Vec<String>,

    #[builder(default = "Utc::now().trunc_subsecs(0)")]
    pub created_at: DateTime<Utc>,

    /// Key expiration in seconds after creation. `None` means no expiration.
    #[builder(default)]
    pub key_expiry: Option<u32>,

    /// Subkeys to generate. When empty, one encryption-capable subkey of a
    /// type matching the primary is generated.
    #[builder(default)]
    pub subkeys: Vec<SubkeyParams>,

    #[builder(
        default = "smallvec![SymmetricKeyAlgorithm::Aes128, SymmetricKeyAlgorithm::Aes192, SymmetricKeyAlgorithm::Aes256]"
    )]
    pub preferred_symmetric_algorithms: SmallVec<[SymmetricKeyAlgorithm; 8]>,

    #[builder(default = "smallvec![HashAlgorithm::Sha256, HashAlgorithm::Sha512]")]
    pub preferred_hash_algorithms: SmallVec<[HashAlgorithm; 8]>,

    #[builder(
        default = "smallvec![CompressionAlgorithm::Uncompressed, CompressionAlgorithm::Zip, CompressionAlgorithm::Zlib, CompressionAlgorithm::Bzip2]"
    )]
    pub preferred_compression_algorithms: SmallVec<[CompressionAlgorithm; 8]>,
}

impl SecretKeyParams {
    /// Generates the key material for the primary and all subkeys.
    /// The result carries plaintext secret material; sign and lock it via
    /// [`SecretKey::sign`] and `set_password`.
    pub fn generate<R: Rng + CryptoRng>(self, rng: &mut R) -> Result<SecretKey> {
        ensure!(
            matches!(self.version, KeyVersion::V4 | KeyVersion::V6),
            "can only generate v4 and v6 keys"
        );
        ensure!(
            self.key_type.is_signing(),
            "primary key must be signing capable"
        );
        if self.key_type == KeyType::EdDSALegacy {
            ensure!(
                self.version == KeyVersion::V4,
                "EdDSALegacy may only be used with v4 keys"
            );
        }

        let (public_params, secret_params) = self.key_type.generate(rng)?;
        let primary = packet::SecretKey::new(
            packet::PublicKey::new(
                self.version,
                self.key_type.to_alg(),
                self.created_at,
                public_params,
            )?,
            SecretParams::Plain(secret_params),
        )?;

        let mut primary_flags = KeyFlags::default();
        primary_flags.set_certify(true);
        primary_flags.set_sign(true);

        let subkey_params = if self.subkeys.is_empty() {
            vec![SubkeyParams {
                key_type: self.key_type.default_encryption_subkey(),
                signing: false,
            }]
        } else {
            self.subkeys
        };

        let mut subkeys = Vec::with_capacity(subkey_params.len());
        for params in subkey_params {
            if params.signing {
                ensure!(
                    params.key_type.is_signing(),
                    "signing subkey of non signing type {:?}",
                    params.key_type
                );
            } else {
                ensure!(
                    params.key_type.to_alg().is_encryption(),
                    "encryption subkey of non encryption type {:?}",
                    params.key_type
                );
            }

            let (public_params, secret_params) = params.key_type.generate(rng)?;
            let key = packet::SecretSubkey::new(
                packet::PublicSubkey::new(
                    self.version,
                    params.key_type.to_alg(),
                    self.created_at,
                    public_params,
                )?,
                SecretParams::Plain(secret_params),
            )?;

            let mut flags = KeyFlags::default();
            if params.signing {
                flags.set_sign(true);
            } else {
                flags.set_encrypt_comms(true);
                flags.set_encrypt_storage(true);
            }

            subkeys.push(SecretSubkeyWithFlags { key, flags });
        }

        Ok(SecretKey {
            primary_key: primary,
            details: KeyDetails {
                primary_user_id: UserId::from_str(&self.primary_user_id),
                user_ids: self.user_ids.iter().map(|id| UserId::from_str(id)).collect(),
                key_flags: primary_flags,
                preferred_symmetric_algorithms: self.preferred_symmetric_algorithms,
                preferred_hash_algorithms: self.preferred_hash_algorithms,
                preferred_compression_algorithms: self.preferred_compression_algorithms,
                key_expiry: self.key_expiry,
            },
            subkeys,
        })
    }
}
