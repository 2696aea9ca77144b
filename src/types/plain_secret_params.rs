use std::io::{self, BufRead};

use rsa::{BigUint, RsaPrivateKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::{dsa, ecdsa, eddsa, elgamal, rsa as rsa_ops, x25519};
use crate::errors::Result;
use crate::parsing::BufReadParsing;
use crate::ser::Serialize;
use crate::types::esk::PkeskBytes;
use crate::types::signature_bytes::SignatureBytes;
use crate::types::{Mpi, PublicParams};

/// Algorithm-specific secret key parameters, in the clear.
///
/// Wiped on drop. The serialized form (without checksum or s2k framing) is
/// what gets encrypted when a key is locked under a passphrase.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, derive_more::Debug)]
pub enum PlainSecretParams {
    Rsa {
        #[debug("..")]
        d: Mpi,
        #[debug("..")]
        p: Mpi,
        #[debug("..")]
        q: Mpi,
        #[debug("..")]
        u: Mpi,
    },
    Dsa {
        #[debug("..")]
        x: Mpi,
    },
    Elgamal {
        #[debug("..")]
        x: Mpi,
    },
    Ecdsa {
        #[debug("..")]
        d: Mpi,
    },
    Ecdh {
        #[debug("..")]
        d: Mpi,
    },
    EddsaLegacy {
        #[debug("..")]
        d: Mpi,
    },
    Ed25519 {
        #[debug("..")]
        secret: [u8; 32],
    },
    X25519 {
        #[debug("..")]
        secret: [u8; 32],
    },
}

impl PlainSecretParams {
    /// Parses secret parameters from their raw serialization (no checksum).
    pub fn try_from_reader<B: BufRead>(alg: PublicKeyAlgorithm, mut i: B) -> Result<Self> {
        match alg {
            PublicKeyAlgorithm::RSA
            | PublicKeyAlgorithm::RSAEncrypt
            | PublicKeyAlgorithm::RSASign => {
                let d = Mpi::try_from_reader(&mut i)?;
                let p = Mpi::try_from_reader(&mut i)?;
                let q = Mpi::try_from_reader(&mut i)?;
                let u = Mpi::try_from_reader(&mut i)?;
                Ok(PlainSecretParams::Rsa { d, p, q, u })
            }
            PublicKeyAlgorithm::DSA => Ok(PlainSecretParams::Dsa {
                x: Mpi::try_from_reader(&mut i)?,
            }),
            PublicKeyAlgorithm::Elgamal => Ok(PlainSecretParams::Elgamal {
                x: Mpi::try_from_reader(&mut i)?,
            }),
            PublicKeyAlgorithm::ECDSA => Ok(PlainSecretParams::Ecdsa {
                d: Mpi::try_from_reader(&mut i)?,
            }),
            PublicKeyAlgorithm::ECDH => Ok(PlainSecretParams::Ecdh {
                d: Mpi::try_from_reader(&mut i)?,
            }),
            PublicKeyAlgorithm::EdDSALegacy => Ok(PlainSecretParams::EddsaLegacy {
                d: Mpi::try_from_reader(&mut i)?,
            }),
            PublicKeyAlgorithm::Ed25519 => Ok(PlainSecretParams::Ed25519 {
                secret: i.read_array::<32>()?,
            }),
            PublicKeyAlgorithm::X25519 => Ok(PlainSecretParams::X25519 {
                secret: i.read_array::<32>()?,
            }),
            _ => unsupported_err!("secret params for {:?}", alg),
        }
    }

    /// The two-octet sum checksum over the raw serialization.
    pub fn checksum_simple(&self) -> Result<[u8; 2]> {
        let buf = self.to_bytes()?;
        Ok(crate::crypto::checksum::calculate_simple(&buf).to_be_bytes())
    }

    /// Algebraic consistency check between the secret scalars and the public
    /// parameters.
    pub fn is_valid(&self, public: &PublicParams) -> bool {
        match (self, public) {
            (PlainSecretParams::Rsa { d, p, q, u: _ }, PublicParams::Rsa { n, e }) => {
                RsaPrivateKey::from_components(
                    BigUint::from_bytes_be(n.as_bytes()),
                    BigUint::from_bytes_be(e.as_bytes()),
                    BigUint::from_bytes_be(d.as_bytes()),
                    vec![
                        BigUint::from_bytes_be(p.as_bytes()),
                        BigUint::from_bytes_be(q.as_bytes()),
                    ],
                )
                .map(|key| key.validate().is_ok())
                .unwrap_or(false)
            }
            (PlainSecretParams::Dsa { x }, PublicParams::Dsa { p, g, y, .. }) => {
                dsa::is_valid(p.as_bytes(), g.as_bytes(), y.as_bytes(), x.as_bytes())
            }
            (PlainSecretParams::Ecdsa { d }, PublicParams::Ecdsa { curve, p }) => {
                ecdsa::is_valid(curve, p.as_bytes(), d.as_bytes())
            }
            (PlainSecretParams::Ecdh { d }, PublicParams::Ecdh { curve, p, .. }) => {
                match curve {
                    crate::crypto::ecc_curve::ECCCurve::Curve25519 => {
                        let point = p.as_bytes();
                        if point.len() != 33 || point[0] != 0x40 || d.len() > 32 {
                            return false;
                        }
                        // wire order is big-endian, the native scalar little-endian
                        let mut scalar = crate::util::pad_left(d.as_bytes(), 32);
                        scalar.reverse();
                        let valid = x25519::is_valid(&point[1..], &scalar);
                        scalar.zeroize();
                        valid
                    }
                    _ => ecdsa::is_valid(curve, p.as_bytes(), d.as_bytes()),
                }
            }
            (PlainSecretParams::EddsaLegacy { d }, PublicParams::EddsaLegacy { q, .. }) => {
                let point = q.as_bytes();
                if point.len() != 33 || point[0] != 0x40 {
                    return false;
                }
                let mut scalar = crate::util::pad_left(d.as_bytes(), 32);
                let valid = eddsa::is_valid(&point[1..], &scalar);
                scalar.zeroize();
                valid
            }
            (PlainSecretParams::Ed25519 { secret }, PublicParams::Ed25519 { public }) => {
                eddsa::is_valid(public, secret)
            }
            (PlainSecretParams::X25519 { secret }, PublicParams::X25519 { public }) => {
                x25519::is_valid(public, secret)
            }
            (PlainSecretParams::Elgamal { .. }, PublicParams::Elgamal { .. }) => {
                // no cheap consistency check without ElGamal support
                true
            }
            _ => false,
        }
    }

    /// Create a signature over the given digest.
    pub fn create_signature(
        &self,
        public: &PublicParams,
        hash: HashAlgorithm,
        digest: &[u8],
    ) -> Result<SignatureBytes> {
        match (self, public) {
            (PlainSecretParams::Rsa { d, p, q, .. }, PublicParams::Rsa { n, e }) => {
                let key = RsaPrivateKey::from_components(
                    BigUint::from_bytes_be(n.as_bytes()),
                    BigUint::from_bytes_be(e.as_bytes()),
                    BigUint::from_bytes_be(d.as_bytes()),
                    vec![
                        BigUint::from_bytes_be(p.as_bytes()),
                        BigUint::from_bytes_be(q.as_bytes()),
                    ],
                )?;
                let sig = rsa_ops::sign(&key, hash, digest)?;
                Ok(SignatureBytes::Mpis(vec![Mpi::from_slice(&sig)]))
            }
            (PlainSecretParams::Dsa { x }, PublicParams::Dsa { p, q, g, y }) => {
                let (r, s) = dsa::sign(
                    p.as_bytes(),
                    q.as_bytes(),
                    g.as_bytes(),
                    y.as_bytes(),
                    x.as_bytes(),
                    digest,
                )?;
                Ok(SignatureBytes::Mpis(vec![
                    Mpi::from_slice(&r),
                    Mpi::from_slice(&s),
                ]))
            }
            (PlainSecretParams::Ecdsa { d }, PublicParams::Ecdsa { curve, .. }) => {
                let (r, s) = ecdsa::sign(curve, d.as_bytes(), hash, digest)?;
                Ok(SignatureBytes::Mpis(vec![
                    Mpi::from_slice(&r),
                    Mpi::from_slice(&s),
                ]))
            }
            (PlainSecretParams::EddsaLegacy { d }, PublicParams::EddsaLegacy { .. }) => {
                let mut scalar = crate::util::pad_left(d.as_bytes(), 32);
                let sig = eddsa::sign(&scalar, digest);
                scalar.zeroize();
                let sig = sig?;

                Ok(SignatureBytes::Mpis(vec![
                    Mpi::from_slice(&sig[..32]),
                    Mpi::from_slice(&sig[32..]),
                ]))
            }
            (PlainSecretParams::Ed25519 { secret }, PublicParams::Ed25519 { .. }) => {
                let sig = eddsa::sign(secret, digest)?;
                Ok(SignatureBytes::Native(sig))
            }
            _ => unsupported_err!("signing with {:?}", public.algorithm()),
        }
    }

    /// Recover the session-key payload from PKESK values.
    ///
    /// Returns `sym_alg || session_key || checksum` for the MPI-based
    /// algorithms and the raw session key for X25519.
    pub fn decrypt_session_key(
        &self,
        public: &PublicParams,
        values: &PkeskBytes,
        fingerprint: &[u8],
    ) -> Result<Vec<u8>> {
        match (self, public, values) {
            (
                PlainSecretParams::Rsa { d, p, q, .. },
                PublicParams::Rsa { n, e },
                PkeskBytes::Rsa { mpi },
            ) => {
                let key = RsaPrivateKey::from_components(
                    BigUint::from_bytes_be(n.as_bytes()),
                    BigUint::from_bytes_be(e.as_bytes()),
                    BigUint::from_bytes_be(d.as_bytes()),
                    vec![
                        BigUint::from_bytes_be(p.as_bytes()),
                        BigUint::from_bytes_be(q.as_bytes()),
                    ],
                )?;
                rsa_ops::decrypt(&key, mpi.as_bytes())
            }
            (
                PlainSecretParams::Ecdh { d },
                PublicParams::Ecdh {
                    curve,
                    hash,
                    alg_sym,
                    ..
                },
                PkeskBytes::Ecdh {
                    public_point,
                    encrypted_session_key,
                },
            ) => crate::crypto::ecdh::decrypt(
                curve,
                *hash,
                *alg_sym,
                d.as_bytes(),
                fingerprint,
                public_point.as_bytes(),
                encrypted_session_key,
            ),
            (
                PlainSecretParams::X25519 { secret },
                PublicParams::X25519 { .. },
                PkeskBytes::X25519 {
                    ephemeral,
                    session_key,
                    ..
                },
            ) => x25519::decrypt(secret, ephemeral, session_key),
            (
                PlainSecretParams::Elgamal { x },
                PublicParams::Elgamal { p, .. },
                PkeskBytes::Elgamal { first, second },
            ) => elgamal::decrypt(
                p.as_bytes(),
                x.as_bytes(),
                first.as_bytes(),
                second.as_bytes(),
            ),
            _ => unsupported_err!("decryption with {:?}", public.algorithm()),
        }
    }
}

impl Serialize for PlainSecretParams {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        match self {
            PlainSecretParams::Rsa { d, p, q, u } => {
                d.to_writer(w)?;
                p.to_writer(w)?;
                q.to_writer(w)?;
                u.to_writer(w)?;
            }
            PlainSecretParams::Dsa { x } | PlainSecretParams::Elgamal { x } => {
                x.to_writer(w)?;
            }
            PlainSecretParams::Ecdsa { d }
            | PlainSecretParams::Ecdh { d }
            | PlainSecretParams::EddsaLegacy { d } => {
                d.to_writer(w)?;
            }
            PlainSecretParams::Ed25519 { secret } | PlainSecretParams::X25519 { secret } => {
                w.write_all(secret)?;
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

    #[test]
    fn ed25519_roundtrip_and_validity() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let (public, secret) = eddsa::generate_key(&mut rng);

        let params = PlainSecretParams::Ed25519 { secret: *secret };
        let public_params = PublicParams::Ed25519 { public };

        assert!(params.is_valid(&public_params));

        let buf = params.to_bytes().unwrap();
        let back =
            PlainSecretParams::try_from_reader(PublicKeyAlgorithm::Ed25519, &mut &buf[..]).unwrap();
        assert_eq!(params, back);
    }

    #[test]
    fn mismatched_params_are_invalid() {
        let mut rng = ChaCha8Rng::seed_from_u64(22);
        let (public, _) = eddsa::generate_key(&mut rng);
        let (_, other_secret) = eddsa::generate_key(&mut rng);

        let params = PlainSecretParams::Ed25519 {
            secret: *other_secret,
        };
        assert!(!params.is_valid(&PublicParams::Ed25519 { public }));
    }
}
