use std::io::{self, BufRead};

use rand::{CryptoRng, Rng};

use crate::crypto::ecc_curve::{ecc_curve_from_oid, ECCCurve};
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::{dsa, ecdsa, eddsa, rsa as rsa_ops, x25519};
use crate::errors::Result;
use crate::parsing::BufReadParsing;
use crate::ser::Serialize;
use crate::types::esk::PkeskBytes;
use crate::types::signature_bytes::SignatureBytes;
use crate::types::Mpi;

/// Algorithm-specific public key parameters, as a closed tagged variant.
///
/// Unknown algorithms deserialize into the `Unknown` arm, which re-serializes
/// byte-identically but supports no crypto operations.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub enum PublicParams {
    Rsa {
        n: Mpi,
        e: Mpi,
    },
    Dsa {
        p: Mpi,
        q: Mpi,
        g: Mpi,
        y: Mpi,
    },
    Elgamal {
        p: Mpi,
        g: Mpi,
        y: Mpi,
    },
    Ecdsa {
        curve: ECCCurve,
        p: Mpi,
    },
    Ecdh {
        curve: ECCCurve,
        p: Mpi,
        hash: HashAlgorithm,
        alg_sym: SymmetricKeyAlgorithm,
    },
    EddsaLegacy {
        curve: ECCCurve,
        q: Mpi,
    },
    Ed25519 {
        #[debug("{}", hex::encode(public))]
        public: [u8; 32],
    },
    X25519 {
        #[debug("{}", hex::encode(public))]
        public: [u8; 32],
    },
    Ed448 {
        #[debug("{}", hex::encode(public))]
        public: [u8; 57],
    },
    X448 {
        #[debug("{}", hex::encode(public))]
        public: [u8; 56],
    },
    Unknown {
        alg: PublicKeyAlgorithm,
        #[debug("{}", hex::encode(data))]
        data: Vec<u8>,
    },
}

fn read_curve<B: BufRead>(mut i: B) -> Result<ECCCurve> {
    let oid_len = i.read_u8()?;
    ensure!(oid_len > 0 && oid_len < 0xFF, "invalid curve OID length");
    let oid = i.take_bytes(oid_len.into())?;

    ecc_curve_from_oid(&oid).ok_or_else(|| format_err!("unknown curve OID {}", hex::encode(&oid)))
}

fn write_curve<W: io::Write>(curve: &ECCCurve, w: &mut W) -> Result<()> {
    let oid = curve.oid();
    w.write_all(&[oid.len().try_into()?])?;
    w.write_all(&oid)?;
    Ok(())
}

impl PublicParams {
    pub fn try_from_reader<B: BufRead>(alg: PublicKeyAlgorithm, mut i: B) -> Result<Self> {
        match alg {
            PublicKeyAlgorithm::RSA
            | PublicKeyAlgorithm::RSAEncrypt
            | PublicKeyAlgorithm::RSASign => {
                let n = Mpi::try_from_reader(&mut i)?;
                let e = Mpi::try_from_reader(&mut i)?;
                Ok(PublicParams::Rsa { n, e })
            }
            PublicKeyAlgorithm::DSA => {
                let p = Mpi::try_from_reader(&mut i)?;
                let q = Mpi::try_from_reader(&mut i)?;
                let g = Mpi::try_from_reader(&mut i)?;
                let y = Mpi::try_from_reader(&mut i)?;
                Ok(PublicParams::Dsa { p, q, g, y })
            }
            PublicKeyAlgorithm::Elgamal => {
                let p = Mpi::try_from_reader(&mut i)?;
                let g = Mpi::try_from_reader(&mut i)?;
                let y = Mpi::try_from_reader(&mut i)?;
                Ok(PublicParams::Elgamal { p, g, y })
            }
            PublicKeyAlgorithm::ECDSA => {
                let curve = read_curve(&mut i)?;
                let p = Mpi::try_from_reader(&mut i)?;
                Ok(PublicParams::Ecdsa { curve, p })
            }
            PublicKeyAlgorithm::ECDH => {
                let curve = read_curve(&mut i)?;
                let p = Mpi::try_from_reader(&mut i)?;

                let kdf_len = i.read_u8()?;
                ensure_eq!(kdf_len, 3, "invalid ECDH KDF parameter length");
                let reserved = i.read_u8()?;
                ensure_eq!(reserved, 1, "invalid ECDH KDF reserved octet");
                let hash = HashAlgorithm::from(i.read_u8()?);
                let alg_sym = SymmetricKeyAlgorithm::from(i.read_u8()?);

                Ok(PublicParams::Ecdh {
                    curve,
                    p,
                    hash,
                    alg_sym,
                })
            }
            PublicKeyAlgorithm::EdDSALegacy => {
                let curve = read_curve(&mut i)?;
                ensure_eq!(curve, ECCCurve::Ed25519, "invalid curve for EdDSALegacy");
                let q = Mpi::try_from_reader(&mut i)?;
                Ok(PublicParams::EddsaLegacy { curve, q })
            }
            PublicKeyAlgorithm::Ed25519 => Ok(PublicParams::Ed25519 {
                public: i.read_array::<32>()?,
            }),
            PublicKeyAlgorithm::X25519 => Ok(PublicParams::X25519 {
                public: i.read_array::<32>()?,
            }),
            PublicKeyAlgorithm::Ed448 => Ok(PublicParams::Ed448 {
                public: i.read_array::<57>()?,
            }),
            PublicKeyAlgorithm::X448 => Ok(PublicParams::X448 {
                public: i.read_array::<56>()?,
            }),
            _ => Ok(PublicParams::Unknown {
                alg,
                data: i.rest()?,
            }),
        }
    }

    /// The public key algorithm these parameters belong to.
    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        match self {
            PublicParams::Rsa { .. } => PublicKeyAlgorithm::RSA,
            PublicParams::Dsa { .. } => PublicKeyAlgorithm::DSA,
            PublicParams::Elgamal { .. } => PublicKeyAlgorithm::Elgamal,
            PublicParams::Ecdsa { .. } => PublicKeyAlgorithm::ECDSA,
            PublicParams::Ecdh { .. } => PublicKeyAlgorithm::ECDH,
            PublicParams::EddsaLegacy { .. } => PublicKeyAlgorithm::EdDSALegacy,
            PublicParams::Ed25519 { .. } => PublicKeyAlgorithm::Ed25519,
            PublicParams::X25519 { .. } => PublicKeyAlgorithm::X25519,
            PublicParams::Ed448 { .. } => PublicKeyAlgorithm::Ed448,
            PublicParams::X448 { .. } => PublicKeyAlgorithm::X448,
            PublicParams::Unknown { alg, .. } => *alg,
        }
    }

    /// Verify a signature over `hashed` (the digest for MPI-based algorithms).
    pub fn verify_signature(
        &self,
        hash: HashAlgorithm,
        hashed: &[u8],
        sig: &SignatureBytes,
    ) -> Result<()> {
        match self {
            PublicParams::Rsa { n, e } => {
                let SignatureBytes::Mpis(mpis) = sig else {
                    bail!("RSA signature must be an MPI");
                };
                ensure_eq!(mpis.len(), 1, "invalid RSA signature");
                rsa_ops::verify(n.as_bytes(), e.as_bytes(), hash, hashed, mpis[0].as_bytes())
            }
            PublicParams::Dsa { p, q, g, y } => {
                let SignatureBytes::Mpis(mpis) = sig else {
                    bail!("DSA signature must be MPIs");
                };
                ensure_eq!(mpis.len(), 2, "invalid DSA signature");
                dsa::verify(
                    p.as_bytes(),
                    q.as_bytes(),
                    g.as_bytes(),
                    y.as_bytes(),
                    hashed,
                    mpis[0].as_bytes(),
                    mpis[1].as_bytes(),
                )
            }
            PublicParams::Ecdsa { curve, p } => {
                let SignatureBytes::Mpis(mpis) = sig else {
                    bail!("ECDSA signature must be MPIs");
                };
                ensure_eq!(mpis.len(), 2, "invalid ECDSA signature");
                ecdsa::verify(
                    curve,
                    p.as_bytes(),
                    hash,
                    hashed,
                    mpis[0].as_bytes(),
                    mpis[1].as_bytes(),
                )
            }
            PublicParams::EddsaLegacy { q, .. } => {
                let SignatureBytes::Mpis(mpis) = sig else {
                    bail!("EdDSA signature must be MPIs");
                };
                ensure_eq!(mpis.len(), 2, "invalid EdDSA signature");

                let point = q.as_bytes();
                ensure!(
                    point.len() == 33 && point[0] == 0x40,
                    "invalid EdDSALegacy public point"
                );

                let mut native = mpis[0].to_padded(32)?;
                native.extend_from_slice(&mpis[1].to_padded(32)?);

                eddsa::verify(&point[1..], hashed, &native)
            }
            PublicParams::Ed25519 { public } => {
                let SignatureBytes::Native(native) = sig else {
                    bail!("Ed25519 signature must be native octets");
                };
                eddsa::verify(public, hashed, native)
            }
            PublicParams::Elgamal { .. } => unsupported_err!("signing with Elgamal"),
            PublicParams::Ecdh { .. } | PublicParams::X25519 { .. } | PublicParams::X448 { .. } => {
                unsupported_err!("{:?} is encryption only", self.algorithm())
            }
            PublicParams::Ed448 { .. } => unsupported_err!("verification with Ed448"),
            PublicParams::Unknown { alg, .. } => {
                unsupported_err!("verification with unknown algorithm {:?}", alg)
            }
        }
    }

    /// Encrypt a session-key payload to these parameters.
    ///
    /// `plain` carries `sym_alg || session_key || checksum` for the MPI-based
    /// algorithms, and the raw session key for X25519.
    pub fn encrypt_session_key<R: CryptoRng + Rng>(
        &self,
        rng: &mut R,
        plain: &[u8],
        fingerprint: &[u8],
    ) -> Result<PkeskBytes> {
        match self {
            PublicParams::Rsa { n, e } => {
                let ct = rsa_ops::encrypt(rng, n.as_bytes(), e.as_bytes(), plain)?;
                Ok(PkeskBytes::Rsa {
                    mpi: Mpi::from_slice(&ct),
                })
            }
            PublicParams::Ecdh {
                curve,
                p,
                hash,
                alg_sym,
            } => {
                let (ephemeral, wrapped) = crate::crypto::ecdh::encrypt(
                    rng,
                    curve,
                    *hash,
                    *alg_sym,
                    p.as_bytes(),
                    fingerprint,
                    plain,
                )?;

                Ok(PkeskBytes::Ecdh {
                    public_point: Mpi::from_slice(&ephemeral),
                    encrypted_session_key: wrapped,
                })
            }
            PublicParams::X25519 { public } => {
                let (ephemeral, wrapped) = x25519::encrypt(rng, public, plain)?;

                Ok(PkeskBytes::X25519 {
                    ephemeral,
                    sym_alg: None,
                    session_key: wrapped,
                })
            }
            PublicParams::Elgamal { .. } => unsupported_err!("encryption with Elgamal"),
            _ => unsupported_err!("encryption with {:?}", self.algorithm()),
        }
    }
}

impl Serialize for PublicParams {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        match self {
            PublicParams::Rsa { n, e } => {
                n.to_writer(w)?;
                e.to_writer(w)?;
            }
            PublicParams::Dsa { p, q, g, y } => {
                p.to_writer(w)?;
                q.to_writer(w)?;
                g.to_writer(w)?;
                y.to_writer(w)?;
            }
            PublicParams::Elgamal { p, g, y } => {
                p.to_writer(w)?;
                g.to_writer(w)?;
                y.to_writer(w)?;
            }
            PublicParams::Ecdsa { curve, p } => {
                write_curve(curve, w)?;
                p.to_writer(w)?;
            }
            PublicParams::Ecdh {
                curve,
                p,
                hash,
                alg_sym,
            } => {
                write_curve(curve, w)?;
                p.to_writer(w)?;
                w.write_all(&[3, 1, u8::from(*hash), u8::from(*alg_sym)])?;
            }
            PublicParams::EddsaLegacy { curve, q } => {
                write_curve(curve, w)?;
                q.to_writer(w)?;
            }
            PublicParams::Ed25519 { public } => {
                w.write_all(public)?;
            }
            PublicParams::X25519 { public } => {
                w.write_all(public)?;
            }
            PublicParams::Ed448 { public } => {
                w.write_all(public)?;
            }
            PublicParams::X448 { public } => {
                w.write_all(public)?;
            }
            PublicParams::Unknown { data, .. } => {
                w.write_all(data)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsa_params_roundtrip() {
        let params = PublicParams::Rsa {
            n: Mpi::from_slice(&[0xAB; 128]),
            e: Mpi::from_slice(&[0x01, 0x00, 0x01]),
        };

        let buf = params.to_bytes().unwrap();
        let back = PublicParams::try_from_reader(PublicKeyAlgorithm::RSA, &mut &buf[..]).unwrap();
        assert_eq!(params, back);
    }

    #[test]
    fn ecdh_params_roundtrip() {
        let params = PublicParams::Ecdh {
            curve: ECCCurve::Curve25519,
            p: Mpi::from_slice(&[0x40; 33]),
            hash: HashAlgorithm::Sha256,
            alg_sym: SymmetricKeyAlgorithm::Aes128,
        };

        let buf = params.to_bytes().unwrap();
        let back = PublicParams::try_from_reader(PublicKeyAlgorithm::ECDH, &mut &buf[..]).unwrap();
        assert_eq!(params, back);
    }

    #[test]
    fn unknown_params_roundtrip() {
        let alg = PublicKeyAlgorithm::Other(99);
        let data = vec![1u8, 2, 3, 4];
        let params = PublicParams::try_from_reader(alg, &mut &data[..]).unwrap();
        assert_eq!(params.to_bytes().unwrap(), data);
        assert!(params
            .verify_signature(
                HashAlgorithm::Sha256,
                &[0; 32],
                &SignatureBytes::Native(vec![])
            )
            .is_err());
    }
}
