use std::io::{self, BufRead};

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::parsing::BufReadParsing;
use crate::ser::Serialize;
use crate::types::Mpi;

/// The algorithm-specific values of a PKESK packet.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub enum PkeskBytes {
    Rsa {
        mpi: Mpi,
    },
    Elgamal {
        first: Mpi,
        second: Mpi,
    },
    Ecdh {
        public_point: Mpi,
        #[debug("{}", hex::encode(encrypted_session_key))]
        encrypted_session_key: Vec<u8>,
    },
    X25519 {
        #[debug("{}", hex::encode(ephemeral))]
        ephemeral: [u8; 32],
        /// Unencrypted symmetric algorithm hint, present in v3 PKESK packets.
        sym_alg: Option<SymmetricKeyAlgorithm>,
        #[debug("{}", hex::encode(session_key))]
        session_key: Vec<u8>,
    },
}

impl PkeskBytes {
    pub fn try_from_reader<B: BufRead>(alg: PublicKeyAlgorithm, mut i: B) -> Result<Self> {
        match alg {
            PublicKeyAlgorithm::RSA
            | PublicKeyAlgorithm::RSAEncrypt
            | PublicKeyAlgorithm::RSASign => Ok(PkeskBytes::Rsa {
                mpi: Mpi::try_from_reader(&mut i)?,
            }),
            PublicKeyAlgorithm::Elgamal => Ok(PkeskBytes::Elgamal {
                first: Mpi::try_from_reader(&mut i)?,
                second: Mpi::try_from_reader(&mut i)?,
            }),
            PublicKeyAlgorithm::ECDH => {
                let public_point = Mpi::try_from_reader(&mut i)?;
                let len = i.read_u8()?;
                let encrypted_session_key = i.take_bytes(len.into())?;

                Ok(PkeskBytes::Ecdh {
                    public_point,
                    encrypted_session_key,
                })
            }
            PublicKeyAlgorithm::X25519 => {
                let ephemeral = i.read_array::<32>()?;
                let len = i.read_u8()?;
                ensure!(len >= 1, "invalid X25519 session key length");

                // the first octet inside the length-prefixed field is the
                // plaintext symmetric algorithm (v3 PKESK framing)
                let sym_alg = SymmetricKeyAlgorithm::from(i.read_u8()?);
                let session_key = i.take_bytes(usize::from(len) - 1)?;

                Ok(PkeskBytes::X25519 {
                    ephemeral,
                    sym_alg: Some(sym_alg),
                    session_key,
                })
            }
            _ => unsupported_err!("PKESK values for {:?}", alg),
        }
    }
}

impl Serialize for PkeskBytes {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        match self {
            PkeskBytes::Rsa { mpi } => mpi.to_writer(w)?,
            PkeskBytes::Elgamal { first, second } => {
                first.to_writer(w)?;
                second.to_writer(w)?;
            }
            PkeskBytes::Ecdh {
                public_point,
                encrypted_session_key,
            } => {
                public_point.to_writer(w)?;
                w.write_all(&[encrypted_session_key.len().try_into()?])?;
                w.write_all(encrypted_session_key)?;
            }
            PkeskBytes::X25519 {
                ephemeral,
                sym_alg,
                session_key,
            } => {
                w.write_all(ephemeral)?;
                match sym_alg {
                    Some(sym_alg) => {
                        w.write_all(&[u8::try_from(session_key.len() + 1)?])?;
                        w.write_all(&[u8::from(*sym_alg)])?;
                    }
                    None => {
                        w.write_all(&[u8::try_from(session_key.len())?])?;
                    }
                }
                w.write_all(session_key)?;
            }
        }
        Ok(())
    }
}
