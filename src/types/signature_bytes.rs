use std::io;

use crate::errors::Result;
use crate::ser::Serialize;
use crate::types::Mpi;

/// The algorithm-specific octets of a signature.
///
/// RSA, DSA, ECDSA and legacy EdDSA encode their values as MPIs; Ed25519 and
/// Ed448 use native fixed-length octet strings.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub enum SignatureBytes {
    Mpis(Vec<Mpi>),
    #[debug("Native({})", hex::encode(_0))]
    Native(Vec<u8>),
}

impl Serialize for SignatureBytes {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        match self {
            SignatureBytes::Mpis(mpis) => {
                for mpi in mpis {
                    mpi.to_writer(w)?;
                }
            }
            SignatureBytes::Native(bytes) => {
                w.write_all(bytes)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            SignatureBytes::Mpis(mpis) => mpis.iter().map(Serialize::write_len).sum(),
            SignatureBytes::Native(bytes) => bytes.len(),
        }
    }
}
