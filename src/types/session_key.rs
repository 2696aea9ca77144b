use rand::{CryptoRng, Rng};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::sym::SymmetricKeyAlgorithm;

/// A per-message ephemeral session key. Never persisted, wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, derive_more::Debug)]
pub struct SessionKey {
    #[debug("..")]
    key: Vec<u8>,
    #[zeroize(skip)]
    sym_alg: SymmetricKeyAlgorithm,
}

impl SessionKey {
    /// Generate a fresh random session key for the given algorithm.
    pub fn generate<R: CryptoRng + Rng>(rng: &mut R, sym_alg: SymmetricKeyAlgorithm) -> Self {
        let mut key = vec![0u8; sym_alg.key_size()];
        rng.fill_bytes(&mut key);

        SessionKey { key, sym_alg }
    }

    pub fn new(key: Vec<u8>, sym_alg: SymmetricKeyAlgorithm) -> Self {
        SessionKey { key, sym_alg }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn sym_alg(&self) -> SymmetricKeyAlgorithm {
        self.sym_alg
    }
}
