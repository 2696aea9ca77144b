//! EdDSA for OpenPGP.
//!
//! OpenPGP knows two framings for Ed25519:
//! - `EdDSALegacy` (MPI-encoded, 0x40-prefixed point), v4 keys only.
//! - `Ed25519` (native fixed-length octet strings), RFC 9580.
//!
//! Both use the same underlying primitive; only the key material layout (and
//! thereby the fingerprint) differs.

use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::errors::Result;

const MIN_HASH_LEN_BITS: usize = 256;

/// Generate an Ed25519 key pair, as raw (public, secret) bytes.
pub fn generate_key<R: Rng + CryptoRng>(rng: &mut R) -> ([u8; 32], Zeroizing<[u8; 32]>) {
    let mut secret = Zeroizing::new([0u8; 32]);
    rng.fill_bytes(&mut *secret);

    let signing_key = SigningKey::from_bytes(&secret);
    (signing_key.verifying_key().to_bytes(), secret)
}

/// Sign the digest with Ed25519. Returns the 64 signature octets.
pub fn sign(secret: &[u8], digest: &[u8]) -> Result<Vec<u8>> {
    ensure!(
        digest.len() * 8 >= MIN_HASH_LEN_BITS,
        "EdDSA signature: hash digest is too short for Ed25519"
    );

    let secret: [u8; 32] = secret
        .try_into()
        .map_err(|_| format_err!("invalid Ed25519 secret key length"))?;
    let key = SigningKey::from_bytes(&secret);

    use ed25519_dalek::Signer;
    let sig = key.sign(digest);

    Ok(sig.to_bytes().to_vec())
}

/// Verify an Ed25519 signature over the digest.
/// `sig` is the concatenation `R || S` (64 octets).
pub fn verify(public: &[u8], digest: &[u8], sig: &[u8]) -> Result<()> {
    let public: [u8; 32] = public
        .try_into()
        .map_err(|_| format_err!("invalid Ed25519 public key length"))?;
    let key = VerifyingKey::from_bytes(&public)?;

    let sig: [u8; 64] = sig
        .try_into()
        .map_err(|_| format_err!("invalid Ed25519 signature length"))?;
    let sig = Signature::from_bytes(&sig);

    key.verify_strict(digest, &sig)?;

    Ok(())
}

/// Checks that the secret scalar produces the given public point.
pub fn is_valid(public: &[u8], secret: &[u8]) -> bool {
    let Ok(secret): std::result::Result<[u8; 32], _> = secret.try_into() else {
        return false;
    };
    SigningKey::from_bytes(&secret).verifying_key().to_bytes() == public
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::crypto::hash::HashAlgorithm;

    #[test]
    fn sign_verify_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let (public, secret) = generate_key(&mut rng);
        assert!(is_valid(&public, &secret[..]));

        let digest = HashAlgorithm::Sha256.digest(b"attested data").unwrap();
        let sig = sign(&secret[..], &digest).unwrap();
        verify(&public, &digest, &sig).unwrap();

        let mut bad = sig.clone();
        bad[0] ^= 1;
        assert!(verify(&public, &digest, &bad).is_err());
    }

    #[test]
    fn short_digest_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let (_, secret) = generate_key(&mut rng);
        let digest = HashAlgorithm::Sha1.digest(b"too short").unwrap();
        assert!(sign(&secret[..], &digest).is_err());
    }
}
