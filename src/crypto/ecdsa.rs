use p256::ecdsa::{Signature as P256Signature, SigningKey, VerifyingKey};
use rand::{CryptoRng, Rng};
use signature::hazmat::{PrehashSigner, PrehashVerifier};

use crate::crypto::ecc_curve::ECCCurve;
use crate::crypto::hash::HashAlgorithm;
use crate::errors::Result;
use crate::util::pad_left;

/// Verify an ECDSA signature. `p` is the SEC1-encoded public point,
/// `(r, s)` the signature halves as stripped big-endian bytes.
pub fn verify(
    curve: &ECCCurve,
    p: &[u8],
    _hash: HashAlgorithm,
    hashed: &[u8],
    r: &[u8],
    s: &[u8],
) -> Result<()> {
    match curve {
        ECCCurve::P256 => {
            ensure!(r.len() <= 32, "invalid R (len)");
            ensure!(s.len() <= 32, "invalid S (len)");

            let key = VerifyingKey::from_sec1_bytes(p)?;
            let r = pad_left(r, 32);
            let s = pad_left(s, 32);
            let mut raw = r;
            raw.extend_from_slice(&s);

            let sig = P256Signature::from_slice(&raw)?;
            key.verify_prehash(hashed, &sig)?;

            Ok(())
        }
        _ => unsupported_err!("ECDSA over {}", curve),
    }
}

/// Sign a prehashed message with ECDSA. Returns `(r, s)` as big-endian bytes.
pub fn sign(
    curve: &ECCCurve,
    d: &[u8],
    _hash: HashAlgorithm,
    hashed: &[u8],
) -> Result<(Vec<u8>, Vec<u8>)> {
    match curve {
        ECCCurve::P256 => {
            let d = pad_left(d, 32);
            let key = SigningKey::from_slice(&d)?;
            let sig: P256Signature = key.sign_prehash(hashed)?;

            let (r, s) = sig.split_bytes();
            Ok((r.to_vec(), s.to_vec()))
        }
        _ => unsupported_err!("ECDSA over {}", curve),
    }
}

/// Generate an ECDSA key pair.
/// Returns the SEC1-encoded public point and the secret scalar.
pub fn generate_key<R: Rng + CryptoRng>(rng: &mut R, curve: &ECCCurve) -> Result<(Vec<u8>, Vec<u8>)> {
    match curve {
        ECCCurve::P256 => {
            let secret = SigningKey::random(rng);
            let public = secret.verifying_key().to_encoded_point(false);

            Ok((public.as_bytes().to_vec(), secret.to_bytes().to_vec()))
        }
        _ => unsupported_err!("ECDSA over {}", curve),
    }
}

/// Checks that the secret scalar produces the given public point.
pub fn is_valid(curve: &ECCCurve, p: &[u8], d: &[u8]) -> bool {
    match curve {
        ECCCurve::P256 => {
            let Ok(key) = SigningKey::from_slice(&pad_left(d, 32)) else {
                return false;
            };
            key.verifying_key().to_encoded_point(false).as_bytes() == p
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn p256_sign_verify() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let (p, d) = generate_key(&mut rng, &ECCCurve::P256).unwrap();
        assert!(is_valid(&ECCCurve::P256, &p, &d));

        let hashed = HashAlgorithm::Sha256.digest(b"payload").unwrap();
        let (r, s) = sign(&ECCCurve::P256, &d, HashAlgorithm::Sha256, &hashed).unwrap();
        verify(&ECCCurve::P256, &p, HashAlgorithm::Sha256, &hashed, &r, &s).unwrap();

        let other = HashAlgorithm::Sha256.digest(b"other").unwrap();
        assert!(verify(&ECCCurve::P256, &p, HashAlgorithm::Sha256, &other, &r, &s).is_err());
    }

    #[test]
    fn unsupported_curves_error() {
        let hashed = [0u8; 32];
        assert!(verify(
            &ECCCurve::P521,
            &[],
            HashAlgorithm::Sha512,
            &hashed,
            &[],
            &[]
        )
        .is_err());
    }
}
