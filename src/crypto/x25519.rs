//! X25519 session-key encryption, RFC 9580 framing.
//!
//! Unlike legacy Curve25519 ECDH, the key material uses native fixed-length
//! octet strings and the KEK is derived with HKDF-SHA256 over the full
//! exchange transcript.

use hkdf::Hkdf;
use rand::{CryptoRng, Rng};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::errors::Result;

const HKDF_INFO: &[u8] = b"OpenPGP X25519";

/// Generate an X25519 key pair as raw (public, secret) bytes.
/// The secret is in native (little-endian) order.
pub fn generate_key<R: Rng + CryptoRng>(rng: &mut R) -> ([u8; 32], Zeroizing<[u8; 32]>) {
    let mut secret = Zeroizing::new([0u8; 32]);
    rng.fill_bytes(&mut *secret);

    let static_secret = x25519_dalek::StaticSecret::from(*secret);
    let public = x25519_dalek::PublicKey::from(&static_secret);

    (public.to_bytes(), Zeroizing::new(static_secret.to_bytes()))
}

fn derive_kek(
    eph_public: &[u8; 32],
    recipient_public: &[u8; 32],
    shared: &[u8; 32],
) -> Result<Zeroizing<[u8; 16]>> {
    let mut ikm = Zeroizing::new([0u8; 96]);
    ikm[..32].copy_from_slice(eph_public);
    ikm[32..64].copy_from_slice(recipient_public);
    ikm[64..].copy_from_slice(shared);

    let hk = Hkdf::<Sha256>::new(None, &*ikm);
    let mut kek = Zeroizing::new([0u8; 16]);
    hk.expand(HKDF_INFO, &mut *kek)
        .map_err(|_| format_err!("hkdf expand failed"))?;

    Ok(kek)
}

/// Encrypt the session key to the given public key.
/// Returns the ephemeral public key and the wrapped session key.
pub fn encrypt<R: CryptoRng + Rng>(
    rng: &mut R,
    recipient_public: &[u8; 32],
    session_key: &[u8],
) -> Result<([u8; 32], Vec<u8>)> {
    let mut secret = Zeroizing::new([0u8; 32]);
    rng.fill_bytes(&mut *secret);
    let eph_secret = x25519_dalek::StaticSecret::from(*secret);
    let eph_public = x25519_dalek::PublicKey::from(&eph_secret);

    let shared = eph_secret.diffie_hellman(&x25519_dalek::PublicKey::from(*recipient_public));

    let kek = derive_kek(&eph_public.to_bytes(), recipient_public, shared.as_bytes())?;
    let wrapped = aes_kw::KekAes128::from(*kek).wrap_vec(session_key)?;

    Ok((eph_public.to_bytes(), wrapped))
}

/// Recover the session key.
pub fn decrypt(secret: &[u8], eph_public: &[u8; 32], wrapped: &[u8]) -> Result<Vec<u8>> {
    let secret: [u8; 32] = secret
        .try_into()
        .map_err(|_| format_err!("invalid X25519 secret key length"))?;
    let static_secret = x25519_dalek::StaticSecret::from(secret);
    let recipient_public = x25519_dalek::PublicKey::from(&static_secret);

    let shared = static_secret.diffie_hellman(&x25519_dalek::PublicKey::from(*eph_public));

    let kek = derive_kek(eph_public, &recipient_public.to_bytes(), shared.as_bytes())?;
    let unwrapped = aes_kw::KekAes128::from(*kek).unwrap_vec(wrapped)?;

    Ok(unwrapped)
}

/// Checks that the secret scalar produces the given public point.
pub fn is_valid(public: &[u8], secret: &[u8]) -> bool {
    let Ok(secret): std::result::Result<[u8; 32], _> = secret.try_into() else {
        return false;
    };
    let static_secret = x25519_dalek::StaticSecret::from(secret);
    x25519_dalek::PublicKey::from(&static_secret).to_bytes() == public
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let (public, secret) = generate_key(&mut rng);
        assert!(is_valid(&public, &secret[..]));

        let session_key = [9u8; 16];
        let (eph, wrapped) = encrypt(&mut rng, &public, &session_key).unwrap();
        let recovered = decrypt(&secret[..], &eph, &wrapped).unwrap();
        assert_eq!(recovered, session_key);
    }
}
