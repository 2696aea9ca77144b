use rand::{CryptoRng, Rng};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};

use crate::crypto::hash::HashAlgorithm;
use crate::errors::Result;

/// Maps a hash algorithm to the matching PKCS#1 v1.5 `DigestInfo` scheme.
fn sign_scheme(hash: HashAlgorithm) -> Result<Pkcs1v15Sign> {
    match hash {
        HashAlgorithm::Md5 => Ok(Pkcs1v15Sign::new::<md5::Md5>()),
        HashAlgorithm::Sha1 => Ok(Pkcs1v15Sign::new::<sha1::Sha1>()),
        HashAlgorithm::Ripemd160 => Ok(Pkcs1v15Sign::new::<ripemd::Ripemd160>()),
        HashAlgorithm::Sha256 => Ok(Pkcs1v15Sign::new::<sha2::Sha256>()),
        HashAlgorithm::Sha384 => Ok(Pkcs1v15Sign::new::<sha2::Sha384>()),
        HashAlgorithm::Sha512 => Ok(Pkcs1v15Sign::new::<sha2::Sha512>()),
        HashAlgorithm::Sha224 => Ok(Pkcs1v15Sign::new::<sha2::Sha224>()),
        HashAlgorithm::Sha3_256 => Ok(Pkcs1v15Sign::new::<sha3::Sha3_256>()),
        HashAlgorithm::Sha3_512 => Ok(Pkcs1v15Sign::new::<sha3::Sha3_512>()),
        _ => unsupported_err!("RSA signing with hash {:?}", hash),
    }
}

/// RSA decryption using PKCS1v15 padding.
pub fn decrypt(priv_key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let m = priv_key.decrypt(Pkcs1v15Encrypt, ciphertext)?;
    Ok(m)
}

/// RSA encryption using PKCS1v15 padding.
pub fn encrypt<R: CryptoRng + Rng>(
    rng: &mut R,
    n: &[u8],
    e: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let key = RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))?;
    let data = key.encrypt(rng, Pkcs1v15Encrypt, plaintext)?;

    Ok(data)
}

/// Generate an RSA key pair of the given size.
pub fn generate_key<R: Rng + CryptoRng>(rng: &mut R, bit_size: usize) -> Result<RsaPrivateKey> {
    let key = RsaPrivateKey::new(rng, bit_size)?;
    Ok(key)
}

/// Verify a RSA, PKCS1v15 padded signature.
pub fn verify(n: &[u8], e: &[u8], hash: HashAlgorithm, hashed: &[u8], sig: &[u8]) -> Result<()> {
    let key = RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))?;

    // The signature may have been stripped of leading zeros when stored as an
    // MPI; restore the full modulus width.
    let sig = if sig.len() < key.size() {
        let mut padded = vec![0u8; key.size()];
        padded[key.size() - sig.len()..].copy_from_slice(sig);
        key.verify(sign_scheme(hash)?, hashed, &padded)
    } else {
        key.verify(sign_scheme(hash)?, hashed, sig)
    };

    sig.map_err(Into::into)
}

/// Sign using RSA, with PKCS1v15 padding.
pub fn sign(key: &RsaPrivateKey, hash: HashAlgorithm, digest: &[u8]) -> Result<Vec<u8>> {
    let sig = key.sign(sign_scheme(hash)?, digest)?;
    Ok(sig)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rsa::traits::PrivateKeyParts;

    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let key = generate_key(&mut rng, 1024).unwrap();

        let digest = HashAlgorithm::Sha256.digest(b"hello world").unwrap();
        let sig = sign(&key, HashAlgorithm::Sha256, &digest).unwrap();

        let n = key.n().to_bytes_be();
        let e = key.e().to_bytes_be();
        verify(&n, &e, HashAlgorithm::Sha256, &digest, &sig).unwrap();

        let bad = HashAlgorithm::Sha256.digest(b"tampered").unwrap();
        assert!(verify(&n, &e, HashAlgorithm::Sha256, &bad, &sig).is_err());
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let key = generate_key(&mut rng, 1024).unwrap();

        let n = key.n().to_bytes_be();
        let e = key.e().to_bytes_be();

        let ct = encrypt(&mut rng, &n, &e, b"session key bytes").unwrap();
        let pt = decrypt(&key, &ct).unwrap();
        assert_eq!(pt, b"session key bytes");

        let _ = key.primes();
    }
}
