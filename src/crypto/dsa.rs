use dsa::{Components, Signature, SigningKey, VerifyingKey};
use num_bigint::BigUint;
use signature::hazmat::{PrehashSigner, PrehashVerifier};

use crate::errors::Result;

/// Verify a DSA signature over a prehashed message.
pub fn verify(p: &[u8], q: &[u8], g: &[u8], y: &[u8], hashed: &[u8], r: &[u8], s: &[u8]) -> Result<()> {
    let components = Components::from_components(
        BigUint::from_bytes_be(p),
        BigUint::from_bytes_be(q),
        BigUint::from_bytes_be(g),
    )?;
    let key = VerifyingKey::from_components(components, BigUint::from_bytes_be(y))?;

    let sig = Signature::from_components(BigUint::from_bytes_be(r), BigUint::from_bytes_be(s))?;

    key.verify_prehash(hashed, &sig)?;

    Ok(())
}

/// Sign a prehashed message with DSA. Returns `(r, s)` as big-endian bytes.
pub fn sign(
    p: &[u8],
    q: &[u8],
    g: &[u8],
    y: &[u8],
    x: &[u8],
    hashed: &[u8],
) -> Result<(Vec<u8>, Vec<u8>)> {
    let components = Components::from_components(
        BigUint::from_bytes_be(p),
        BigUint::from_bytes_be(q),
        BigUint::from_bytes_be(g),
    )?;
    let verifying_key = VerifyingKey::from_components(components, BigUint::from_bytes_be(y))?;
    let key = SigningKey::from_components(verifying_key, BigUint::from_bytes_be(x))?;

    let sig: Signature = key.sign_prehash(hashed)?;

    Ok((sig.r().to_bytes_be(), sig.s().to_bytes_be()))
}

/// Checks that `y == g^x mod p`.
pub fn is_valid(p: &[u8], g: &[u8], y: &[u8], x: &[u8]) -> bool {
    let p = BigUint::from_bytes_be(p);
    let g = BigUint::from_bytes_be(g);
    let y = BigUint::from_bytes_be(y);
    let x = BigUint::from_bytes_be(x);

    g.modpow(&x, &p) == y
}
