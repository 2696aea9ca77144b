use aes_kw::{KekAes128, KekAes192, KekAes256};
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::ecc_curve::ECCCurve;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;

/// 20 octets representing "Anonymous Sender    ".
const ANON_SENDER: [u8; 20] = [
    0x41, 0x6E, 0x6F, 0x6E, 0x79, 0x6D, 0x6F, 0x75, 0x73, 0x20, 0x53, 0x65, 0x6E, 0x64, 0x65,
    0x72, 0x20, 0x20, 0x20, 0x20,
];

/// Build the KDF parameters and derive the KEK from the shared point.
/// Ref: RFC 6637 §7
fn derive_kek(
    shared: &[u8],
    curve: &ECCCurve,
    hash: HashAlgorithm,
    alg_sym: SymmetricKeyAlgorithm,
    fingerprint: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let oid = curve.oid();

    let mut param = Vec::with_capacity(36 + oid.len() + fingerprint.len());
    param.push(oid.len() as u8);
    param.extend_from_slice(&oid);
    param.push(PublicKeyAlgorithm::ECDH.into());
    // KDF params: length, reserved, hash id, symmetric cipher id
    param.extend_from_slice(&[0x03, 0x01, hash.into(), alg_sym.into()]);
    param.extend_from_slice(&ANON_SENDER);
    param.extend_from_slice(fingerprint);

    let mut hasher = hash.new_hasher()?;
    hasher.update(&[0, 0, 0, 1]);
    hasher.update(shared);
    hasher.update(&param);

    let digest = hasher.finish();
    ensure!(
        digest.len() >= alg_sym.key_size(),
        "KDF hash {:?} too short for KEK {:?}",
        hash,
        alg_sym
    );

    Ok(Zeroizing::new(digest[..alg_sym.key_size()].to_vec()))
}

fn aes_kw_wrap(kek: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let wrapped = match kek.len() {
        16 => KekAes128::from(<[u8; 16]>::try_from(kek).expect("checked")).wrap_vec(data)?,
        24 => KekAes192::from(<[u8; 24]>::try_from(kek).expect("checked")).wrap_vec(data)?,
        32 => KekAes256::from(<[u8; 32]>::try_from(kek).expect("checked")).wrap_vec(data)?,
        _ => unsupported_err!("KEK size {}", kek.len()),
    };
    Ok(wrapped)
}

fn aes_kw_unwrap(kek: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let unwrapped = match kek.len() {
        16 => KekAes128::from(<[u8; 16]>::try_from(kek).expect("checked")).unwrap_vec(data)?,
        24 => KekAes192::from(<[u8; 24]>::try_from(kek).expect("checked")).unwrap_vec(data)?,
        32 => KekAes256::from(<[u8; 32]>::try_from(kek).expect("checked")).unwrap_vec(data)?,
        _ => unsupported_err!("KEK size {}", kek.len()),
    };
    Ok(unwrapped)
}

/// PKCS#5-style padding to the next multiple of 8 octets.
fn pad(plain: &[u8]) -> Zeroizing<Vec<u8>> {
    let n = 8 - (plain.len() % 8);
    let mut padded = Zeroizing::new(Vec::with_capacity(plain.len() + n));
    padded.extend_from_slice(plain);
    padded.extend(std::iter::repeat(n as u8).take(n));
    padded
}

fn unpad(mut padded: Zeroizing<Vec<u8>>) -> Result<Zeroizing<Vec<u8>>> {
    let Some(&n) = padded.last() else {
        bail!("empty unwrapped session key");
    };
    ensure!(
        (1..=8).contains(&n) && usize::from(n) < padded.len(),
        "invalid session key padding"
    );
    let cut = padded.len() - usize::from(n);
    ensure!(
        padded[cut..].iter().all(|&b| b == n),
        "invalid session key padding"
    );
    padded.truncate(cut);
    Ok(padded)
}

/// Generate an ECDH key pair.
/// Returns the encoded public point and the secret scalar in wire order.
pub fn generate_key<R: Rng + CryptoRng>(
    rng: &mut R,
    curve: &ECCCurve,
) -> Result<(Vec<u8>, Zeroizing<Vec<u8>>)> {
    match curve {
        ECCCurve::Curve25519 => {
            let mut secret = Zeroizing::new([0u8; 32]);
            rng.fill_bytes(&mut *secret);

            let static_secret = x25519_dalek::StaticSecret::from(*secret);
            let public = x25519_dalek::PublicKey::from(&static_secret);

            let mut q = Vec::with_capacity(33);
            q.push(0x40);
            q.extend_from_slice(public.as_bytes());

            // the secret scalar is stored big-endian on the wire
            let mut d = static_secret.to_bytes().to_vec();
            d.reverse();

            Ok((q, Zeroizing::new(d)))
        }
        ECCCurve::P256 => {
            let secret = p256::SecretKey::random(rng);
            let public = secret.public_key().to_sec1_bytes().to_vec();

            Ok((public, Zeroizing::new(secret.to_bytes().to_vec())))
        }
        _ => unsupported_err!("ECDH over {}", curve),
    }
}

/// Encrypt the session-key payload to the given recipient point.
/// Returns the encoded ephemeral public point and the wrapped key.
pub fn encrypt<R: CryptoRng + Rng>(
    rng: &mut R,
    curve: &ECCCurve,
    hash: HashAlgorithm,
    alg_sym: SymmetricKeyAlgorithm,
    q: &[u8],
    fingerprint: &[u8],
    plain: &[u8],
) -> Result<(Vec<u8>, Vec<u8>)> {
    ensure!(plain.len() <= 40, "plaintext session key payload too long");

    let (ephemeral, shared) = match curve {
        ECCCurve::Curve25519 => {
            ensure_eq!(q.len(), 33, "invalid Curve25519 public point");
            ensure_eq!(q[0], 0x40, "invalid Curve25519 point prefix");

            let their_public =
                x25519_dalek::PublicKey::from(<[u8; 32]>::try_from(&q[1..]).expect("checked"));

            let mut secret = Zeroizing::new([0u8; 32]);
            rng.fill_bytes(&mut *secret);
            let eph_secret = x25519_dalek::StaticSecret::from(*secret);
            let eph_public = x25519_dalek::PublicKey::from(&eph_secret);

            let shared = eph_secret.diffie_hellman(&their_public);

            let mut enc = Vec::with_capacity(33);
            enc.push(0x40);
            enc.extend_from_slice(eph_public.as_bytes());

            (enc, Zeroizing::new(shared.as_bytes().to_vec()))
        }
        ECCCurve::P256 => {
            let their_public = p256::PublicKey::from_sec1_bytes(q)?;

            let eph_secret = p256::ecdh::EphemeralSecret::random(rng);
            let eph_public = p256::EncodedPoint::from(eph_secret.public_key());

            let shared = eph_secret.diffie_hellman(&their_public);

            (
                eph_public.as_bytes().to_vec(),
                Zeroizing::new(shared.raw_secret_bytes().to_vec()),
            )
        }
        _ => unsupported_err!("ECDH over {}", curve),
    };

    let kek = derive_kek(&shared, curve, hash, alg_sym, fingerprint)?;
    let wrapped = aes_kw_wrap(&kek, &pad(plain))?;

    Ok((ephemeral, wrapped))
}

/// Recover the session-key payload from the wire values.
pub fn decrypt(
    curve: &ECCCurve,
    hash: HashAlgorithm,
    alg_sym: SymmetricKeyAlgorithm,
    d: &[u8],
    fingerprint: &[u8],
    ephemeral: &[u8],
    wrapped: &[u8],
) -> Result<Vec<u8>> {
    let shared = match curve {
        ECCCurve::Curve25519 => {
            ensure_eq!(ephemeral.len(), 33, "invalid Curve25519 ephemeral point");
            ensure_eq!(ephemeral[0], 0x40, "invalid Curve25519 point prefix");
            ensure!(d.len() <= 32, "invalid Curve25519 secret scalar");

            let their_public = x25519_dalek::PublicKey::from(
                <[u8; 32]>::try_from(&ephemeral[1..]).expect("checked"),
            );

            // wire order is big-endian, the scalar is little-endian
            let mut scalar = Zeroizing::new([0u8; 32]);
            scalar[32 - d.len()..].copy_from_slice(d);
            scalar.reverse();

            let secret = x25519_dalek::StaticSecret::from(*scalar);
            let shared = secret.diffie_hellman(&their_public);

            Zeroizing::new(shared.as_bytes().to_vec())
        }
        ECCCurve::P256 => {
            let their_public = p256::PublicKey::from_sec1_bytes(ephemeral)?;
            let secret = p256::SecretKey::from_slice(&crate::util::pad_left(d, 32))?;

            let shared = p256::ecdh::diffie_hellman(
                secret.to_nonzero_scalar(),
                their_public.as_affine(),
            );

            Zeroizing::new(shared.raw_secret_bytes().to_vec())
        }
        _ => unsupported_err!("ECDH over {}", curve),
    };

    let kek = derive_kek(&shared, curve, hash, alg_sym, fingerprint)?;
    let unwrapped = unpad(Zeroizing::new(aes_kw_unwrap(&kek, wrapped)?))?;

    Ok(unwrapped.to_vec())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn pad_unpad() {
        let padded = pad(&[1, 2, 3]);
        assert_eq!(padded.len(), 8);
        assert_eq!(unpad(padded).unwrap().as_slice(), &[1, 2, 3]);

        let padded = pad(&[0u8; 8]);
        assert_eq!(padded.len(), 16);
    }

    #[test]
    fn roundtrip_curve25519() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let curve = ECCCurve::Curve25519;
        let (q, d) = generate_key(&mut rng, &curve).unwrap();
        let fingerprint = [0xAA; 20];

        let plain = b"\x07session-key-bytes\x12\x34";
        let (ephemeral, wrapped) = encrypt(
            &mut rng,
            &curve,
            HashAlgorithm::Sha256,
            SymmetricKeyAlgorithm::Aes128,
            &q,
            &fingerprint,
            plain,
        )
        .unwrap();

        let recovered = decrypt(
            &curve,
            HashAlgorithm::Sha256,
            SymmetricKeyAlgorithm::Aes128,
            &d,
            &fingerprint,
            &ephemeral,
            &wrapped,
        )
        .unwrap();
        assert_eq!(recovered, plain);
    }

    #[test]
    fn roundtrip_p256() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let curve = ECCCurve::P256;
        let (q, d) = generate_key(&mut rng, &curve).unwrap();
        let fingerprint = [0xBB; 20];

        let plain = b"\x09another-session-key\x00\x01";
        let (ephemeral, wrapped) = encrypt(
            &mut rng,
            &curve,
            HashAlgorithm::Sha256,
            SymmetricKeyAlgorithm::Aes128,
            &q,
            &fingerprint,
            plain,
        )
        .unwrap();

        let recovered = decrypt(
            &curve,
            HashAlgorithm::Sha256,
            SymmetricKeyAlgorithm::Aes128,
            &d,
            &fingerprint,
            &ephemeral,
            &wrapped,
        )
        .unwrap();
        assert_eq!(recovered, plain);
    }
}
