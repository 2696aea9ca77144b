use pgp_core::composed::{
    CleartextSignedMessage, KeyType, Message, SecretKeyParamsBuilder, SignedSecretKey,
    StandaloneSignature,
};
use pgp_core::crypto::hash::{HashAlgorithm, Hasher as _};
use pgp_core::errors::Error;
use pgp_core::types::KeyVersion;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn gen_key(rng: &mut ChaCha8Rng, key_type: KeyType, version: KeyVersion) -> SignedSecretKey {
    let params = SecretKeyParamsBuilder::default()
        .key_type(key_type)
        .version(version)
        .primary_user_id("Signer <sig@x>".into())
        .build()
        .unwrap();

    params.generate(rng).unwrap().sign(rng, String::new).unwrap()
}

#[test]
fn detached_signature_roundtrip() {
    let mut rng = ChaCha8Rng::seed_from_u64(301);
    let key = gen_key(&mut rng, KeyType::Ed25519, KeyVersion::V4);
    let public = key.signed_public_key();

    let message = Message::new_literal_bytes(b"", b"detached payload");
    let sig = message
        .sign_detached(&mut rng, &key.primary_key, String::new, HashAlgorithm::Sha256)
        .unwrap();

    sig.verify(&public.primary_key, b"detached payload")
        .expect("verifies");

    let armored = sig.to_armored_string().unwrap();
    assert!(armored.starts_with("-----BEGIN PGP SIGNATURE-----"));

    let parsed = StandaloneSignature::from_string(&armored).unwrap();
    assert_eq!(sig, parsed);
    parsed
        .verify(&public.primary_key, b"detached payload")
        .expect("verifies after roundtrip");

    assert!(parsed.verify(&public.primary_key, b"other payload").is_err());
}

#[test]
fn cleartext_signature_normalizes_whitespace() {
    let mut rng = ChaCha8Rng::seed_from_u64(302);
    let key = gen_key(&mut rng, KeyType::Ed25519, KeyVersion::V4);
    let public = key.signed_public_key();

    // trailing spaces on line 1 are stripped before hashing
    let text = "Line 1  \r\nLine 2\r\n";
    let msg =
        CleartextSignedMessage::sign(&mut rng, text, &key.primary_key, String::new, HashAlgorithm::Sha256)
            .unwrap();

    msg.verify(&public.primary_key).expect("verifies");

    let armored = msg.to_armored_string().unwrap();
    assert!(armored.starts_with("-----BEGIN PGP SIGNED MESSAGE-----"));
    assert!(armored.contains("Hash: SHA256"));

    let parsed = CleartextSignedMessage::from_string(&armored).unwrap();
    parsed.verify(&public.primary_key).expect("verifies after roundtrip");
}

#[test]
fn cleartext_dash_escaping() {
    let mut rng = ChaCha8Rng::seed_from_u64(303);
    let key = gen_key(&mut rng, KeyType::Ed25519, KeyVersion::V4);
    let public = key.signed_public_key();

    let text = "normal\n- dashed\n----- five";
    let msg =
        CleartextSignedMessage::sign(&mut rng, text, &key.primary_key, String::new, HashAlgorithm::Sha256)
            .unwrap();

    let armored = msg.to_armored_string().unwrap();
    assert!(armored.contains("\n- - dashed\n"));
    assert!(armored.contains("\n- ----- five\n"));

    let parsed = CleartextSignedMessage::from_string(&armored).unwrap();
    assert_eq!(parsed.text(), text);
    parsed.verify(&public.primary_key).expect("verifies");
}

#[test]
fn ed25519_v6_sign_binary_payload() {
    let mut rng = ChaCha8Rng::seed_from_u64(304);
    let key = gen_key(&mut rng, KeyType::Ed25519, KeyVersion::V6);
    let public = key.signed_public_key();

    // lock and unlock with AEAD protection before signing
    let locked = key.set_password(&mut rng, "pw").unwrap();
    let unlocked = locked.remove_password(|| "pw".into()).unwrap();

    let payload = vec![0xC3u8; 1024];
    let message = Message::new_literal_bytes(b"blob", &payload);
    let sig = message
        .sign_detached(
            &mut rng,
            &unlocked.primary_key,
            String::new,
            HashAlgorithm::Sha512,
        )
        .unwrap();

    sig.verify(&public.primary_key, &payload).expect("verifies");

    // flipping one byte fails with a signature error
    let mut flipped = payload.clone();
    flipped[17] ^= 0x01;
    let err = sig.verify(&public.primary_key, &flipped).unwrap_err();
    assert!(matches!(err, Error::SignatureInvalid { .. }));
}

#[test]
fn signed_hash_prefix_matches() {
    let mut rng = ChaCha8Rng::seed_from_u64(305);
    let key = gen_key(&mut rng, KeyType::Ed25519, KeyVersion::V4);

    let message = Message::new_literal_bytes(b"", b"prefix check");
    let sig = message
        .sign_detached(&mut rng, &key.primary_key, String::new, HashAlgorithm::Sha256)
        .unwrap();

    // recompute the digest by hand and compare the stored prefix
    let config = &sig.signature.config;
    let mut hasher = HashAlgorithm::Sha256.new_hasher().unwrap();
    hasher.update(b"prefix check");
    let len = config.hash_signature_data(&mut *hasher).unwrap();
    hasher.update(&config.trailer(len).unwrap());
    let digest = hasher.finish();

    assert_eq!(&digest[..2], &sig.signature.signed_hash_value[..]);
}
