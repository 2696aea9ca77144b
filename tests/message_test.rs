use pgp_core::composed::{KeyType, Message, SecretKeyParamsBuilder, SignedSecretKey};
use pgp_core::crypto::aead::AeadAlgorithm;
use pgp_core::crypto::hash::HashAlgorithm;
use pgp_core::crypto::sym::SymmetricKeyAlgorithm;
use pgp_core::errors::Error;
use pgp_core::types::{CompressionAlgorithm, KeyVersion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn gen_key(rng: &mut ChaCha8Rng, key_type: KeyType, version: KeyVersion) -> SignedSecretKey {
    let params = SecretKeyParamsBuilder::default()
        .key_type(key_type)
        .version(version)
        .primary_user_id("Test <test@x>".into())
        .build()
        .unwrap();

    params.generate(rng).unwrap().sign(rng, String::new).unwrap()
}

#[test]
fn encrypt_decrypt_rsa() {
    let mut rng = ChaCha8Rng::seed_from_u64(201);
    let key = gen_key(&mut rng, KeyType::Rsa(2048), KeyVersion::V4);
    let public = key.signed_public_key();

    let message = Message::new_literal_bytes(b"", b"hello openpgp");
    let recipients = public.encryption_keys_at(chrono::Utc::now());
    assert!(!recipients.is_empty());

    let encrypted = message
        .encrypt(
            &mut rng,
            &recipients.iter().collect::<Vec<_>>(),
            &[],
            SymmetricKeyAlgorithm::Aes128,
        )
        .unwrap();

    // wire roundtrip
    let armored = encrypted.to_armored_string().unwrap();
    assert!(armored.starts_with("-----BEGIN PGP MESSAGE-----"));
    let parsed = Message::from_string(&armored).unwrap();
    assert_eq!(encrypted, parsed);

    let decrypted = parsed.decrypt(String::new, &[&key], &[]).unwrap();
    assert_eq!(decrypted.get_content().unwrap(), b"hello openpgp");
}

#[test]
fn encrypt_decrypt_x25519_locked_key() {
    let mut rng = ChaCha8Rng::seed_from_u64(202);
    let key = gen_key(&mut rng, KeyType::Ed25519, KeyVersion::V4);
    let locked = key.set_password(&mut rng, "hunter2").unwrap();
    let public = key.signed_public_key();

    let message = Message::new_literal_bytes(b"file", b"x25519 payload");
    let recipients = public.encryption_keys_at(chrono::Utc::now());
    let encrypted = message
        .encrypt(
            &mut rng,
            &recipients.iter().collect::<Vec<_>>(),
            &[],
            SymmetricKeyAlgorithm::Aes256,
        )
        .unwrap();

    let decrypted = encrypted
        .decrypt(|| "hunter2".into(), &[&locked], &[])
        .unwrap();
    assert_eq!(decrypted.get_content().unwrap(), b"x25519 payload");
}

#[test]
fn password_only_skesk() {
    let mut rng = ChaCha8Rng::seed_from_u64(203);

    let message = Message::new_literal_bytes(b"", b"hello openpgp");
    let encrypted = message
        .encrypt::<_, pgp_core::composed::PublicKeyRef<'_>>(
            &mut rng,
            &[],
            &["secret"],
            SymmetricKeyAlgorithm::Aes128,
        )
        .unwrap();

    let decrypted = encrypted.decrypt(String::new, &[], &["secret"]).unwrap();
    assert_eq!(decrypted.get_content().unwrap(), b"hello openpgp");

    let err = encrypted
        .decrypt(String::new, &[], &["wrong"])
        .unwrap_err();
    assert!(matches!(err, Error::SessionKeyDecryptionFailed { .. }));
}

#[test]
fn no_recipients_is_rejected() {
    let mut rng = ChaCha8Rng::seed_from_u64(204);
    let message = Message::new_literal_bytes(b"", b"data");
    assert!(message
        .encrypt::<_, pgp_core::composed::PublicKeyRef<'_>>(
            &mut rng,
            &[],
            &[],
            SymmetricKeyAlgorithm::Aes128,
        )
        .is_err());
}

#[test]
fn seipd_v2_aead_roundtrip() {
    let mut rng = ChaCha8Rng::seed_from_u64(205);
    let key = gen_key(&mut rng, KeyType::Ed25519, KeyVersion::V6);
    let public = key.signed_public_key();

    let payload = vec![0x5Au8; 1024];
    let message = Message::new_literal_bytes(b"blob", &payload);
    let recipients = public.encryption_keys_at(chrono::Utc::now());

    let encrypted = message
        .encrypt_seipd_v2(
            &mut rng,
            &recipients.iter().collect::<Vec<_>>(),
            &["backup-passphrase"],
            SymmetricKeyAlgorithm::Aes256,
            AeadAlgorithm::Ocb,
            6,
        )
        .unwrap();

    // via the key
    let decrypted = encrypted.decrypt(String::new, &[&key], &[]).unwrap();
    assert_eq!(decrypted.get_content().unwrap(), payload);

    // via the passphrase
    let decrypted = encrypted
        .decrypt(String::new, &[], &["backup-passphrase"])
        .unwrap();
    assert_eq!(decrypted.get_content().unwrap(), payload);
}

#[test]
fn decoy_recipient_is_skipped() {
    let mut rng = ChaCha8Rng::seed_from_u64(206);
    let key = gen_key(&mut rng, KeyType::Rsa(2048), KeyVersion::V4);
    let decoy = gen_key(&mut rng, KeyType::Rsa(2048), KeyVersion::V4);
    let public = key.signed_public_key();

    let message = Message::new_literal_bytes(b"", b"selective");
    let recipients = public.encryption_keys_at(chrono::Utc::now());
    let encrypted = message
        .encrypt(
            &mut rng,
            &recipients.iter().collect::<Vec<_>>(),
            &[],
            SymmetricKeyAlgorithm::Aes128,
        )
        .unwrap();

    // the decoy's key ids match no PKESK, so only the real key is tried
    let decrypted = encrypted
        .decrypt(String::new, &[&decoy, &key], &[])
        .unwrap();
    assert_eq!(decrypted.get_content().unwrap(), b"selective");

    // with only the decoy, nothing matches
    let err = encrypted
        .decrypt(String::new, &[&decoy], &[])
        .unwrap_err();
    assert!(matches!(err, Error::SessionKeyDecryptionFailed { .. }));
}

#[test]
fn compressed_message_roundtrip() {
    let mut rng = ChaCha8Rng::seed_from_u64(207);
    let key = gen_key(&mut rng, KeyType::Ed25519, KeyVersion::V4);
    let public = key.signed_public_key();

    let message = Message::new_literal_bytes(b"", &b"compressible ".repeat(100));
    let compressed = message.compress(CompressionAlgorithm::Zlib).unwrap();

    let recipients = public.encryption_keys_at(chrono::Utc::now());
    let encrypted = compressed
        .encrypt(
            &mut rng,
            &recipients.iter().collect::<Vec<_>>(),
            &[],
            SymmetricKeyAlgorithm::Aes128,
        )
        .unwrap();

    // decrypt decompresses transparently
    let decrypted = encrypted.decrypt(String::new, &[&key], &[]).unwrap();
    assert_eq!(
        decrypted.get_content().unwrap(),
        b"compressible ".repeat(100)
    );
}

#[test]
fn one_pass_sign_and_verify() {
    let mut rng = ChaCha8Rng::seed_from_u64(208);
    let key = gen_key(&mut rng, KeyType::Ed25519, KeyVersion::V4);
    let public = key.signed_public_key();

    let message = Message::new_literal_bytes(b"", b"signed content");
    let signed = message
        .sign(&mut rng, &key.primary_key, String::new, HashAlgorithm::Sha256)
        .unwrap();

    signed.verify(&public.primary_key).expect("verifies");

    // wire roundtrip keeps the one-pass framing
    let bytes = pgp_core::ser::Serialize::to_bytes(&signed).unwrap();
    let parsed = Message::from_bytes(&bytes).unwrap();
    assert_eq!(signed, parsed);
    parsed.verify(&public.primary_key).expect("verifies");

    // tampering makes verification fail
    let tampered = Message::new_literal_bytes(b"", b"signed CONTENT");
    let Message::Signed {
        one_pass_signature,
        signature,
        ..
    } = signed
    else {
        panic!("must be signed")
    };
    let forged = Message::Signed {
        message: Some(Box::new(tampered)),
        one_pass_signature,
        signature,
    };
    let err = forged.verify(&public.primary_key).unwrap_err();
    assert!(matches!(err, Error::SignatureInvalid { .. }));
}

#[test]
fn sign_encrypt_decrypt_verify() {
    let mut rng = ChaCha8Rng::seed_from_u64(209);
    let key = gen_key(&mut rng, KeyType::Ed25519, KeyVersion::V4);
    let public = key.signed_public_key();

    let message = Message::new_literal_bytes(b"", b"sign then encrypt");
    let signed = message
        .sign(&mut rng, &key.primary_key, String::new, HashAlgorithm::Sha256)
        .unwrap();

    let recipients = public.encryption_keys_at(chrono::Utc::now());
    let encrypted = signed
        .encrypt(
            &mut rng,
            &recipients.iter().collect::<Vec<_>>(),
            &[],
            SymmetricKeyAlgorithm::Aes128,
        )
        .unwrap();

    let decrypted = encrypted.decrypt(String::new, &[&key], &[]).unwrap();
    decrypted.verify(&public.primary_key).expect("verifies");
    assert_eq!(decrypted.get_content().unwrap(), b"sign then encrypt");
}
