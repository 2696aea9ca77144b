use std::io;

use chrono::{DateTime, SubsecRound, Utc};
use rand::{CryptoRng, Rng};

use crate::armor;
use crate::composed::key::builder::SubkeyParams;
use crate::composed::key::public::SignedPublicKey;
use crate::composed::key::shared::{
    preference_subpackets, revocation_signature, KeyDetails, SignedKeyDetails, SignedSecretSubKey,
    SignedUser,
};
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::packet::{
    self, Features, KeyFlags, Packet, RevocationCode, Signature, SignatureConfig, SignatureType,
    Subpacket, SubpacketData, UserId,
};
use crate::ser::Serialize;
use crate::types::{
    Fingerprint, KeyId, KeyVersion, PkeskBytes, PublicKeyTrait, PublicParams, SecretKeyTrait, Tag,
};

/// A generated subkey with the capabilities it will be bound with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSubkeyWithFlags {
    pub key: packet::SecretSubkey,
    pub flags: KeyFlags,
}

/// A freshly generated, not yet self-signed secret key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKey {
    pub primary_key: packet::SecretKey,
    pub details: KeyDetails,
    pub subkeys: Vec<SecretSubkeyWithFlags>,
}

impl SecretKey {
    /// Produces the transferable key: self certifications for every user id,
    /// a direct key signature for v6 keys, and a binding signature per
    /// subkey (with an embedded back signature for signing subkeys).
    pub fn sign<R, F>(self, rng: &mut R, key_pw: F) -> Result<SignedSecretKey>
    where
        R: CryptoRng + Rng,
        F: FnOnce() -> String + Clone,
    {
        let primary = &self.primary_key;

        let mut features = Features::new(Features::MDC);
        if primary.version() == KeyVersion::V6 {
            features = Features::new(Features::MDC | Features::SEIPD_V2);
        }

        let mut users = Vec::with_capacity(1 + self.details.user_ids.len());
        for (index, id) in std::iter::once(&self.details.primary_user_id)
            .chain(self.details.user_ids.iter())
            .enumerate()
        {
            let mut config =
                SignatureConfig::from_key(rng, primary, SignatureType::CertPositive)?;
            config
                .hashed_subpackets
                .extend(preference_subpackets(&self.details, features));
            if index == 0 {
                config
                    .hashed_subpackets
                    .push(Subpacket::regular(SubpacketData::IsPrimary(true)));
            }

            let sig =
                config.sign_certification(primary, key_pw.clone(), primary, Tag::UserId, id)?;

            let mut user = SignedUser::new(id.clone());
            user.self_certifications.push(sig);
            users.push(user);
        }

        let mut direct_signatures = Vec::new();
        if primary.version() == KeyVersion::V6 {
            let mut config = SignatureConfig::from_key(rng, primary, SignatureType::Key)?;
            config
                .hashed_subpackets
                .extend(preference_subpackets(&self.details, features));

            direct_signatures.push(config.sign_key(primary, key_pw.clone(), primary)?);
        }

        let mut secret_subkeys = Vec::with_capacity(self.subkeys.len());
        for subkey in self.subkeys {
            let mut config =
                SignatureConfig::from_key(rng, primary, SignatureType::SubkeyBinding)?;
            config
                .hashed_subpackets
                .push(Subpacket::regular(SubpacketData::KeyFlags(subkey.flags)));
            if let Some(expiry) = self.details.key_expiry {
                config
                    .hashed_subpackets
                    .push(Subpacket::regular(SubpacketData::KeyExpirationTime(expiry)));
            }

            if subkey.flags.sign() {
                let back_config = SignatureConfig::from_key(
                    rng,
                    &subkey.key,
                    SignatureType::KeyBinding,
                )?;
                let back_sig = back_config.sign_primary_key_binding(
                    &subkey.key,
                    key_pw.clone(),
                    primary,
                )?;
                config
                    .hashed_subpackets
                    .push(Subpacket::regular(SubpacketData::EmbeddedSignature(
                        Box::new(back_sig),
                    )));
            }

            let binding = config.sign_key_binding(primary, key_pw.clone(), &subkey.key)?;

            secret_subkeys.push(SignedSecretSubKey {
                key: subkey.key,
                binding_signatures: vec![binding],
                revocation_signatures: Vec::new(),
            });
        }

        Ok(SignedSecretKey {
            primary_key: self.primary_key,
            details: SignedKeyDetails {
                revocation_signatures: Vec::new(),
                direct_signatures,
                users,
                user_attributes: Vec::new(),
            },
            secret_subkeys,
        })
    }
}

/// A complete transferable secret key: primary key, bound users and subkeys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSecretKey {
    pub primary_key: packet::SecretKey,
    pub details: SignedKeyDetails,
    pub secret_subkeys: Vec<SignedSecretSubKey>,
}

/// Reference to a concrete secret key packet inside a transferable key.
#[derive(Debug, Clone, Copy)]
pub enum SecretKeyRef<'a> {
    Primary(&'a packet::SecretKey),
    Subkey(&'a packet::SecretSubkey),
}

impl SecretKeyRef<'_> {
    pub fn decrypt_session_key<F>(&self, key_pw: F, values: &PkeskBytes) -> Result<Vec<u8>>
    where
        F: FnOnce() -> String,
    {
        match self {
            SecretKeyRef::Primary(key) => key.decrypt_session_key(key_pw, values),
            SecretKeyRef::Subkey(key) => key.decrypt_session_key(key_pw, values),
        }
    }
}

impl Serialize for SecretKeyRef<'_> {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        match self {
            SecretKeyRef::Primary(key) => key.to_writer(w),
            SecretKeyRef::Subkey(key) => key.to_writer(w),
        }
    }
}

macro_rules! delegate_key_ref {
    ($method:ident, $ret:ty) => {
        fn $method(&self) -> $ret {
            match self {
                SecretKeyRef::Primary(key) => key.$method(),
                SecretKeyRef::Subkey(key) => key.$method(),
            }
        }
    };
}

impl PublicKeyTrait for SecretKeyRef<'_> {
    delegate_key_ref!(version, KeyVersion);
    delegate_key_ref!(fingerprint, Fingerprint);
    delegate_key_ref!(key_id, KeyId);
    delegate_key_ref!(algorithm, PublicKeyAlgorithm);
    delegate_key_ref!(created_at, &DateTime<Utc>);
    delegate_key_ref!(public_params, &PublicParams);

    fn serialize_for_hashing<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            SecretKeyRef::Primary(key) => key.serialize_for_hashing(writer),
            SecretKeyRef::Subkey(key) => key.serialize_for_hashing(writer),
        }
    }

    fn verify_signature(
        &self,
        hash: HashAlgorithm,
        data: &[u8],
        sig: &crate::types::SignatureBytes,
    ) -> Result<()> {
        match self {
            SecretKeyRef::Primary(key) => key.verify_signature(hash, data, sig),
            SecretKeyRef::Subkey(key) => key.verify_signature(hash, data, sig),
        }
    }

    fn encrypt_session_key<R: CryptoRng + Rng>(
        &self,
        rng: &mut R,
        plain: &[u8],
    ) -> Result<PkeskBytes> {
        match self {
            SecretKeyRef::Primary(key) => key.encrypt_session_key(rng, plain),
            SecretKeyRef::Subkey(key) => key.encrypt_session_key(rng, plain),
        }
    }
}

impl SecretKeyTrait for SecretKeyRef<'_> {
    fn create_signature<F>(
        &self,
        key_pw: F,
        hash: HashAlgorithm,
        prehashed_data: &[u8],
    ) -> Result<crate::types::SignatureBytes>
    where
        F: FnOnce() -> String,
    {
        match self {
            SecretKeyRef::Primary(key) => key.create_signature(key_pw, hash, prehashed_data),
            SecretKeyRef::Subkey(key) => key.create_signature(key_pw, hash, prehashed_data),
        }
    }
}

impl SignedSecretKey {
    /// Checks the usability of the key at the current time.
    pub fn verify(&self) -> Result<()> {
        self.verify_at(Utc::now())
    }

    /// Checks the usability of the key at `at` (spec §"is this key usable").
    pub fn verify_at(&self, at: DateTime<Utc>) -> Result<()> {
        self.details.verify_at(&self.primary_key, at)
    }

    /// The corresponding public transferable key.
    pub fn signed_public_key(&self) -> SignedPublicKey {
        SignedPublicKey {
            primary_key: self.primary_key.public_key().clone(),
            details: self.details.clone(),
            public_subkeys: self
                .secret_subkeys
                .iter()
                .map(|subkey| subkey.as_public())
                .collect(),
        }
    }

    /// Locks the primary key and all secret subkeys under `passphrase`,
    /// returning the protected copy.
    pub fn set_password<R: CryptoRng + Rng>(
        &self,
        rng: &mut R,
        passphrase: &str,
    ) -> Result<Self> {
        let primary_key = self.primary_key.set_password(rng, passphrase)?;
        let mut secret_subkeys = Vec::with_capacity(self.secret_subkeys.len());
        for subkey in &self.secret_subkeys {
            secret_subkeys.push(SignedSecretSubKey {
                key: subkey.key.set_password(rng, passphrase)?,
                binding_signatures: subkey.binding_signatures.clone(),
                revocation_signatures: subkey.revocation_signatures.clone(),
            });
        }

        Ok(SignedSecretKey {
            primary_key,
            details: self.details.clone(),
            secret_subkeys,
        })
    }

    /// Unlocks the primary key and all secret subkeys, returning the
    /// plaintext copy.
    pub fn remove_password<F>(&self, key_pw: F) -> Result<Self>
    where
        F: FnOnce() -> String + Clone,
    {
        let primary_key = self.primary_key.remove_password(key_pw.clone())?;
        let mut secret_subkeys = Vec::with_capacity(self.secret_subkeys.len());
        for subkey in &self.secret_subkeys {
            secret_subkeys.push(SignedSecretSubKey {
                key: subkey.key.remove_password(key_pw.clone())?,
                binding_signatures: subkey.binding_signatures.clone(),
                revocation_signatures: subkey.revocation_signatures.clone(),
            });
        }

        Ok(SignedSecretKey {
            primary_key,
            details: self.details.clone(),
            secret_subkeys,
        })
    }

    /// Selects the signing key to use at `at`: a signing-capable subkey with
    /// a valid binding, the primary itself otherwise.
    pub fn signing_key_at(&self, at: DateTime<Utc>) -> Option<SecretKeyRef<'_>> {
        for subkey in &self.secret_subkeys {
            if !subkey.key_flags().sign() {
                continue;
            }
            if subkey.verify_at(&self.primary_key, at).is_ok() {
                return Some(SecretKeyRef::Subkey(&subkey.key));
            }
        }

        if self.primary_key.is_signing_key() {
            return Some(SecretKeyRef::Primary(&self.primary_key));
        }

        None
    }

    /// Returns the encryption-capable key packets usable for decryption at
    /// `at`, newest first, the primary (if encryption capable) last.
    /// With `key_id` given, only matching keys are returned.
    pub fn decryption_keys_at(
        &self,
        key_id: Option<&KeyId>,
        at: DateTime<Utc>,
    ) -> Vec<SecretKeyRef<'_>> {
        let mut subkeys: Vec<&SignedSecretSubKey> = self
            .secret_subkeys
            .iter()
            .filter(|subkey| subkey.key_flags().encrypt())
            .filter(|subkey| subkey.verify_at(&self.primary_key, at).is_ok())
            .collect();
        // newest first
        subkeys.sort_by_key(|subkey| std::cmp::Reverse(*subkey.key.created_at()));

        let mut keys: Vec<SecretKeyRef<'_>> = subkeys
            .into_iter()
            .map(|subkey| SecretKeyRef::Subkey(&subkey.key))
            .collect();

        if self.primary_key.is_encryption_key() {
            keys.push(SecretKeyRef::Primary(&self.primary_key));
        }

        if let Some(key_id) = key_id {
            keys.retain(|key| key.key_id() == *key_id);
        }

        keys
    }

    /// Adds a new certified user id, returning the extended key.
    pub fn add_user<R, F>(&self, rng: &mut R, id: &str, key_pw: F) -> Result<Self>
    where
        R: CryptoRng + Rng,
        F: FnOnce() -> String,
    {
        let id = UserId::from_str(id);

        let config =
            SignatureConfig::from_key(rng, &self.primary_key, SignatureType::CertPositive)?;
        let sig = config.sign_certification(
            &self.primary_key,
            key_pw,
            &self.primary_key,
            Tag::UserId,
            &id,
        )?;

        let mut user = SignedUser::new(id);
        user.self_certifications.push(sig);

        let mut new = self.clone();
        new.details.users.push(user);
        Ok(new)
    }

    /// Generates and binds a new subkey, returning the extended key.
    pub fn add_subkey<R, F>(
        &self,
        rng: &mut R,
        params: SubkeyParams,
        key_pw: F,
    ) -> Result<Self>
    where
        R: CryptoRng + Rng,
        F: FnOnce() -> String + Clone,
    {
        let (public_params, secret_params) = params.key_type.generate(rng)?;
        let key = packet::SecretSubkey::new(
            packet::PublicSubkey::new(
                self.primary_key.version(),
                params.key_type.to_alg(),
                Utc::now().trunc_subsecs(0),
                public_params,
            )?,
            crate::types::SecretParams::Plain(secret_params),
        )?;

        let mut flags = KeyFlags::default();
        if params.signing {
            flags.set_sign(true);
        } else {
            flags.set_encrypt_comms(true);
            flags.set_encrypt_storage(true);
        }

        let mut config =
            SignatureConfig::from_key(rng, &self.primary_key, SignatureType::SubkeyBinding)?;
        config
            .hashed_subpackets
            .push(Subpacket::regular(SubpacketData::KeyFlags(flags)));

        if flags.sign() {
            let back_config = SignatureConfig::from_key(rng, &key, SignatureType::KeyBinding)?;
            let back_sig =
                back_config.sign_primary_key_binding(&key, key_pw.clone(), &self.primary_key)?;
            config
                .hashed_subpackets
                .push(Subpacket::regular(SubpacketData::EmbeddedSignature(
                    Box::new(back_sig),
                )));
        }

        let binding = config.sign_key_binding(&self.primary_key, key_pw, &key)?;

        let mut new = self.clone();
        new.secret_subkeys.push(SignedSecretSubKey {
            key,
            binding_signatures: vec![binding],
            revocation_signatures: Vec::new(),
        });
        Ok(new)
    }

    /// Certifies a user id of another key (third-party certification).
    pub fn certify<R, P, F>(
        &self,
        rng: &mut R,
        key_pw: F,
        other: &P,
        id: &UserId,
    ) -> Result<Signature>
    where
        R: CryptoRng + Rng,
        P: PublicKeyTrait,
        F: FnOnce() -> String,
    {
        let config =
            SignatureConfig::from_key(rng, &self.primary_key, SignatureType::CertGeneric)?;
        config.sign_certification(&self.primary_key, key_pw, other, Tag::UserId, id)
    }

    /// Revokes the primary key, returning the revoked copy.
    pub fn revoke<R, F>(
        &self,
        rng: &mut R,
        code: RevocationCode,
        reason: &str,
        key_pw: F,
    ) -> Result<Self>
    where
        R: CryptoRng + Rng,
        F: FnOnce() -> String,
    {
        let config = revocation_signature(
            rng,
            &self.primary_key,
            SignatureType::KeyRevocation,
            code,
            reason,
        )?;
        let sig = config.sign_key(&self.primary_key, key_pw, &self.primary_key)?;

        let mut new = self.clone();
        new.details.revocation_signatures.push(sig);
        Ok(new)
    }

    /// Revokes a user id certification, returning the updated key.
    pub fn revoke_user<R, F>(
        &self,
        rng: &mut R,
        user_index: usize,
        code: RevocationCode,
        reason: &str,
        key_pw: F,
    ) -> Result<Self>
    where
        R: CryptoRng + Rng,
        F: FnOnce() -> String,
    {
        ensure!(user_index < self.details.users.len(), "no such user");

        let user = &self.details.users[user_index];
        let config = revocation_signature(
            rng,
            &self.primary_key,
            SignatureType::CertRevocation,
            code,
            reason,
        )?;
        let sig = config.sign_certification(
            &self.primary_key,
            key_pw,
            &self.primary_key,
            Tag::UserId,
            &user.id,
        )?;

        let mut new = self.clone();
        new.details.users[user_index]
            .revocation_certifications
            .push(sig);
        Ok(new)
    }

    /// Revokes a subkey, returning the updated key.
    pub fn revoke_subkey<R, F>(
        &self,
        rng: &mut R,
        subkey_index: usize,
        code: RevocationCode,
        reason: &str,
        key_pw: F,
    ) -> Result<Self>
    where
        R: CryptoRng + Rng,
        F: FnOnce() -> String,
    {
        ensure!(
            subkey_index < self.secret_subkeys.len(),
            "no such subkey"
        );

        let subkey = &self.secret_subkeys[subkey_index];
        let config = revocation_signature(
            rng,
            &self.primary_key,
            SignatureType::SubkeyRevocation,
            code,
            reason,
        )?;
        let sig = config.sign_key_binding(&self.primary_key, key_pw, &subkey.key)?;

        let mut new = self.clone();
        new.secret_subkeys[subkey_index]
            .revocation_signatures
            .push(sig);
        Ok(new)
    }

    /// The packets of the transferable secret key, in canonical order.
    pub fn to_packets(&self) -> Vec<Packet> {
        let mut packets: Vec<Packet> = vec![self.primary_key.clone().into()];
        packets.extend(self.details.to_packets());
        for subkey in &self.secret_subkeys {
            packets.extend(subkey.to_packets());
        }
        packets
    }

    pub fn to_armored_writer(&self, writer: &mut impl io::Write) -> Result<()> {
        armor::write(self, armor::BlockType::PrivateKey, writer, None, true)
    }

    pub fn to_armored_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.to_armored_writer(&mut buf)?;
        Ok(String::from_utf8(buf).map_err(|e| e.utf8_error())?)
    }
}

impl Serialize for SignedSecretKey {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        for packet in self.to_packets() {
            packet.to_writer(w)?;
        }
        Ok(())
    }
}
