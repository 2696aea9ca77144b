use std::io;

use chrono::{DateTime, Utc};

use crate::armor;
use crate::composed::key::shared::{SignedKeyDetails, SignedPublicSubKey};
use crate::errors::Result;
use crate::packet::{self, Packet};
use crate::ser::Serialize;
use crate::types::{KeyId, PublicKeyTrait};

/// A complete transferable public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPublicKey {
    pub primary_key: packet::PublicKey,
    pub details: SignedKeyDetails,
    pub public_subkeys: Vec<SignedPublicSubKey>,
}

/// Reference to a concrete public key packet inside a transferable key.
#[derive(Debug, Clone, Copy)]
pub enum PublicKeyRef<'a> {
    Primary(&'a packet::PublicKey),
    Subkey(&'a packet::PublicSubkey),
}

impl SignedPublicKey {
    /// Checks the usability of the key at the current time.
    pub fn verify(&self) -> Result<()> {
        self.verify_at(Utc::now())
    }

    /// Checks the usability of the key at `at`.
    pub fn verify_at(&self, at: DateTime<Utc>) -> Result<()> {
        self.details.verify_at(&self.primary_key, at)
    }

    /// Selects the encryption keys usable at `at`, newest subkey first, the
    /// primary (if encryption capable) last.
    pub fn encryption_keys_at(&self, at: DateTime<Utc>) -> Vec<PublicKeyRef<'_>> {
        let mut subkeys: Vec<&SignedPublicSubKey> = self
            .public_subkeys
            .iter()
            .filter(|subkey| subkey.key_flags().encrypt())
            .filter(|subkey| subkey.verify_at(&self.primary_key, at).is_ok())
            .collect();
        subkeys.sort_by_key(|subkey| std::cmp::Reverse(*subkey.key.created_at()));

        let mut keys: Vec<PublicKeyRef<'_>> = subkeys
            .into_iter()
            .map(|subkey| PublicKeyRef::Subkey(&subkey.key))
            .collect();

        if self.primary_key.is_encryption_key() {
            keys.push(PublicKeyRef::Primary(&self.primary_key));
        }

        keys
    }

    /// Selects the verification key packet for the given issuer hint.
    pub fn verification_key(&self, issuer: Option<&KeyId>) -> Option<PublicKeyRef<'_>> {
        match issuer {
            None => Some(PublicKeyRef::Primary(&self.primary_key)),
            Some(id) => {
                if self.primary_key.key_id() == *id {
                    return Some(PublicKeyRef::Primary(&self.primary_key));
                }
                self.public_subkeys
                    .iter()
                    .find(|subkey| subkey.key.key_id() == *id)
                    .map(|subkey| PublicKeyRef::Subkey(&subkey.key))
            }
        }
    }

    pub fn key_id(&self) -> KeyId {
        self.primary_key.key_id()
    }

    /// The packets of the transferable public key, in canonical order.
    pub fn to_packets(&self) -> Vec<Packet> {
        let mut packets: Vec<Packet> = vec![self.primary_key.clone().into()];
        packets.extend(self.details.to_packets());
        for subkey in &self.public_subkeys {
            packets.extend(subkey.to_packets());
        }
        packets
    }

    pub fn to_armored_writer(&self, writer: &mut impl io::Write) -> Result<()> {
        armor::write(self, armor::BlockType::PublicKey, writer, None, true)
    }

    pub fn to_armored_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.to_armored_writer(&mut buf)?;
        Ok(String::from_utf8(buf).map_err(|e| e.utf8_error())?)
    }
}

impl Serialize for SignedPublicKey {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        for packet in self.to_packets() {
            packet.to_writer(w)?;
        }
        Ok(())
    }
}

macro_rules! delegate_public_ref {
    ($method:ident, $ret:ty) => {
        fn $method(&self) -> $ret {
            match self {
                PublicKeyRef::Primary(key) => key.$method(),
                PublicKeyRef::Subkey(key) => key.$method(),
            }
        }
    };
}

impl Serialize for PublicKeyRef<'_> {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        match self {
            PublicKeyRef::Primary(key) => key.to_writer(w),
            PublicKeyRef::Subkey(key) => key.to_writer(w),
        }
    }
}

impl PublicKeyTrait for PublicKeyRef<'_> {
    delegate_public_ref!(version, crate::types::KeyVersion);
    delegate_public_ref!(fingerprint, crate::types::Fingerprint);
    delegate_public_ref!(key_id, KeyId);
    delegate_public_ref!(algorithm, crate::crypto::public_key::PublicKeyAlgorithm);
    delegate_public_ref!(created_at, &DateTime<Utc>);
    delegate_public_ref!(public_params, &crate::types::PublicParams);

    fn serialize_for_hashing<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PublicKeyRef::Primary(key) => key.serialize_for_hashing(writer),
            PublicKeyRef::Subkey(key) => key.serialize_for_hashing(writer),
        }
    }

    fn verify_signature(
        &self,
        hash: crate::crypto::hash::HashAlgorithm,
        data: &[u8],
        sig: &crate::types::SignatureBytes,
    ) -> Result<()> {
        match self {
            PublicKeyRef::Primary(key) => key.verify_signature(hash, data, sig),
            PublicKeyRef::Subkey(key) => key.verify_signature(hash, data, sig),
        }
    }

    fn encrypt_session_key<R: rand::CryptoRng + rand::Rng>(
        &self,
        rng: &mut R,
        plain: &[u8],
    ) -> Result<crate::types::PkeskBytes> {
        match self {
            PublicKeyRef::Primary(key) => key.encrypt_session_key(rng, plain),
            PublicKeyRef::Subkey(key) => key.encrypt_session_key(rng, plain),
        }
    }
}
