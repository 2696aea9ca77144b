use chrono::{DateTime, Duration, Utc};
use log::debug;
use rand::{CryptoRng, Rng};
use smallvec::SmallVec;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::{
    self, KeyFlags, Packet, RevocationCode, Signature, SignatureConfig, SignatureType, Subpacket,
    SubpacketData, UserAttribute, UserId,
};
use crate::ser::Serialize;
use crate::types::{CompressionAlgorithm, PublicKeyTrait, SecretKeyTrait, Tag};

/// A User ID with its certifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUser {
    pub id: UserId,
    pub self_certifications: Vec<Signature>,
    pub other_certifications: Vec<Signature>,
    pub revocation_certifications: Vec<Signature>,
}

impl SignedUser {
    pub fn new(id: UserId) -> Self {
        SignedUser {
            id,
            self_certifications: Vec::new(),
            other_certifications: Vec::new(),
            revocation_certifications: Vec::new(),
        }
    }

    /// Is there a valid self-certification by `primary`, which is not
    /// superseded by a later revocation from the same issuer, at `at`?
    pub fn verify_at<P>(&self, primary: &P, at: DateTime<Utc>) -> Result<()>
    where
        P: PublicKeyTrait,
    {
        debug!("verify user {:?}", self.id);

        let mut valid_certification: Option<&Signature> = None;
        for sig in &self.self_certifications {
            if sig.check_validity_at(at).is_err() {
                continue;
            }
            if sig
                .verify_certification(primary, primary, Tag::UserId, &self.id)
                .is_ok()
            {
                valid_certification = Some(sig);
                break;
            }
        }

        let Some(certification) = valid_certification else {
            return Err(Error::KeyInvalid {
                message: "no valid self certification".to_string(),
                backtrace: None,
            });
        };

        // a later, valid cert revocation from the same issuer supersedes it
        for revocation in &self.revocation_certifications {
            if revocation.check_validity_at(at).is_err() {
                continue;
            }
            if revocation.created() < certification.created() {
                continue;
            }
            if revocation
                .verify_certification(primary, primary, Tag::UserId, &self.id)
                .is_ok()
            {
                return Err(Error::KeyInvalid {
                    message: "user id is revoked".to_string(),
                    backtrace: None,
                });
            }
        }

        Ok(())
    }

    pub fn is_primary(&self) -> bool {
        self.self_certifications
            .iter()
            .any(|sig| sig.is_primary_user_id())
    }

    /// The key expiration carried on the newest valid self certification.
    pub fn key_expiration(&self) -> Option<u32> {
        self.self_certifications
            .iter()
            .max_by_key(|sig| sig.created().copied())
            .and_then(|sig| sig.key_expiration_time())
    }

    fn to_packets(&self) -> Vec<Packet> {
        let mut packets: Vec<Packet> = vec![self.id.clone().into()];
        packets.extend(self.self_certifications.iter().cloned().map(Packet::from));
        packets.extend(self.other_certifications.iter().cloned().map(Packet::from));
        packets.extend(
            self.revocation_certifications
                .iter()
                .cloned()
                .map(Packet::from),
        );
        packets
    }
}

/// A User Attribute with its certifications. Carried opaquely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUserAttribute {
    pub attr: UserAttribute,
    pub certifications: Vec<Signature>,
}

impl SignedUserAttribute {
    fn to_packets(&self) -> Vec<Packet> {
        let mut packets: Vec<Packet> = vec![self.attr.clone().into()];
        packets.extend(self.certifications.iter().cloned().map(Packet::from));
        packets
    }
}

/// The signatures and users bound to a primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedKeyDetails {
    pub revocation_signatures: Vec<Signature>,
    pub direct_signatures: Vec<Signature>,
    pub users: Vec<SignedUser>,
    pub user_attributes: Vec<SignedUserAttribute>,
}

impl SignedKeyDetails {
    /// Verifies the key graph state at `at` per the usability rules:
    /// a valid unrevoked self-certification exists, the primary is not
    /// revoked, it existed at `at` and has not expired.
    pub fn verify_at<P>(&self, primary: &P, at: DateTime<Utc>) -> Result<()>
    where
        P: PublicKeyTrait,
    {
        if *primary.created_at() > at {
            return Err(Error::KeyInvalid {
                message: "key not yet created".to_string(),
                backtrace: None,
            });
        }

        for revocation in &self.revocation_signatures {
            if revocation.check_validity_at(at).is_err() {
                continue;
            }
            if revocation.verify_key(primary, primary).is_ok() {
                return Err(Error::KeyInvalid {
                    message: "key is revoked".to_string(),
                    backtrace: None,
                });
            }
        }

        let mut user_result = Err(Error::KeyInvalid {
            message: "no users".to_string(),
            backtrace: None,
        });
        for user in &self.users {
            match user.verify_at(primary, at) {
                Ok(()) => {
                    user_result = Ok(());
                    break;
                }
                Err(err) => user_result = Err(err),
            }
        }
        user_result?;

        if let Some(expiration) = self.key_expiration() {
            let expires_at = *primary.created_at() + Duration::seconds(expiration.into());
            if expires_at <= at {
                return Err(Error::KeyInvalid {
                    message: "key is expired".to_string(),
                    backtrace: None,
                });
            }
        }

        Ok(())
    }

    /// The effective key expiration in seconds after creation, if set on a
    /// self signature.
    pub fn key_expiration(&self) -> Option<u32> {
        self.users
            .iter()
            .filter_map(|user| user.key_expiration())
            .chain(
                self.direct_signatures
                    .iter()
                    .filter_map(|sig| sig.key_expiration_time()),
            )
            .max()
    }

    pub fn to_packets(&self) -> Vec<Packet> {
        let mut packets: Vec<Packet> = Vec::new();
        packets.extend(self.revocation_signatures.iter().cloned().map(Packet::from));
        packets.extend(self.direct_signatures.iter().cloned().map(Packet::from));
        for user in &self.users {
            packets.extend(user.to_packets());
        }
        for attr in &self.user_attributes {
            packets.extend(attr.to_packets());
        }
        packets
    }
}

macro_rules! impl_signed_subkey {
    ($name:ident, $inner:ty) => {
        /// A subkey with its binding and revocation signatures.
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub key: $inner,
            pub binding_signatures: Vec<Signature>,
            pub revocation_signatures: Vec<Signature>,
        }

        impl $name {
            /// Returns the newest binding signature that verifies against the
            /// primary (including the embedded back signature for
            /// signing-capable subkeys).
            pub fn valid_binding_at<P>(
                &self,
                primary: &P,
                at: DateTime<Utc>,
            ) -> Option<&Signature>
            where
                P: PublicKeyTrait,
            {
                let mut bindings: Vec<&Signature> = self
                    .binding_signatures
                    .iter()
                    .filter(|sig| sig.check_validity_at(at).is_ok())
                    .filter(|sig| sig.verify_key_binding(primary, &self.key).is_ok())
                    .collect();
                bindings.sort_by_key(|sig| sig.created().copied());

                let binding = bindings.pop()?;

                // signing-capable subkeys must carry a valid back signature
                if binding.key_flags().sign() {
                    let back = binding.embedded_signature()?;
                    back.verify_primary_key_binding(primary, &self.key).ok()?;
                }

                Some(binding)
            }

            /// Is this subkey usable at `at`: bound, not revoked, not expired?
            pub fn verify_at<P>(&self, primary: &P, at: DateTime<Utc>) -> Result<()>
            where
                P: PublicKeyTrait,
            {
                let Some(binding) = self.valid_binding_at(primary, at) else {
                    return Err(Error::KeyInvalid {
                        message: "no valid subkey binding".to_string(),
                        backtrace: None,
                    });
                };

                for revocation in &self.revocation_signatures {
                    if revocation.check_validity_at(at).is_err() {
                        continue;
                    }
                    if revocation.created() < binding.created() {
                        continue;
                    }
                    if revocation.verify_key_binding(primary, &self.key).is_ok() {
                        return Err(Error::KeyInvalid {
                            message: "subkey is revoked".to_string(),
                            backtrace: None,
                        });
                    }
                }

                if *self.key.created_at() > at {
                    return Err(Error::KeyInvalid {
                        message: "subkey not yet created".to_string(),
                        backtrace: None,
                    });
                }
                if let Some(expiration) = binding.key_expiration_time() {
                    if *self.key.created_at() + Duration::seconds(expiration.into()) <= at {
                        return Err(Error::KeyInvalid {
                            message: "subkey is expired".to_string(),
                            backtrace: None,
                        });
                    }
                }

                Ok(())
            }

            /// The key flags from the newest binding signature.
            pub fn key_flags(&self) -> KeyFlags {
                self.binding_signatures
                    .iter()
                    .max_by_key(|sig| sig.created().copied())
                    .map(|sig| sig.key_flags())
                    .unwrap_or_default()
            }

            pub fn to_packets(&self) -> Vec<Packet> {
                let mut packets: Vec<Packet> = vec![self.key.clone().into()];
                packets.extend(self.binding_signatures.iter().cloned().map(Packet::from));
                packets.extend(
                    self.revocation_signatures
                        .iter()
                        .cloned()
                        .map(Packet::from),
                );
                packets
            }
        }
    };
}

impl_signed_subkey!(SignedPublicSubKey, packet::PublicSubkey);
impl_signed_subkey!(SignedSecretSubKey, packet::SecretSubkey);

impl SignedSecretSubKey {
    pub fn as_public(&self) -> SignedPublicSubKey {
        SignedPublicSubKey {
            key: self.public_key().clone(),
            binding_signatures: self.binding_signatures.clone(),
            revocation_signatures: self.revocation_signatures.clone(),
        }
    }

    fn public_key(&self) -> &packet::PublicSubkey {
        self.key.public_key()
    }
}

/// Preferences attached to generated self signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDetails {
    pub primary_user_id: UserId,
    pub user_ids: Vec<UserId>,
    pub key_flags: KeyFlags,
    pub preferred_symmetric_algorithms: SmallVec<[SymmetricKeyAlgorithm; 8]>,
    pub preferred_hash_algorithms: SmallVec<[HashAlgorithm; 8]>,
    pub preferred_compression_algorithms: SmallVec<[CompressionAlgorithm; 8]>,
    pub key_expiry: Option<u32>,
}

/// Builds the hashed subpackets shared by self certifications and direct
/// signatures: key flags, preferences, features, expiration.
pub(crate) fn preference_subpackets(
    details: &KeyDetails,
    features: packet::Features,
) -> Vec<Subpacket> {
    let mut subpackets = vec![
        Subpacket::regular(SubpacketData::KeyFlags(details.key_flags)),
        Subpacket::regular(SubpacketData::PreferredSymmetricAlgorithms(
            details.preferred_symmetric_algorithms.clone(),
        )),
        Subpacket::regular(SubpacketData::PreferredHashAlgorithms(
            details.preferred_hash_algorithms.clone(),
        )),
        Subpacket::regular(SubpacketData::PreferredCompressionAlgorithms(
            details.preferred_compression_algorithms.clone(),
        )),
        Subpacket::regular(SubpacketData::Features(features)),
    ];
    if let Some(expiry) = details.key_expiry {
        subpackets.push(Subpacket::regular(SubpacketData::KeyExpirationTime(expiry)));
    }
    subpackets
}

/// Creates a revocation signature (key, subkey or certification revocation)
/// with the given reason.
pub(crate) fn revocation_signature<R, K>(
    rng: &mut R,
    signer: &K,
    typ: SignatureType,
    code: RevocationCode,
    reason: &str,
) -> Result<SignatureConfig>
where
    R: CryptoRng + Rng,
    K: SecretKeyTrait + Serialize,
{
    let mut config = SignatureConfig::from_key(rng, signer, typ)?;
    config.hashed_subpackets.push(Subpacket::regular(
        SubpacketData::RevocationReason(code, reason.as_bytes().to_vec()),
    ));
    Ok(config)
}
