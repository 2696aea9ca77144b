use log::warn;

use crate::armor;
use crate::composed::key::public::SignedPublicKey;
use crate::composed::key::secret::SignedSecretKey;
use crate::composed::key::shared::{
    SignedKeyDetails, SignedPublicSubKey, SignedSecretSubKey, SignedUser, SignedUserAttribute,
};
use crate::errors::Result;
use crate::packet::{self, Packet, Signature, SignatureType};
use crate::types::{KeyId, PublicKeyTrait};

/// Splits a packet stream into the parts of a transferable key, following
/// the canonical grammar: primary, direct signatures, users with their
/// certifications, subkeys with their bindings.
struct KeyParts {
    details: SignedKeyDetails,
    public_subkeys: Vec<SignedPublicSubKey>,
    secret_subkeys: Vec<SignedSecretSubKey>,
}

enum Position {
    Primary,
    User(usize),
    UserAttribute(usize),
    PublicSubkey(usize),
    SecretSubkey(usize),
}

fn classify_issuer(sig: &Signature, primary_id: &KeyId) -> bool {
    let issuers = sig.issuer();
    issuers.is_empty() || issuers.contains(&primary_id)
}

fn parse_parts(
    packets: impl Iterator<Item = Packet>,
    primary_id: &KeyId,
) -> Result<KeyParts> {
    let mut details = SignedKeyDetails {
        revocation_signatures: Vec::new(),
        direct_signatures: Vec::new(),
        users: Vec::new(),
        user_attributes: Vec::new(),
    };
    let mut public_subkeys: Vec<SignedPublicSubKey> = Vec::new();
    let mut secret_subkeys: Vec<SignedSecretSubKey> = Vec::new();

    let mut position = Position::Primary;

    for packet in packets {
        match packet {
            Packet::UserId(id) => {
                details.users.push(SignedUser::new(id));
                position = Position::User(details.users.len() - 1);
            }
            Packet::UserAttribute(attr) => {
                details.user_attributes.push(SignedUserAttribute {
                    attr,
                    certifications: Vec::new(),
                });
                position = Position::UserAttribute(details.user_attributes.len() - 1);
            }
            Packet::PublicSubkey(key) => {
                public_subkeys.push(SignedPublicSubKey {
                    key,
                    binding_signatures: Vec::new(),
                    revocation_signatures: Vec::new(),
                });
                position = Position::PublicSubkey(public_subkeys.len() - 1);
            }
            Packet::SecretSubkey(key) => {
                secret_subkeys.push(SignedSecretSubKey {
                    key,
                    binding_signatures: Vec::new(),
                    revocation_signatures: Vec::new(),
                });
                position = Position::SecretSubkey(secret_subkeys.len() - 1);
            }
            Packet::Signature(sig) => match position {
                Position::Primary => match sig.typ() {
                    SignatureType::KeyRevocation => details.revocation_signatures.push(sig),
                    _ => details.direct_signatures.push(sig),
                },
                Position::User(index) => {
                    let user = &mut details.users[index];
                    match sig.typ() {
                        SignatureType::CertRevocation => user.revocation_certifications.push(sig),
                        _ => {
                            if classify_issuer(&sig, primary_id) {
                                user.self_certifications.push(sig);
                            } else {
                                user.other_certifications.push(sig);
                            }
                        }
                    }
                }
                Position::UserAttribute(index) => {
                    details.user_attributes[index].certifications.push(sig);
                }
                Position::PublicSubkey(index) => {
                    let subkey = &mut public_subkeys[index];
                    match sig.typ() {
                        SignatureType::SubkeyRevocation => subkey.revocation_signatures.push(sig),
                        _ => subkey.binding_signatures.push(sig),
                    }
                }
                Position::SecretSubkey(index) => {
                    let subkey = &mut secret_subkeys[index];
                    match sig.typ() {
                        SignatureType::SubkeyRevocation => subkey.revocation_signatures.push(sig),
                        _ => subkey.binding_signatures.push(sig),
                    }
                }
            },
            other => {
                warn!("unexpected packet in key block: {:?}", other.tag());
            }
        }
    }

    Ok(KeyParts {
        details,
        public_subkeys,
        secret_subkeys,
    })
}

impl SignedSecretKey {
    /// Parses a transferable secret key from a binary packet stream.
    pub fn from_bytes(input: &[u8]) -> Result<Self> {
        let packets = packet::from_bytes(input)?;
        let mut iter = packets.into_iter();

        let Some(Packet::SecretKey(primary_key)) = iter.next() else {
            bail!("expected a secret key packet first");
        };

        let primary_id = primary_key.key_id();
        let parts = parse_parts(iter, &primary_id)?;
        ensure!(
            parts.public_subkeys.is_empty(),
            "public subkeys inside a secret key block"
        );

        Ok(SignedSecretKey {
            primary_key,
            details: parts.details,
            secret_subkeys: parts.secret_subkeys,
        })
    }

    /// Parses a transferable secret key from armored text.
    pub fn from_string(input: &str) -> Result<Self> {
        let dearmored = armor::parse(input)?;
        ensure_eq!(
            dearmored.typ,
            armor::BlockType::PrivateKey,
            "unexpected armor type"
        );
        Self::from_bytes(&dearmored.body)
    }
}

impl SignedPublicKey {
    /// Parses a transferable public key from a binary packet stream.
    pub fn from_bytes(input: &[u8]) -> Result<Self> {
        let packets = packet::from_bytes(input)?;
        let mut iter = packets.into_iter();

        let Some(Packet::PublicKey(primary_key)) = iter.next() else {
            bail!("expected a public key packet first");
        };

        let primary_id = primary_key.key_id();
        let parts = parse_parts(iter, &primary_id)?;
        ensure!(
            parts.secret_subkeys.is_empty(),
            "secret subkeys inside a public key block"
        );

        Ok(SignedPublicKey {
            primary_key,
            details: parts.details,
            public_subkeys: parts.public_subkeys,
        })
    }

    /// Parses a transferable public key from armored text.
    pub fn from_string(input: &str) -> Result<Self> {
        let dearmored = armor::parse(input)?;
        ensure_eq!(
            dearmored.typ,
            armor::BlockType::PublicKey,
            "unexpected armor type"
        );
        Self::from_bytes(&dearmored.body)
    }
}
