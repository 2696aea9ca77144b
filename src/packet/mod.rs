mod compressed_data;
pub mod key;
mod literal_data;
mod many;
mod one_pass_signature;
mod public_key_encrypted_session_key;
pub mod signature;
mod sym_encrypted_data;
mod sym_encrypted_protected_data;
mod sym_key_encrypted_session_key;
mod user_attribute;
mod user_id;

use std::io;

use crate::errors::Result;
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, Tag};

pub use self::compressed_data::CompressedData;
pub use self::key::{KeyProtection, PubKeyInner, PublicKey, PublicSubkey, SecretKey, SecretSubkey};
pub use self::literal_data::{DataMode, LiteralData};
pub use self::many::from_bytes;
pub use self::one_pass_signature::OnePassSignature;
pub use self::public_key_encrypted_session_key::PublicKeyEncryptedSessionKey;
pub use self::signature::{
    Features, KeyFlags, Notation, RevocationCode, Signature, SignatureConfig, SignatureType,
    SignatureVersion, SignatureVersionSpecific, Subpacket, SubpacketData, SubpacketType,
};
pub use self::sym_encrypted_data::SymEncryptedData;
pub use self::sym_encrypted_protected_data::SymEncryptedProtectedData;
pub use self::sym_key_encrypted_session_key::SymKeyEncryptedSessionKey;
pub use self::user_attribute::UserAttribute;
pub use self::user_id::UserId;

/// The sum of all supported packet types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    CompressedData(CompressedData),
    PublicKey(PublicKey),
    PublicSubkey(PublicSubkey),
    SecretKey(SecretKey),
    SecretSubkey(SecretSubkey),
    LiteralData(LiteralData),
    OnePassSignature(OnePassSignature),
    PublicKeyEncryptedSessionKey(PublicKeyEncryptedSessionKey),
    Signature(Signature),
    SymEncryptedData(SymEncryptedData),
    SymEncryptedProtectedData(SymEncryptedProtectedData),
    SymKeyEncryptedSessionKey(SymKeyEncryptedSessionKey),
    UserAttribute(UserAttribute),
    UserId(UserId),
}

impl Packet {
    pub fn tag(&self) -> Tag {
        match self {
            Packet::CompressedData(p) => p.tag(),
            Packet::PublicKey(p) => p.tag(),
            Packet::PublicSubkey(p) => p.tag(),
            Packet::SecretKey(p) => p.tag(),
            Packet::SecretSubkey(p) => p.tag(),
            Packet::LiteralData(p) => p.tag(),
            Packet::OnePassSignature(p) => p.tag(),
            Packet::PublicKeyEncryptedSessionKey(p) => p.tag(),
            Packet::Signature(p) => p.tag(),
            Packet::SymEncryptedData(p) => p.tag(),
            Packet::SymEncryptedProtectedData(p) => p.tag(),
            Packet::SymKeyEncryptedSessionKey(p) => p.tag(),
            Packet::UserAttribute(p) => p.tag(),
            Packet::UserId(p) => p.tag(),
        }
    }

    fn body_to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Packet::CompressedData(p) => p.to_bytes(),
            Packet::PublicKey(p) => p.to_bytes(),
            Packet::PublicSubkey(p) => p.to_bytes(),
            Packet::SecretKey(p) => p.to_bytes(),
            Packet::SecretSubkey(p) => p.to_bytes(),
            Packet::LiteralData(p) => p.to_bytes(),
            Packet::OnePassSignature(p) => p.to_bytes(),
            Packet::PublicKeyEncryptedSessionKey(p) => p.to_bytes(),
            Packet::Signature(p) => p.to_bytes(),
            Packet::SymEncryptedData(p) => p.to_bytes(),
            Packet::SymEncryptedProtectedData(p) => p.to_bytes(),
            Packet::SymKeyEncryptedSessionKey(p) => p.to_bytes(),
            Packet::UserAttribute(p) => p.to_bytes(),
            Packet::UserId(p) => p.to_bytes(),
        }
    }
}

impl Serialize for Packet {
    /// Emits the packet with a new-format header and a single fixed length.
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        let body = self.body_to_bytes()?;
        PacketHeaderVersion::New.write_header(w, self.tag(), body.len())?;
        w.write_all(&body)?;
        Ok(())
    }
}

macro_rules! impl_packet_from {
    ($variant:ident, $typ:ty) => {
        impl From<$typ> for Packet {
            fn from(value: $typ) -> Self {
                Packet::$variant(value)
            }
        }
    };
}

impl_packet_from!(CompressedData, CompressedData);
impl_packet_from!(PublicKey, PublicKey);
impl_packet_from!(PublicSubkey, PublicSubkey);
impl_packet_from!(SecretKey, SecretKey);
impl_packet_from!(SecretSubkey, SecretSubkey);
impl_packet_from!(LiteralData, LiteralData);
impl_packet_from!(OnePassSignature, OnePassSignature);
impl_packet_from!(
    PublicKeyEncryptedSessionKey,
    PublicKeyEncryptedSessionKey
);
impl_packet_from!(Signature, Signature);
impl_packet_from!(SymEncryptedData, SymEncryptedData);
impl_packet_from!(SymEncryptedProtectedData, SymEncryptedProtectedData);
impl_packet_from!(SymKeyEncryptedSessionKey, SymKeyEncryptedSessionKey);
impl_packet_from!(UserAttribute, UserAttribute);
impl_packet_from!(UserId, UserId);

/// Returns the packets with the given tag, preserving their original order.
pub fn filter_by_tag(packets: &[Packet], tag: Tag) -> Vec<&Packet> {
    packets.iter().filter(|p| p.tag() == tag).collect()
}
