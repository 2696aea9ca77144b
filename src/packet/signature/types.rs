use num_enum::{FromPrimitive, IntoPrimitive};

/// The version of a signature packet. Treated as data; only v4 and v6
/// signatures can be created.
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SignatureVersion {
    V2 = 2,
    V3 = 3,
    V4 = 4,
    V5 = 5,
    V6 = 6,

    #[num_enum(catch_all)]
    Other(u8),
}

/// Available signature types.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-signature-types>
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SignatureType {
    /// Signature of a binary document.
    Binary = 0x00,
    /// Signature of a canonical text document.
    Text = 0x01,
    /// Standalone signature.
    Standalone = 0x02,
    /// Generic certification of a User ID and Public-Key packet.
    CertGeneric = 0x10,
    /// Persona certification of a User ID and Public-Key packet.
    CertPersona = 0x11,
    /// Casual certification of a User ID and Public-Key packet.
    CertCasual = 0x12,
    /// Positive certification of a User ID and Public-Key packet.
    CertPositive = 0x13,
    /// Subkey Binding Signature
    SubkeyBinding = 0x18,
    /// Primary Key Binding Signature (the "back signature" of a signing subkey)
    KeyBinding = 0x19,
    /// Signature directly on a key.
    Key = 0x1F,
    /// Key revocation signature.
    KeyRevocation = 0x20,
    /// Subkey revocation signature.
    SubkeyRevocation = 0x28,
    /// Certification revocation signature.
    CertRevocation = 0x30,
    /// Timestamp signature.
    Timestamp = 0x40,
    /// Third-Party Confirmation signature.
    ThirdParty = 0x50,

    #[num_enum(catch_all)]
    Other(u8),
}

impl SignatureType {
    pub fn is_certification(self) -> bool {
        matches!(
            self,
            SignatureType::CertGeneric
                | SignatureType::CertPersona
                | SignatureType::CertCasual
                | SignatureType::CertPositive
                | SignatureType::CertRevocation
        )
    }
}

/// Key flags as stored in the key-flags signature subpacket.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-key-flags>
#[derive(Default, Clone, Copy, PartialEq, Eq, derive_more::Debug)]
#[debug("KeyFlags({:#04x})", _0)]
pub struct KeyFlags(u8);

impl KeyFlags {
    pub fn certify(&self) -> bool {
        self.0 & 0x01 != 0
    }

    pub fn sign(&self) -> bool {
        self.0 & 0x02 != 0
    }

    pub fn encrypt_comms(&self) -> bool {
        self.0 & 0x04 != 0
    }

    pub fn encrypt_storage(&self) -> bool {
        self.0 & 0x08 != 0
    }

    pub fn authentication(&self) -> bool {
        self.0 & 0x20 != 0
    }

    pub fn set_certify(&mut self, value: bool) {
        self.set_bit(0x01, value);
    }

    pub fn set_sign(&mut self, value: bool) {
        self.set_bit(0x02, value);
    }

    pub fn set_encrypt_comms(&mut self, value: bool) {
        self.set_bit(0x04, value);
    }

    pub fn set_encrypt_storage(&mut self, value: bool) {
        self.set_bit(0x08, value);
    }

    pub fn set_authentication(&mut self, value: bool) {
        self.set_bit(0x20, value);
    }

    fn set_bit(&mut self, mask: u8, value: bool) {
        if value {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    /// Usable for encrypting communications or storage.
    pub fn encrypt(&self) -> bool {
        self.encrypt_comms() || self.encrypt_storage()
    }
}

impl From<u8> for KeyFlags {
    fn from(value: u8) -> Self {
        KeyFlags(value)
    }
}

impl From<KeyFlags> for u8 {
    fn from(value: KeyFlags) -> Self {
        value.0
    }
}

/// Feature flags from the features subpacket.
#[derive(Default, Clone, Copy, PartialEq, Eq, derive_more::Debug)]
#[debug("Features({:#04x})", _0)]
pub struct Features(u8);

impl Features {
    pub const MDC: u8 = 0x01;
    pub const SEIPD_V2: u8 = 0x08;

    pub fn new(value: u8) -> Self {
        Features(value)
    }

    pub fn modification_detection(&self) -> bool {
        self.0 & Self::MDC != 0
    }

    pub fn seipd_v2(&self) -> bool {
        self.0 & Self::SEIPD_V2 != 0
    }
}

impl From<u8> for Features {
    fn from(value: u8) -> Self {
        Features(value)
    }
}

impl From<Features> for u8 {
    fn from(value: Features) -> Self {
        value.0
    }
}

/// Reason codes for revocation-reason subpackets.
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum RevocationCode {
    NoReason = 0,
    KeySuperseded = 1,
    KeyCompromised = 2,
    KeyRetired = 3,
    CertUserIdInvalid = 32,

    #[num_enum(catch_all)]
    Other(u8),
}

/// A human-readable notation on a signature.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct Notation {
    pub readable: bool,
    #[debug("{:?}", String::from_utf8_lossy(name))]
    pub name: Vec<u8>,
    #[debug("{:?}", String::from_utf8_lossy(value))]
    pub value: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_flags() {
        let mut flags = KeyFlags::default();
        assert!(!flags.sign());

        flags.set_sign(true);
        flags.set_encrypt_comms(true);
        assert!(flags.sign());
        assert!(flags.encrypt());
        assert_eq!(u8::from(flags), 0x06);

        flags.set_sign(false);
        assert!(!flags.sign());
    }

    #[test]
    fn features() {
        let f = Features::new(Features::MDC | Features::SEIPD_V2);
        assert!(f.modification_detection());
        assert!(f.seipd_v2());
    }
}
