use num_enum::{FromPrimitive, IntoPrimitive};

/// Available public key algorithms.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-public-key-algorithms>
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive, Hash)]
#[repr(u8)]
pub enum PublicKeyAlgorithm {
    /// RSA (Encrypt and Sign)
    RSA = 1,
    /// RSA (Encrypt only, legacy)
    RSAEncrypt = 2,
    /// RSA (Sign only, legacy)
    RSASign = 3,
    /// ElGamal (Encrypt only)
    Elgamal = 16,
    /// DSA (Sign only)
    DSA = 17,
    /// Elliptic Curve Diffie-Hellman, RFC 6637
    ECDH = 18,
    /// ECDSA, RFC 6637
    ECDSA = 19,
    /// Formerly ElGamal (Encrypt and Sign), now reserved
    ElgamalEncryptSign = 20,
    /// EdDSA with legacy (MPI) framing, may only be used with v4 keys
    EdDSALegacy = 22,
    /// X25519, RFC 9580
    X25519 = 25,
    /// X448, RFC 9580
    X448 = 26,
    /// Ed25519, RFC 9580
    Ed25519 = 27,
    /// Ed448, RFC 9580
    Ed448 = 28,

    #[num_enum(catch_all)]
    Other(u8),
}

impl PublicKeyAlgorithm {
    /// Can this algorithm be used to issue signatures?
    pub fn is_signing(self) -> bool {
        matches!(
            self,
            PublicKeyAlgorithm::RSA
                | PublicKeyAlgorithm::RSASign
                | PublicKeyAlgorithm::DSA
                | PublicKeyAlgorithm::ECDSA
                | PublicKeyAlgorithm::EdDSALegacy
                | PublicKeyAlgorithm::Ed25519
                | PublicKeyAlgorithm::Ed448
        )
    }

    /// Can this algorithm be used to encrypt session keys?
    pub fn is_encryption(self) -> bool {
        matches!(
            self,
            PublicKeyAlgorithm::RSA
                | PublicKeyAlgorithm::RSAEncrypt
                | PublicKeyAlgorithm::Elgamal
                | PublicKeyAlgorithm::ECDH
                | PublicKeyAlgorithm::X25519
                | PublicKeyAlgorithm::X448
        )
    }
}
