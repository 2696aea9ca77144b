use std::fmt;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;

/// Elliptic curves used with ECDSA, EdDSA (legacy framing) and ECDH.
/// Identified on the wire by their OID.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-curve-specific-wire-formats>
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ECCCurve {
    Curve25519,
    Ed25519,
    P256,
    P384,
    P521,
    Secp256k1,
    BrainpoolP256r1,
    BrainpoolP384r1,
    BrainpoolP512r1,
}

impl ECCCurve {
    /// Standard name of the curve.
    pub fn name(&self) -> &str {
        match self {
            ECCCurve::Curve25519 => "Curve25519",
            ECCCurve::Ed25519 => "Ed25519",
            ECCCurve::P256 => "NIST P-256",
            ECCCurve::P384 => "NIST P-384",
            ECCCurve::P521 => "NIST P-521",
            ECCCurve::Secp256k1 => "secp256k1",
            ECCCurve::BrainpoolP256r1 => "brainpoolP256r1",
            ECCCurve::BrainpoolP384r1 => "brainpoolP384r1",
            ECCCurve::BrainpoolP512r1 => "brainpoolP512r1",
        }
    }

    /// ASN.1 OID, without the leading tag and length octets.
    pub fn oid(&self) -> Vec<u8> {
        match self {
            ECCCurve::Curve25519 => vec![0x2B, 0x06, 0x01, 0x04, 0x01, 0x97, 0x55, 0x01, 0x05, 0x01],
            ECCCurve::Ed25519 => vec![0x2B, 0x06, 0x01, 0x04, 0x01, 0xDA, 0x47, 0x0F, 0x01],
            ECCCurve::P256 => vec![0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07],
            ECCCurve::P384 => vec![0x2B, 0x81, 0x04, 0x00, 0x22],
            ECCCurve::P521 => vec![0x2B, 0x81, 0x04, 0x00, 0x23],
            ECCCurve::Secp256k1 => vec![0x2B, 0x81, 0x04, 0x00, 0x0A],
            ECCCurve::BrainpoolP256r1 => vec![0x2B, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x07],
            ECCCurve::BrainpoolP384r1 => vec![0x2B, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x0B],
            ECCCurve::BrainpoolP512r1 => vec![0x2B, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x0D],
        }
    }

    /// Field size in bits.
    pub fn nbits(&self) -> u16 {
        match self {
            ECCCurve::Curve25519 => 255,
            ECCCurve::Ed25519 => 255,
            ECCCurve::P256 => 256,
            ECCCurve::P384 => 384,
            ECCCurve::P521 => 521,
            ECCCurve::Secp256k1 => 256,
            ECCCurve::BrainpoolP256r1 => 256,
            ECCCurve::BrainpoolP384r1 => 384,
            ECCCurve::BrainpoolP512r1 => 512,
        }
    }

    /// Length of the secret scalar in bytes.
    pub fn secret_key_length(&self) -> usize {
        (usize::from(self.nbits()) + 7) / 8
    }

    /// Default KDF hash for ECDH, per RFC 6637 §8.
    pub fn hash_algo(&self) -> HashAlgorithm {
        match self {
            ECCCurve::Curve25519 => HashAlgorithm::Sha256,
            ECCCurve::P256 | ECCCurve::Secp256k1 | ECCCurve::BrainpoolP256r1 => {
                HashAlgorithm::Sha256
            }
            ECCCurve::P384 | ECCCurve::BrainpoolP384r1 => HashAlgorithm::Sha384,
            ECCCurve::P521 | ECCCurve::BrainpoolP512r1 => HashAlgorithm::Sha512,
            ECCCurve::Ed25519 => HashAlgorithm::Sha256,
        }
    }

    /// Default key-wrap cipher for ECDH, per RFC 6637 §8.
    pub fn sym_algo(&self) -> SymmetricKeyAlgorithm {
        match self {
            ECCCurve::Curve25519 => SymmetricKeyAlgorithm::Aes128,
            ECCCurve::P256 | ECCCurve::Secp256k1 | ECCCurve::BrainpoolP256r1 => {
                SymmetricKeyAlgorithm::Aes128
            }
            ECCCurve::P384 | ECCCurve::BrainpoolP384r1 => SymmetricKeyAlgorithm::Aes192,
            ECCCurve::P521 | ECCCurve::BrainpoolP512r1 => SymmetricKeyAlgorithm::Aes256,
            ECCCurve::Ed25519 => SymmetricKeyAlgorithm::Aes128,
        }
    }
}

impl fmt::Display for ECCCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Looks up a curve by its encoded OID.
pub fn ecc_curve_from_oid(oid: &[u8]) -> Option<ECCCurve> {
    [
        ECCCurve::Curve25519,
        ECCCurve::Ed25519,
        ECCCurve::P256,
        ECCCurve::P384,
        ECCCurve::P521,
        ECCCurve::Secp256k1,
        ECCCurve::BrainpoolP256r1,
        ECCCurve::BrainpoolP384r1,
        ECCCurve::BrainpoolP512r1,
    ]
    .into_iter()
    .find(|c| c.oid() == oid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oid_roundtrip() {
        for curve in [
            ECCCurve::Curve25519,
            ECCCurve::Ed25519,
            ECCCurve::P256,
            ECCCurve::P384,
            ECCCurve::P521,
        ] {
            assert_eq!(ecc_curve_from_oid(&curve.oid()), Some(curve));
        }
        assert_eq!(ecc_curve_from_oid(&[0x01, 0x02]), None);
    }
}
