//! ElGamal for OpenPGP.
//!
//! ElGamal encryption is deprecated (RFC 9580 forbids generating such keys).
//! The key material is recognized so that existing keys parse and
//! re-serialize, but no crypto operations are offered.

use crate::errors::Result;

pub fn encrypt(_p: &[u8], _g: &[u8], _y: &[u8], _plain: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    unsupported_err!("ElGamal encryption")
}

pub fn decrypt(_p: &[u8], _x: &[u8], _a: &[u8], _b: &[u8]) -> Result<Vec<u8>> {
    unsupported_err!("ElGamal decryption")
}
