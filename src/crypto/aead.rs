use aead::generic_array::GenericArray;
use aead::{AeadInPlace, KeyInit};
use cipher::consts::{U12, U15, U16};
use aes::{Aes128, Aes192, Aes256};
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;

type Aes128Eax = eax::Eax<Aes128>;
type Aes192Eax = eax::Eax<Aes192>;
type Aes256Eax = eax::Eax<Aes256>;

type Aes128Ocb = ocb3::Ocb3<Aes128, U15, U16>;
type Aes192Ocb = ocb3::Ocb3<Aes192, U15, U16>;
type Aes256Ocb = ocb3::Ocb3<Aes256, U15, U16>;

type Aes128Gcm = aes_gcm::AesGcm<Aes128, U12>;
type Aes192Gcm = aes_gcm::AesGcm<Aes192, U12>;
type Aes256Gcm = aes_gcm::AesGcm<Aes256, U12>;

macro_rules! aead_encrypt {
    ($cipher:ty, $key:expr, $nonce:expr, $aad:expr, $buffer:expr) => {{
        let cipher = <$cipher>::new_from_slice($key)?;
        let nonce = GenericArray::from_slice($nonce);
        let tag = cipher.encrypt_in_place_detached(nonce, $aad, $buffer)?;
        Ok(tag.to_vec())
    }};
}

macro_rules! aead_decrypt {
    ($cipher:ty, $key:expr, $nonce:expr, $aad:expr, $tag:expr, $buffer:expr) => {{
        let cipher = <$cipher>::new_from_slice($key)?;
        let nonce = GenericArray::from_slice($nonce);
        let tag = GenericArray::from_slice($tag);
        cipher.decrypt_in_place_detached(nonce, $aad, $buffer, tag)?;
        Ok(())
    }};
}

/// Available AEAD algorithms.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-aead-algorithms>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive, Hash)]
#[repr(u8)]
pub enum AeadAlgorithm {
    None = 0,
    Eax = 1,
    Ocb = 2,
    Gcm = 3,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Default for AeadAlgorithm {
    fn default() -> Self {
        Self::Ocb
    }
}

impl AeadAlgorithm {
    /// Nonce size in bytes.
    pub fn iv_size(self) -> usize {
        match self {
            AeadAlgorithm::Eax => 16,
            AeadAlgorithm::Ocb => 15,
            AeadAlgorithm::Gcm => 12,
            _ => 0,
        }
    }

    /// Authentication tag size in bytes.
    pub fn tag_size(self) -> usize {
        match self {
            AeadAlgorithm::Eax | AeadAlgorithm::Ocb | AeadAlgorithm::Gcm => 16,
            _ => 0,
        }
    }

    /// Encrypt `buffer` in place, returning the detached authentication tag.
    pub fn encrypt_in_place(
        self,
        sym_alg: SymmetricKeyAlgorithm,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        buffer: &mut [u8],
    ) -> Result<Vec<u8>> {
        ensure_eq!(nonce.len(), self.iv_size(), "invalid nonce size");

        match (self, sym_alg) {
            (AeadAlgorithm::Eax, SymmetricKeyAlgorithm::Aes128) => {
                aead_encrypt!(Aes128Eax, key, nonce, aad, buffer)
            }
            (AeadAlgorithm::Eax, SymmetricKeyAlgorithm::Aes192) => {
                aead_encrypt!(Aes192Eax, key, nonce, aad, buffer)
            }
            (AeadAlgorithm::Eax, SymmetricKeyAlgorithm::Aes256) => {
                aead_encrypt!(Aes256Eax, key, nonce, aad, buffer)
            }
            (AeadAlgorithm::Ocb, SymmetricKeyAlgorithm::Aes128) => {
                aead_encrypt!(Aes128Ocb, key, nonce, aad, buffer)
            }
            (AeadAlgorithm::Ocb, SymmetricKeyAlgorithm::Aes192) => {
                aead_encrypt!(Aes192Ocb, key, nonce, aad, buffer)
            }
            (AeadAlgorithm::Ocb, SymmetricKeyAlgorithm::Aes256) => {
                aead_encrypt!(Aes256Ocb, key, nonce, aad, buffer)
            }
            (AeadAlgorithm::Gcm, SymmetricKeyAlgorithm::Aes128) => {
                aead_encrypt!(Aes128Gcm, key, nonce, aad, buffer)
            }
            (AeadAlgorithm::Gcm, SymmetricKeyAlgorithm::Aes192) => {
                aead_encrypt!(Aes192Gcm, key, nonce, aad, buffer)
            }
            (AeadAlgorithm::Gcm, SymmetricKeyAlgorithm::Aes256) => {
                aead_encrypt!(Aes256Gcm, key, nonce, aad, buffer)
            }
            _ => unsupported_err!("AEAD {:?} with {:?}", self, sym_alg),
        }
    }

    /// Decrypt `buffer` in place, verifying the detached authentication tag.
    pub fn decrypt_in_place(
        self,
        sym_alg: SymmetricKeyAlgorithm,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        tag: &[u8],
        buffer: &mut [u8],
    ) -> Result<()> {
        ensure_eq!(nonce.len(), self.iv_size(), "invalid nonce size");
        ensure_eq!(tag.len(), self.tag_size(), "invalid tag size");

        match (self, sym_alg) {
            (AeadAlgorithm::Eax, SymmetricKeyAlgorithm::Aes128) => {
                aead_decrypt!(Aes128Eax, key, nonce, aad, tag, buffer)
            }
            (AeadAlgorithm::Eax, SymmetricKeyAlgorithm::Aes192) => {
                aead_decrypt!(Aes192Eax, key, nonce, aad, tag, buffer)
            }
            (AeadAlgorithm::Eax, SymmetricKeyAlgorithm::Aes256) => {
                aead_decrypt!(Aes256Eax, key, nonce, aad, tag, buffer)
            }
            (AeadAlgorithm::Ocb, SymmetricKeyAlgorithm::Aes128) => {
                aead_decrypt!(Aes128Ocb, key, nonce, aad, tag, buffer)
            }
            (AeadAlgorithm::Ocb, SymmetricKeyAlgorithm::Aes192) => {
                aead_decrypt!(Aes192Ocb, key, nonce, aad, tag, buffer)
            }
            (AeadAlgorithm::Ocb, SymmetricKeyAlgorithm::Aes256) => {
                aead_decrypt!(Aes256Ocb, key, nonce, aad, tag, buffer)
            }
            (AeadAlgorithm::Gcm, SymmetricKeyAlgorithm::Aes128) => {
                aead_decrypt!(Aes128Gcm, key, nonce, aad, tag, buffer)
            }
            (AeadAlgorithm::Gcm, SymmetricKeyAlgorithm::Aes192) => {
                aead_decrypt!(Aes192Gcm, key, nonce, aad, tag, buffer)
            }
            (AeadAlgorithm::Gcm, SymmetricKeyAlgorithm::Aes256) => {
                aead_decrypt!(Aes256Gcm, key, nonce, aad, tag, buffer)
            }
            _ => unsupported_err!("AEAD {:?} with {:?}", self, sym_alg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_modes() {
        for aead in [AeadAlgorithm::Eax, AeadAlgorithm::Ocb, AeadAlgorithm::Gcm] {
            for sym in [
                SymmetricKeyAlgorithm::Aes128,
                SymmetricKeyAlgorithm::Aes192,
                SymmetricKeyAlgorithm::Aes256,
            ] {
                let key = vec![7u8; sym.key_size()];
                let nonce = vec![3u8; aead.iv_size()];
                let aad = b"associated";

                let mut buffer = b"hello aead world".to_vec();
                let tag = aead
                    .encrypt_in_place(sym, &key, &nonce, aad, &mut buffer)
                    .unwrap();
                assert_ne!(&buffer[..], b"hello aead world");

                aead.decrypt_in_place(sym, &key, &nonce, aad, &tag, &mut buffer)
                    .unwrap();
                assert_eq!(&buffer[..], b"hello aead world");

                // tampering must fail
                let mut tampered = buffer.clone();
                let tag2 = aead
                    .encrypt_in_place(sym, &key, &nonce, aad, &mut tampered)
                    .unwrap();
                tampered[0] ^= 1;
                assert!(aead
                    .decrypt_in_place(sym, &key, &nonce, aad, &tag2, &mut tampered)
                    .is_err());
            }
        }
    }
}
