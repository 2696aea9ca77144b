use aes::{Aes128, Aes192, Aes256};
use blowfish::Blowfish;
use camellia::{Camellia128, Camellia192, Camellia256};
use cast5::Cast5;
use cfb_mode::{BufDecryptor, BufEncryptor};
use cipher::KeyIvInit;
use des::TdesEde3;
use num_enum::{FromPrimitive, IntoPrimitive};
use rand::{CryptoRng, Rng};
use twofish::Twofish;
use zeroize::Zeroizing;

use crate::errors::Result;

macro_rules! cfb_encrypt {
    ($cipher:ident, $key:expr, $iv:expr, $data:expr) => {{
        let mut mode = BufEncryptor::<$cipher>::new_from_slices($key, $iv)?;
        mode.encrypt($data);
    }};
}

macro_rules! cfb_decrypt {
    ($cipher:ident, $key:expr, $iv:expr, $data:expr) => {{
        let mut mode = BufDecryptor::<$cipher>::new_from_slices($key, $iv)?;
        mode.decrypt($data);
    }};
}

/// OpenPGP CFB decryption with resynchronization, as used by the legacy
/// Symmetrically Encrypted Data packet.
macro_rules! cfb_decrypt_resync {
    ($cipher:ident, $key:expr, $bs:expr, $ciphertext:expr) => {{
        let iv = vec![0u8; $bs];
        let encrypted_prefix = $ciphertext[..$bs + 2].to_vec();
        let resync_iv = $ciphertext[2..$bs + 2].to_vec();

        let mut prefix = encrypted_prefix;
        let mut mode = BufDecryptor::<$cipher>::new_from_slices($key, &iv)?;
        mode.decrypt(&mut prefix);

        ensure!(
            prefix[$bs - 2] == prefix[$bs] && prefix[$bs - 1] == prefix[$bs + 1],
            "quick check on random prefix failed"
        );

        let data = &mut $ciphertext[$bs + 2..];
        let mut mode = BufDecryptor::<$cipher>::new_from_slices($key, &resync_iv)?;
        mode.decrypt(data);
    }};
}

/// Available symmetric key algorithms.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-symmetric-key-algorithms>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive, Hash)]
#[repr(u8)]
pub enum SymmetricKeyAlgorithm {
    /// Plaintext or unencrypted data
    Plaintext = 0,
    Idea = 1,
    /// TripleDES (DES-EDE, 168 bit key derived from 192)
    TripleDes = 2,
    /// CAST5 (128 bit key, as per RFC 2144)
    Cast5 = 3,
    /// Blowfish (128 bit key, 16 rounds)
    Blowfish = 4,
    Aes128 = 7,
    Aes192 = 8,
    Aes256 = 9,
    /// Twofish with 256-bit key
    Twofish = 10,
    Camellia128 = 11,
    Camellia192 = 12,
    Camellia256 = 13,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Default for SymmetricKeyAlgorithm {
    fn default() -> Self {
        Self::Aes128
    }
}

impl zeroize::DefaultIsZeroes for SymmetricKeyAlgorithm {}

impl SymmetricKeyAlgorithm {
    /// The size of a single block in bytes.
    pub fn block_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::Plaintext => 0,
            SymmetricKeyAlgorithm::Idea
            | SymmetricKeyAlgorithm::TripleDes
            | SymmetricKeyAlgorithm::Cast5
            | SymmetricKeyAlgorithm::Blowfish => 8,
            SymmetricKeyAlgorithm::Aes128
            | SymmetricKeyAlgorithm::Aes192
            | SymmetricKeyAlgorithm::Aes256
            | SymmetricKeyAlgorithm::Twofish
            | SymmetricKeyAlgorithm::Camellia128
            | SymmetricKeyAlgorithm::Camellia192
            | SymmetricKeyAlgorithm::Camellia256 => 16,
            SymmetricKeyAlgorithm::Other(_) => 0,
        }
    }

    /// The size of the key in bytes.
    pub fn key_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::Plaintext => 0,
            SymmetricKeyAlgorithm::Idea
            | SymmetricKeyAlgorithm::Cast5
            | SymmetricKeyAlgorithm::Blowfish
            | SymmetricKeyAlgorithm::Aes128
            | SymmetricKeyAlgorithm::Camellia128 => 16,
            SymmetricKeyAlgorithm::TripleDes
            | SymmetricKeyAlgorithm::Aes192
            | SymmetricKeyAlgorithm::Camellia192 => 24,
            SymmetricKeyAlgorithm::Aes256
            | SymmetricKeyAlgorithm::Twofish
            | SymmetricKeyAlgorithm::Camellia256 => 32,
            SymmetricKeyAlgorithm::Other(_) => 0,
        }
    }

    /// Generate a new session key for this algorithm.
    pub fn new_session_key<R: CryptoRng + Rng>(self, rng: &mut R) -> Zeroizing<Vec<u8>> {
        let mut key = Zeroizing::new(vec![0u8; self.key_size()]);
        rng.fill_bytes(&mut key);
        key
    }

    /// Encrypt the data using regular CFB mode, without padding. Overwrites the input.
    pub fn encrypt_with_iv_regular(self, key: &[u8], iv: &[u8], plaintext: &mut [u8]) -> Result<()> {
        match self {
            SymmetricKeyAlgorithm::TripleDes => cfb_encrypt!(TdesEde3, key, iv, plaintext),
            SymmetricKeyAlgorithm::Cast5 => cfb_encrypt!(Cast5, key, iv, plaintext),
            SymmetricKeyAlgorithm::Blowfish => cfb_encrypt!(Blowfish, key, iv, plaintext),
            SymmetricKeyAlgorithm::Aes128 => cfb_encrypt!(Aes128, key, iv, plaintext),
            SymmetricKeyAlgorithm::Aes192 => cfb_encrypt!(Aes192, key, iv, plaintext),
            SymmetricKeyAlgorithm::Aes256 => cfb_encrypt!(Aes256, key, iv, plaintext),
            SymmetricKeyAlgorithm::Twofish => cfb_encrypt!(Twofish, key, iv, plaintext),
            SymmetricKeyAlgorithm::Camellia128 => cfb_encrypt!(Camellia128, key, iv, plaintext),
            SymmetricKeyAlgorithm::Camellia192 => cfb_encrypt!(Camellia192, key, iv, plaintext),
            SymmetricKeyAlgorithm::Camellia256 => cfb_encrypt!(Camellia256, key, iv, plaintext),
            _ => unsupported_err!("CFB encryption for {:?}", self),
        }
        Ok(())
    }

    /// Decrypt the data using regular CFB mode, without padding. Overwrites the input.
    pub fn decrypt_with_iv_regular(
        self,
        key: &[u8],
        iv: &[u8],
        ciphertext: &mut [u8],
    ) -> Result<()> {
        match self {
            SymmetricKeyAlgorithm::TripleDes => cfb_decrypt!(TdesEde3, key, iv, ciphertext),
            SymmetricKeyAlgorithm::Cast5 => cfb_decrypt!(Cast5, key, iv, ciphertext),
            SymmetricKeyAlgorithm::Blowfish => cfb_decrypt!(Blowfish, key, iv, ciphertext),
            SymmetricKeyAlgorithm::Aes128 => cfb_decrypt!(Aes128, key, iv, ciphertext),
            SymmetricKeyAlgorithm::Aes192 => cfb_decrypt!(Aes192, key, iv, ciphertext),
            SymmetricKeyAlgorithm::Aes256 => cfb_decrypt!(Aes256, key, iv, ciphertext),
            SymmetricKeyAlgorithm::Twofish => cfb_decrypt!(Twofish, key, iv, ciphertext),
            SymmetricKeyAlgorithm::Camellia128 => cfb_decrypt!(Camellia128, key, iv, ciphertext),
            SymmetricKeyAlgorithm::Camellia192 => cfb_decrypt!(Camellia192, key, iv, ciphertext),
            SymmetricKeyAlgorithm::Camellia256 => cfb_decrypt!(Camellia256, key, iv, ciphertext),
            _ => unsupported_err!("CFB decryption for {:?}", self),
        }
        Ok(())
    }

    /// Encrypt with an IV of all zeroes, as used inside SEIPD v1 and SKESK.
    pub fn encrypt_regular(self, key: &[u8], plaintext: &mut [u8]) -> Result<()> {
        let iv = vec![0u8; self.block_size()];
        self.encrypt_with_iv_regular(key, &iv, plaintext)
    }

    /// Decrypt with an IV of all zeroes.
    pub fn decrypt_regular(self, key: &[u8], ciphertext: &mut [u8]) -> Result<()> {
        let iv = vec![0u8; self.block_size()];
        self.decrypt_with_iv_regular(key, &iv, ciphertext)
    }

    /// OpenPGP CFB decryption with resynchronization.
    ///
    /// The input must start with the `block_size + 2` octet random prefix.
    /// Returns the offset of the plaintext within `ciphertext` after
    /// decryption in place.
    ///
    /// Ref: <https://www.rfc-editor.org/rfc/rfc4880#section-13.9>
    pub fn decrypt_resync<'a>(self, key: &[u8], ciphertext: &'a mut [u8]) -> Result<&'a [u8]> {
        let bs = self.block_size();
        ensure!(bs > 0, "{:?} is not a block cipher", self);
        ensure!(ciphertext.len() > bs + 2, "invalid ciphertext length");

        match self {
            SymmetricKeyAlgorithm::TripleDes => cfb_decrypt_resync!(TdesEde3, key, bs, ciphertext),
            SymmetricKeyAlgorithm::Cast5 => cfb_decrypt_resync!(Cast5, key, bs, ciphertext),
            SymmetricKeyAlgorithm::Blowfish => cfb_decrypt_resync!(Blowfish, key, bs, ciphertext),
            SymmetricKeyAlgorithm::Aes128 => cfb_decrypt_resync!(Aes128, key, bs, ciphertext),
            SymmetricKeyAlgorithm::Aes192 => cfb_decrypt_resync!(Aes192, key, bs, ciphertext),
            SymmetricKeyAlgorithm::Aes256 => cfb_decrypt_resync!(Aes256, key, bs, ciphertext),
            SymmetricKeyAlgorithm::Twofish => cfb_decrypt_resync!(Twofish, key, bs, ciphertext),
            SymmetricKeyAlgorithm::Camellia128 => {
                cfb_decrypt_resync!(Camellia128, key, bs, ciphertext)
            }
            SymmetricKeyAlgorithm::Camellia192 => {
                cfb_decrypt_resync!(Camellia192, key, bs, ciphertext)
            }
            SymmetricKeyAlgorithm::Camellia256 => {
                cfb_decrypt_resync!(Camellia256, key, bs, ciphertext)
            }
            _ => unsupported_err!("CFB decryption for {:?}", self),
        }

        Ok(&ciphertext[bs + 2..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! roundtrip {
        ($name:ident, $alg:path) => {
            #[test]
            fn $name() {
                let data = vec![2u8; 256];
                let key = vec![1u8; $alg.key_size()];
                let iv = vec![3u8; $alg.block_size()];

                let mut ciphertext = data.clone();
                $alg.encrypt_with_iv_regular(&key, &iv, &mut ciphertext)
                    .unwrap();
                assert_ne!(data, ciphertext);

                let mut plaintext = ciphertext.clone();
                $alg.decrypt_with_iv_regular(&key, &iv, &mut plaintext)
                    .unwrap();
                assert_eq!(data, plaintext);
            }
        };
    }

    roundtrip!(roundtrip_aes128, SymmetricKeyAlgorithm::Aes128);
    roundtrip!(roundtrip_aes192, SymmetricKeyAlgorithm::Aes192);
    roundtrip!(roundtrip_aes256, SymmetricKeyAlgorithm::Aes256);
    roundtrip!(roundtrip_tripledes, SymmetricKeyAlgorithm::TripleDes);
    roundtrip!(roundtrip_blowfish, SymmetricKeyAlgorithm::Blowfish);
    roundtrip!(roundtrip_twofish, SymmetricKeyAlgorithm::Twofish);
    roundtrip!(roundtrip_cast5, SymmetricKeyAlgorithm::Cast5);
    roundtrip!(roundtrip_camellia128, SymmetricKeyAlgorithm::Camellia128);
    roundtrip!(roundtrip_camellia256, SymmetricKeyAlgorithm::Camellia256);

    #[test]
    fn plaintext_is_rejected() {
        let mut buf = vec![0u8; 16];
        assert!(SymmetricKeyAlgorithm::Plaintext
            .encrypt_regular(&[], &mut buf)
            .is_err());
    }
}
