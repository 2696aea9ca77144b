use std::io::{self, BufRead};

use byteorder::{BigEndian, ByteOrder};
use hkdf::Hkdf;
use rand::{CryptoRng, Rng};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::crypto::aead::AeadAlgorithm;
use crate::crypto::checksum;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::parsing::BufReadParsing;
use crate::ser::Serialize;
use crate::types::Tag;

/// The MDC trailer header: packet tag 19, length 20.
const MDC_HEADER: [u8; 2] = [0xD3, 0x14];

/// Symmetrically Encrypted Integrity Protected Data Packet
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-symmetrically-encrypted-int>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub enum SymEncryptedProtectedData {
    /// CFB encryption with a SHA-1 modification detection code trailer.
    V1 {
        #[debug("{}", hex::encode(data))]
        data: Vec<u8>,
    },
    /// Chunked AEAD encryption.
    V2 {
        sym_alg: SymmetricKeyAlgorithm,
        aead: AeadAlgorithm,
        chunk_size: u8,
        #[debug("{}", hex::encode(salt))]
        salt: [u8; 32],
        #[debug("{}", hex::encode(data))]
        data: Vec<u8>,
    },
}

/// Expands the coded chunk size exponent.
fn expand_chunk_size(coded: u8) -> Result<usize> {
    ensure!(coded <= 16, "invalid SEIPD v2 chunk size {}", coded);
    Ok(1usize << (coded + 6))
}

impl SymEncryptedProtectedData {
    /// Parses a `SymEncryptedProtectedData` packet body.
    pub fn from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        match version {
            1 => Ok(SymEncryptedProtectedData::V1 { data: i.rest()? }),
            2 => {
                let sym_alg = SymmetricKeyAlgorithm::from(i.read_u8()?);
                let aead = AeadAlgorithm::from(i.read_u8()?);
                let chunk_size = i.read_u8()?;
                let salt = i.read_array::<32>()?;
                let data = i.rest()?;

                Ok(SymEncryptedProtectedData::V2 {
                    sym_alg,
                    aead,
                    chunk_size,
                    salt,
                    data,
                })
            }
            _ => unsupported_err!("SEIPD version {}", version),
        }
    }

    pub fn version(&self) -> u8 {
        match self {
            Self::V1 { .. } => 1,
            Self::V2 { .. } => 2,
        }
    }

    pub fn tag(&self) -> Tag {
        Tag::SymEncryptedProtectedData
    }

    /// Encrypts the payload, v1 style: random prefix with quick-check
    /// repetition, MDC trailer, CFB with a zero IV.
    pub fn encrypt_v1<R: CryptoRng + Rng>(
        rng: &mut R,
        sym_alg: SymmetricKeyAlgorithm,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Self> {
        ensure!(
            sym_alg != SymmetricKeyAlgorithm::Plaintext,
            "invalid symmetric algorithm"
        );
        let bs = sym_alg.block_size();

        let mut prefix = vec![0u8; bs + 2];
        rng.fill_bytes(&mut prefix[..bs]);
        prefix[bs] = prefix[bs - 2];
        prefix[bs + 1] = prefix[bs - 1];

        let mut data = Vec::with_capacity(prefix.len() + plaintext.len() + 22);
        data.extend_from_slice(&prefix);
        data.extend_from_slice(plaintext);
        data.extend_from_slice(&MDC_HEADER);
        let mdc = checksum::calculate_sha1([&data[..]])?;
        data.extend_from_slice(&mdc);

        sym_alg.encrypt_regular(key, &mut data)?;

        Ok(SymEncryptedProtectedData::V1 { data })
    }

    /// Encrypts the payload, v2 style: chunked AEAD with a trailing
    /// length-binding tag.
    pub fn encrypt_v2<R: CryptoRng + Rng>(
        rng: &mut R,
        sym_alg: SymmetricKeyAlgorithm,
        aead: AeadAlgorithm,
        chunk_size: u8,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Self> {
        let chunk_len = expand_chunk_size(chunk_size)?;

        let mut salt = [0u8; 32];
        rng.fill_bytes(&mut salt);

        let (message_key, nonce_prefix, info) =
            Self::aead_setup(sym_alg, aead, chunk_size, &salt, key)?;

        let mut data = Vec::with_capacity(
            plaintext.len() + (plaintext.len() / chunk_len + 2) * aead.tag_size(),
        );

        let mut chunk_index = 0u64;
        for chunk in plaintext.chunks(chunk_len) {
            let nonce = Self::chunk_nonce(&nonce_prefix, chunk_index);

            let mut buffer = chunk.to_vec();
            let tag = aead.encrypt_in_place(sym_alg, &message_key, &nonce, &info, &mut buffer)?;

            data.extend_from_slice(&buffer);
            data.extend_from_slice(&tag);
            chunk_index += 1;
        }

        // final tag over the empty string binds the total plaintext length
        let nonce = Self::chunk_nonce(&nonce_prefix, chunk_index);
        let mut final_info = info.to_vec();
        final_info.extend_from_slice(&(plaintext.len() as u64).to_be_bytes());

        let mut empty = Vec::new();
        let tag =
            aead.encrypt_in_place(sym_alg, &message_key, &nonce, &final_info, &mut empty)?;
        data.extend_from_slice(&tag);

        Ok(SymEncryptedProtectedData::V2 {
            sym_alg,
            aead,
            chunk_size,
            salt,
            data,
        })
    }

    /// Decrypts the payload. For v1, `sym_alg` selects the cipher; v2
    /// carries its own algorithms.
    pub fn decrypt(&self, key: &[u8], sym_alg: SymmetricKeyAlgorithm) -> Result<Vec<u8>> {
        match self {
            Self::V1 { data } => {
                let bs = sym_alg.block_size();
                ensure!(data.len() > bs + 2 + 22, "SEIPD v1 payload too short");

                let mut decrypted = data.clone();
                sym_alg.decrypt_regular(key, &mut decrypted)?;

                // quick check on the prefix repetition
                if decrypted[bs - 2] != decrypted[bs] || decrypted[bs - 1] != decrypted[bs + 1] {
                    return Err(Error::MdcError { backtrace: None });
                }

                let mdc_start = decrypted.len() - 22;
                let (body, mdc) = decrypted.split_at(mdc_start);
                if mdc[..2] != MDC_HEADER {
                    return Err(Error::MdcError { backtrace: None });
                }

                let expected = checksum::calculate_sha1([body, &MDC_HEADER[..]])?;
                if expected[..] != mdc[2..] {
                    return Err(Error::MdcError { backtrace: None });
                }

                Ok(body[bs + 2..].to_vec())
            }
            Self::V2 {
                sym_alg,
                aead,
                chunk_size,
                salt,
                data,
            } => {
                let chunk_len = expand_chunk_size(*chunk_size)?;
                let tag_size = aead.tag_size();
                ensure!(data.len() >= tag_size, "SEIPD v2 payload too short");

                let (message_key, nonce_prefix, info) =
                    Self::aead_setup(*sym_alg, *aead, *chunk_size, salt, key)?;

                let (chunks, final_tag) = data.split_at(data.len() - tag_size);

                let mut plaintext = Vec::with_capacity(chunks.len());
                let mut chunk_index = 0u64;
                let mut rest = chunks;

                // decryption is sequential; truncation is reported before any
                // chunk past the damage is released
                while !rest.is_empty() {
                    ensure!(rest.len() >= tag_size, "truncated SEIPD v2 chunk");
                    let take = (chunk_len + tag_size).min(rest.len());
                    let (chunk, remaining) = rest.split_at(take);
                    rest = remaining;

                    let (ct, tag) = chunk.split_at(chunk.len() - tag_size);
                    let nonce = Self::chunk_nonce(&nonce_prefix, chunk_index);

                    let mut buffer = ct.to_vec();
                    aead.decrypt_in_place(
                        *sym_alg,
                        &message_key,
                        &nonce,
                        &info,
                        tag,
                        &mut buffer,
                    )?;

                    plaintext.extend_from_slice(&buffer);
                    chunk_index += 1;
                }

                // verify the length-binding final tag
                let nonce = Self::chunk_nonce(&nonce_prefix, chunk_index);
                let mut final_info = info.to_vec();
                final_info.extend_from_slice(&(plaintext.len() as u64).to_be_bytes());

                let mut empty = Vec::new();
                aead.decrypt_in_place(
                    *sym_alg,
                    &message_key,
                    &nonce,
                    &final_info,
                    final_tag,
                    &mut empty,
                )?;

                Ok(plaintext)
            }
        }
    }

    /// Derives the message key and nonce prefix for v2 payloads.
    fn aead_setup(
        sym_alg: SymmetricKeyAlgorithm,
        aead: AeadAlgorithm,
        chunk_size: u8,
        salt: &[u8],
        ikm: &[u8],
    ) -> Result<(Zeroizing<Vec<u8>>, Vec<u8>, [u8; 5])> {
        let info = [
            Tag::SymEncryptedProtectedData.encode(),
            0x02,
            sym_alg.into(),
            aead.into(),
            chunk_size,
        ];

        let key_size = sym_alg.key_size();
        let nonce_prefix_len = aead.iv_size() - 8;

        let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
        let mut okm = Zeroizing::new(vec![0u8; key_size + nonce_prefix_len]);
        hk.expand(&info, &mut okm)
            .map_err(|_| format_err!("hkdf expand failed"))?;

        let message_key = Zeroizing::new(okm[..key_size].to_vec());
        let nonce_prefix = okm[key_size..].to_vec();

        Ok((message_key, nonce_prefix, info))
    }

    fn chunk_nonce(prefix: &[u8], index: u64) -> Vec<u8> {
        let mut nonce = vec![0u8; prefix.len() + 8];
        nonce[..prefix.len()].copy_from_slice(prefix);
        BigEndian::write_u64(&mut nonce[prefix.len()..], index);
        nonce
    }
}

impl Serialize for SymEncryptedProtectedData {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        match self {
            Self::V1 { data } => {
                w.write_all(&[0x01])?;
                w.write_all(data)?;
            }
            Self::V2 {
                sym_alg,
                aead,
                chunk_size,
                salt,
                data,
            } => {
                w.write_all(&[0x02, u8::from(*sym_alg), u8::from(*aead), *chunk_size])?;
                w.write_all(salt)?;
                w.write_all(data)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn v1_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(61);
        let key = vec![9u8; 16];
        let plaintext = b"hello openpgp".to_vec();

        let seipd = SymEncryptedProtectedData::encrypt_v1(
            &mut rng,
            SymmetricKeyAlgorithm::Aes128,
            &key,
            &plaintext,
        )
        .unwrap();

        let buf = seipd.to_bytes().unwrap();
        let back = SymEncryptedProtectedData::from_reader(&mut &buf[..]).unwrap();
        assert_eq!(seipd, back);

        let recovered = back.decrypt(&key, SymmetricKeyAlgorithm::Aes128).unwrap();
        assert_eq!(recovered, plaintext);

        // tampering is detected by the MDC
        let SymEncryptedProtectedData::V1 { mut data } = back else {
            unreachable!()
        };
        let last = data.len() - 1;
        data[last] ^= 1;
        let tampered = SymEncryptedProtectedData::V1 { data };
        assert!(tampered
            .decrypt(&key, SymmetricKeyAlgorithm::Aes128)
            .is_err());
    }

    #[test]
    fn v1_wrong_key() {
        let mut rng = ChaCha8Rng::seed_from_u64(62);
        let key = vec![9u8; 16];
        let seipd = SymEncryptedProtectedData::encrypt_v1(
            &mut rng,
            SymmetricKeyAlgorithm::Aes128,
            &key,
            b"payload",
        )
        .unwrap();

        let wrong = vec![8u8; 16];
        assert!(seipd
            .decrypt(&wrong, SymmetricKeyAlgorithm::Aes128)
            .is_err());
    }

    #[test]
    fn v2_roundtrip_multi_chunk() {
        let mut rng = ChaCha8Rng::seed_from_u64(63);
        let key = vec![7u8; 32];
        // chunk size 64 (coded 0), payload spans multiple chunks
        let plaintext = vec![0xAAu8; 200];

        let seipd = SymEncryptedProtectedData::encrypt_v2(
            &mut rng,
            SymmetricKeyAlgorithm::Aes256,
            AeadAlgorithm::Ocb,
            0,
            &key,
            &plaintext,
        )
        .unwrap();

        let buf = seipd.to_bytes().unwrap();
        let back = SymEncryptedProtectedData::from_reader(&mut &buf[..]).unwrap();
        assert_eq!(seipd, back);

        let recovered = back.decrypt(&key, SymmetricKeyAlgorithm::Aes256).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn v2_truncation_detected() {
        let mut rng = ChaCha8Rng::seed_from_u64(64);
        let key = vec![7u8; 32];
        let plaintext = vec![0xBBu8; 200];

        let seipd = SymEncryptedProtectedData::encrypt_v2(
            &mut rng,
            SymmetricKeyAlgorithm::Aes256,
            AeadAlgorithm::Gcm,
            0,
            &key,
            &plaintext,
        )
        .unwrap();

        // drop one full chunk from the middle
        let SymEncryptedProtectedData::V2 {
            sym_alg,
            aead,
            chunk_size,
            salt,
            mut data,
        } = seipd
        else {
            unreachable!()
        };
        data.drain(0..80);
        let truncated = SymEncryptedProtectedData::V2 {
            sym_alg,
            aead,
            chunk_size,
            salt,
            data,
        };

        assert!(truncated
            .decrypt(&key, SymmetricKeyAlgorithm::Aes256)
            .is_err());
    }
}
