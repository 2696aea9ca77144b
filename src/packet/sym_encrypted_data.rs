use std::io::{self, BufRead};

use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::parsing::BufReadParsing;
use crate::ser::Serialize;
use crate::types::Tag;

/// Symmetrically Encrypted Data Packet (legacy, tag 9).
/// <https://www.rfc-editor.org/rfc/rfc4880#section-5.7>
///
/// Carries no integrity protection; only decryption is supported, for
/// interoperability with old data.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct SymEncryptedData {
    #[debug("{}", hex::encode(data))]
    data: Vec<u8>,
}

impl SymEncryptedData {
    pub fn from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        Ok(SymEncryptedData { data: i.rest()? })
    }

    /// Decrypts using OpenPGP CFB mode with resynchronization.
    pub fn decrypt(&self, key: &[u8], sym_alg: SymmetricKeyAlgorithm) -> Result<Vec<u8>> {
        let mut data = self.data.clone();
        let plaintext = sym_alg.decrypt_resync(key, &mut data)?;
        Ok(plaintext.to_vec())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn tag(&self) -> Tag {
        Tag::SymEncryptedData
    }
}

impl Serialize for SymEncryptedData {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.data.len()
    }
}
