use std::io;

use crate::errors::Result;
use crate::ser::Serialize;

/// The eight-octet Key ID.
///
/// For v4 keys these are the low 64 bits of the fingerprint, for v6 keys the
/// high 64 bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, derive_more::Debug)]
#[debug("KeyId({})", hex::encode(_0))]
pub struct KeyId([u8; 8]);

impl KeyId {
    pub const WILDCARD: KeyId = KeyId([0u8; 8]);

    pub fn from_slice(input: &[u8]) -> Result<KeyId> {
        ensure_eq!(input.len(), 8, "invalid key id length");

        let mut arr = [0u8; 8];
        arr.copy_from_slice(input);
        Ok(KeyId(arr))
    }

    /// The wildcard id requests trial decryption with every available key.
    pub fn is_wildcard(&self) -> bool {
        self.0 == [0u8; 8]
    }
}

impl AsRef<[u8]> for KeyId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 8]> for KeyId {
    fn from(value: [u8; 8]) -> Self {
        KeyId(value)
    }
}

impl Serialize for KeyId {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.0)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        8
    }
}
