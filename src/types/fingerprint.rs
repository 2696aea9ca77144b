use crate::errors::Result;
use crate::types::KeyVersion;

/// An OpenPGP key fingerprint: 20 octets (SHA-1) for v4 keys,
/// 32 octets (SHA-256) for v6 keys.
#[derive(Clone, PartialEq, Eq, Hash, derive_more::Debug)]
pub enum Fingerprint {
    #[debug("V4({})", hex::encode(_0))]
    V4([u8; 20]),
    #[debug("V6({})", hex::encode(_0))]
    V6([u8; 32]),
    #[debug("Unknown({:?}, {})", _0, hex::encode(_1))]
    Unknown(KeyVersion, Vec<u8>),
}

impl Fingerprint {
    pub fn new(version: KeyVersion, bytes: &[u8]) -> Result<Self> {
        match version {
            KeyVersion::V4 => Ok(Fingerprint::V4(
                bytes
                    .try_into()
                    .map_err(|_| format_err!("invalid v4 fingerprint length {}", bytes.len()))?,
            )),
            KeyVersion::V6 => Ok(Fingerprint::V6(
                bytes
                    .try_into()
                    .map_err(|_| format_err!("invalid v6 fingerprint length {}", bytes.len()))?,
            )),
            _ => Ok(Fingerprint::Unknown(version, bytes.to_vec())),
        }
    }

    pub fn version(&self) -> Option<KeyVersion> {
        match self {
            Fingerprint::V4(_) => Some(KeyVersion::V4),
            Fingerprint::V6(_) => Some(KeyVersion::V6),
            Fingerprint::Unknown(version, _) => Some(*version),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Fingerprint::V4(bytes) => bytes,
            Fingerprint::V6(bytes) => bytes,
            Fingerprint::Unknown(_, bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_lengths() {
        assert!(Fingerprint::new(KeyVersion::V4, &[0; 20]).is_ok());
        assert!(Fingerprint::new(KeyVersion::V4, &[0; 19]).is_err());
        assert!(Fingerprint::new(KeyVersion::V6, &[0; 32]).is_ok());
        assert!(Fingerprint::new(KeyVersion::V6, &[0; 20]).is_err());
    }
}
