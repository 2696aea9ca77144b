use chrono::{DateTime, Utc};
use rand::{CryptoRng, Rng};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::ser::Serialize;
use crate::types::{Fingerprint, KeyId, KeyVersion, PkeskBytes, PublicParams, SignatureBytes};

/// Shared surface of public key packets (primary keys and subkeys).
pub trait PublicKeyTrait: Serialize {
    fn version(&self) -> KeyVersion;

    fn fingerprint(&self) -> Fingerprint;

    fn key_id(&self) -> KeyId;

    fn algorithm(&self) -> PublicKeyAlgorithm;

    fn created_at(&self) -> &DateTime<Utc>;

    fn public_params(&self) -> &PublicParams;

    /// Serializes the key in the form used for fingerprints and signature
    /// hashing (`0x99` / `0x9B` prefix plus length-framed body).
    fn serialize_for_hashing<W: std::io::Write>(&self, writer: &mut W) -> Result<()>;

    /// Verify a signed message.
    /// Data will be hashed using `hash`, before verifying.
    fn verify_signature(
        &self,
        hash: HashAlgorithm,
        data: &[u8],
        sig: &SignatureBytes,
    ) -> Result<()>;

    /// Encrypt the given `plain` to this key.
    fn encrypt_session_key<R: CryptoRng + Rng>(
        &self,
        rng: &mut R,
        plain: &[u8],
    ) -> Result<PkeskBytes>;

    fn is_signing_key(&self) -> bool {
        self.algorithm().is_signing()
    }

    fn is_encryption_key(&self) -> bool {
        self.algorithm().is_encryption()
    }
}

/// Shared surface of secret key packets.
pub trait SecretKeyTrait: PublicKeyTrait {
    /// Create a signature over the prehashed data.
    ///
    /// The passphrase callback is only invoked when the secret material is
    /// locked.
    fn create_signature<F>(
        &self,
        key_pw: F,
        hash: HashAlgorithm,
        prehashed_data: &[u8],
    ) -> Result<SignatureBytes>
    where
        F: FnOnce() -> String;
}
