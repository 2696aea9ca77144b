mod compression;
mod esk;
mod fingerprint;
mod key_id;
mod key_traits;
mod mpi;
mod packet;
mod plain_secret_params;
mod public_params;
mod s2k;
mod secret_params;
mod session_key;
mod signature_bytes;

pub use self::compression::CompressionAlgorithm;
pub use self::esk::PkeskBytes;
pub use self::fingerprint::Fingerprint;
pub use self::key_id::KeyId;
pub use self::key_traits::{PublicKeyTrait, SecretKeyTrait};
pub use self::mpi::Mpi;
pub use self::packet::{KeyVersion, PacketHeaderVersion, PacketLength, Tag};
pub use self::plain_secret_params::PlainSecretParams;
pub use self::public_params::PublicParams;
pub use self::s2k::StringToKey;
pub use self::secret_params::{EncryptedSecretParams, S2kUsage, SecretParams};
pub use self::session_key::SessionKey;
pub use self::signature_bytes::SignatureBytes;
