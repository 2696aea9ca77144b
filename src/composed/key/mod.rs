mod builder;
mod parse;
mod public;
mod secret;
mod shared;

pub use self::builder::{
    KeyType, SecretKeyParams, SecretKeyParamsBuilder, SubkeyParams, SubkeyParamsBuilder,
};
pub use self::public::{PublicKeyRef, SignedPublicKey};
pub use self::secret::{SecretKey, SecretKeyRef, SecretSubkeyWithFlags, SignedSecretKey};
pub use self::shared::{
    KeyDetails, SignedKeyDetails, SignedPublicSubKey, SignedSecretSubKey, SignedUser,
    SignedUserAttribute,
};
