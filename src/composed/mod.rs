pub mod cleartext;
pub mod key;
pub mod message;
pub mod signature;

pub use self::cleartext::CleartextSignedMessage;
pub use self::key::*;
pub use self::message::{Edata, Esk, Message};
pub use self::signature::StandaloneSignature;
