use std::num::TryFromIntError;

use snafu::{Backtrace, Snafu};

pub type Result<T, E = Error> = ::std::result::Result<T, E>;

/// Error types
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// Structurally broken input: bad framing, bad lengths, reserved fields.
    #[snafu(display("invalid input"))]
    InvalidInput { backtrace: Option<Backtrace> },
    #[snafu(display("incomplete input: missing {size} bytes"))]
    Incomplete {
        size: usize,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("invalid armor wrappers"))]
    InvalidArmorWrappers { backtrace: Option<Backtrace> },
    #[snafu(display("invalid crc24 checksum"))]
    InvalidChecksum { backtrace: Option<Backtrace> },
    #[snafu(transparent)]
    Base64Decode {
        source: base64::DecodeError,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("no matching packet found"))]
    NoMatchingPacket { backtrace: Option<Backtrace> },
    #[snafu(display("more than one matching packet was found"))]
    TooManyPackets { backtrace: Option<Backtrace> },
    #[snafu(display("packet contained more data than was parsable (trailing bytes {size})"))]
    PacketTooLarge { size: u64 },
    /// The two-octet sum checksum over plaintext secret key material did not match.
    #[snafu(display("checksum mismatch"))]
    ChecksumMismatch { backtrace: Option<Backtrace> },
    /// The SHA-1 trailer or AEAD tag over locked secret key material did not
    /// verify for the supplied passphrase.
    #[snafu(display("incorrect passphrase"))]
    IncorrectPassphrase { backtrace: Option<Backtrace> },
    /// No PKESK or SKESK candidate yielded a session key.
    #[snafu(display("session key decryption failed: {reasons:?}"))]
    SessionKeyDecryptionFailed {
        reasons: Vec<String>,
        backtrace: Option<Backtrace>,
    },
    /// A signature did not verify; the message carries the diagnostic reason.
    #[snafu(display("signature invalid: {message}"))]
    SignatureInvalid {
        message: String,
        backtrace: Option<Backtrace>,
    },
    /// A key failed its own self-verification.
    #[snafu(display("key invalid: {message}"))]
    KeyInvalid {
        message: String,
        backtrace: Option<Backtrace>,
    },
    #[snafu(transparent)]
    RsaError {
        source: rsa::errors::Error,
        backtrace: Option<Backtrace>,
    },
    #[snafu(transparent)]
    EllipticCurve {
        source: elliptic_curve::Error,
        backtrace: Option<Backtrace>,
    },
    #[snafu(transparent)]
    SignatureError {
        source: signature::Error,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("IO error: {}", source), context(false))]
    IO {
        source: std::io::Error,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("invalid key length"))]
    InvalidKeyLength { backtrace: Option<Backtrace> },
    #[snafu(display("cfb: invalid key iv length"))]
    CfbInvalidKeyIvLength { backtrace: Option<Backtrace> },
    #[snafu(display("AEAD error"))]
    AeadError { backtrace: Option<Backtrace> },
    #[snafu(display("Modification Detection Code error"))]
    MdcError { backtrace: Option<Backtrace> },
    #[snafu(display("SHA1 hash collision detected"))]
    Sha1HashCollision { backtrace: Option<Backtrace> },
    #[snafu(display("Not yet implemented: {message}"))]
    Unimplemented { message: String },
    /// Signals packet versions and parameters we don't support, but can safely ignore
    #[snafu(display("Unsupported: {message}"))]
    Unsupported {
        message: String,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("{message}"))]
    Message {
        message: String,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("Invalid Packet Content {source:?}"))]
    InvalidPacketContent { source: Box<Error> },
    #[snafu(transparent)]
    Utf8Error {
        source: std::str::Utf8Error,
        backtrace: Option<Backtrace>,
    },
    #[snafu(transparent)]
    TryFromInt {
        source: TryFromIntError,
        backtrace: Option<Backtrace>,
    },
    #[snafu(transparent)]
    AesKek {
        source: aes_kw::Error,
        backtrace: Option<Backtrace>,
    },
    #[snafu(transparent)]
    Argon2 {
        source: argon2::Error,
        backtrace: Option<Backtrace>,
    },
}

impl Error {
    /// Errors that abort only the current candidate during session-key or
    /// decryption-key trials, not the whole operation.
    pub fn is_recoverable_attempt(&self) -> bool {
        !matches!(self, Error::IO { .. })
    }
}

impl From<cipher::InvalidLength> for Error {
    fn from(_: cipher::InvalidLength) -> Error {
        Error::CfbInvalidKeyIvLength { backtrace: None }
    }
}

impl From<aead::Error> for Error {
    fn from(_: aead::Error) -> Error {
        Error::AeadError { backtrace: None }
    }
}

impl From<String> for Error {
    fn from(message: String) -> Error {
        Error::Message {
            message,
            backtrace: Some(snafu::GenerateImplicitData::generate()),
        }
    }
}

impl From<derive_builder::UninitializedFieldError> for Error {
    fn from(err: derive_builder::UninitializedFieldError) -> Error {
        Error::Message {
            message: err.to_string(),
            backtrace: Some(snafu::GenerateImplicitData::generate()),
        }
    }
}

#[macro_export]
macro_rules! unimplemented_err {
    ($e:expr) => {
        return Err($crate::errors::Error::Unimplemented { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Unimplemented { message: format!($fmt, $($arg)+)})
    };
}

#[macro_export]
macro_rules! unsupported_err {
    ($e:expr) => {
        return Err($crate::errors::Error::Unsupported {
            message: $e.to_string(),
            backtrace: ::snafu::GenerateImplicitData::generate(),
        })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Unsupported {
            message: format!($fmt, $($arg)+),
            backtrace: ::snafu::GenerateImplicitData::generate(),
        })
    };
}

#[macro_export]
macro_rules! bail {
    ($e:expr) => {
        return Err($crate::errors::Error::Message {
            message: $e.to_string(),
            backtrace: ::snafu::GenerateImplicitData::generate(),
        })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Message {
            message: format!($fmt, $($arg)+),
            backtrace: ::snafu::GenerateImplicitData::generate(),
        })
    };
}

#[macro_export]
macro_rules! format_err {
    ($e:expr) => {
        $crate::errors::Error::Message {
            message: $e.to_string(),
            backtrace: ::snafu::GenerateImplicitData::generate(),
        }
    };
    ($fmt:expr, $($arg:tt)+) => {
        $crate::errors::Error::Message {
            message: format!($fmt, $($arg)+),
            backtrace: ::snafu::GenerateImplicitData::generate(),
        }
    };
}

#[macro_export(local_inner_macros)]
macro_rules! ensure {
    ($cond:expr, $e:expr) => {
        if !($cond) {
            bail!($e);
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)+) => {
        if !($cond) {
            bail!($fmt, $($arg)+);
        }
    };
}

#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr) => ({
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    bail!(r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`"#, left_val, right_val)
                }
            }
        }
    });
    ($left:expr, $right:expr,) => ({
        ensure_eq!($left, $right)
    });
    ($left:expr, $right:expr, $($arg:tt)+) => ({
        match (&($left), &($right)) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    bail!(r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`: {}"#, left_val, right_val,
                           format_args!($($arg)+))
                }
            }
        }
    });
}
