//! # pgp-core
//!
//! An implementation of the OpenPGP message format (RFC 4880 / RFC 9580):
//! packet framing, ASCII armor, signatures, transferable keys, secret-key
//! protection, and message encryption and decryption.
//!
//! Usage examples are available under the respective modules:
//! key generation in [`composed::key`], message handling in
//! [`composed::message`], packet level access in [`packet`].

#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::style,
    clippy::perf,
    clippy::complexity,
    clippy::correctness,
    clippy::unwrap_used,
    rust_2018_idioms
)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::use_self,
    clippy::needless_borrows_for_generic_args,
    clippy::type_complexity
)]

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

#[macro_use]
pub mod errors;
pub mod armor;
pub mod composed;
pub mod crypto;
pub mod line_writer;
pub mod normalize_lines;
pub mod packet;
pub mod parsing;
pub mod ser;
pub mod types;
pub mod util;

// reexports for easier use
#[allow(unused_imports)]
pub use self::composed::key::*;
pub use self::composed::*;
pub use self::packet::Signature;

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default maximum size that gets buffered.
pub const MAX_BUFFER_SIZE: usize = 1024 * 1024 * 1024;
