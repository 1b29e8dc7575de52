//! envseal-crypto: versioned, self-describing encrypted envelopes
//!
//! Envelope text: `TAG || base64(body)` where `TAG` is a 3-digit scheme
//! version.
//!
//! ```text
//! 004  current   AES-256-CBC + HMAC-SHA384 (encrypt-then-MAC)
//!      body = [Salt(32)] || Tag(48) || IV(16) || Ciphertext
//!      keys = KeyProvider "foura"/"fourb"  |  PBKDF2-SHA384 → HKDF-SHA384 (passphrase)
//! 003  legacy    AES-256-CBC + HMAC-SHA256, keys "threea"/"threeb" or SHA-256(passphrase)
//! 002  legacy    AES-256-CBC + HMAC-SHA256, keys "twoa"/"twob"     or SHA-256(passphrase)
//!      body = Tag(32) || IV(16) || Ciphertext
//! 001  legacy    AES-256-CBC, unauthenticated, key "one"
//!      body = IV(16) || Ciphertext
//! ```
//!
//! Only `004` can be produced; older versions are decode-only.

pub mod cipher;
pub mod codec;
pub mod kdf;
pub mod legacy;
pub mod scheme;

pub use codec::{envelope_version, is_well_formed_envelope, Codec};
pub use kdf::{passphrase_keys, standard_keys, DerivedKeyPair, KdfParams};
pub use scheme::Scheme;

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of an AES-CBC initialization vector
pub const IV_SIZE: usize = 16;

/// Size of the passphrase-mode salt
pub const SALT_SIZE: usize = 32;

/// Size of an HMAC-SHA384 tag (current scheme)
pub const TAG_SIZE: usize = 48;

/// Size of an HMAC-SHA256 tag (schemes 002/003)
pub const LEGACY_TAG_SIZE: usize = 32;
