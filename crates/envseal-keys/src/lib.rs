//! envseal-keys: long-lived key provisioning
//!
//! Keys are 256-bit random values identified by a label (`"foura"`,
//! `"fourb"`, ...). They are created lazily on first request and never
//! rotated or deleted here.
//!
//! ```text
//! KeyProvider::get_or_create(label, source)
//!   ├── KeySource::File  → FileBackend  (one file per label under an injected root)
//!   └── KeySource::Store → StoreBackend (one row per label in a KeyStore table)
//! ```
//!
//! Both backends create keys with an exclusive-create primitive, so
//! concurrent first callers converge on a single key and readers never see a
//! partially written one.

pub mod backend;
pub mod file;
pub mod material;
pub mod provider;
pub mod random;
pub mod store;

pub use backend::{validate_label, CreateOutcome, KeyBackend};
pub use file::FileBackend;
pub use material::KeyMaterial;
pub use provider::{KeyProvider, KeySource};
pub use random::{fill_random, random_array, random_bytes};
pub use store::{KeyStore, MemoryKeyStore, StoreBackend, StoreError};

#[cfg(feature = "rocksdb")]
pub use store::RocksDbKeyStore;

/// Size of a provisioned key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;
