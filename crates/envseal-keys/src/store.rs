//! Key-store backed key storage: one row per label in a dedicated key table
//! with a unique constraint on the name.
//!
//! `KeyStore` is the table seam. `MemoryKeyStore` keeps rows in-process;
//! `RocksDbKeyStore` (feature `rocksdb`) persists them.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use envseal_core::{EnvsealError, EnvsealResult};
use thiserror::Error;

use crate::backend::{CreateOutcome, KeyBackend};
use crate::material::KeyMaterial;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique constraint on the name was hit.
    #[error("a key with this name already exists")]
    AlreadyExists,

    #[error("key store unavailable: {0}")]
    Unavailable(String),
}

/// A key-value table keyed by name, unique on name.
pub trait KeyStore: Send + Sync {
    fn get_by_name(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError>;
    /// Insert a new row; fails with `AlreadyExists` if `name` is taken.
    fn insert(&self, name: &str, value: &[u8]) -> Result<(), StoreError>;
}

/// In-process key table.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    rows: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn get_by_name(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::Unavailable("key table lock poisoned".into()))?;
        Ok(rows.get(name).cloned())
    }

    fn insert(&self, name: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::Unavailable("key table lock poisoned".into()))?;
        match rows.entry(name.to_string()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(value.to_vec());
                Ok(())
            }
        }
    }
}

// ── RocksDB key table ───────────────────────────────────────────────────────

#[cfg(feature = "rocksdb")]
mod rocksdb_store {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    /// RocksDB-backed key table.
    ///
    /// RocksDB holds an exclusive lock on the database directory, so the
    /// handle is the only writer; `insert_lock` makes check+put atomic
    /// across threads sharing it.
    pub struct RocksDbKeyStore {
        db: rocksdb::DB,
        insert_lock: Mutex<()>,
    }

    impl RocksDbKeyStore {
        /// Open or create a key table at the given path.
        pub fn open(db_path: &Path) -> Result<Self, StoreError> {
            let mut opts = rocksdb::Options::default();
            opts.create_if_missing(true);

            let db = rocksdb::DB::open(&opts, db_path).map_err(|e| {
                StoreError::Unavailable(format!("opening RocksDB {}: {e}", db_path.display()))
            })?;

            Ok(RocksDbKeyStore {
                db,
                insert_lock: Mutex::new(()),
            })
        }
    }

    impl KeyStore for RocksDbKeyStore {
        fn get_by_name(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.db
                .get(name.as_bytes())
                .map_err(|e| StoreError::Unavailable(format!("RocksDB get: {e}")))
        }

        fn insert(&self, name: &str, value: &[u8]) -> Result<(), StoreError> {
            let _guard = self
                .insert_lock
                .lock()
                .map_err(|_| StoreError::Unavailable("insert lock poisoned".into()))?;

            if self.get_by_name(name)?.is_some() {
                return Err(StoreError::AlreadyExists);
            }

            let mut write_opts = rocksdb::WriteOptions::default();
            write_opts.set_sync(true);
            self.db
                .put_opt(name.as_bytes(), value, &write_opts)
                .map_err(|e| StoreError::Unavailable(format!("RocksDB put: {e}")))
        }
    }
}

#[cfg(feature = "rocksdb")]
pub use rocksdb_store::RocksDbKeyStore;

// ── Backend adapter ─────────────────────────────────────────────────────────

/// Exposes a `KeyStore` table as a `KeyBackend`. Rows hold base64 key text.
#[derive(Clone)]
pub struct StoreBackend {
    store: Arc<dyn KeyStore>,
}

impl StoreBackend {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self { store }
    }
}

impl std::fmt::Debug for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreBackend").finish_non_exhaustive()
    }
}

impl KeyBackend for StoreBackend {
    fn name(&self) -> &'static str {
        "store"
    }

    fn load(&self, label: &str) -> EnvsealResult<Option<KeyMaterial>> {
        match self.store.get_by_name(label) {
            Ok(Some(value)) => {
                let value = zeroize::Zeroizing::new(value);
                KeyMaterial::from_stored(label, &value).map(Some)
            }
            Ok(None) => Ok(None),
            Err(e) => Err(EnvsealError::key_unavailable(label, e)),
        }
    }

    fn create(&self, label: &str, key: &KeyMaterial) -> EnvsealResult<CreateOutcome> {
        match self.store.insert(label, key.to_stored().as_bytes()) {
            Ok(()) => Ok(CreateOutcome::Created),
            Err(StoreError::AlreadyExists) => Ok(CreateOutcome::AlreadyExists),
            Err(e) => Err(EnvsealError::key_unavailable(label, e)),
        }
    }
}
