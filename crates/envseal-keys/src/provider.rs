//! Lazily provisioned, named keys.

use envseal_core::{EnvsealError, EnvsealResult, KeySourceKind};

use crate::backend::{validate_label, CreateOutcome, KeyBackend};
use crate::file::FileBackend;
use crate::material::KeyMaterial;
use crate::store::StoreBackend;

/// Which backend a request is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    File,
    Store,
}

impl From<KeySourceKind> for KeySource {
    fn from(kind: KeySourceKind) -> Self {
        match kind {
            KeySourceKind::File => KeySource::File,
            KeySourceKind::Store => KeySource::Store,
        }
    }
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::File => f.write_str("file"),
            KeySource::Store => f.write_str("store"),
        }
    }
}

/// Hands out long-lived keys from whichever backends were configured.
///
/// Holds no key material itself; every call goes to the backend.
#[derive(Debug, Default)]
pub struct KeyProvider {
    file: Option<FileBackend>,
    store: Option<StoreBackend>,
}

impl KeyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file_backend(mut self, backend: FileBackend) -> Self {
        self.file = Some(backend);
        self
    }

    pub fn with_store_backend(mut self, backend: StoreBackend) -> Self {
        self.store = Some(backend);
        self
    }

    fn backend(&self, label: &str, source: KeySource) -> EnvsealResult<&dyn KeyBackend> {
        let backend: Option<&dyn KeyBackend> = match source {
            KeySource::File => self.file.as_ref().map(|b| b as &dyn KeyBackend),
            KeySource::Store => self.store.as_ref().map(|b| b as &dyn KeyBackend),
        };
        backend.ok_or_else(|| {
            EnvsealError::key_unavailable(label, format!("{source} key backend is not configured"))
        })
    }

    /// Return the key stored under `label`, creating it on first use.
    ///
    /// Creation goes through the backend's exclusive create. A caller that
    /// loses a creation race re-reads and returns the winner's key, so every
    /// caller sees the same bytes for a label.
    pub fn get_or_create(&self, label: &str, source: KeySource) -> EnvsealResult<KeyMaterial> {
        validate_label(label)?;
        let backend = self.backend(label, source)?;

        if let Some(key) = backend.load(label)? {
            tracing::debug!(label, backend = backend.name(), "loaded key");
            return Ok(key);
        }

        let candidate = KeyMaterial::generate()?;
        match backend.create(label, &candidate)? {
            CreateOutcome::Created => {
                tracing::info!(label, backend = backend.name(), "created new key");
            }
            CreateOutcome::AlreadyExists => {
                tracing::debug!(
                    label,
                    backend = backend.name(),
                    "key created concurrently, using existing"
                );
            }
        }
        drop(candidate);

        backend
            .load(label)?
            .ok_or_else(|| EnvsealError::key_unavailable(label, "key missing after creation"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKeyStore;
    use std::sync::{Arc, Barrier};

    fn providers() -> (tempfile::TempDir, KeyProvider) {
        let dir = tempfile::tempdir().unwrap();
        let provider = KeyProvider::new()
            .with_file_backend(FileBackend::new(dir.path().join("keys")))
            .with_store_backend(StoreBackend::new(Arc::new(MemoryKeyStore::new())));
        (dir, provider)
    }

    #[test]
    fn test_sequential_calls_return_same_key() {
        let (_dir, provider) = providers();
        for source in [KeySource::File, KeySource::Store] {
            let k1 = provider.get_or_create("foura", source).unwrap();
            let k2 = provider.get_or_create("foura", source).unwrap();
            assert_eq!(k1.as_bytes(), k2.as_bytes(), "{source} key must be stable");
        }
    }

    #[test]
    fn test_labels_and_sources_are_independent() {
        let (_dir, provider) = providers();

        let file_a = provider.get_or_create("foura", KeySource::File).unwrap();
        let file_b = provider.get_or_create("fourb", KeySource::File).unwrap();
        let store_a = provider.get_or_create("foura", KeySource::Store).unwrap();

        assert_ne!(file_a.as_bytes(), file_b.as_bytes());
        assert_ne!(file_a.as_bytes(), store_a.as_bytes());
    }

    #[test]
    fn test_unconfigured_source_is_key_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let provider = KeyProvider::new().with_file_backend(FileBackend::new(dir.path()));

        let err = provider.get_or_create("foura", KeySource::Store).unwrap_err();
        assert!(matches!(err, EnvsealError::KeyUnavailable { .. }));
    }

    #[test]
    fn test_existing_key_is_returned_not_replaced() {
        let (dir, provider) = providers();
        let existing = KeyMaterial::from_bytes([0x5au8; 32]);
        FileBackend::new(dir.path().join("keys"))
            .create("twoa", &existing)
            .unwrap();

        let key = provider.get_or_create("twoa", KeySource::File).unwrap();
        assert_eq!(key.as_bytes(), existing.as_bytes());
    }

    #[test]
    fn test_concurrent_first_calls_converge() {
        const THREADS: usize = 8;

        for source in [KeySource::File, KeySource::Store] {
            let (_dir, provider) = providers();
            let provider = Arc::new(provider);
            let barrier = Arc::new(Barrier::new(THREADS));

            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let provider = Arc::clone(&provider);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        *provider.get_or_create("foura", source).unwrap().as_bytes()
                    })
                })
                .collect();

            let keys: Vec<[u8; 32]> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            assert!(
                keys.windows(2).all(|w| w[0] == w[1]),
                "all {source} callers must observe one key"
            );
        }
    }
}
