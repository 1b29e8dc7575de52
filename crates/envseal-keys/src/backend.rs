//! Backend seam shared by the file and key-store backends.

use envseal_core::{EnvsealError, EnvsealResult};

use crate::material::KeyMaterial;

const MAX_LABEL_LEN: usize = 64;

/// Result of an exclusive create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// This call wrote the key.
    Created,
    /// A key under the label was already present; nothing was written.
    AlreadyExists,
}

/// A place long-lived keys live.
///
/// `create` must be atomic create-if-absent: it never overwrites an existing
/// key and never exposes a partially written one.
pub trait KeyBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;
    /// Load the key stored under `label`, if any.
    fn load(&self, label: &str) -> EnvsealResult<Option<KeyMaterial>>;
    /// Store `key` under `label` unless a key already exists there.
    fn create(&self, label: &str, key: &KeyMaterial) -> EnvsealResult<CreateOutcome>;
}

/// Labels must be 1..=64 characters of `[A-Za-z0-9_-]`.
pub fn validate_label(label: &str) -> EnvsealResult<()> {
    let valid = !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(EnvsealError::key_unavailable(label, "invalid key label"))
    }
}
