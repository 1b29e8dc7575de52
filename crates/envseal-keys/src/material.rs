//! In-memory representation of a provisioned key

use base64::{engine::general_purpose::STANDARD, Engine};
use envseal_core::{EnvsealError, EnvsealResult};
use zeroize::{Zeroize, Zeroizing};

use crate::random::random_array;
use crate::KEY_SIZE;

/// A 256-bit long-lived key borrowed from a backend. Zeroized on drop.
#[derive(Clone)]
pub struct KeyMaterial {
    bytes: [u8; KEY_SIZE],
}

impl KeyMaterial {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Generate a new random key from the OS CSPRNG.
    pub fn generate() -> EnvsealResult<Self> {
        Ok(Self::from_bytes(random_array()?))
    }

    /// Encode for persistence: base64 text of the raw bytes.
    pub fn to_stored(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(self.bytes))
    }

    /// Decode a persisted value. Surrounding whitespace is ignored.
    pub fn from_stored(label: &str, stored: &[u8]) -> EnvsealResult<Self> {
        let text = std::str::from_utf8(stored)
            .map_err(|_| EnvsealError::key_unavailable(label, "stored key is not valid text"))?;
        let raw = Zeroizing::new(
            STANDARD
                .decode(text.trim())
                .map_err(|e| EnvsealError::key_unavailable(label, format!("stored key: {e}")))?,
        );
        if raw.len() != KEY_SIZE {
            return Err(EnvsealError::key_unavailable(
                label,
                format!("stored key has {} bytes (expected {KEY_SIZE})", raw.len()),
            ));
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&raw);
        Ok(Self::from_bytes(bytes))
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_roundtrip() {
        let key = KeyMaterial::generate().unwrap();
        let stored = key.to_stored();
        let decoded = KeyMaterial::from_stored("foura", stored.as_bytes()).unwrap();
        assert_eq!(key.as_bytes(), decoded.as_bytes());
    }

    #[test]
    fn test_stored_tolerates_trailing_newline() {
        let key = KeyMaterial::from_bytes([7u8; KEY_SIZE]);
        let stored = format!("{}\n", key.to_stored().as_str());
        let decoded = KeyMaterial::from_stored("foura", stored.as_bytes()).unwrap();
        assert_eq!(decoded.as_bytes(), &[7u8; KEY_SIZE]);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let short = STANDARD.encode([1u8; 16]);
        let err = KeyMaterial::from_stored("fourb", short.as_bytes()).unwrap_err();
        assert!(matches!(err, EnvsealError::KeyUnavailable { ref label, .. } if label == "fourb"));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(KeyMaterial::from_stored("foura", b"not base64!!").is_err());
        assert!(KeyMaterial::from_stored("foura", &[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_debug_redacts() {
        let key = KeyMaterial::from_bytes([0x41u8; KEY_SIZE]);
        let shown = format!("{key:?}");
        assert!(shown.contains("REDACTED"));
        assert!(!shown.contains("65"));
    }
}
