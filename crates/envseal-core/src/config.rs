use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{EnvsealError, EnvsealResult};

/// Top-level configuration (loaded from envseal.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvsealConfig {
    pub keys: KeysConfig,
    pub kdf: KdfConfig,
    pub log: LogConfig,
}

/// Which backend long-lived keys are provisioned from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySourceKind {
    #[default]
    File,
    Store,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Default key source for encrypt/decrypt
    pub source: KeySourceKind,
    /// Per-installation key directory used by the file backend
    pub key_dir: PathBuf,
    /// RocksDB path used by the store backend
    pub store_path: PathBuf,
}

/// Passphrase-mode key derivation settings.
///
/// The iteration count is not recorded in envelopes, so changing it makes
/// existing passphrase-mode envelopes unreadable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    /// PBKDF2-HMAC-SHA384 rounds (default: 100000)
    pub pbkdf2_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            source: KeySourceKind::File,
            key_dir: PathBuf::from("/var/lib/envseal/keys"),
            store_path: PathBuf::from("/var/lib/envseal/keystore.db"),
        }
    }
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: 100_000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl EnvsealConfig {
    pub fn from_toml_str(content: &str) -> EnvsealResult<Self> {
        toml::from_str(content).map_err(|e| EnvsealError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> EnvsealResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| EnvsealError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn to_toml_string(&self) -> EnvsealResult<String> {
        toml::to_string_pretty(self).map_err(|e| EnvsealError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[keys]
source = "store"
key_dir = "/srv/app/keys"
store_path = "/srv/app/keys.rocksdb"

[kdf]
pbkdf2_iterations = 200000

[log]
level = "debug"
format = "json"
"#;
        let config = EnvsealConfig::from_toml_str(toml_str).unwrap();

        assert_eq!(config.keys.source, KeySourceKind::Store);
        assert_eq!(config.keys.key_dir, PathBuf::from("/srv/app/keys"));
        assert_eq!(config.keys.store_path, PathBuf::from("/srv/app/keys.rocksdb"));
        assert_eq!(config.kdf.pbkdf2_iterations, 200_000);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config = EnvsealConfig::from_toml_str("").unwrap();

        assert_eq!(config.keys.source, KeySourceKind::File);
        assert_eq!(config.keys.key_dir, PathBuf::from("/var/lib/envseal/keys"));
        assert_eq!(config.kdf.pbkdf2_iterations, 100_000);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[keys]
key_dir = "/tmp/keys"
"#;
        let config = EnvsealConfig::from_toml_str(toml_str).unwrap();

        // Overridden
        assert_eq!(config.keys.key_dir, PathBuf::from("/tmp/keys"));
        // Defaults
        assert_eq!(config.keys.source, KeySourceKind::File);
        assert_eq!(config.kdf.pbkdf2_iterations, 100_000);
    }

    #[test]
    fn test_unknown_source_rejected() {
        let result = EnvsealConfig::from_toml_str("[keys]\nsource = \"cloud\"\n");
        assert!(matches!(result, Err(EnvsealError::Config(_))));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EnvsealConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.kdf.pbkdf2_iterations, 100_000);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("envseal.toml");

        let mut config = EnvsealConfig::default();
        config.keys.source = KeySourceKind::Store;
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let parsed = EnvsealConfig::load(&path).unwrap();
        assert_eq!(parsed.keys.source, KeySourceKind::Store);
        assert_eq!(parsed.keys.key_dir, config.keys.key_dir);
    }
}
