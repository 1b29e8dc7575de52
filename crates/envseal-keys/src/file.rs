//! File-backed key storage: one base64 key file per label under a fixed
//! per-installation directory.
//!
//! New keys are written to a temp file in the same directory and then
//! persisted with no-clobber semantics (`renameat2(RENAME_NOREPLACE)` or
//! link+unlink), so the final path either does not exist or holds a
//! complete key.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use envseal_core::{EnvsealError, EnvsealResult};
use zeroize::Zeroizing;

use crate::backend::{validate_label, CreateOutcome, KeyBackend};
use crate::material::KeyMaterial;

#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, label: &str) -> EnvsealResult<PathBuf> {
        validate_label(label)?;
        Ok(self.root.join(label))
    }

    pub fn exists(&self, label: &str) -> EnvsealResult<bool> {
        let path = self.path_for(label)?;
        match std::fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(EnvsealError::key_unavailable(
                label,
                format!("checking {}: {e}", path.display()),
            )),
        }
    }

    /// Read the raw contents stored under `label`; `None` if absent.
    pub fn read(&self, label: &str) -> EnvsealResult<Option<Zeroizing<Vec<u8>>>> {
        let path = self.path_for(label)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(Zeroizing::new(bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(EnvsealError::key_unavailable(
                label,
                format!("reading {}: {e}", path.display()),
            )),
        }
    }

    /// Exclusively create `label` with `contents`. Never overwrites.
    pub fn write(&self, label: &str, contents: &[u8]) -> EnvsealResult<CreateOutcome> {
        let path = self.path_for(label)?;
        self.ensure_root()
            .map_err(|e| EnvsealError::key_unavailable(label, e))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".envseal-")
            .tempfile_in(&self.root)
            .map_err(|e| EnvsealError::key_unavailable(label, format!("temp file: {e}")))?;
        tmp.write_all(contents)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| EnvsealError::key_unavailable(label, format!("writing temp file: {e}")))?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(EnvsealError::key_unavailable(
                label,
                format!("persisting {}: {}", path.display(), e.error),
            )),
        }
    }

    fn ensure_root(&self) -> std::io::Result<()> {
        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&self.root)
    }
}

impl KeyBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn load(&self, label: &str) -> EnvsealResult<Option<KeyMaterial>> {
        match self.read(label)? {
            Some(contents) => KeyMaterial::from_stored(label, &contents).map(Some),
            None => Ok(None),
        }
    }

    fn create(&self, label: &str, key: &KeyMaterial) -> EnvsealResult<CreateOutcome> {
        self.write(label, key.to_stored().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("methods"));

        assert!(!backend.exists("foura").unwrap());
        assert!(backend.read("foura").unwrap().is_none());

        let outcome = backend.write("foura", b"c2VjcmV0").unwrap();
        assert_eq!(outcome, CreateOutcome::Created);
        assert!(backend.exists("foura").unwrap());
        assert_eq!(backend.read("foura").unwrap().unwrap().as_slice(), b"c2VjcmV0");
    }

    #[test]
    fn test_write_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());

        backend.write("fourb", b"first").unwrap();
        let outcome = backend.write("fourb", b"second").unwrap();

        assert_eq!(outcome, CreateOutcome::AlreadyExists);
        assert_eq!(backend.read("fourb").unwrap().unwrap().as_slice(), b"first");
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());

        backend.write("foura", b"first").unwrap();
        backend.write("foura", b"second").unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["foura".to_string()]);
    }

    #[test]
    fn test_traversal_label_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("keys"));

        let result = backend.write("../escape", b"x");
        assert!(matches!(result, Err(EnvsealError::KeyUnavailable { .. })));
        assert!(!dir.path().join("escape").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_exists_surfaces_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("blocker");
        std::fs::write(&not_a_dir, b"").unwrap();
        let backend = FileBackend::new(&not_a_dir);

        // ENOTDIR, not NotFound: must not read as "no key"
        let result = backend.exists("foura");
        assert!(matches!(result, Err(EnvsealError::KeyUnavailable { .. })));
    }

    #[test]
    fn test_exists_ignores_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("foura")).unwrap();
        let backend = FileBackend::new(dir.path());

        assert!(!backend.exists("foura").unwrap());
    }

    #[test]
    fn test_load_decodes_stored_key() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        let key = KeyMaterial::from_bytes([9u8; 32]);

        assert_eq!(backend.create("foura", &key).unwrap(), CreateOutcome::Created);
        let loaded = backend.load("foura").unwrap().unwrap();
        assert_eq!(loaded.as_bytes(), key.as_bytes());
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        backend.write("foura", b"secret").unwrap();

        let mode = std::fs::metadata(dir.path().join("foura"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o077, 0, "key file must not be group/world accessible");
    }
}
