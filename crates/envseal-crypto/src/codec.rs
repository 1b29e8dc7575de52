//! Versioned envelope codec: the public encrypt/decrypt entry point.

use base64::{engine::general_purpose::STANDARD, Engine};
use envseal_core::{EnvsealError, EnvsealResult};
use envseal_keys::{random_array, KeyProvider, KeySource};
use secrecy::{ExposeSecret, SecretString};

use crate::kdf::{self, passphrase_keys, standard_keys, KdfParams};
use crate::scheme::Scheme;
use crate::{cipher, legacy, SALT_SIZE};

const VERSION_TAG_LEN: usize = 3;

/// True iff `value` starts with three ASCII digits.
pub fn is_well_formed_envelope(value: impl AsRef<[u8]>) -> bool {
    envelope_version(value).is_some()
}

/// Parse the leading 3-digit version tag.
pub fn envelope_version(value: impl AsRef<[u8]>) -> Option<u16> {
    let tag = value.as_ref().get(..VERSION_TAG_LEN)?;
    tag.iter().try_fold(0u16, |acc, &b| {
        b.is_ascii_digit().then(|| acc * 10 + u16::from(b - b'0'))
    })
}

/// An empty passphrase means "no passphrase".
fn effective(passphrase: Option<&SecretString>) -> Option<&SecretString> {
    passphrase.filter(|p| !p.expose_secret().is_empty())
}

/// Encrypts with the current scheme and decrypts every scheme ever shipped.
///
/// Stateless apart from the key backends behind the provider; share it
/// across threads with `Arc`.
#[derive(Debug)]
pub struct Codec {
    provider: KeyProvider,
    kdf: KdfParams,
}

impl Codec {
    pub fn new(provider: KeyProvider, kdf: KdfParams) -> Self {
        Self { provider, kdf }
    }

    pub fn provider(&self) -> &KeyProvider {
        &self.provider
    }

    /// Encrypt `value` into a `004` envelope.
    pub fn encrypt(
        &self,
        value: &[u8],
        passphrase: Option<&SecretString>,
        source: KeySource,
    ) -> EnvsealResult<String> {
        let result = self.encrypt_inner(value, passphrase, source);
        if let Err(e) = &result {
            tracing::error!(%source, "envelope encryption failed: {e}");
        }
        result
    }

    fn encrypt_inner(
        &self,
        value: &[u8],
        passphrase: Option<&SecretString>,
        source: KeySource,
    ) -> EnvsealResult<String> {
        let scheme = Scheme::CURRENT;
        let body = match effective(passphrase) {
            None => {
                let keys = standard_keys(&self.provider, scheme, source)?;
                cipher::seal(&keys, value)?
            }
            Some(passphrase) => {
                let salt: [u8; SALT_SIZE] = random_array()?;
                let keys = passphrase_keys(passphrase, &salt, &self.kdf)?;
                let sealed = cipher::seal(&keys, value)?;

                let mut body = Vec::with_capacity(SALT_SIZE + sealed.len());
                body.extend_from_slice(&salt);
                body.extend_from_slice(&sealed);
                body
            }
        };

        Ok(format!("{}{}", scheme.tag(), STANDARD.encode(body)))
    }

    /// Decrypt an envelope of any known scheme. Empty input yields empty
    /// output without touching any key.
    pub fn decrypt(
        &self,
        envelope: &str,
        passphrase: Option<&SecretString>,
        source: KeySource,
    ) -> EnvsealResult<Vec<u8>> {
        self.decrypt_inner(envelope, passphrase, source, None)
    }

    /// Like [`Codec::decrypt`], but refuses envelopes older than `minimum`
    /// before decoding anything.
    pub fn decrypt_min_version(
        &self,
        envelope: &str,
        passphrase: Option<&SecretString>,
        source: KeySource,
        minimum: u16,
    ) -> EnvsealResult<Vec<u8>> {
        self.decrypt_inner(envelope, passphrase, source, Some(minimum))
    }

    fn decrypt_inner(
        &self,
        envelope: &str,
        passphrase: Option<&SecretString>,
        source: KeySource,
        minimum: Option<u16>,
    ) -> EnvsealResult<Vec<u8>> {
        if envelope.is_empty() {
            return Ok(Vec::new());
        }

        let Some(version) = envelope_version(envelope) else {
            tracing::error!("envelope has no 3-digit version tag");
            return Err(EnvsealError::malformed("missing 3-digit version tag"));
        };

        if let Some(minimum) = minimum {
            if version < minimum {
                tracing::error!(version, minimum, "envelope scheme below required minimum");
                return Err(EnvsealError::VersionBelowMinimum {
                    found: version,
                    minimum,
                });
            }
        }

        let Some(scheme) = Scheme::from_number(version) else {
            tracing::error!(version, "unknown envelope scheme version");
            return Err(EnvsealError::UnknownSchemeVersion(version));
        };

        let result = STANDARD
            .decode(&envelope[VERSION_TAG_LEN..])
            .map_err(|e| EnvsealError::malformed(format!("base64: {e}")))
            .and_then(|body| self.open(scheme, &body, effective(passphrase), source));

        if let Err(e) = &result {
            tracing::error!(version, %source, "envelope decryption failed: {e}");
        }
        result
    }

    fn open(
        &self,
        scheme: Scheme,
        body: &[u8],
        passphrase: Option<&SecretString>,
        source: KeySource,
    ) -> EnvsealResult<Vec<u8>> {
        match scheme {
            Scheme::V4 => match passphrase {
                None => cipher::open(&standard_keys(&self.provider, scheme, source)?, body),
                Some(passphrase) => {
                    if body.len() < SALT_SIZE {
                        return Err(EnvsealError::malformed(format!(
                            "body too short for salt: {} bytes",
                            body.len()
                        )));
                    }
                    let (salt, sealed) = body.split_at(SALT_SIZE);
                    let salt: &[u8; SALT_SIZE] = salt
                        .try_into()
                        .map_err(|_| EnvsealError::malformed("salt has wrong length"))?;
                    cipher::open(&passphrase_keys(passphrase, salt, &self.kdf)?, sealed)
                }
            },
            Scheme::V2 | Scheme::V3 => {
                let keys = match passphrase {
                    None => standard_keys(&self.provider, scheme, source)?,
                    Some(passphrase) => kdf::legacy_sha256_keys(passphrase)?,
                };
                legacy::open_sha256(&keys, body)
            }
            Scheme::V1 => match passphrase {
                None => {
                    let key = self
                        .provider
                        .get_or_create(&scheme.encryption_label(), source)?;
                    legacy::open_unauthenticated(key.as_bytes(), body)
                }
                Some(passphrase) => {
                    legacy::open_unauthenticated(&kdf::legacy_v1_key(passphrase), body)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envseal_keys::FileBackend;

    fn codec_in(dir: &std::path::Path) -> Codec {
        Codec::new(
            KeyProvider::new().with_file_backend(FileBackend::new(dir)),
            KdfParams {
                pbkdf2_iterations: 1000,
            },
        )
    }

    #[test]
    fn test_well_formed_envelope() {
        assert!(is_well_formed_envelope("004abc"));
        assert!(is_well_formed_envelope("999"));
        assert!(is_well_formed_envelope(b"001".as_slice()));
        assert!(!is_well_formed_envelope("04"));
        assert!(!is_well_formed_envelope("a04xyz"));
        assert!(!is_well_formed_envelope(""));
        assert!(!is_well_formed_envelope("٠٠٤"));
    }

    #[test]
    fn test_envelope_version() {
        assert_eq!(envelope_version("004AAAA"), Some(4));
        assert_eq!(envelope_version("123"), Some(123));
        assert_eq!(envelope_version("0x4"), None);
    }

    #[test]
    fn test_roundtrip_standard() {
        let dir = tempfile::tempdir().unwrap();
        let codec = codec_in(dir.path());

        let envelope = codec.encrypt(b"secret", None, KeySource::File).unwrap();
        assert!(envelope.starts_with("004"));
        assert_eq!(codec.decrypt(&envelope, None, KeySource::File).unwrap(), b"secret");
    }

    #[test]
    fn test_empty_passphrase_is_standard_mode() {
        let dir = tempfile::tempdir().unwrap();
        let codec = codec_in(dir.path());
        let empty = SecretString::from("");

        let envelope = codec.encrypt(b"secret", Some(&empty), KeySource::File).unwrap();
        assert_eq!(codec.decrypt(&envelope, None, KeySource::File).unwrap(), b"secret");
    }

    #[test]
    fn test_empty_envelope_touches_no_keys() {
        let dir = tempfile::tempdir().unwrap();
        let key_dir = dir.path().join("keys");
        let codec = codec_in(&key_dir);

        assert!(codec.decrypt("", None, KeySource::File).unwrap().is_empty());
        assert!(!key_dir.exists(), "no key may be provisioned for empty input");
    }

    #[test]
    fn test_unknown_version_creates_no_keys() {
        let dir = tempfile::tempdir().unwrap();
        let key_dir = dir.path().join("keys");
        let codec = codec_in(&key_dir);

        let err = codec.decrypt("999AAAA", None, KeySource::File).unwrap_err();
        assert!(matches!(err, EnvsealError::UnknownSchemeVersion(999)));
        assert!(!key_dir.exists());
    }

    #[test]
    fn test_missing_tag_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let codec = codec_in(dir.path());
        assert!(matches!(
            codec.decrypt("AB4xyz", None, KeySource::File),
            Err(EnvsealError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_bad_base64_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let codec = codec_in(dir.path());
        assert!(matches!(
            codec.decrypt("004***", None, KeySource::File),
            Err(EnvsealError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_minimum_version_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let codec = codec_in(dir.path());

        let err = codec
            .decrypt_min_version("001AAAA", None, KeySource::File, 4)
            .unwrap_err();
        assert!(matches!(
            err,
            EnvsealError::VersionBelowMinimum {
                found: 1,
                minimum: 4
            }
        ));

        let envelope = codec.encrypt(b"new", None, KeySource::File).unwrap();
        assert_eq!(
            codec
                .decrypt_min_version(&envelope, None, KeySource::File, 4)
                .unwrap(),
            b"new"
        );
    }
}
