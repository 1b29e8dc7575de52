//! Key derivation: provisioned key pairs and passphrase → key pair

use envseal_core::config::KdfConfig;
use envseal_core::{EnvsealError, EnvsealResult};
use envseal_keys::{KeyProvider, KeySource};
use hkdf::Hkdf;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256, Sha384};
use zeroize::{Zeroize, Zeroizing};

use crate::scheme::Scheme;
use crate::{KEY_SIZE, SALT_SIZE};

/// HKDF info label for the encryption key.
const ENCRYPTION_INFO: &[u8] = b"aes-256-encryption";
/// HKDF info label for the authentication key.
const AUTHENTICATION_INFO: &[u8] = b"sha-384-authentication";

/// Encryption and authentication keys for a single operation.
///
/// Never persisted. Zeroized on drop.
pub struct DerivedKeyPair {
    encryption: [u8; KEY_SIZE],
    authentication: [u8; KEY_SIZE],
}

impl DerivedKeyPair {
    /// Build a pair, rejecting all-zero keys.
    pub fn new(encryption: [u8; KEY_SIZE], authentication: [u8; KEY_SIZE]) -> EnvsealResult<Self> {
        let pair = Self {
            encryption,
            authentication,
        };
        if pair.encryption.iter().all(|&b| b == 0) || pair.authentication.iter().all(|&b| b == 0)
        {
            return Err(EnvsealError::KeyDerivationFailed(
                "derived key is all zeros".into(),
            ));
        }
        Ok(pair)
    }

    pub fn encryption_key(&self) -> &[u8; KEY_SIZE] {
        &self.encryption
    }

    pub fn mac_key(&self) -> &[u8; KEY_SIZE] {
        &self.authentication
    }
}

impl Drop for DerivedKeyPair {
    fn drop(&mut self) {
        self.encryption.zeroize();
        self.authentication.zeroize();
    }
}

impl std::fmt::Debug for DerivedKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeyPair")
            .field("encryption", &"[REDACTED]")
            .field("authentication", &"[REDACTED]")
            .finish()
    }
}

/// Passphrase-mode parameters.
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// PBKDF2-HMAC-SHA384 rounds (default: 100000)
    pub pbkdf2_iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: 100_000,
        }
    }
}

impl From<&KdfConfig> for KdfParams {
    fn from(config: &KdfConfig) -> Self {
        Self {
            pbkdf2_iterations: config.pbkdf2_iterations,
        }
    }
}

/// Fetch the two provisioned keys of `scheme` from `source`.
pub fn standard_keys(
    provider: &KeyProvider,
    scheme: Scheme,
    source: KeySource,
) -> EnvsealResult<DerivedKeyPair> {
    let encryption = provider.get_or_create(&scheme.encryption_label(), source)?;
    let authentication = provider.get_or_create(&scheme.authentication_label(), source)?;
    DerivedKeyPair::new(*encryption.as_bytes(), *authentication.as_bytes())
}

/// Derive a key pair from a passphrase and salt.
///
/// `pre = PBKDF2-HMAC-SHA384(passphrase, salt, iterations)`, then HKDF-SHA384
/// expands `pre` (salted with `salt`) into two keys under distinct info
/// labels. Deterministic for a given (passphrase, salt, iterations).
pub fn passphrase_keys(
    passphrase: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> EnvsealResult<DerivedKeyPair> {
    if params.pbkdf2_iterations == 0 {
        return Err(EnvsealError::KeyDerivationFailed(
            "PBKDF2 iteration count must be non-zero".into(),
        ));
    }

    let mut pre_key = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2::pbkdf2_hmac::<Sha384>(
        passphrase.expose_secret().as_bytes(),
        salt,
        params.pbkdf2_iterations,
        &mut pre_key[..],
    );

    let hkdf = Hkdf::<Sha384>::new(Some(&salt[..]), &pre_key[..]);
    let mut encryption = [0u8; KEY_SIZE];
    let mut authentication = [0u8; KEY_SIZE];
    hkdf.expand(ENCRYPTION_INFO, &mut encryption)
        .and_then(|()| hkdf.expand(AUTHENTICATION_INFO, &mut authentication))
        .map_err(|e| EnvsealError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    DerivedKeyPair::new(encryption, authentication)
}

/// Schemes 002/003 passphrase key: SHA-256 of the passphrase, used for both
/// roles.
pub(crate) fn legacy_sha256_keys(passphrase: &SecretString) -> EnvsealResult<DerivedKeyPair> {
    let digest: Zeroizing<[u8; KEY_SIZE]> =
        Zeroizing::new(Sha256::digest(passphrase.expose_secret().as_bytes()).into());
    DerivedKeyPair::new(*digest, *digest)
}

/// Scheme 001 passphrase key: the first 32 characters of the lowercase hex
/// SHA-256 digest, taken as ASCII bytes.
pub(crate) fn legacy_v1_key(passphrase: &SecretString) -> Zeroizing<[u8; KEY_SIZE]> {
    const HEX: &[u8; 16] = b"0123456789abcdef";

    let digest: Zeroizing<[u8; KEY_SIZE]> =
        Zeroizing::new(Sha256::digest(passphrase.expose_secret().as_bytes()).into());
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    for (i, byte) in digest.iter().take(KEY_SIZE / 2).enumerate() {
        key[2 * i] = HEX[(byte >> 4) as usize];
        key[2 * i + 1] = HEX[(byte & 0x0f) as usize];
    }
    key
}
