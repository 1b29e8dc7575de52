//! Decode-only support for retired schemes.
//!
//! Nothing here can produce an envelope. Schemes 002 and 003 share a body
//! layout and differ only in which provisioned keys they read:
//!
//! ```text
//! 002/003: [32 bytes: HMAC-SHA256(mac_key, IV || Ciphertext)][16 bytes: IV][Ciphertext]
//! 001:     [16 bytes: IV][Ciphertext]
//! ```
//!
//! Scheme 001 carries no tag. Tampering surfaces as garbage plaintext or a
//! padding error, never as `AuthenticationFailed`.

use envseal_core::{EnvsealError, EnvsealResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::cipher::{cbc_decrypt, split_iv};
use crate::kdf::DerivedKeyPair;
use crate::{KEY_SIZE, LEGACY_TAG_SIZE};

type HmacSha256 = Hmac<Sha256>;

/// Verify and decrypt a 002/003 body.
pub fn open_sha256(keys: &DerivedKeyPair, body: &[u8]) -> EnvsealResult<Vec<u8>> {
    if body.len() < LEGACY_TAG_SIZE {
        return Err(EnvsealError::malformed(format!(
            "body too short for tag: {} bytes",
            body.len()
        )));
    }

    let (tag, rest) = body.split_at(LEGACY_TAG_SIZE);
    let (iv, ciphertext) = split_iv(rest)?;

    let mut mac = HmacSha256::new_from_slice(keys.mac_key())
        .map_err(|e| EnvsealError::KeyDerivationFailed(format!("HMAC key: {e}")))?;
    mac.update(iv);
    mac.update(ciphertext);
    mac.verify_slice(tag)
        .map_err(|_| EnvsealError::AuthenticationFailed)?;

    cbc_decrypt(keys.encryption_key(), iv, ciphertext)
}

/// Decrypt a 001 body. There is no integrity check.
pub fn open_unauthenticated(key: &[u8; KEY_SIZE], body: &[u8]) -> EnvsealResult<Vec<u8>> {
    let (iv, ciphertext) = split_iv(body)?;
    cbc_decrypt(key, iv, ciphertext)
}
