//! Current scheme (004): AES-256-CBC + HMAC-SHA384, encrypt-then-MAC
//!
//! Sealed body (binary):
//! ```text
//! [48 bytes: HMAC-SHA384(mac_key, IV || Ciphertext)][16 bytes: IV][N bytes: Ciphertext]
//! ```
//!
//! The tag is verified in constant time before any decryption happens, so
//! a tampered body never reaches the CBC padding check.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use envseal_core::{EnvsealError, EnvsealResult};
use envseal_keys::random_array;
use hmac::{Hmac, Mac};
use sha2::Sha384;

use crate::kdf::DerivedKeyPair;
use crate::{IV_SIZE, KEY_SIZE, TAG_SIZE};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha384 = Hmac<Sha384>;

const BLOCK_SIZE: usize = 16;

/// AES-256-CBC encrypt with PKCS#7 padding.
pub(crate) fn cbc_encrypt(key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE], plaintext: &[u8]) -> Vec<u8> {
    Aes256CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// AES-256-CBC decrypt and strip PKCS#7 padding.
pub(crate) fn cbc_decrypt(
    key: &[u8; KEY_SIZE],
    iv: &[u8; IV_SIZE],
    ciphertext: &[u8],
) -> EnvsealResult<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(EnvsealError::malformed(format!(
            "ciphertext length {} is not a positive multiple of {BLOCK_SIZE}",
            ciphertext.len()
        )));
    }
    Aes256CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| EnvsealError::malformed("invalid CBC padding"))
}

/// Split `IV || rest` into a fixed-size IV and the remainder.
pub(crate) fn split_iv(body: &[u8]) -> EnvsealResult<(&[u8; IV_SIZE], &[u8])> {
    if body.len() < IV_SIZE {
        return Err(EnvsealError::malformed(format!(
            "body too short for IV: {} bytes",
            body.len()
        )));
    }
    let (iv, rest) = body.split_at(IV_SIZE);
    let iv = iv
        .try_into()
        .map_err(|_| EnvsealError::malformed("IV has wrong length"))?;
    Ok((iv, rest))
}

fn tag_for(mac_key: &[u8; KEY_SIZE], iv: &[u8], ciphertext: &[u8]) -> EnvsealResult<HmacSha384> {
    let mut mac = HmacSha384::new_from_slice(mac_key)
        .map_err(|e| EnvsealError::KeyDerivationFailed(format!("HMAC key: {e}")))?;
    mac.update(iv);
    mac.update(ciphertext);
    Ok(mac)
}

/// Encrypt `plaintext` under `keys`.
///
/// Returns: `[48-byte tag][16-byte IV][ciphertext]`
pub fn seal(keys: &DerivedKeyPair, plaintext: &[u8]) -> EnvsealResult<Vec<u8>> {
    let iv: [u8; IV_SIZE] = random_array()?;
    let ciphertext = cbc_encrypt(keys.encryption_key(), &iv, plaintext);
    let tag = tag_for(keys.mac_key(), &iv, &ciphertext)?.finalize().into_bytes();

    let mut body = Vec::with_capacity(TAG_SIZE + IV_SIZE + ciphertext.len());
    body.extend_from_slice(&tag);
    body.extend_from_slice(&iv);
    body.extend_from_slice(&ciphertext);
    Ok(body)
}

/// Verify and decrypt a body produced by [`seal`].
///
/// A tag mismatch is `AuthenticationFailed`; no plaintext is produced.
pub fn open(keys: &DerivedKeyPair, body: &[u8]) -> EnvsealResult<Vec<u8>> {
    if body.len() < TAG_SIZE + IV_SIZE {
        return Err(EnvsealError::malformed(format!(
            "body too short: {} bytes (minimum {})",
            body.len(),
            TAG_SIZE + IV_SIZE
        )));
    }

    let (tag, rest) = body.split_at(TAG_SIZE);
    let (iv, ciphertext) = split_iv(rest)?;

    tag_for(keys.mac_key(), iv, ciphertext)?
        .verify_slice(tag)
        .map_err(|_| EnvsealError::AuthenticationFailed)?;

    cbc_decrypt(keys.encryption_key(), iv, ciphertext)
}
