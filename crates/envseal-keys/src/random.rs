//! OS-backed secure randomness for keys, salts and IVs.

use envseal_core::{EnvsealError, EnvsealResult};
use rand::rngs::OsRng;
use rand::RngCore;

/// Fill `buf` from the operating system CSPRNG.
///
/// Any generator failure is surfaced as `RandomUnavailable`; callers must
/// abort the surrounding operation rather than continue with weak bytes.
pub fn fill_random(buf: &mut [u8]) -> EnvsealResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| EnvsealError::RandomUnavailable(e.to_string()))
}

/// Return `n` fresh random bytes.
pub fn random_bytes(n: usize) -> EnvsealResult<Vec<u8>> {
    let mut buf = vec![0u8; n];
    fill_random(&mut buf)?;
    Ok(buf)
}

/// Return a fixed-size array of fresh random bytes.
pub fn random_array<const N: usize>() -> EnvsealResult<[u8; N]> {
    let mut buf = [0u8; N];
    fill_random(&mut buf)?;
    Ok(buf)
}
