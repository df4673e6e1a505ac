//! Secure random number generation.
//!
//! Uses the operating system's cryptographic random source via `rand`.

use rand::RngCore;

use crate::crypto::cipher::BLOCK_SIZE;

/// Fill a buffer with cryptographically secure random bytes.
pub fn fill_random(buf: &mut [u8]) {
    rand::thread_rng().fill_bytes(buf);
}

/// Generate a fixed-size array of cryptographically secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    fill_random(&mut buf);
    buf
}

/// Generate a random AES-CBC initialisation vector.
pub fn random_iv() -> [u8; BLOCK_SIZE] {
    random_bytes()
}
