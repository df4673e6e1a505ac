//! Key derivation using HKDF-SHA256.
//!
//! The registry challenge key is HKDF-SHA256 over the raw X25519 shared
//! secret with no salt and an empty info string. Both sides of the
//! exchange must derive it the same way, so these parameters are fixed.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{OndcError, Result};

/// A 32-byte AES-256 key derived from an X25519 exchange.
///
/// Zeroized on drop. `Debug` never prints the key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedKey([u8; 32]);

impl SharedKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedKey(..)")
    }
}

/// Derive a 32-byte key from input key material and an info string.
///
/// Uses HKDF-SHA256 (RFC 5869) without a salt.
pub fn derive_key(ikm: &[u8], info: &[u8]) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(None, ikm);
    let mut output = [0u8; 32];
    hk.expand(info, &mut output)
        .map_err(|e| OndcError::Unavailable(format!("HKDF expand failed: {e}")))?;
    Ok(output)
}

/// Derive the AES-256 challenge key from a raw X25519 shared secret.
pub fn derive_challenge_key(raw_shared_secret: &[u8; 32]) -> Result<SharedKey> {
    derive_key(raw_shared_secret, b"").map(SharedKey)
}
