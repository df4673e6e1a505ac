//! AES-256-CBC with PKCS#7 padding, as used by the ONDC registry for
//! subscription challenges.
//!
//! Wire layout of an encrypted challenge: `IV (16 bytes) ‖ ciphertext`.
//! CBC is unauthenticated, so padding is validated explicitly and any
//! inconsistency is reported as malformed input instead of returning a
//! truncated plaintext.

use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::{OndcError, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size, also the IV length.
pub const BLOCK_SIZE: usize = 16;

/// Encrypt `plaintext` with AES-256-CBC, appending PKCS#7 padding.
pub fn encrypt(key: &[u8; 32], iv: &[u8; BLOCK_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256CbcEnc::new_from_slices(key, iv)
        .map_err(|e| OndcError::InvalidKey(format!("cipher init: {e}")))?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Decrypt AES-256-CBC ciphertext and strip validated PKCS#7 padding.
pub fn decrypt(key: &[u8; 32], iv: &[u8; BLOCK_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let mut plaintext = decrypt_unpadded(key, iv, ciphertext)?;
    let len = strip_pkcs7(&plaintext)?.len();
    plaintext.truncate(len);
    Ok(plaintext)
}

/// Decrypt without touching the padding. The ciphertext must be a
/// non-empty whole number of blocks.
pub fn decrypt_unpadded(
    key: &[u8; 32],
    iv: &[u8; BLOCK_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    if ciphertext.is_empty() {
        return Err(OndcError::MalformedInput("ciphertext is empty".into()));
    }
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(OndcError::MalformedInput(format!(
            "ciphertext length {} is not a multiple of {BLOCK_SIZE}",
            ciphertext.len()
        )));
    }
    let cipher = Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|e| OndcError::InvalidKey(format!("cipher init: {e}")))?;
    cipher
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|_| OndcError::MalformedInput("AES-CBC decryption failed".into()))
}

/// Return `padded` without its PKCS#7 padding.
///
/// The last byte `k` must be in `1..=16`, must not exceed the buffer, and
/// the last `k` bytes must all equal `k`.
pub fn strip_pkcs7(padded: &[u8]) -> Result<&[u8]> {
    let Some(&last) = padded.last() else {
        return Err(OndcError::MalformedInput("nothing to unpad".into()));
    };
    let k = last as usize;
    if k == 0 || k > BLOCK_SIZE || k > padded.len() {
        return Err(OndcError::MalformedInput(format!(
            "invalid PKCS#7 padding length {k}"
        )));
    }
    let (body, pad) = padded.split_at(padded.len() - k);
    if pad.iter().any(|&b| b != last) {
        return Err(OndcError::MalformedInput(
            "inconsistent PKCS#7 padding bytes".into(),
        ));
    }
    Ok(body)
}

/// Split `IV ‖ ciphertext` into its parts.
pub fn split_iv(data: &[u8]) -> Result<([u8; BLOCK_SIZE], &[u8])> {
    if data.len() < BLOCK_SIZE {
        return Err(OndcError::MalformedInput(format!(
            "encrypted challenge is {} bytes, shorter than the {BLOCK_SIZE}-byte IV",
            data.len()
        )));
    }
    let (iv_bytes, ciphertext) = data.split_at(BLOCK_SIZE);
    let mut iv = [0u8; BLOCK_SIZE];
    iv.copy_from_slice(iv_bytes);
    Ok((iv, ciphertext))
}
