//! Ed25519 signing and verification over raw message bytes.
//!
//! ONDC signs the UTF-8 bytes of the message directly (no pre-hash).
//! Signatures and public keys travel as standard base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::crypto::keys::Ed25519KeyPair;
use crate::error::{OndcError, Result};

/// Sign a message with an Ed25519 signing key.
pub fn sign(signing_key: &SigningKey, message: &[u8]) -> Signature {
    signing_key.sign(message)
}

/// Sign a message and return the signature as a base64-encoded string.
pub fn sign_to_base64(signing_key: &SigningKey, message: &[u8]) -> String {
    STANDARD.encode(sign(signing_key, message).to_bytes())
}

/// Verify a base64 signature with a base64 raw (32-byte) public key.
///
/// Returns the reason on failure. [`verify_base64`] is the boolean form.
pub fn check_base64(message: &[u8], signature_b64: &str, public_key_b64: &str) -> Result<()> {
    let key_bytes = STANDARD
        .decode(public_key_b64)
        .map_err(|e| OndcError::MalformedInput(format!("invalid base64 public key: {e}")))?;
    let key_array: [u8; 32] = key_bytes
        .try_into()
        .map_err(|_| OndcError::MalformedInput("public key must be 32 bytes".into()))?;
    let verifying_key = Ed25519KeyPair::verifying_key_from_bytes(&key_array)?;

    let sig_bytes = STANDARD
        .decode(signature_b64)
        .map_err(|e| OndcError::MalformedInput(format!("invalid base64 signature: {e}")))?;
    let sig_array: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| OndcError::MalformedInput("signature must be 64 bytes".into()))?;

    verify(&verifying_key, message, &Signature::from_bytes(&sig_array))
}

/// Verify an Ed25519 signature against a public key and message.
pub fn verify(verifying_key: &VerifyingKey, message: &[u8], signature: &Signature) -> Result<()> {
    verifying_key
        .verify(message, signature)
        .map_err(|_| OndcError::MalformedInput("signature does not match".into()))
}

/// Boolean verification. Never fails: any decode error or mismatch is
/// `false`.
pub fn verify_base64(message: &[u8], signature_b64: &str, public_key_b64: &str) -> bool {
    check_base64(message, signature_b64, public_key_b64).is_ok()
}
