//! Cryptographic primitives for the ONDC registry handshake.
//!
//! This module provides:
//! - Ed25519 key generation, signing, and verification
//! - X25519 Diffie-Hellman key exchange and SPKI DER wrapping
//! - HKDF-SHA256 challenge key derivation
//! - AES-256-CBC with validated PKCS#7 padding
//! - Cryptographically secure random number generation

pub mod cipher;
pub mod derivation;
pub mod keys;
pub mod random;
pub mod signing;

pub use derivation::SharedKey;
