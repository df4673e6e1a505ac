//! Ed25519 and X25519 key pairs, plus the DER wrapping ONDC uses for
//! X25519 public keys.
//!
//! Ed25519 signs requests and the site-verification request id.
//! X25519 is used for the registry challenge key exchange.

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand_core::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::error::{OndcError, Result};

/// DER `SubjectPublicKeyInfo` header for an X25519 key (OID 1.3.101.110).
///
/// `SEQUENCE { SEQUENCE { OID id-X25519 }, BIT STRING (0 unused bits) }`
/// followed by the 32 raw key bytes. The encoding is fixed-length.
const X25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x6e, 0x03, 0x21, 0x00,
];

/// Total length of a DER-encoded X25519 public key.
pub const X25519_SPKI_LEN: usize = X25519_SPKI_PREFIX.len() + 32;

/// Unencrypted PKCS#8 header for an X25519 private key. Some ONDC tooling
/// stores the encryption secret this way instead of as the raw scalar.
const X25519_PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x6e, 0x04, 0x22, 0x04, 0x20,
];

/// An Ed25519 key pair for signing operations.
///
/// `SigningKey` zeroizes its secret on drop.
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl Ed25519KeyPair {
    /// Generate a new random Ed25519 key pair.
    pub fn generate() -> Self {
        Self::generate_with_rng(&mut rand::thread_rng())
    }

    /// Generate a key pair from a caller-supplied CSPRNG.
    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let signing_key = SigningKey::generate(rng);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Reconstruct a key pair from the 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Reconstruct from a stored private key: either the 32-byte seed or
    /// the 64-byte `seed ‖ public` form written by libsodium.
    pub fn from_private_encoding(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(bytes);
                let kp = Self::from_seed(&seed);
                seed.zeroize();
                Ok(kp)
            }
            64 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&bytes[..32]);
                let kp = Self::from_seed(&seed);
                seed.zeroize();
                if kp.verifying_key_bytes()[..] != bytes[32..] {
                    return Err(OndcError::InvalidKey(
                        "64-byte signing key has a public half that does not match its seed"
                            .into(),
                    ));
                }
                Ok(kp)
            }
            n => Err(OndcError::InvalidKey(format!(
                "signing key must be 32 or 64 bytes, got {n}"
            ))),
        }
    }

    /// Reconstruct a verifying key from raw bytes.
    pub fn verifying_key_from_bytes(bytes: &[u8; 32]) -> Result<VerifyingKey> {
        VerifyingKey::from_bytes(bytes)
            .map_err(|e| OndcError::InvalidKey(format!("invalid verifying key: {e}")))
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Return the seed bytes. Caller must zeroize after use.
    pub fn seed_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn verifying_key_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }
}

/// An X25519 static key pair for the registry key exchange.
pub struct X25519KeyPair {
    secret: StaticSecret,
    public: X25519PublicKey,
}

impl X25519KeyPair {
    /// Generate a new random X25519 key pair.
    pub fn generate() -> Self {
        Self::generate_with_rng(rand::thread_rng())
    }

    /// Generate a key pair from a caller-supplied CSPRNG.
    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: R) -> Self {
        let secret = StaticSecret::random_from_rng(rng);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Reconstruct from the 32-byte scalar.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Reconstruct from a stored private key: the raw 32-byte scalar or
    /// an unencrypted PKCS#8 document.
    pub fn from_private_encoding(bytes: &[u8]) -> Result<Self> {
        let scalar = match bytes.len() {
            32 => bytes,
            48 if bytes[..X25519_PKCS8_PREFIX.len()] == X25519_PKCS8_PREFIX => {
                &bytes[X25519_PKCS8_PREFIX.len()..]
            }
            n => {
                return Err(OndcError::InvalidKey(format!(
                    "encryption key must be a 32-byte scalar or X25519 PKCS#8, got {n} bytes"
                )))
            }
        };
        let mut raw = [0u8; 32];
        raw.copy_from_slice(scalar);
        let kp = Self::from_secret_bytes(raw);
        raw.zeroize();
        Ok(kp)
    }

    /// Perform the Diffie-Hellman exchange with a peer's public key.
    ///
    /// Fails when the peer key is a low-order point, which would make
    /// the shared secret all zeros regardless of our secret.
    pub fn diffie_hellman(&self, peer_public: &X25519PublicKey) -> Result<[u8; 32]> {
        let shared = self.secret.diffie_hellman(peer_public);
        if !shared.was_contributory() {
            return Err(OndcError::InvalidKey(
                "peer public key produced a non-contributory shared secret".into(),
            ));
        }
        Ok(*shared.as_bytes())
    }

    pub fn public_key(&self) -> &X25519PublicKey {
        &self.public
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Return the scalar bytes. Caller must zeroize after use.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// Public key in DER `SubjectPublicKeyInfo` form.
    pub fn public_key_der(&self) -> Vec<u8> {
        x25519_public_key_to_der(&self.public)
    }
}

/// Wrap a raw X25519 public key in DER `SubjectPublicKeyInfo`.
pub fn x25519_public_key_to_der(key: &X25519PublicKey) -> Vec<u8> {
    let mut der = Vec::with_capacity(X25519_SPKI_LEN);
    der.extend_from_slice(&X25519_SPKI_PREFIX);
    der.extend_from_slice(key.as_bytes());
    der
}

/// Parse a DER `SubjectPublicKeyInfo` carrying an X25519 key.
pub fn x25519_public_key_from_der(der: &[u8]) -> Result<X25519PublicKey> {
    if der.len() != X25519_SPKI_LEN {
        return Err(OndcError::InvalidKey(format!(
            "X25519 SubjectPublicKeyInfo must be {X25519_SPKI_LEN} bytes, got {}",
            der.len()
        )));
    }
    let (header, key) = der.split_at(X25519_SPKI_PREFIX.len());
    if header != &X25519_SPKI_PREFIX[..] {
        return Err(OndcError::InvalidKey(
            "not an X25519 SubjectPublicKeyInfo (unexpected algorithm or structure)".into(),
        ));
    }
    let mut raw = [0u8; 32];
    raw.copy_from_slice(key);
    Ok(X25519PublicKey::from(raw))
}
