//! Registry challenge handling: shared-key derivation, challenge
//! decryption, and request signing with the subscriber's long-lived keys.
//!
//! A [`ChallengeCrypto`] is built once from the credential file and then
//! shared by reference (or `Arc`) with whatever needs it. It is immutable
//! after construction, so every operation is safe to call concurrently.
//!
//! Key material that is missing, partial or undecodable makes the
//! matching operations return [`OndcError::Unavailable`]; it never makes
//! construction fail.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use zeroize::Zeroize;

use crate::crypto::derivation::{derive_challenge_key, SharedKey};
use crate::crypto::keys::{x25519_public_key_from_der, Ed25519KeyPair, X25519KeyPair};
use crate::crypto::{cipher, signing};
use crate::environment::Environment;
use crate::error::{OndcError, Result};
use crate::storage::credential_file::{load_credentials, CredentialFile, KeyPairRecord};

/// The subscriber's loaded ONDC key material.
pub struct ChallengeCrypto {
    signing: Option<Ed25519KeyPair>,
    encryption: Option<X25519KeyPair>,
    registry_keys: HashMap<Environment, String>,
    signing_public_key: Option<String>,
    encryption_public_key: Option<String>,
    unique_key_id: Option<String>,
    request_id: Option<String>,
    signed_request_id: Option<String>,
    subscriber_id: Option<String>,
}

/// Which operations the loaded credentials support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub signing: bool,
    pub encryption: bool,
    /// Environments with a usable registry key.
    pub environments: Vec<Environment>,
}

impl Availability {
    /// True when challenges from `env` can be decrypted.
    pub fn can_decrypt(&self, env: Environment) -> bool {
        self.encryption && self.environments.contains(&env)
    }
}

impl ChallengeCrypto {
    /// An instance with no key material. Every keyed operation returns
    /// `Unavailable`.
    pub fn unconfigured() -> Self {
        Self {
            signing: None,
            encryption: None,
            registry_keys: HashMap::new(),
            signing_public_key: None,
            encryption_public_key: None,
            unique_key_id: None,
            request_id: None,
            signed_request_id: None,
            subscriber_id: None,
        }
    }

    /// Build from a parsed credential file.
    ///
    /// Each key pair is accepted only when both halves are present and
    /// the public half matches the private one.
    pub fn from_credentials(credentials: &CredentialFile) -> Self {
        let signing = credentials
            .signing_keys
            .as_ref()
            .and_then(|rec| load_pair("signing", rec, decode_signing_pair));
        let encryption = credentials
            .encryption_keys
            .as_ref()
            .and_then(|rec| load_pair("encryption", rec, decode_encryption_pair));

        let registry_keys = Environment::ALL
            .iter()
            .filter_map(|&env| {
                credentials
                    .ondc_public_keys
                    .get(env)
                    .map(|k| (env, k.trim().to_string()))
            })
            .collect();

        Self {
            signing_public_key: signing
                .as_ref()
                .and(credentials.signing_keys.as_ref())
                .map(|r| r.public_key.clone()),
            encryption_public_key: encryption
                .as_ref()
                .and(credentials.encryption_keys.as_ref())
                .map(|r| r.public_key.clone()),
            signing,
            encryption,
            registry_keys,
            unique_key_id: credentials.unique_key_id.clone(),
            request_id: credentials.request_id.clone(),
            signed_request_id: credentials.signed_request_id.clone(),
            subscriber_id: credentials.subscriber_id.clone(),
        }
    }

    /// Load from the credential file at `path`.
    ///
    /// A missing or unreadable file yields an unconfigured instance and a
    /// logged diagnostic, so a service can start before keys exist.
    pub fn load(path: &Path) -> Self {
        match load_credentials(path) {
            Ok(Some(credentials)) => {
                log::debug!("loaded ONDC credentials from {}", path.display());
                Self::from_credentials(&credentials)
            }
            Ok(None) => {
                log::warn!(
                    "ONDC credentials file {} not found; generate keys first",
                    path.display()
                );
                Self::unconfigured()
            }
            Err(e) => {
                log::error!("error loading ONDC credentials from {}: {e}", path.display());
                Self::unconfigured()
            }
        }
    }

    /// Derive the AES-256 key shared with the registry of `env`.
    ///
    /// X25519 between our encryption secret and the registry's DER public
    /// key, then HKDF-SHA256 with no salt and empty info.
    pub fn derive_shared_key(&self, env: Environment) -> Result<SharedKey> {
        let Some(local) = self.encryption.as_ref() else {
            log::error!("encryption private key not available");
            return Err(OndcError::Unavailable("encryption key pair not loaded".into()));
        };
        let Some(registry_b64) = self.registry_keys.get(&env) else {
            log::error!("ONDC public key not available for {env}");
            return Err(OndcError::Unavailable(format!("no registry public key for {env}")));
        };
        derive_peer_key(local, registry_b64).map_err(|e| {
            log::error!("error creating shared key for {env}: {e}");
            OndcError::Unavailable(format!("cannot derive shared key for {env}: {e}"))
        })
    }

    /// Decrypt a registry challenge (`base64(IV ‖ ciphertext)`) and return
    /// the plaintext answer.
    pub fn decrypt_challenge(
        &self,
        encrypted_challenge_b64: &str,
        env: Environment,
    ) -> Result<String> {
        let key = self.derive_shared_key(env)?;
        open_challenge(&key, encrypted_challenge_b64).map_err(|e| {
            log::error!("error decrypting challenge for {env}: {e}");
            e
        })
    }

    /// Sign the UTF-8 bytes of `data`, returning a base64 signature.
    pub fn sign(&self, data: &str) -> Result<String> {
        let Some(kp) = self.signing.as_ref() else {
            log::error!("signing private key not available");
            return Err(OndcError::Unavailable("signing key pair not loaded".into()));
        };
        Ok(signing::sign_to_base64(kp.signing_key(), data.as_bytes()))
    }

    /// Check `signature_b64` over `data` against a base64 raw Ed25519
    /// public key. Never fails; malformed input is `false`.
    pub fn verify(&self, data: &str, signature_b64: &str, public_key_b64: &str) -> bool {
        verify(data, signature_b64, public_key_b64)
    }

    /// The signing key pair, for callers that build their own signatures.
    pub fn signing_key_pair(&self) -> Option<&Ed25519KeyPair> {
        self.signing.as_ref()
    }

    pub fn signing_public_key(&self) -> Option<&str> {
        self.signing_public_key.as_deref()
    }

    /// Base64 DER encryption public key, as registered with ONDC.
    pub fn encryption_public_key(&self) -> Option<&str> {
        self.encryption_public_key.as_deref()
    }

    pub fn unique_key_id(&self) -> Option<&str> {
        self.unique_key_id.as_deref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn signed_request_id(&self) -> Option<&str> {
        self.signed_request_id.as_deref()
    }

    pub fn subscriber_id(&self) -> Option<&str> {
        self.subscriber_id.as_deref()
    }

    /// True when both key pairs loaded.
    pub fn is_configured(&self) -> bool {
        self.signing.is_some() && self.encryption.is_some()
    }

    /// Report what the loaded credentials can do. Registry keys are
    /// decoded here, so a stored key that is not valid DER is reported as
    /// unavailable.
    pub fn availability(&self) -> Availability {
        let environments = Environment::ALL
            .into_iter()
            .filter(|env| {
                self.registry_keys
                    .get(env)
                    .is_some_and(|k| decode_registry_key(k).is_ok())
            })
            .collect();
        Availability {
            signing: self.signing.is_some(),
            encryption: self.encryption.is_some(),
            environments,
        }
    }
}

/// Boolean Ed25519 verification over the UTF-8 bytes of `data`.
pub fn verify(data: &str, signature_b64: &str, public_key_b64: &str) -> bool {
    match signing::check_base64(data.as_bytes(), signature_b64, public_key_b64) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("signature verification failed: {e}");
            false
        }
    }
}

/// Derive the challenge key between `local` and a peer's base64 DER
/// X25519 public key. The registry runs the same derivation with the
/// roles swapped.
pub fn derive_peer_key(local: &X25519KeyPair, peer_public_der_b64: &str) -> Result<SharedKey> {
    let peer = decode_registry_key(peer_public_der_b64)?;
    let mut raw = local.diffie_hellman(&peer)?;
    let key = derive_challenge_key(&raw);
    raw.zeroize();
    key
}

/// Encrypt `plaintext` as the registry does: AES-256-CBC with PKCS#7,
/// returned as `base64(IV ‖ ciphertext)`.
pub fn seal_challenge(
    key: &SharedKey,
    iv: &[u8; cipher::BLOCK_SIZE],
    plaintext: &str,
) -> Result<String> {
    let ciphertext = cipher::encrypt(key.as_bytes(), iv, plaintext.as_bytes())?;
    let mut out = Vec::with_capacity(iv.len() + ciphertext.len());
    out.extend_from_slice(iv);
    out.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(out))
}

/// Decrypt `base64(IV ‖ ciphertext)` with an already derived key.
pub fn open_challenge(key: &SharedKey, encrypted_challenge_b64: &str) -> Result<String> {
    let data = STANDARD
        .decode(encrypted_challenge_b64.trim())
        .map_err(|e| OndcError::MalformedInput(format!("challenge is not valid base64: {e}")))?;
    let (iv, ciphertext) = cipher::split_iv(&data)?;
    let plaintext = cipher::decrypt(key.as_bytes(), &iv, ciphertext)?;
    String::from_utf8(plaintext)
        .map_err(|_| OndcError::MalformedInput("decrypted challenge is not UTF-8".into()))
}

/// Load-once handle around a credential file path.
///
/// The file is read on first use and cached for the life of the handle;
/// concurrent first callers block until the single load finishes.
pub struct LazyChallengeCrypto {
    path: PathBuf,
    cell: OnceLock<ChallengeCrypto>,
}

impl LazyChallengeCrypto {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cell: OnceLock::new(),
        }
    }

    /// The loaded credentials, reading the file on first call.
    pub fn get(&self) -> &ChallengeCrypto {
        self.cell.get_or_init(|| ChallengeCrypto::load(&self.path))
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn decode_registry_key(der_b64: &str) -> Result<x25519_dalek::PublicKey> {
    let der = STANDARD
        .decode(der_b64.trim())
        .map_err(|e| OndcError::InvalidKey(format!("registry key is not valid base64: {e}")))?;
    x25519_public_key_from_der(&der)
}

fn load_pair<T>(
    label: &str,
    record: &KeyPairRecord,
    decode: impl FnOnce(&KeyPairRecord) -> Result<T>,
) -> Option<T> {
    if record.private_key.trim().is_empty() || record.public_key.trim().is_empty() {
        log::warn!("{label} key pair is incomplete; treating as unavailable");
        return None;
    }
    match decode(record) {
        Ok(pair) => Some(pair),
        Err(e) => {
            log::error!("error loading {label} key pair: {e}");
            None
        }
    }
}

fn decode_b64_secret(value: &str, label: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value.trim())
        .map_err(|e| OndcError::InvalidKey(format!("{label} is not valid base64: {e}")))
}

fn decode_signing_pair(record: &KeyPairRecord) -> Result<Ed25519KeyPair> {
    let mut private = decode_b64_secret(&record.private_key, "signing private key")?;
    let pair = Ed25519KeyPair::from_private_encoding(&private);
    private.zeroize();
    let pair = pair?;

    let public = decode_b64_secret(&record.public_key, "signing public key")?;
    if public[..] != pair.verifying_key_bytes()[..] {
        return Err(OndcError::InvalidKey(
            "signing public key does not match the private key".into(),
        ));
    }
    Ok(pair)
}

fn decode_encryption_pair(record: &KeyPairRecord) -> Result<X25519KeyPair> {
    let mut private = decode_b64_secret(&record.private_key, "encryption private key")?;
    let pair = X25519KeyPair::from_private_encoding(&private);
    private.zeroize();
    let pair = pair?;

    let public = decode_b64_secret(&record.public_key, "encryption public key")?;
    // Accept the DER form ONDC registers as well as a bare 32-byte key.
    let matches = if public.len() == 32 {
        public[..] == pair.public_key_bytes()[..]
    } else {
        x25519_public_key_from_der(&public)?.as_bytes() == &pair.public_key_bytes()
    };
    if !matches {
        return Err(OndcError::InvalidKey(
            "encryption public key does not match the private key".into(),
        ));
    }
    Ok(pair)
}
