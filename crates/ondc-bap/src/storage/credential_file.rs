//! Credential file: the JSON document holding this subscriber's ONDC
//! keys and registry bookkeeping identifiers.
//!
//! File format (JSON):
//! ```json
//! {
//!     "generated_at": "2025-08-21T00:55:51.000000+00:00",
//!     "subscriber_id": "neo-server.rozana.in",
//!     "request_id": "<uuid>",
//!     "signed_request_id": "<base64 Ed25519 signature of request_id>",
//!     "signing_keys": { "private_key": "<b64 seed>", "public_key": "<b64 raw>" },
//!     "encryption_keys": { "private_key": "<b64 scalar>", "public_key": "<b64 SPKI DER>" },
//!     "unique_key_id": "key_1755737751",
//!     "ondc_public_keys": { "staging": "<b64 DER>", "pre_prod": "<b64 DER>", "prod": "<b64 DER>" }
//! }
//! ```
//!
//! Every field is optional on load so a partially written file still
//! parses; whether the keys inside are usable is decided by
//! [`crate::challenge::ChallengeCrypto`].

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::environment::Environment;
use crate::error::{OndcError, Result};

/// A base64 `{private_key, public_key}` pair as stored on disk.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPairRecord {
    pub private_key: String,
    pub public_key: String,
}

impl fmt::Debug for KeyPairRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPairRecord")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Registry encryption public keys (base64 DER), one per environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_prod: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prod: Option<String>,
}

impl RegistryKeys {
    /// The stored key for `env`, ignoring blank entries.
    pub fn get(&self, env: Environment) -> Option<&str> {
        let slot = match env {
            Environment::Staging => &self.staging,
            Environment::PreProd => &self.pre_prod,
            Environment::Prod => &self.prod,
        };
        slot.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn set(&mut self, env: Environment, key_b64: impl Into<String>) {
        let slot = match env {
            Environment::Staging => &mut self.staging,
            Environment::PreProd => &mut self.pre_prod,
            Environment::Prod => &mut self.prod,
        };
        *slot = Some(key_b64.into());
    }
}

/// On-disk credential bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_keys: Option<KeyPairRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_keys: Option<KeyPairRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_key_id: Option<String>,
    #[serde(default)]
    pub ondc_public_keys: RegistryKeys,
}

impl CredentialFile {
    /// Parse a credential document from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            OndcError::InvalidFileFormat(format!("failed to parse credential file: {e}"))
        })
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| OndcError::Serialization(e.to_string()))
    }
}

/// Load the credential file at `path`.
///
/// Returns `Ok(None)` when the file does not exist, which callers treat
/// as "keys not generated yet".
///
/// # Errors
///
/// Returns `OndcError::InvalidFileFormat` for malformed JSON or
/// `OndcError::Io` for other filesystem errors.
pub fn load_credentials(path: &Path) -> Result<Option<CredentialFile>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    CredentialFile::from_json(&bytes).map(Some)
}

/// Save `credentials` to `path`.
///
/// Refuses to replace an existing file unless `overwrite` is set, since
/// replacing keys that are already registered breaks the subscription.
/// The write is atomic (temp file then rename) and creates parent
/// directories as needed.
pub fn save_credentials(credentials: &CredentialFile, path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        return Err(OndcError::AlreadyExists(path.display().to_string()));
    }
    let json = credentials.to_json()?;
    write_atomic(path, json.as_bytes())
}

/// Write `data` to `path` atomically using a sibling temporary file.
///
/// Each call uses its own randomly named temporary file, which is removed
/// again if the write or the rename fails.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    let suffix = u64::from_le_bytes(crate::crypto::random::random_bytes::<8>());
    tmp_name.push(format!(".{suffix:016x}.tmp"));
    let tmp_path = path.with_file_name(tmp_name);

    let result = std::fs::write(&tmp_path, data).and_then(|()| std::fs::rename(&tmp_path, path));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    Ok(())
}
