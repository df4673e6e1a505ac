//! ONDC buyer app core: subscriber key material and registry onboarding.
//!
//! Decrypts registry challenges (X25519 + HKDF-SHA256 + AES-256-CBC),
//! signs and verifies with Ed25519, generates and stores credentials,
//! and builds the payloads and headers the ONDC registry expects.

pub mod auth;
pub mod challenge;
pub mod config;
pub mod crypto;
pub mod environment;
pub mod error;
pub mod keygen;
pub mod storage;
pub mod subscribe;
pub mod time;

// Re-export primary types
pub use auth::{verify_authorization_header, AuthorizationHeader};
pub use challenge::{Availability, ChallengeCrypto, LazyChallengeCrypto};
pub use config::{EntityConfig, OndcConfig};
pub use crypto::SharedKey;
pub use environment::Environment;
pub use error::{ErrorKind, OndcError, Result};
pub use keygen::{generate_credentials, site_verification_html};
pub use storage::{CredentialFile, KeyPairRecord, RegistryKeys};
pub use subscribe::{
    lookup_signing_string, respond_on_subscribe, LookupParameters, OnSubscribeResponse, Operation,
    SubscribePayload,
};
