//! Credential generation for ONDC onboarding.
//!
//! Produces a fresh Ed25519 signing pair, a fresh X25519 encryption pair
//! (public half exported as SPKI DER), a request id and its signature
//! for site verification, and the registry's published encryption keys.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::crypto::keys::{Ed25519KeyPair, X25519KeyPair};
use crate::crypto::signing;
use crate::environment::Environment;
use crate::storage::credential_file::{CredentialFile, KeyPairRecord, RegistryKeys};

/// ONDC registry encryption public keys (base64 SPKI DER) as published
/// for each environment.
pub const PUBLISHED_REGISTRY_KEYS: [(Environment, &str); 3] = [
    (
        Environment::Staging,
        "MCowBQYDK2VuAyEAduMuZgmtpjdCuxv+Nc49K0cB6tL/Dj3HZetvVN7ZekM=",
    ),
    (
        Environment::PreProd,
        "MCowBQYDK2VuAyEAa9Wbpvd9SsrpOZFcynyt/TO3x0Yrqyys4NUGIvyxX2Q=",
    ),
    (
        Environment::Prod,
        "MCowBQYDK2VuAyEAvVEyZY91O2yV8w8/CAwVDAnqIZDJJUPdLUUKwLo3K0M=",
    ),
];

/// Registry keys pre-populated with [`PUBLISHED_REGISTRY_KEYS`].
pub fn published_registry_keys() -> RegistryKeys {
    let mut keys = RegistryKeys::default();
    for (env, key) in PUBLISHED_REGISTRY_KEYS {
        keys.set(env, key);
    }
    keys
}

/// Generate a complete credential bundle for `subscriber_id`.
pub fn generate_credentials(subscriber_id: &str) -> CredentialFile {
    generate_credentials_with(subscriber_id, &mut rand::thread_rng(), Utc::now())
}

/// Generate with an explicit RNG and clock.
pub fn generate_credentials_with<R: RngCore + CryptoRng>(
    subscriber_id: &str,
    rng: &mut R,
    now: DateTime<Utc>,
) -> CredentialFile {
    let signing_pair = Ed25519KeyPair::generate_with_rng(rng);
    let encryption_pair = X25519KeyPair::generate_with_rng(&mut *rng);

    let mut uuid_bytes = [0u8; 16];
    rng.fill_bytes(&mut uuid_bytes);
    let request_id = uuid::Builder::from_random_bytes(uuid_bytes)
        .into_uuid()
        .to_string();
    let signed_request_id =
        signing::sign_to_base64(signing_pair.signing_key(), request_id.as_bytes());

    let mut seed = signing_pair.seed_bytes();
    let mut scalar = encryption_pair.secret_bytes();
    let signing_keys = KeyPairRecord {
        private_key: STANDARD.encode(seed),
        public_key: STANDARD.encode(signing_pair.verifying_key_bytes()),
    };
    let encryption_keys = KeyPairRecord {
        private_key: STANDARD.encode(scalar),
        public_key: STANDARD.encode(encryption_pair.public_key_der()),
    };
    seed.zeroize();
    scalar.zeroize();

    CredentialFile {
        generated_at: Some(now.to_rfc3339()),
        subscriber_id: Some(subscriber_id.to_string()),
        request_id: Some(request_id),
        signed_request_id: Some(signed_request_id),
        signing_keys: Some(signing_keys),
        encryption_keys: Some(encryption_keys),
        unique_key_id: Some(format!("key_{}", now.timestamp())),
        ondc_public_keys: published_registry_keys(),
    }
}

/// The `ondc-site-verification.html` page the registry fetches from the
/// subscriber's domain root.
///
/// Without a signed request id the page carries `not_generated` so the
/// registry check fails visibly instead of matching stale content.
pub fn site_verification_html(
    subscriber_id: &str,
    signed_request_id: Option<&str>,
    generated_at: Option<&str>,
) -> String {
    match signed_request_id {
        Some(signed) => {
            let generated = generated_at
                .map(|g| format!("\n        <br>\n        Generated: {g}"))
                .unwrap_or_default();
            format!(
                "<html>\n    <head>\n        <meta name='ondc-site-verification' content='{signed}' />\n    </head>\n    <body>\n        ONDC Site Verification Page\n        <br>\n        Subscriber ID: {subscriber_id}{generated}\n    </body>\n</html>\n"
            )
        }
        None => format!(
            "<html>\n    <head>\n        <meta name='ondc-site-verification' content='not_generated' />\n    </head>\n    <body>\n        ONDC Site Verification Page\n        <br>\n        <strong>Note:</strong> Generate ONDC keys first to create proper verification file.\n        <br>\n        Subscriber ID: {subscriber_id}\n    </body>\n</html>\n"
        ),
    }
}
