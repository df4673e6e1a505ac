//! Integration test: a full onboarding round against a simulated registry.
//!
//! Generates credentials, persists and reloads them, lets a "registry"
//! key pair seal challenges for each environment, and checks every
//! artifact a real registry would check.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::json;

use ondc_bap::auth::{verify_authorization_header, AuthorizationHeader};
use ondc_bap::challenge::{derive_peer_key, seal_challenge};
use ondc_bap::crypto::keys::X25519KeyPair;
use ondc_bap::crypto::random::random_iv;
use ondc_bap::storage::{load_credentials, save_credentials};
use ondc_bap::{
    generate_credentials, respond_on_subscribe, site_verification_html, ChallengeCrypto,
    Environment, LazyChallengeCrypto, OnSubscribeResponse, OndcConfig, Operation,
    SubscribePayload,
};

const SUBSCRIBER: &str = "buyer.example.com";

struct Registry {
    env: Environment,
    keys: X25519KeyPair,
}

impl Registry {
    fn new(env: Environment) -> Self {
        Self {
            env,
            keys: X25519KeyPair::generate(),
        }
    }

    fn public_der_b64(&self) -> String {
        STANDARD.encode(self.keys.public_key_der())
    }

    /// Seal `challenge` for the subscriber whose DER public key is given.
    fn challenge(&self, subscriber_public_der_b64: &str, challenge: &str) -> String {
        let key = derive_peer_key(&self.keys, subscriber_public_der_b64).unwrap();
        seal_challenge(&key, &random_iv(), challenge).unwrap()
    }
}

fn fixed_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_755_737_751, 0).unwrap()
}

#[test]
fn full_onboarding_round() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("secrets/ondc_credentials.json");

    // Step 1: keygen, with simulated registries in place of the published keys.
    let registries: Vec<Registry> = Environment::ALL.into_iter().map(Registry::new).collect();
    let mut credentials = generate_credentials(SUBSCRIBER);
    for registry in &registries {
        credentials
            .ondc_public_keys
            .set(registry.env, registry.public_der_b64());
    }
    save_credentials(&credentials, &path, false).unwrap();

    // Step 2: reload from disk.
    let reloaded = load_credentials(&path).unwrap().unwrap();
    assert_eq!(reloaded, credentials);
    let crypto = ChallengeCrypto::load(&path);
    assert!(crypto.is_configured());
    let our_public = crypto.encryption_public_key().unwrap().to_string();

    // Step 3: site verification carries a signature the registry can check.
    let html = site_verification_html(
        SUBSCRIBER,
        crypto.signed_request_id(),
        credentials.generated_at.as_deref(),
    );
    let signed = crypto.signed_request_id().unwrap();
    assert!(html.contains(signed));
    assert!(crypto.verify(
        crypto.request_id().unwrap(),
        signed,
        crypto.signing_public_key().unwrap()
    ));

    // Step 4: the subscribe payload advertises the loaded keys.
    let payload =
        SubscribePayload::build(&OndcConfig::default(), &crypto, Operation::BuyerApp, fixed_now())
            .unwrap();
    assert_eq!(
        payload.message.entity.key_pair.encryption_public_key,
        our_public
    );
    assert_eq!(payload.message.request_id, crypto.request_id().unwrap());

    // Step 5: each registry's challenge is answered only under its own key.
    for registry in &registries {
        let challenge_text = format!("challenge-for-{}", registry.env);
        let sealed = registry.challenge(&our_public, &challenge_text);
        let body = json!({"subscriber_id": SUBSCRIBER, "challenge": sealed});

        let reply = respond_on_subscribe(&crypto, registry.env, &body).unwrap();
        assert_eq!(
            reply,
            OnSubscribeResponse::Answer {
                answer: challenge_text.clone()
            }
        );

        for other in Environment::ALL.into_iter().filter(|e| *e != registry.env) {
            match crypto.decrypt_challenge(&sealed, other) {
                Ok(text) => assert_ne!(text, challenge_text),
                Err(e) => assert!(!e.is_unavailable(), "{other}: {e}"),
            }
        }
    }

    // Step 6: signed network calls carry a verifiable Authorization header.
    let body = serde_json::to_string(&payload).unwrap();
    let created = fixed_now().timestamp();
    let header = AuthorizationHeader::sign(
        crypto.signing_key_pair().unwrap(),
        SUBSCRIBER,
        crypto.unique_key_id().unwrap(),
        &body,
        created,
        created + 3600,
    )
    .unwrap()
    .to_header_value();
    assert!(verify_authorization_header(
        &header,
        &body,
        crypto.signing_public_key().unwrap(),
        created + 60
    ));
}

#[test]
fn service_starts_before_keys_exist() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ondc_credentials.json");

    let lazy = LazyChallengeCrypto::new(&path);
    let crypto = lazy.get();
    assert!(!crypto.is_configured());

    let reply = respond_on_subscribe(crypto, Environment::PreProd, &json!({"status": "INITIATED"}))
        .unwrap();
    assert!(matches!(reply, OnSubscribeResponse::Ack { .. }));

    let err = respond_on_subscribe(
        crypto,
        Environment::PreProd,
        &json!({"subscriber_id": SUBSCRIBER, "challenge": "AAAA"}),
    )
    .unwrap_err();
    assert!(err.is_unavailable());

    let html = site_verification_html(SUBSCRIBER, crypto.signed_request_id(), None);
    assert!(html.contains("not_generated"));
}

#[test]
fn published_registry_keys_are_usable() {
    let crypto = ChallengeCrypto::from_credentials(&generate_credentials(SUBSCRIBER));
    for env in Environment::ALL {
        let key = crypto.derive_shared_key(env).unwrap();
        assert_ne!(key.as_bytes(), &[0u8; 32]);
    }
    // Distinct registries yield distinct keys.
    let staging = crypto.derive_shared_key(Environment::Staging).unwrap();
    let prod = crypto.derive_shared_key(Environment::Prod).unwrap();
    assert_ne!(staging.as_bytes(), prod.as_bytes());
}

#[test]
fn shared_instance_crosses_threads() {
    let registry = Registry::new(Environment::Prod);
    let mut credentials = generate_credentials(SUBSCRIBER);
    credentials
        .ondc_public_keys
        .set(Environment::Prod, registry.public_der_b64());
    let crypto = Arc::new(ChallengeCrypto::from_credentials(&credentials));
    let sealed = registry.challenge(crypto.encryption_public_key().unwrap(), "threaded");

    let handle = {
        let crypto = Arc::clone(&crypto);
        std::thread::spawn(move || crypto.decrypt_challenge(&sealed, Environment::Prod).unwrap())
    };
    assert_eq!(handle.join().unwrap(), "threaded");
}
