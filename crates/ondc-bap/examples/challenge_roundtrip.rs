//! Challenge round trip: generate subscriber credentials, play the
//! registry, and answer its challenge the way `/on_subscribe` does.
//!
//! Run with:
//!   cargo run --example challenge_roundtrip -p ondc-bap

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;

use ondc_bap::challenge::{derive_peer_key, seal_challenge};
use ondc_bap::crypto::keys::X25519KeyPair;
use ondc_bap::crypto::random::random_iv;
use ondc_bap::{generate_credentials, respond_on_subscribe, ChallengeCrypto, Environment};

fn main() -> ondc_bap::Result<()> {
    // ── 1. Subscriber credentials ───────────────────────────────────────────
    //
    // A real deployment keeps the published registry keys. Here one of them
    // is replaced by a key pair we control so we can play the registry.
    let registry = X25519KeyPair::generate();
    let mut credentials = generate_credentials("buyer.example.com");
    credentials
        .ondc_public_keys
        .set(Environment::PreProd, STANDARD.encode(registry.public_key_der()));
    let crypto = ChallengeCrypto::from_credentials(&credentials);

    println!("Subscriber credentials");
    println!("  Signing key:    {}", crypto.signing_public_key().unwrap_or("-"));
    println!("  Encryption key: {}", crypto.encryption_public_key().unwrap_or("-"));
    println!();

    // ── 2. Registry side ────────────────────────────────────────────────────
    //
    // The registry derives the same key from its secret and our DER public
    // key, then sends base64(IV || AES-256-CBC ciphertext).
    let subscriber_public = crypto.encryption_public_key().unwrap_or_default();
    let registry_key = derive_peer_key(&registry, subscriber_public)?;
    let challenge = seal_challenge(&registry_key, &random_iv(), "d6e8a1f2-challenge")?;
    println!("Registry challenge: {challenge}");

    // ── 3. Subscriber answers ───────────────────────────────────────────────
    let body = json!({"subscriber_id": "buyer.example.com", "challenge": challenge});
    let reply = respond_on_subscribe(&crypto, Environment::PreProd, &body)?;
    println!(
        "on_subscribe reply: {}",
        serde_json::to_string(&reply).unwrap_or_default()
    );

    Ok(())
}
