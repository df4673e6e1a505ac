//! Stress test: one credential set shared across threads, decrypting and
//! signing concurrently.

use std::sync::{Arc, Barrier};
use std::thread;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use ondc_bap::challenge::{derive_peer_key, seal_challenge};
use ondc_bap::crypto::keys::X25519KeyPair;
use ondc_bap::storage::save_credentials;
use ondc_bap::{generate_credentials, ChallengeCrypto, Environment, LazyChallengeCrypto};

const THREADS: usize = 8;
const PER_THREAD: usize = 100;

fn setup() -> (ChallengeCrypto, X25519KeyPair) {
    let registry = X25519KeyPair::generate();
    let mut credentials = generate_credentials("stress.example.com");
    credentials
        .ondc_public_keys
        .set(Environment::Staging, STANDARD.encode(registry.public_key_der()));
    (ChallengeCrypto::from_credentials(&credentials), registry)
}

#[test]
fn stress_concurrent_decrypt_800_challenges() {
    let (crypto, registry) = setup();
    let registry_key = derive_peer_key(&registry, crypto.encryption_public_key().unwrap()).unwrap();

    let mut sealed = Vec::with_capacity(THREADS * PER_THREAD);
    for i in 0..THREADS * PER_THREAD {
        let iv = [(i % 256) as u8; 16];
        sealed.push(seal_challenge(&registry_key, &iv, &format!("challenge {i}")).unwrap());
    }
    let sealed = Arc::new(sealed);
    let crypto = Arc::new(crypto);

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let crypto = Arc::clone(&crypto);
            let sealed = Arc::clone(&sealed);
            thread::spawn(move || {
                for i in t * PER_THREAD..(t + 1) * PER_THREAD {
                    let answer = crypto
                        .decrypt_challenge(&sealed[i], Environment::Staging)
                        .expect("decryption should succeed");
                    assert_eq!(answer, format!("challenge {i}"));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("thread panicked");
    }
}

#[test]
fn stress_concurrent_sign_verify() {
    let (crypto, _) = setup();
    let crypto = Arc::new(crypto);
    let public = crypto.signing_public_key().unwrap().to_string();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let crypto = Arc::clone(&crypto);
            let public = public.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let data = format!("thread {t} message {i}");
                    let signature = crypto.sign(&data).expect("signing should succeed");
                    assert!(crypto.verify(&data, &signature, &public));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("thread panicked");
    }
}

#[test]
fn stress_concurrent_derivation_is_stable() {
    let (crypto, _) = setup();
    let crypto = Arc::new(crypto);
    let expected = *crypto
        .derive_shared_key(Environment::Staging)
        .unwrap()
        .as_bytes();

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let crypto = Arc::clone(&crypto);
            thread::spawn(move || {
                (0..PER_THREAD)
                    .map(|_| *crypto.derive_shared_key(Environment::Staging).unwrap().as_bytes())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        for key in handle.join().expect("thread panicked") {
            assert_eq!(key, expected);
        }
    }
}

#[test]
fn stress_lazy_first_use_from_many_threads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("creds.json");
    save_credentials(&generate_credentials("lazy.example.com"), &path, false).unwrap();

    let lazy = Arc::new(LazyChallengeCrypto::new(&path));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let lazy = Arc::clone(&lazy);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let crypto = lazy.get();
                assert!(crypto.is_configured());
                crypto as *const ChallengeCrypto as usize
            })
        })
        .collect();

    let addresses: Vec<usize> = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .collect();
    assert!(addresses.windows(2).all(|w| w[0] == w[1]));
}
