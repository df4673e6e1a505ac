//! Integration tests for the CLI binary.
//!
//! This test is registered as a [[test]] in the ondc-bap-cli crate so that
//! CARGO_BIN_EXE_ondc-bap is available.

use std::path::Path;
use std::process::{Command, Output};

/// Get a Command pointing to the `ondc-bap` binary, with all file output
/// confined to `dir`.
fn ondc_binary(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ondc-bap"));
    cmd.current_dir(dir)
        .env("ONDC_CREDENTIALS_PATH", dir.join("secrets/creds.json"))
        .env(
            "ONDC_SITE_VERIFICATION_PATH",
            dir.join("ondc-site-verification.html"),
        )
        .env_remove("ONDC_ENVIRONMENT")
        .env_remove("ONDC_SUBSCRIBER_ID");
    cmd
}

fn run(dir: &Path, args: &[&str]) -> Output {
    ondc_binary(dir)
        .args(args)
        .output()
        .expect("failed to execute ondc-bap")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn cli_responds_to_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["--help"]);

    assert!(
        output.status.success(),
        "--help should exit with success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let text = stdout(&output);
    assert!(text.contains("Usage"), "got: {text}");
    assert!(text.contains("keygen"), "got: {text}");
}

#[test]
fn cli_responds_to_version() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("0.1"));
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["--nonexistent-flag"]);
    assert!(!output.status.success());
}

#[test]
fn cli_rejects_unknown_environment() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["--environment", "qa", "show"]);
    assert!(!output.status.success());
}

#[test]
fn cli_keygen_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(
        dir.path(),
        &["keygen", "--subscriber-id", "buyer.example.com"],
    );
    assert!(
        output.status.success(),
        "keygen failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(dir.path().join("secrets/creds.json").exists());

    let html = std::fs::read_to_string(dir.path().join("ondc-site-verification.html")).unwrap();
    assert!(html.contains("ondc-site-verification"));
    assert!(!html.contains("not_generated"));

    let output = run(dir.path(), &["show"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("buyer.example.com"), "got: {text}");
    assert!(text.contains("Challenges (pre_prod): available"), "got: {text}");
    // Private keys never appear.
    let creds = std::fs::read_to_string(dir.path().join("secrets/creds.json")).unwrap();
    let creds: serde_json::Value = serde_json::from_str(&creds).unwrap();
    let private = creds["signing_keys"]["private_key"].as_str().unwrap();
    assert!(!text.contains(private));
}

#[test]
fn cli_keygen_refuses_overwrite_without_force() {
    let dir = tempfile::tempdir().unwrap();
    assert!(run(dir.path(), &["keygen"]).status.success());
    let before = std::fs::read(dir.path().join("secrets/creds.json")).unwrap();

    let output = run(dir.path(), &["keygen"]);
    assert!(!output.status.success());
    assert_eq!(
        std::fs::read(dir.path().join("secrets/creds.json")).unwrap(),
        before
    );

    assert!(run(dir.path(), &["keygen", "--force"]).status.success());
    assert_ne!(
        std::fs::read(dir.path().join("secrets/creds.json")).unwrap(),
        before
    );
}

#[test]
fn cli_sign_then_verify() {
    let dir = tempfile::tempdir().unwrap();
    assert!(run(dir.path(), &["keygen"]).status.success());

    let output = run(dir.path(), &["sign", "hello ondc"]);
    assert!(output.status.success());
    let signature = stdout(&output).trim().to_string();

    let output = run(dir.path(), &["verify", "hello ondc", &signature]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("valid"));

    let output = run(dir.path(), &["verify", "tampered", &signature]);
    assert!(!output.status.success());
}

#[test]
fn cli_self_test_passes_after_keygen() {
    let dir = tempfile::tempdir().unwrap();
    assert!(run(dir.path(), &["keygen"]).status.success());
    let output = run(dir.path(), &["self-test"]);
    assert!(
        output.status.success(),
        "self-test failed: {}",
        stdout(&output)
    );
}

#[test]
fn cli_without_credentials_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["sign", "x"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"), "got: {stderr}");

    let output = run(dir.path(), &["decrypt", "AAAA"]);
    assert!(!output.status.success());
}

#[test]
fn cli_answer_acknowledges_status_update() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["answer", "--body", r#"{"status":"SUBSCRIBED"}"#]);
    assert!(output.status.success());
    let reply: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(reply["status"], "ACK");
}

#[test]
fn cli_subscribe_payload_and_auth_header() {
    let dir = tempfile::tempdir().unwrap();
    assert!(run(dir.path(), &["keygen"]).status.success());

    let output = run(dir.path(), &["subscribe-payload", "--ops", "2"]);
    assert!(output.status.success());
    let payload: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(payload["context"]["operation"]["ops_no"], 2);
    assert_eq!(
        payload["message"]["network_participant"][0]["type"],
        "sellerApp"
    );

    let body_path = dir.path().join("body.json");
    std::fs::write(&body_path, stdout(&output)).unwrap();
    let output = run(
        dir.path(),
        &["auth-header", "--body-file", body_path.to_str().unwrap()],
    );
    assert!(output.status.success());
    let header = stdout(&output);
    assert!(header.starts_with("Signature keyId=\""));

    let signed = std::fs::read_to_string(dir.path().join("body.signed.json")).unwrap();
    assert!(ondc_bap::verify_authorization_header(
        header.trim(),
        &signed,
        &signing_public_key(dir.path()),
        ondc_bap::time::now_unix(),
    ));

    assert!(!run(dir.path(), &["subscribe-payload", "--ops", "3"])
        .status
        .success());
}

fn signing_public_key(dir: &Path) -> String {
    let creds = std::fs::read_to_string(dir.join("secrets/creds.json")).unwrap();
    let creds: serde_json::Value = serde_json::from_str(&creds).unwrap();
    creds["signing_keys"]["public_key"]
        .as_str()
        .unwrap()
        .to_string()
}

#[test]
fn cli_auth_header_signs_ascii_escaped_body() {
    let dir = tempfile::tempdir().unwrap();
    assert!(run(dir.path(), &["keygen"]).status.success());

    let body_path = dir.path().join("search.json");
    let body = "{\n  \"descriptor\": {\"name\": \"caf\u{e9} \u{20b9}\"}\n}\n";
    std::fs::write(&body_path, body).unwrap();
    let out_path = dir.path().join("out/body.json");
    std::fs::create_dir_all(out_path.parent().unwrap()).unwrap();

    let output = run(
        dir.path(),
        &[
            "auth-header",
            "--body-file",
            body_path.to_str().unwrap(),
            "--body-out",
            out_path.to_str().unwrap(),
        ],
    );
    assert!(output.status.success());

    // The bytes on disk are the ones the header signs, escaped as Python's json.dumps does.
    let signed = std::fs::read_to_string(&out_path).unwrap();
    assert_eq!(signed, r#"{"descriptor":{"name":"caf\u00e9 \u20b9"}}"#);
    assert!(ondc_bap::verify_authorization_header(
        stdout(&output).trim(),
        &signed,
        &signing_public_key(dir.path()),
        ondc_bap::time::now_unix(),
    ));
}

#[test]
fn cli_auth_header_rejects_overflowing_ttl() {
    let dir = tempfile::tempdir().unwrap();
    assert!(run(dir.path(), &["keygen"]).status.success());
    let body_path = dir.path().join("body.json");
    std::fs::write(&body_path, "{}").unwrap();

    let output = run(
        dir.path(),
        &[
            "auth-header",
            "--body-file",
            body_path.to_str().unwrap(),
            "--ttl",
            "9223372036854775807",
        ],
    );
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"), "unexpected stderr: {stderr}");
    assert!(stderr.contains("overflows"));
    assert!(!stderr.contains("panicked"));
}
