//! ONDC buyer app CLI: `ondc-bap` command.
//!
//! Generates subscriber credentials, answers registry challenges, and
//! produces the signed artifacts needed for ONDC onboarding.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ondc_bap::auth::AuthorizationHeader;
use ondc_bap::challenge::{derive_peer_key, seal_challenge};
use ondc_bap::crypto::keys::X25519KeyPair;
use ondc_bap::crypto::random::random_iv;
use ondc_bap::storage::{load_credentials, save_credentials, write_site_verification};
use ondc_bap::subscribe::respond_on_subscribe;
use ondc_bap::time::now_unix;
use ondc_bap::{
    generate_credentials, site_verification_html, ChallengeCrypto, Environment, OndcConfig,
    Operation, SubscribePayload,
};

// ── CLI structure ─────────────────────────────────────────────────────────────

/// ONDC buyer app CLI: manage subscriber keys and registry onboarding.
#[derive(Parser, Debug)]
#[command(
    name = "ondc-bap",
    about = "ONDC buyer app CLI",
    version,
    long_about = "ondc-bap: ONDC buyer app CLI\n\nGenerate subscriber keys, decrypt registry challenges, sign requests,\nand build the payloads needed to subscribe to the ONDC registry."
)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Credential file (overrides configuration)
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    /// Registry environment: staging, pre_prod or prod (overrides configuration)
    #[arg(long, global = true)]
    environment: Option<Environment>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a new credential file and site verification page
    Keygen {
        /// Subscriber id (defaults to the configured one)
        #[arg(long)]
        subscriber_id: Option<String>,

        /// Replace an existing credential file
        #[arg(long)]
        force: bool,
    },

    /// Show the loaded credentials (public material only)
    Show,

    /// Decrypt a base64 registry challenge
    Decrypt {
        /// Encrypted challenge, base64(IV || ciphertext)
        challenge: String,
    },

    /// Produce the reply to an on_subscribe callback body
    Answer {
        /// Callback body as JSON (reads stdin when omitted)
        #[arg(long)]
        body: Option<String>,
    },

    /// Sign data with the subscriber signing key
    Sign {
        /// Text to sign
        data: String,
    },

    /// Verify a base64 Ed25519 signature
    Verify {
        /// Signed text
        data: String,

        /// Base64 signature
        signature: String,

        /// Base64 public key (defaults to the subscriber's own)
        #[arg(long)]
        public_key: Option<String>,
    },

    /// Print the registry /subscribe request body
    SubscribePayload {
        /// Operation: 1 (buyer app), 2 (seller app) or 4 (both)
        #[arg(long, default_value_t = 1)]
        ops: u8,
    },

    /// Build an Authorization header for a request body
    AuthHeader {
        /// File holding the JSON request body
        #[arg(long)]
        body_file: PathBuf,

        /// Header lifetime in seconds (defaults to configuration)
        #[arg(long)]
        ttl: Option<i64>,

        /// Where to write the exact signed body (defaults to `<body-file>.signed.json`)
        #[arg(long)]
        body_out: Option<PathBuf>,
    },

    /// Write the ondc-site-verification.html page
    SiteVerification {
        /// Output path (defaults to configuration)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Check that the loaded credentials can sign, verify and decrypt challenges
    SelfTest,
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let verbose = cli.verbose;

    let result = load_config(&cli).and_then(|config| match cli.command {
        Commands::Keygen {
            subscriber_id,
            force,
        } => cmd_keygen(&config, subscriber_id.as_deref(), force, verbose),
        Commands::Show => cmd_show(&config, verbose),
        Commands::Decrypt { challenge } => cmd_decrypt(&config, &challenge, verbose),
        Commands::Answer { body } => cmd_answer(&config, body.as_deref(), verbose),
        Commands::Sign { data } => cmd_sign(&config, &data, verbose),
        Commands::Verify {
            data,
            signature,
            public_key,
        } => cmd_verify(&config, &data, &signature, public_key.as_deref(), verbose),
        Commands::SubscribePayload { ops } => cmd_subscribe_payload(&config, ops, verbose),
        Commands::AuthHeader {
            body_file,
            ttl,
            body_out,
        } => cmd_auth_header(&config, &body_file, ttl, body_out.as_deref(), verbose),
        Commands::SiteVerification { output } => {
            cmd_site_verification(&config, output.as_deref(), verbose)
        }
        Commands::SelfTest => cmd_self_test(&config, verbose),
    });

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<OndcConfig> {
    let mut config =
        OndcConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(ref path) = cli.credentials {
        config.credentials_path = path.clone();
    }
    if let Some(env) = cli.environment {
        config.environment = env;
    }
    log::debug!(
        "using credentials {} for {}",
        config.credentials_path.display(),
        config.environment
    );
    Ok(config)
}

fn load_crypto(config: &OndcConfig) -> ChallengeCrypto {
    ChallengeCrypto::load(&config.credentials_path)
}

// ── Command implementations ───────────────────────────────────────────────────

/// `ondc-bap keygen [--subscriber-id ID] [--force]`
fn cmd_keygen(
    config: &OndcConfig,
    subscriber_id: Option<&str>,
    force: bool,
    verbose: bool,
) -> Result<()> {
    let subscriber_id = subscriber_id.unwrap_or(config.subscriber_id.as_str());
    let path = &config.credentials_path;

    let credentials = generate_credentials(subscriber_id);
    save_credentials(&credentials, path, force).with_context(|| {
        format!(
            "failed to save credentials to {} (use --force to replace)",
            path.display()
        )
    })?;

    let html = site_verification_html(
        subscriber_id,
        credentials.signed_request_id.as_deref(),
        credentials.generated_at.as_deref(),
    );
    write_site_verification(&config.site_verification_path, &html)
        .context("failed to write site verification page")?;

    println!("Generated ONDC credentials for '{subscriber_id}'");
    println!("  File:          {}", path.display());
    println!(
        "  Unique key id: {}",
        credentials.unique_key_id.as_deref().unwrap_or("-")
    );
    println!(
        "  Request id:    {}",
        credentials.request_id.as_deref().unwrap_or("-")
    );
    println!(
        "  Verification:  {}",
        config.site_verification_path.display()
    );

    if verbose {
        if let Some(ref keys) = credentials.signing_keys {
            println!("  Signing key:    {}", keys.public_key);
        }
        if let Some(ref keys) = credentials.encryption_keys {
            println!("  Encryption key: {}", keys.public_key);
        }
    }

    Ok(())
}

/// `ondc-bap show`
fn cmd_show(config: &OndcConfig, verbose: bool) -> Result<()> {
    let path = &config.credentials_path;
    let credentials = load_credentials(path)
        .context("failed to read credential file")?
        .ok_or_else(|| anyhow!("no credentials at {} (run `keygen` first)", path.display()))?;
    let crypto = ChallengeCrypto::from_credentials(&credentials);
    let availability = crypto.availability();

    let or_dash = |v: Option<&str>| v.unwrap_or("-").to_string();
    println!("Credentials: {}", path.display());
    println!("  Subscriber:     {}", or_dash(crypto.subscriber_id()));
    println!("  Unique key id:  {}", or_dash(crypto.unique_key_id()));
    println!("  Request id:     {}", or_dash(crypto.request_id()));
    println!("  Signing key:    {}", or_dash(crypto.signing_public_key()));
    println!("  Encryption key: {}", or_dash(crypto.encryption_public_key()));
    println!(
        "  Signing:        {}",
        if availability.signing { "available" } else { "UNAVAILABLE" }
    );
    for env in Environment::ALL {
        let status = if availability.can_decrypt(env) {
            "available"
        } else {
            "UNAVAILABLE"
        };
        println!("  Challenges ({env}): {status}");
    }

    if verbose {
        println!(
            "  Generated:      {}",
            credentials.generated_at.as_deref().unwrap_or("-")
        );
        println!(
            "  Signed request: {}",
            credentials.signed_request_id.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

/// `ondc-bap decrypt CHALLENGE`
fn cmd_decrypt(config: &OndcConfig, challenge: &str, verbose: bool) -> Result<()> {
    let crypto = load_crypto(config);
    let answer = crypto
        .decrypt_challenge(challenge, config.environment)
        .context("failed to decrypt challenge")?;
    if verbose {
        eprintln!("decrypted with the {} registry key", config.environment);
    }
    println!("{answer}");
    Ok(())
}

/// `ondc-bap answer [--body JSON]`
fn cmd_answer(config: &OndcConfig, body: Option<&str>, verbose: bool) -> Result<()> {
    let raw = match body {
        Some(b) => b.to_string(),
        None => std::io::read_to_string(std::io::stdin()).context("failed to read stdin")?,
    };
    let body: serde_json::Value =
        serde_json::from_str(&raw).context("callback body is not valid JSON")?;

    let crypto = load_crypto(config);
    let reply = respond_on_subscribe(&crypto, config.environment, &body)?;
    if verbose {
        eprintln!("environment: {}", config.environment);
    }
    println!("{}", serde_json::to_string(&reply)?);
    Ok(())
}

/// `ondc-bap sign DATA`
fn cmd_sign(config: &OndcConfig, data: &str, verbose: bool) -> Result<()> {
    let crypto = load_crypto(config);
    let signature = crypto.sign(data)?;
    println!("{signature}");
    if verbose {
        if let Some(key) = crypto.signing_public_key() {
            eprintln!("public key: {key}");
        }
    }
    Ok(())
}

/// `ondc-bap verify DATA SIGNATURE [--public-key KEY]`
fn cmd_verify(
    config: &OndcConfig,
    data: &str,
    signature: &str,
    public_key: Option<&str>,
    verbose: bool,
) -> Result<()> {
    let crypto = load_crypto(config);
    let public_key = match public_key {
        Some(key) => key.to_string(),
        None => crypto
            .signing_public_key()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("no --public-key given and no signing key loaded"))?,
    };
    if verbose {
        eprintln!("public key: {public_key}");
    }

    if crypto.verify(data, signature, &public_key) {
        println!("Signature: valid");
        Ok(())
    } else {
        bail!("signature is not valid")
    }
}

/// `ondc-bap subscribe-payload [--ops N]`
fn cmd_subscribe_payload(config: &OndcConfig, ops: u8, verbose: bool) -> Result<()> {
    let operation = Operation::try_from(ops)?;
    let crypto = load_crypto(config);
    let payload = SubscribePayload::build(config, &crypto, operation, chrono::Utc::now())?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    if verbose {
        eprintln!("POST {}", config.environment.subscribe_url());
    }
    Ok(())
}

/// `ondc-bap auth-header --body-file PATH [--ttl SECS] [--body-out PATH]`
fn cmd_auth_header(
    config: &OndcConfig,
    body_file: &Path,
    ttl: Option<i64>,
    body_out: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let raw = std::fs::read_to_string(body_file)
        .with_context(|| format!("failed to read {}", body_file.display()))?;
    let body: serde_json::Value =
        serde_json::from_str(&raw).context("request body is not valid JSON")?;
    // The digest covers these exact bytes; the request must send them unchanged.
    let minified = ondc_bap::auth::minify_body(&body)?;

    let crypto = load_crypto(config);
    let keys = crypto
        .signing_key_pair()
        .ok_or_else(|| anyhow!("signing key pair not loaded (run `keygen` first)"))?;
    let unique_key_id = crypto
        .unique_key_id()
        .ok_or_else(|| anyhow!("credential file has no unique_key_id"))?;

    let created = now_unix();
    let ttl = ttl.unwrap_or(config.auth_ttl_secs);
    let expires = created
        .checked_add(ttl)
        .ok_or_else(|| anyhow!("ttl {ttl} overflows the expiry timestamp"))?;
    let header = AuthorizationHeader::sign(
        keys,
        &config.subscriber_id,
        unique_key_id,
        &minified,
        created,
        expires,
    )?;

    let signed_path = body_out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| body_file.with_extension("signed.json"));
    std::fs::write(&signed_path, &minified)
        .with_context(|| format!("failed to write {}", signed_path.display()))?;

    println!("{}", header.to_header_value());
    eprintln!("signed body: {}", signed_path.display());
    if verbose {
        eprintln!("body: {minified}");
    }
    Ok(())
}

/// `ondc-bap site-verification [--output PATH]`
fn cmd_site_verification(config: &OndcConfig, output: Option<&Path>, verbose: bool) -> Result<()> {
    let path = output.unwrap_or(config.site_verification_path.as_path());
    let credentials = load_credentials(&config.credentials_path)
        .context("failed to read credential file")?
        .unwrap_or_default();

    let subscriber_id = credentials
        .subscriber_id
        .as_deref()
        .unwrap_or(config.subscriber_id.as_str());
    let html = site_verification_html(
        subscriber_id,
        credentials.signed_request_id.as_deref(),
        credentials.generated_at.as_deref(),
    );
    write_site_verification(path, &html)?;

    println!("Wrote {}", path.display());
    if credentials.signed_request_id.is_none() {
        println!("  Note: no signed request id yet; the page is a placeholder");
    }
    if verbose {
        println!("{html}");
    }
    Ok(())
}

/// `ondc-bap self-test`
fn cmd_self_test(config: &OndcConfig, verbose: bool) -> Result<()> {
    let crypto = load_crypto(config);
    let mut failures = 0;

    let mut check = |name: &str, outcome: Result<()>| match outcome {
        Ok(()) => println!("  [ok]   {name}"),
        Err(e) => {
            failures += 1;
            println!("  [FAIL] {name}: {e}");
        }
    };

    println!("Self-test: {}", config.credentials_path.display());

    check(
        "sign and verify",
        (|| {
            let public = crypto
                .signing_public_key()
                .ok_or_else(|| anyhow!("signing key not loaded"))?;
            let probe = format!("self-test {}", now_unix());
            let signature = crypto.sign(&probe)?;
            if !crypto.verify(&probe, &signature, public) {
                bail!("fresh signature did not verify");
            }
            Ok(())
        })(),
    );

    check(
        "signed request id",
        (|| {
            let (Some(request_id), Some(signed), Some(public)) = (
                crypto.request_id(),
                crypto.signed_request_id(),
                crypto.signing_public_key(),
            ) else {
                bail!("request id, signature or key missing");
            };
            if !crypto.verify(request_id, signed, public) {
                bail!("stored signature does not match the request id");
            }
            Ok(())
        })(),
    );

    check(
        "challenge round trip",
        (|| {
            let mut credentials = load_credentials(&config.credentials_path)?
                .ok_or_else(|| anyhow!("credential file not found"))?;
            let our_public = crypto
                .encryption_public_key()
                .ok_or_else(|| anyhow!("encryption key not loaded"))?;

            // Stand in for the registry with a throwaway key pair.
            let registry = X25519KeyPair::generate();
            credentials
                .ondc_public_keys
                .set(config.environment, STANDARD.encode(registry.public_key_der()));
            let local = ChallengeCrypto::from_credentials(&credentials);

            let probe = format!("self-test-{}", now_unix());
            let registry_key = derive_peer_key(&registry, our_public)?;
            let sealed = seal_challenge(&registry_key, &random_iv(), &probe)?;
            if local.decrypt_challenge(&sealed, config.environment)? != probe {
                bail!("decrypted challenge does not match");
            }
            Ok(())
        })(),
    );

    for env in Environment::ALL {
        check(
            &format!("shared key ({env})"),
            crypto
                .derive_shared_key(env)
                .map(|_| ())
                .map_err(anyhow::Error::from),
        );
    }

    if verbose {
        println!("  Availability: {:?}", crypto.availability());
    }

    if failures > 0 {
        bail!("{failures} check(s) failed");
    }
    println!("All checks passed");
    Ok(())
}
