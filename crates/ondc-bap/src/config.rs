//! Subscriber configuration.
//!
//! Sources, later overriding earlier: built-in defaults, an optional JSON
//! file, then `ONDC_*` environment variables. The CLI applies its own
//! flags on top.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::environment::Environment;
use crate::error::{OndcError, Result};

/// Legal entity details submitted with a registry subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    pub legal_entity_name: String,
    pub business_address: String,
    pub gst_no: String,
    pub pan_no: String,
    pub name_as_per_pan: String,
    /// `DD/MM/YYYY`, as the registry expects.
    pub date_of_incorporation: String,
    pub name_of_authorised_signatory: String,
    pub address_of_authorised_signatory: String,
    pub email_id: String,
    pub mobile_no: u64,
}

/// Configuration for one ONDC subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OndcConfig {
    pub subscriber_id: String,
    pub subscriber_url: String,
    /// Path of the subscription callback, relative to `subscriber_url`.
    pub callback_url: String,
    pub domain: String,
    pub country: String,
    pub city_codes: Vec<String>,
    /// Registry whose challenges `on_subscribe` decrypts.
    pub environment: Environment,
    pub credentials_path: PathBuf,
    pub site_verification_path: PathBuf,
    /// Validity window advertised for the registered key pair.
    pub key_validity_days: u32,
    /// Lifetime of generated authorization headers.
    pub auth_ttl_secs: i64,
    pub entity: EntityConfig,
}

impl Default for OndcConfig {
    fn default() -> Self {
        Self {
            subscriber_id: "neo-server.rozana.in".to_string(),
            subscriber_url: "https://neo-server.rozana.in".to_string(),
            callback_url: "/on_subscribe".to_string(),
            domain: "ONDC:RET10".to_string(),
            country: "IND".to_string(),
            city_codes: vec!["std:080".to_string(), "std:011".to_string()],
            environment: Environment::PreProd,
            credentials_path: PathBuf::from("secrets/ondc_credentials.json"),
            site_verification_path: PathBuf::from("ondc-site-verification.html"),
            key_validity_days: 365,
            auth_ttl_secs: 3600,
            entity: EntityConfig::default(),
        }
    }
}

impl OndcConfig {
    /// Defaults, then `file` if given, then the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            OndcError::InvalidFileFormat(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Override fields from `ONDC_*` variables returned by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("ONDC_SUBSCRIBER_ID") {
            self.subscriber_id = v;
        }
        if let Some(v) = var("ONDC_SUBSCRIBER_URL") {
            self.subscriber_url = v;
        }
        if let Some(v) = var("ONDC_CALLBACK_URL") {
            self.callback_url = v;
        }
        if let Some(v) = var("ONDC_DOMAIN") {
            self.domain = v;
        }
        if let Some(v) = var("ONDC_CITY_CODES") {
            self.city_codes = v
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = var("ONDC_ENVIRONMENT") {
            self.environment = v.trim().parse()?;
        }
        if let Some(v) = var("ONDC_CREDENTIALS_PATH") {
            self.credentials_path = PathBuf::from(v);
        }
        if let Some(v) = var("ONDC_SITE_VERIFICATION_PATH") {
            self.site_verification_path = PathBuf::from(v);
        }
        Ok(())
    }
}
