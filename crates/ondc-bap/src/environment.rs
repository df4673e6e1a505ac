//! ONDC registry environments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{OndcError, Result};

/// One of the three ONDC registry deployments.
///
/// Each environment has its own registry encryption key, so the shared
/// key derived for one cannot decrypt challenges from another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Staging,
    PreProd,
    Prod,
}

impl Environment {
    /// All environments in registry promotion order.
    pub const ALL: [Environment; 3] = [
        Environment::Staging,
        Environment::PreProd,
        Environment::Prod,
    ];

    /// The name used in credential files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Staging => "staging",
            Environment::PreProd => "pre_prod",
            Environment::Prod => "prod",
        }
    }

    /// Registry endpoint accepting `/subscribe` requests.
    pub fn subscribe_url(&self) -> &'static str {
        match self {
            Environment::Staging => "https://staging.registry.ondc.org/subscribe",
            Environment::PreProd => "https://preprod.registry.ondc.org/ondc/subscribe",
            Environment::Prod => "https://prod.registry.ondc.org/subscribe",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = OndcError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "staging" => Ok(Environment::Staging),
            "pre_prod" => Ok(Environment::PreProd),
            "prod" => Ok(Environment::Prod),
            other => Err(OndcError::UnknownEnvironment(other.to_string())),
        }
    }
}
