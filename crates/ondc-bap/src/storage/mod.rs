//! Storage layer for ONDC credentials and the site verification page.
//!
//! # Layout
//!
//! ```text
//! secrets/
//! └── ondc_credentials.json      signing + encryption key pairs, request id
//! ondc-site-verification.html    served from the subscriber's domain root
//! ```
//!
//! Both files are written atomically: a temporary sibling is written
//! first and then renamed over the target.

pub mod credential_file;

pub use credential_file::{
    load_credentials, save_credentials, CredentialFile, KeyPairRecord, RegistryKeys,
};

use std::path::Path;

use crate::error::Result;

/// Write the site verification page to `path`, replacing any previous one.
pub fn write_site_verification(path: &Path, html: &str) -> Result<()> {
    credential_file::write_atomic(path, html.as_bytes())?;
    log::info!("site verification page written to {}", path.display());
    Ok(())
}
