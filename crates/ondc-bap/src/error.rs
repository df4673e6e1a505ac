//! Error types for the ONDC buyer app core.
//!
//! All errors are strongly typed and propagated without panicking.
//! Private key material is never included in error messages.

/// Coarse classification of an [`OndcError`].
///
/// Lets callers distinguish "not configured" from "bad input" without
/// matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Required key material is absent. Generate or install credentials.
    Unavailable,
    /// The caller supplied something undecodable. Do not retry as-is.
    MalformedInput,
    /// Reading or writing the credential store failed.
    Storage,
}

/// Error types covering all operations.
#[derive(Debug, thiserror::Error)]
pub enum OndcError {
    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Unknown environment: {0} (expected staging, pre_prod or prod)")]
    UnknownEnvironment(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Credentials already exist at {0}")]
    AlreadyExists(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OndcError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OndcError::Unavailable(_) => ErrorKind::Unavailable,
            OndcError::MalformedInput(_)
            | OndcError::UnknownEnvironment(_)
            | OndcError::InvalidKey(_) => ErrorKind::MalformedInput,
            OndcError::Serialization(_)
            | OndcError::InvalidFileFormat(_)
            | OndcError::AlreadyExists(_)
            | OndcError::Io(_) => ErrorKind::Storage,
        }
    }

    /// True when the failure means "keys not generated yet".
    pub fn is_unavailable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, OndcError>;
