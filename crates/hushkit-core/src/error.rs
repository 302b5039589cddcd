//! Error taxonomy shared by every codec and generator in the core.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HushError {
    /// Wrong passphrase or tampered data. Carries no detail on purpose:
    /// the two causes must look identical to the caller.
    #[error("Authentication failed: wrong passphrase or corrupted data")]
    Authentication,
    #[error("Invalid format: {0}")]
    Format(String),
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Secure random source unavailable: {0}")]
    EntropySource(String),
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

impl HushError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication)
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }
}

pub type Result<T> = std::result::Result<T, HushError>;
