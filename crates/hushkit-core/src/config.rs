//! Toolkit configuration, parsed from TOML.
//!
//! Every section and field has a default, so an empty document is a valid
//! configuration. Reading the document from disk is left to the caller.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::envelope::KdfProfile;
use crate::error::{HushError, Result};
use crate::generator::HardeningConstraints;
use crate::passphrase::PassphraseSettings;
use crate::password_hash::{assess_password_hash_choice, HashSafety, HashScheme};
use crate::primitives::supports_argon2id;
use crate::throttle::ThrottlePolicy;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HushConfig {
    pub envelope: EnvelopeSection,
    pub password_hash: PasswordHashSection,
    pub generator: HardeningConstraints,
    pub passphrase: PassphraseSettings,
    pub throttle: ThrottlePolicy,
}

/// Envelope sealing defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeSection {
    /// Key-derivation tier for new envelopes
    pub profile: KdfProfile,
}

/// Password hashing defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordHashSection {
    /// Scheme used for new hashes. Verification always follows the stored
    /// hash string instead.
    pub scheme: HashScheme,
}

impl HushConfig {
    /// Parse a TOML document. Does not validate.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| HushError::Configuration(format!("failed to parse TOML config: {}", e)))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self)
            .map_err(|e| HushError::Configuration(format!("failed to serialize config: {}", e)))
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if let Some(problem) = self.envelope.profile.params().bounds_violation() {
            return Err(section_error("envelope.profile", problem));
        }

        let scheme = &self.password_hash.scheme;
        if let Some(problem) = scheme.kdf().and_then(|kdf| kdf.bounds_violation()) {
            return Err(section_error("password_hash.scheme", problem));
        }
        let assessment = assess_password_hash_choice(scheme);
        let unavailable = matches!(scheme, HashScheme::Argon2id(_)) && !supports_argon2id();
        if assessment.safety == HashSafety::Weak && !unavailable {
            warn!("Rejecting weak password_hash.scheme {}", scheme.tag());
            return Err(section_error(
                "password_hash.scheme",
                assessment.warnings.join("; "),
            ));
        }
        for warning in &assessment.warnings {
            warn!("password_hash.scheme: {}", warning);
        }

        self.generator
            .validate()
            .map_err(|e| nested_error("generator", e))?;
        self.passphrase
            .validate()
            .map_err(|e| nested_error("passphrase", e))?;
        self.throttle
            .validate()
            .map_err(|e| nested_error("throttle", e))?;

        Ok(())
    }
}

fn section_error(section: &str, problem: impl std::fmt::Display) -> HushError {
    HushError::Configuration(format!("{}: {}", section, problem))
}

fn nested_error(section: &str, e: HushError) -> HushError {
    match e {
        HushError::Configuration(msg) => section_error(section, msg),
        other => other,
    }
}
