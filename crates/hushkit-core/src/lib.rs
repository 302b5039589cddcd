//! HushKit Core
//!
//! Local cryptographic building blocks for a secret-handling tool.
//!
//! # Envelopes
//!
//! Text and binary payloads are sealed with AES-256-GCM under a key derived
//! from a passphrase (PBKDF2-SHA256 or Argon2id). The result is a
//! self-describing blob: everything needed to open it except the passphrase
//! travels inside.
//!
//! # Password hashes
//!
//! PHC-style `$alg$params$salt$digest` strings, verified in constant time.
//!
//! # Secret generation
//!
//! Passwords under hardening constraints, syllable passphrases from a
//! deterministic dictionary, and entropy analysis of user-chosen secrets.
//!
//! # Unlock throttling
//!
//! A pure state machine that escalates from human checks to exponential
//! lockouts after repeated failed unlocks.

pub mod config;
pub mod entropy;
pub mod envelope;
pub mod error;
pub mod generator;
pub mod passphrase;
pub mod password_hash;
pub mod primitives;
pub mod throttle;

pub use config::HushConfig;
pub use entropy::{analyze_secret, SecretAnalysis, SecretStrength};
pub use envelope::{
    open, open_bytes, open_bytes_with_aad, open_text, open_text_with_aad, seal, seal_bytes,
    seal_bytes_with_aad, seal_text, seal_text_with_aad, EnvelopeHeader, EnvelopeMetadata,
    KdfProfile, OpenedBytes, SealedBytes, SealedEnvelope,
};
pub use error::{HushError, Result};
pub use generator::{generate_password, HardeningConstraints};
pub use passphrase::{estimate_passphrase_entropy, generate_passphrase, PassphraseSettings};
pub use password_hash::{
    assess_password_hash_choice, hash_password, parse_password_hash, verify_password,
    HashOptions, HashScheme,
};
pub use primitives::{supports_argon2id, Argon2Params, KdfParams};
pub use throttle::{
    apply_unlock_failure, clear_unlock_failures, cooldown_seconds_for_failure_count,
    create_human_check_challenge, create_unlock_throttle_state, is_unlock_blocked,
    remaining_lockout_ms, should_require_human_check, verify_human_check, HumanCheckChallenge,
    ThrottlePolicy, UnlockThrottleState,
};
