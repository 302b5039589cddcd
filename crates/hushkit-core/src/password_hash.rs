//! Self-describing password hashes
//!
//! Encodes a hash record as a single `$`-delimited string whose first field
//! names the algorithm, followed by its cost parameters, the salt and the
//! digest (standard base64, no padding):
//!
//! | Scheme        | Encoding                                              |
//! |---------------|-------------------------------------------------------|
//! | SHA-256       | `$sha256$<salt>$<digest>`                             |
//! | SHA-512       | `$sha512$<salt>$<digest>`                             |
//! | PBKDF2-SHA256 | `$pbkdf2-sha256$i=<iterations>$<salt>$<digest>`       |
//! | Argon2id      | `$argon2id$v=19$m=<kib>,t=<passes>,p=<lanes>$<salt>$<digest>` |
//!
//! The salted SHA schemes exist only to verify credentials created by older
//! tooling. [`assess_password_hash_choice`] flags them as weak.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{HushError, Result};
use crate::primitives::{derive_key, random_bytes, Argon2Params, KdfParams};

pub use crate::primitives::supports_argon2id;

/// Salt length for every scheme
pub const HASH_SALT_LEN: usize = 16;

/// PBKDF2 below this is weak
pub const PBKDF2_MIN_ITERATIONS: u32 = 100_000;

/// PBKDF2 at or above this is strong
pub const PBKDF2_RECOMMENDED_ITERATIONS: u32 = 600_000;

/// Argon2id minimums for a strong rating
pub const ARGON2_MIN_MEMORY_KIB: u32 = 19 * 1024;
pub const ARGON2_MIN_PASSES: u32 = 2;

const ARGON2_VERSION_FIELD: &str = "v=19";

/// Hash algorithm together with its cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "kebab-case")]
pub enum HashScheme {
    /// Legacy: SHA-256(salt || password)
    Sha256,
    /// Legacy: SHA-512(salt || password)
    Sha512,
    Pbkdf2Sha256 { iterations: u32 },
    Argon2id(Argon2Params),
}

impl Default for HashScheme {
    fn default() -> Self {
        Self::Pbkdf2Sha256 {
            iterations: PBKDF2_RECOMMENDED_ITERATIONS,
        }
    }
}

impl HashScheme {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Pbkdf2Sha256 { .. } => "pbkdf2-sha256",
            Self::Argon2id(_) => "argon2id",
        }
    }

    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha512 => 64,
            _ => 32,
        }
    }

    pub(crate) fn kdf(&self) -> Option<KdfParams> {
        match *self {
            Self::Sha256 | Self::Sha512 => None,
            Self::Pbkdf2Sha256 { iterations } => Some(KdfParams::Pbkdf2Sha256 { iterations }),
            Self::Argon2id(p) => Some(KdfParams::Argon2id(p)),
        }
    }

    /// Swap Argon2id for recommended PBKDF2 when this build lacks it.
    /// The returned notice is `Some` exactly when a downgrade happened.
    pub fn with_fallback(self) -> (Self, Option<String>) {
        if matches!(self, Self::Argon2id(_)) && !supports_argon2id() {
            let notice = format!(
                "argon2id is not available in this build; using pbkdf2-sha256 with {} iterations instead",
                PBKDF2_RECOMMENDED_ITERATIONS
            );
            warn!("{}", notice);
            return (Self::default(), Some(notice));
        }
        (self, None)
    }
}

/// Options for [`hash_password`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashOptions {
    pub scheme: HashScheme,
    /// Explicit salt, for reproducing legacy records. A fresh random salt
    /// is drawn when `None`.
    pub salt: Option<Vec<u8>>,
}

impl HashOptions {
    pub fn new(scheme: HashScheme) -> Self {
        Self { scheme, salt: None }
    }

    pub fn with_salt(mut self, salt: impl Into<Vec<u8>>) -> Self {
        self.salt = Some(salt.into());
        self
    }
}

/// Parsed form of an encoded password hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHashRecord {
    pub scheme: HashScheme,
    pub salt: Vec<u8>,
    pub digest: Vec<u8>,
}

impl PasswordHashRecord {
    pub fn encode(&self) -> String {
        let salt = STANDARD_NO_PAD.encode(&self.salt);
        let digest = STANDARD_NO_PAD.encode(&self.digest);
        match self.scheme {
            HashScheme::Sha256 | HashScheme::Sha512 => {
                format!("${}${}${}", self.scheme.tag(), salt, digest)
            }
            HashScheme::Pbkdf2Sha256 { iterations } => {
                format!("${}$i={}${}${}", self.scheme.tag(), iterations, salt, digest)
            }
            HashScheme::Argon2id(p) => format!(
                "${}${}$m={},t={},p={}${}${}",
                self.scheme.tag(),
                ARGON2_VERSION_FIELD,
                p.memory_kib,
                p.passes,
                p.parallelism,
                salt,
                digest
            ),
        }
    }
}

impl fmt::Display for PasswordHashRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for PasswordHashRecord {
    type Err = HushError;

    fn from_str(s: &str) -> Result<Self> {
        parse_password_hash(s)
    }
}

/// Output of [`hash_password`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedPassword {
    pub encoded: String,
    pub record: PasswordHashRecord,
}

/// Hash a password under the chosen scheme.
pub fn hash_password(password: &str, options: &HashOptions) -> Result<HashedPassword> {
    let scheme = options.scheme;
    if matches!(scheme, HashScheme::Argon2id(_)) && !supports_argon2id() {
        return Err(HushError::UnsupportedAlgorithm(
            "argon2id is not available in this build; check supports_argon2id() and fall back to pbkdf2-sha256"
                .to_string(),
        ));
    }

    let salt = match &options.salt {
        Some(salt) if salt.len() != HASH_SALT_LEN => {
            return Err(HushError::Configuration(format!(
                "salt must be exactly {} bytes",
                HASH_SALT_LEN
            )));
        }
        Some(salt) => salt.clone(),
        None => random_bytes(HASH_SALT_LEN)?,
    };

    let digest = compute_digest(password.as_bytes(), &scheme, &salt)?;
    let record = PasswordHashRecord {
        scheme,
        salt,
        digest: digest.to_vec(),
    };
    debug!("Hashed password with {}", scheme.tag());

    Ok(HashedPassword {
        encoded: record.encode(),
        record,
    })
}

/// Parse an encoded hash. Unknown prefixes and malformed fields are
/// reported as "unsupported hash format".
pub fn parse_password_hash(encoded: &str) -> Result<PasswordHashRecord> {
    let fields: Vec<&str> = encoded.split('$').collect();
    if fields.len() < 4 || !fields[0].is_empty() {
        return Err(unsupported("expected $<algorithm>$...$<salt>$<digest>"));
    }

    let scheme = match (fields[1], fields.len()) {
        ("sha256", 4) => HashScheme::Sha256,
        ("sha512", 4) => HashScheme::Sha512,
        ("pbkdf2-sha256", 5) => {
            let iterations = fields[2]
                .strip_prefix("i=")
                .ok_or_else(|| unsupported("missing pbkdf2 iteration field"))
                .and_then(parse_u32)?;
            HashScheme::Pbkdf2Sha256 { iterations }
        }
        ("argon2id", 6) => {
            if fields[2] != ARGON2_VERSION_FIELD {
                return Err(unsupported(format!("argon2id version {}", fields[2])));
            }
            HashScheme::Argon2id(parse_argon2_params(fields[3])?)
        }
        (tag, _) => return Err(unsupported(format!("unrecognized prefix '{}'", tag))),
    };

    if let Some(problem) = scheme.kdf().and_then(|kdf| kdf.bounds_violation()) {
        return Err(unsupported(problem));
    }

    let salt = decode_field(fields[fields.len() - 2], "salt")?;
    if salt.len() != HASH_SALT_LEN {
        return Err(unsupported(format!(
            "salt must be {} bytes, got {}",
            HASH_SALT_LEN,
            salt.len()
        )));
    }
    let digest = decode_field(fields[fields.len() - 1], "digest")?;
    if digest.len() != scheme.digest_len() {
        return Err(unsupported(format!(
            "{} digest must be {} bytes, got {}",
            scheme.tag(),
            scheme.digest_len(),
            digest.len()
        )));
    }

    Ok(PasswordHashRecord {
        scheme,
        salt,
        digest,
    })
}

/// Check a password against an encoded hash in constant time.
///
/// A wrong password is `Ok(false)`; only a malformed `encoded` (or an
/// algorithm this build cannot run) is an error.
pub fn verify_password(password: &str, encoded: &str) -> Result<bool> {
    let record = parse_password_hash(encoded)?;
    let candidate = compute_digest(password.as_bytes(), &record.scheme, &record.salt)?;
    let matched: bool = candidate.as_slice().ct_eq(&record.digest).into();
    debug!(
        "Verified password against {} hash: {}",
        record.scheme.tag(),
        if matched { "match" } else { "mismatch" }
    );
    Ok(matched)
}

/// How safe a hashing choice is for storing passwords
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashSafety {
    Weak,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashAssessment {
    pub safety: HashSafety,
    /// One entry per deficiency
    pub warnings: Vec<String>,
}

/// Static policy check of a hashing choice. No I/O, no hashing.
pub fn assess_password_hash_choice(scheme: &HashScheme) -> HashAssessment {
    let mut warnings = Vec::new();

    let safety = match *scheme {
        HashScheme::Sha256 | HashScheme::Sha512 => {
            warnings.push(format!(
                "{} is a single fast digest; use pbkdf2-sha256 or argon2id for passwords",
                scheme.tag()
            ));
            HashSafety::Weak
        }
        HashScheme::Pbkdf2Sha256 { iterations } => {
            if iterations < PBKDF2_MIN_ITERATIONS {
                warnings.push(format!(
                    "pbkdf2 iteration count {} is below the minimum of {}",
                    iterations, PBKDF2_MIN_ITERATIONS
                ));
                HashSafety::Weak
            } else if iterations < PBKDF2_RECOMMENDED_ITERATIONS {
                warnings.push(format!(
                    "pbkdf2 iteration count {} is below the recommended {}",
                    iterations, PBKDF2_RECOMMENDED_ITERATIONS
                ));
                HashSafety::Moderate
            } else {
                HashSafety::Strong
            }
        }
        HashScheme::Argon2id(p) => {
            if !supports_argon2id() {
                warnings.push(
                    "argon2id is not available in this build; hashes cannot be created or verified"
                        .to_string(),
                );
                HashSafety::Weak
            } else if let Some(problem) = KdfParams::Argon2id(p).bounds_violation() {
                warnings.push(problem);
                HashSafety::Weak
            } else {
                if p.memory_kib < ARGON2_MIN_MEMORY_KIB {
                    warnings.push(format!(
                        "argon2id memory {} KiB is below the recommended {} KiB",
                        p.memory_kib, ARGON2_MIN_MEMORY_KIB
                    ));
                }
                if p.passes < ARGON2_MIN_PASSES {
                    warnings.push(format!(
                        "argon2id passes {} is below the recommended {}",
                        p.passes, ARGON2_MIN_PASSES
                    ));
                }
                if warnings.is_empty() {
                    HashSafety::Strong
                } else {
                    HashSafety::Moderate
                }
            }
        }
    };

    HashAssessment { safety, warnings }
}

fn compute_digest(
    password: &[u8],
    scheme: &HashScheme,
    salt: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    match scheme.kdf() {
        Some(kdf) => derive_key(password, salt, &kdf, scheme.digest_len()),
        None => {
            let digest = match scheme {
                HashScheme::Sha512 => Sha512::new()
                    .chain_update(salt)
                    .chain_update(password)
                    .finalize()
                    .to_vec(),
                _ => Sha256::new()
                    .chain_update(salt)
                    .chain_update(password)
                    .finalize()
                    .to_vec(),
            };
            Ok(Zeroizing::new(digest))
        }
    }
}

fn parse_argon2_params(field: &str) -> Result<Argon2Params> {
    let mut parts = field.split(',');
    let mut next = |key: &str| -> Result<u32> {
        parts
            .next()
            .and_then(|part| part.strip_prefix(key))
            .ok_or_else(|| unsupported(format!("missing argon2id field '{}'", key)))
            .and_then(parse_u32)
    };
    let params = Argon2Params {
        memory_kib: next("m=")?,
        passes: next("t=")?,
        parallelism: next("p=")?,
    };
    if parts.next().is_some() {
        return Err(unsupported("extra argon2id parameters"));
    }
    Ok(params)
}

/// Canonical decimal only: no sign, no leading zeros.
fn parse_u32(s: &str) -> Result<u32> {
    let canonical = !s.is_empty()
        && s.bytes().all(|b| b.is_ascii_digit())
        && (s == "0" || !s.starts_with('0'));
    if !canonical {
        return Err(unsupported(format!("invalid number '{}'", s)));
    }
    s.parse()
        .map_err(|_| unsupported(format!("number out of range '{}'", s)))
}

fn decode_field(field: &str, what: &str) -> Result<Vec<u8>> {
    STANDARD_NO_PAD
        .decode(field)
        .map_err(|e| unsupported(format!("{} is not valid base64: {}", what, e)))
}

fn unsupported(detail: impl fmt::Display) -> HushError {
    HushError::Format(format!("unsupported hash format: {}", detail))
}
