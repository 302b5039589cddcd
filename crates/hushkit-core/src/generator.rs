//! Password generation under hardening constraints
//!
//! Candidates are drawn uniformly from the union of the enabled character
//! classes and rejected whole until every active constraint holds. The
//! constraints are checked for feasibility before the loop starts, and the
//! loop itself is capped, so generation always terminates.

use std::collections::HashSet;

use log::debug;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{HushError, Result};
use crate::primitives::random_below;

pub const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
pub const DIGITS: &str = "0123456789";
pub const SYMBOLS: &str = "!@#$%^&*()-_=+[]{};:,.?/~";

/// Characters easily confused with one another when read or typed
pub const AMBIGUOUS: &str = "Il1O0o|`'\"";

/// Longest password `generate_password` will produce
pub const MAX_PASSWORD_LENGTH: usize = 1024;

/// Rejection-sampling budget
const MAX_ATTEMPTS: u32 = 10_000;

/// Runs that count as sequential, matched case-insensitively in either
/// direction: alphabet, digits and the three keyboard letter rows.
const SEQUENCES: &[&str] = &[
    LOWERCASE,
    "01234567890",
    "qwertyuiop",
    "asdfghjkl",
    "zxcvbnm",
];

/// Declarative policy for generated passwords
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardeningConstraints {
    pub length: usize,
    pub uppercase: bool,
    pub lowercase: bool,
    pub digits: bool,
    pub symbols: bool,
    pub exclude_ambiguous: bool,
    /// Require at least one character from every enabled class
    pub enforce_mix: bool,
    /// Reject runs of 3 sequential characters (abc, 321, qwe, ...)
    pub block_sequential: bool,
    /// Reject 3 identical characters in a row
    pub block_repeats: bool,
    pub min_unique_chars: usize,
}

impl Default for HardeningConstraints {
    fn default() -> Self {
        Self {
            length: 20,
            uppercase: true,
            lowercase: true,
            digits: true,
            symbols: true,
            exclude_ambiguous: true,
            enforce_mix: true,
            block_sequential: true,
            block_repeats: true,
            min_unique_chars: 12,
        }
    }
}

impl HardeningConstraints {
    /// Enabled character classes after ambiguous-character filtering.
    pub fn classes(&self) -> Vec<Vec<char>> {
        [
            (self.uppercase, UPPERCASE),
            (self.lowercase, LOWERCASE),
            (self.digits, DIGITS),
            (self.symbols, SYMBOLS),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, set)| {
            set.chars()
                .filter(|c| !(self.exclude_ambiguous && AMBIGUOUS.contains(*c)))
                .collect()
        })
        .collect()
    }

    /// Reject constraint sets that no candidate could ever satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.length == 0 || self.length > MAX_PASSWORD_LENGTH {
            return Err(config_error(format!(
                "length must be in 1..={}",
                MAX_PASSWORD_LENGTH
            )));
        }

        let classes = self.classes();
        if classes.is_empty() {
            return Err(config_error("at least one character class must be enabled"));
        }
        let pool_size: usize = classes.iter().map(Vec::len).sum();

        if self.min_unique_chars > self.length {
            return Err(config_error(format!(
                "min_unique_chars ({}) exceeds length ({})",
                self.min_unique_chars, self.length
            )));
        }
        if self.min_unique_chars > pool_size {
            return Err(config_error(format!(
                "min_unique_chars ({}) exceeds the {} available characters",
                self.min_unique_chars, pool_size
            )));
        }
        if self.enforce_mix && classes.len() > self.length {
            return Err(config_error(format!(
                "length {} is too short to include all {} enabled classes",
                self.length,
                classes.len()
            )));
        }
        if self.block_repeats && pool_size == 1 && self.length >= 3 {
            return Err(config_error(
                "a single-character pool cannot avoid repeated runs",
            ));
        }
        Ok(())
    }

    /// Whether `candidate` meets every active constraint.
    pub fn is_satisfied_by(&self, candidate: &str) -> bool {
        if candidate.chars().count() != self.length {
            return false;
        }
        if self.block_sequential && count_sequential_runs(candidate) > 0 {
            return false;
        }
        if self.block_repeats && count_repeat_runs(candidate) > 0 {
            return false;
        }
        let unique: HashSet<char> = candidate.chars().collect();
        if unique.len() < self.min_unique_chars {
            return false;
        }
        if self.enforce_mix {
            return self
                .classes()
                .iter()
                .all(|class| candidate.chars().any(|c| class.contains(&c)));
        }
        true
    }
}

/// Generate a password satisfying all of `constraints`.
///
/// # Errors
/// `Configuration` when the constraints are jointly unsatisfiable, or when
/// the attempt budget runs out (a policy that is feasible only in theory).
pub fn generate_password(constraints: &HardeningConstraints) -> Result<String> {
    constraints.validate()?;

    let pool: Vec<char> = constraints.classes().into_iter().flatten().collect();
    let pool_len = pool.len() as u32;

    for attempt in 1..=MAX_ATTEMPTS {
        let mut candidate = Zeroizing::new(
            (0..constraints.length)
                .map(|_| random_below(pool_len).map(|i| pool[i as usize]))
                .collect::<Result<String>>()?,
        );
        if constraints.is_satisfied_by(&candidate) {
            debug!(
                "Generated {}-character password after {} attempt(s)",
                constraints.length, attempt
            );
            return Ok(std::mem::take(&mut *candidate));
        }
    }

    Err(config_error(format!(
        "no password satisfied the constraints after {} attempts",
        MAX_ATTEMPTS
    )))
}

/// Count 3-character windows that follow a known sequence forwards or
/// backwards (case-insensitive).
pub fn count_sequential_runs(s: &str) -> usize {
    let chars: Vec<char> = s.chars().flat_map(char::to_lowercase).collect();
    chars
        .windows(3)
        .filter(|w| {
            let forward: String = w.iter().collect();
            let backward: String = w.iter().rev().collect();
            SEQUENCES
                .iter()
                .any(|seq| seq.contains(&forward) || seq.contains(&backward))
        })
        .count()
}

/// Count 3-character windows of one repeated character.
pub fn count_repeat_runs(s: &str) -> usize {
    let chars: Vec<char> = s.chars().collect();
    chars
        .windows(3)
        .filter(|w| w[0] == w[1] && w[1] == w[2])
        .count()
}

fn config_error(msg: impl Into<String>) -> HushError {
    HushError::Configuration(msg.into())
}
