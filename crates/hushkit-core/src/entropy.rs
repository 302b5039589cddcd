//! Secret strength analysis
//!
//! Estimates raw entropy from character-class coverage and length, then
//! subtracts penalties for predictable structure. Every penalty that fires
//! also adds a warning, so callers can show the user what to fix.
//!
//! # Strength Levels
//!
//! | Level     | Bits   | Meaning                                    |
//! |-----------|--------|--------------------------------------------|
//! | Dangerous | < 28   | Trivially brute-forceable                  |
//! | Weak      | 28–35  | Vulnerable to targeted attack              |
//! | Fair      | 36–59  | Adequate for casual threats                |
//! | Strong    | 60–127 | Resistant to well-funded attackers         |
//! | Excellent | ≥ 128  | Beyond brute-force for foreseeable future  |
//!
//! This is advisory only. Nothing here refuses a secret.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::generator::{count_repeat_runs, count_sequential_runs};

/// Minimum recommended entropy for vault passphrases (bits)
pub const MIN_RECOMMENDED_ENTROPY: f64 = 60.0;

/// Guessing cost assumed for a word from the common list
const DICTIONARY_WORD_BITS: f64 = 10.0;

/// Common passwords and words that show up first in guessing lists
const COMMON_WORDS: &[&str] = &[
    "password",
    "passw0rd",
    "qwerty",
    "letmein",
    "iloveyou",
    "admin",
    "welcome",
    "monkey",
    "dragon",
    "master",
    "sunshine",
    "shadow",
    "football",
    "baseball",
    "princess",
    "trustno1",
    "secret",
    "freedom",
    "whatever",
    "login",
    "hello",
    "abc123",
    "summer",
    "winter",
    "love",
    "privacy",
    "vault",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SecretStrength {
    /// < 28 bits
    Dangerous,
    /// 28–35 bits
    Weak,
    /// 36–59 bits
    Fair,
    /// 60–127 bits
    Strong,
    /// ≥ 128 bits
    Excellent,
}

impl SecretStrength {
    pub fn from_bits(bits: f64) -> Self {
        if bits < 28.0 {
            Self::Dangerous
        } else if bits < 36.0 {
            Self::Weak
        } else if bits < MIN_RECOMMENDED_ENTROPY {
            Self::Fair
        } else if bits < 128.0 {
            Self::Strong
        } else {
            Self::Excellent
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Dangerous => "Dangerous: trivially crackable",
            Self::Weak => "Weak: vulnerable to targeted attacks",
            Self::Fair => "Fair: adequate for casual threats only",
            Self::Strong => "Strong: resistant to well-funded attackers",
            Self::Excellent => "Excellent: beyond brute-force for the foreseeable future",
        }
    }

    pub fn is_recommended(&self) -> bool {
        *self >= Self::Strong
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecretAnalysis {
    /// Entropy from length and character classes alone
    pub raw_entropy_bits: f64,
    /// Entropy after weakness penalties, never above the raw figure
    pub effective_entropy_bits: f64,
    pub strength: SecretStrength,
    pub warnings: Vec<String>,
}

/// Score an arbitrary secret.
///
/// # Example
/// ```
/// use hushkit_core::entropy::analyze_secret;
/// let weak = analyze_secret("password123");
/// let strong = analyze_secret("Q7$wLm2!kP9@rT5#");
/// assert!(weak.effective_entropy_bits < strong.effective_entropy_bits);
/// ```
pub fn analyze_secret(secret: &str) -> SecretAnalysis {
    if secret.is_empty() {
        return SecretAnalysis {
            raw_entropy_bits: 0.0,
            effective_entropy_bits: 0.0,
            strength: SecretStrength::Dangerous,
            warnings: vec!["Secret is empty".to_string()],
        };
    }

    let mut warnings = Vec::new();
    let classes = CharClasses::of(secret);
    let bits_per_char = classes.charset_size().log2();
    let len = secret.chars().count();
    let raw = len as f64 * bits_per_char;
    let mut entropy = raw;

    // Dictionary words, including simple character substitutions
    let words = common_words_in(secret);
    for word in &words {
        let word_bits = word.chars().count() as f64 * bits_per_char;
        entropy -= (word_bits - DICTIONARY_WORD_BITS).max(0.0);
        warnings.push(format!("Contains the common word or password '{}'", word));
    }

    let sequential = count_sequential_runs(secret);
    if sequential > 0 {
        entropy -= sequential as f64 * bits_per_char;
        warnings.push("Contains sequential patterns (abc, 123, qwe)".to_string());
    }

    let repeats = count_repeat_runs(secret);
    if repeats > 0 {
        entropy -= repeats as f64 * bits_per_char;
        warnings.push("Contains runs of the same character".to_string());
    }

    let unique: HashSet<char> = secret.chars().collect();
    let unique_ratio = unique.len() as f64 / len as f64;
    if unique_ratio < 0.5 {
        entropy -= (1.0 - unique_ratio) * raw * 0.3;
        warnings.push("Too many repeated characters".to_string());
    }

    let suffix = trailing_digit_suffix(secret);
    if suffix > 0 {
        entropy -= suffix as f64 * bits_per_char * 0.5;
        warnings.push("Ends with a predictable number suffix".to_string());
    }

    let single_class = classes.count() == 1 && len < 12;
    if single_class {
        warnings.push("Single character class: add numbers, symbols, or mixed case".to_string());
    }

    if len < 12 {
        entropy -= (12 - len) as f64 * bits_per_char * 0.5;
        if len < 8 {
            warnings.push("Secret is very short (< 8 characters)".to_string());
        } else {
            warnings.push("Consider a longer secret (12+ characters recommended)".to_string());
        }
    }

    // Applied to the clamped value
    let mut effective = entropy.clamp(0.0, raw);
    if single_class {
        effective *= 0.85;
    }
    SecretAnalysis {
        raw_entropy_bits: raw,
        effective_entropy_bits: effective,
        strength: SecretStrength::from_bits(effective),
        warnings,
    }
}

#[derive(Debug, Default)]
struct CharClasses {
    lower: bool,
    upper: bool,
    digit: bool,
    symbol: bool,
    other: bool,
}

impl CharClasses {
    fn of(secret: &str) -> Self {
        let mut classes = Self::default();
        for ch in secret.chars() {
            if ch.is_ascii_lowercase() {
                classes.lower = true;
            } else if ch.is_ascii_uppercase() {
                classes.upper = true;
            } else if ch.is_ascii_digit() {
                classes.digit = true;
            } else if ch.is_ascii_punctuation() || ch == ' ' {
                classes.symbol = true;
            } else {
                classes.other = true;
            }
        }
        classes
    }

    fn charset_size(&self) -> f64 {
        let size = [
            (self.lower, 26.0),
            (self.upper, 26.0),
            (self.digit, 10.0),
            (self.symbol, 33.0),
            (self.other, 100.0), // conservative for common Unicode
        ]
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, n)| n)
        .sum::<f64>();
        size.max(2.0)
    }

    fn count(&self) -> usize {
        [self.lower, self.upper, self.digit, self.symbol, self.other]
            .iter()
            .filter(|&&present| present)
            .count()
    }
}

/// Common words found in the secret, as typed or after undoing common
/// substitutions (p@ssw0rd). Words contained in a longer match are dropped.
fn common_words_in(secret: &str) -> Vec<&'static str> {
    let lower = secret.to_lowercase();
    let normalized: String = lower
        .chars()
        .map(|c| match c {
            '0' => 'o',
            '1' | '!' => 'i',
            '3' => 'e',
            '4' | '@' => 'a',
            '5' | '$' => 's',
            '7' => 't',
            other => other,
        })
        .collect();

    let found: Vec<&'static str> = COMMON_WORDS
        .iter()
        .copied()
        .filter(|w| lower.contains(w) || normalized.contains(w))
        .collect();

    found
        .iter()
        .copied()
        .filter(|w| !found.iter().any(|other| other != w && other.contains(w)))
        .collect()
}

/// Length of a 1–4 digit suffix following a letter ("summer2024").
fn trailing_digit_suffix(secret: &str) -> usize {
    let chars: Vec<char> = secret.chars().collect();
    let digits = chars.iter().rev().take_while(|c| c.is_ascii_digit()).count();
    let preceded_by_letter = chars
        .len()
        .checked_sub(digits + 1)
        .map(|i| chars[i].is_alphabetic())
        .unwrap_or(false);
    if (1..=4).contains(&digits) && preceded_by_letter {
        digits
    } else {
        0
    }
}
