//! Passphrase generation and entropy estimation
//!
//! Words come from a deterministic pseudo-dictionary: every index below the
//! profile size maps to a distinct pronounceable word built from
//! consonant-vowel syllables, so no word list has to ship with the crate and
//! the entropy of a uniform draw is exactly `log2(size)` bits.

use std::collections::HashSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{HushError, Result};
use crate::primitives::random_below;

const CONSONANTS: &[u8; 16] = b"bdfghjklmnprstvz";
const VOWELS: &[u8; 4] = b"aeio";
const SYLLABLES: u32 = (CONSONANTS.len() * VOWELS.len()) as u32;

/// Digits used for number insertion
pub const PASSPHRASE_DIGITS: &str = "0123456789";

/// Symbols used for symbol insertion
pub const PASSPHRASE_SYMBOLS: &str = "!@#$%^&*?+=~";

pub const MAX_WORDS: usize = 64;
pub const MAX_SEPARATOR_LEN: usize = 8;
pub const MAX_INSERTIONS: u8 = 8;

/// Vocabulary size tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DictionaryProfile {
    /// 2^15 words
    Compact,
    /// 2^20 words
    #[default]
    Balanced,
    /// 2^24 words
    Maximal,
}

impl DictionaryProfile {
    pub fn size(&self) -> u32 {
        match self {
            Self::Compact => 1 << 15,
            Self::Balanced => 1 << 20,
            Self::Maximal => 1 << 24,
        }
    }

    /// Syllables per word: enough for `SYLLABLES^n >= size`.
    fn syllables(&self) -> u32 {
        let mut n = 1;
        let mut capacity = u64::from(SYLLABLES);
        while capacity < u64::from(self.size()) {
            capacity *= u64::from(SYLLABLES);
            n += 1;
        }
        n
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseStyle {
    #[default]
    Lower,
    Title,
    /// Each word independently lower or title case
    Random,
}

/// Where extra digits or symbols go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsertionMode {
    #[default]
    None,
    /// One character at the end
    Append,
    /// N characters at the end
    AppendN(u8),
    /// One character at each end
    Wrap,
}

impl InsertionMode {
    pub fn count(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Append => 1,
            Self::AppendN(n) => *n as usize,
            Self::Wrap => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassphraseSettings {
    pub words: usize,
    pub separator: String,
    pub dictionary: DictionaryProfile,
    pub case_style: CaseStyle,
    pub number_mode: InsertionMode,
    pub symbol_mode: InsertionMode,
    /// Re-draw words already used in this passphrase
    pub unique_words: bool,
}

impl Default for PassphraseSettings {
    fn default() -> Self {
        Self {
            words: 6,
            separator: "-".to_string(),
            dictionary: DictionaryProfile::default(),
            case_style: CaseStyle::default(),
            number_mode: InsertionMode::None,
            symbol_mode: InsertionMode::None,
            unique_words: true,
        }
    }
}

impl PassphraseSettings {
    pub fn validate(&self) -> Result<()> {
        if self.words == 0 || self.words > MAX_WORDS {
            return Err(HushError::Configuration(format!(
                "words must be in 1..={}",
                MAX_WORDS
            )));
        }
        if self.separator.chars().count() > MAX_SEPARATOR_LEN {
            return Err(HushError::Configuration(format!(
                "separator must be at most {} characters",
                MAX_SEPARATOR_LEN
            )));
        }
        if self
            .separator
            .chars()
            .any(|c| c.is_whitespace() && c != ' ')
        {
            return Err(HushError::Configuration(
                "separator may not contain whitespace other than a space".to_string(),
            ));
        }
        for (label, mode) in [("number", self.number_mode), ("symbol", self.symbol_mode)] {
            if let InsertionMode::AppendN(n) = mode {
                if n == 0 || n > MAX_INSERTIONS {
                    return Err(HushError::Configuration(format!(
                        "{} append count must be in 1..={}",
                        label, MAX_INSERTIONS
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The word at `index` in `profile`'s pseudo-dictionary, or `None` if the
/// index is out of range. Distinct indices always give distinct words.
pub fn word_at(profile: DictionaryProfile, index: u32) -> Option<String> {
    if index >= profile.size() {
        return None;
    }

    let mut rest = index;
    let mut word = String::with_capacity(2 * profile.syllables() as usize);
    for _ in 0..profile.syllables() {
        let syllable = (rest % SYLLABLES) as usize;
        rest /= SYLLABLES;
        word.push(CONSONANTS[syllable / VOWELS.len()] as char);
        word.push(VOWELS[syllable % VOWELS.len()] as char);
    }
    Some(word)
}

/// Generate a passphrase from `settings`.
pub fn generate_passphrase(settings: &PassphraseSettings) -> Result<String> {
    settings.validate()?;

    let size = settings.dictionary.size();
    let mut used = HashSet::with_capacity(settings.words);
    let mut words = Vec::with_capacity(settings.words);
    while words.len() < settings.words {
        let index = random_below(size)?;
        if settings.unique_words && !used.insert(index) {
            continue;
        }
        let word = word_at(settings.dictionary, index).ok_or_else(|| {
            HushError::Crypto(format!("dictionary index {} out of range", index))
        })?;
        words.push(apply_case(word, settings.case_style)?);
    }

    let mut phrase = words.join(&settings.separator);
    phrase = insert(phrase, settings.number_mode, PASSPHRASE_DIGITS)?;
    phrase = insert(phrase, settings.symbol_mode, PASSPHRASE_SYMBOLS)?;

    debug!(
        "Generated {}-word passphrase ({:?} dictionary, ~{:.1} bits)",
        settings.words,
        settings.dictionary,
        estimate_passphrase_entropy(settings)
    );
    Ok(phrase)
}

/// Entropy of a passphrase drawn under `settings`, in bits.
///
/// Word choice contributes `log2(size)` per word (exactly `log2(size - k)`
/// for the k-th word when words are unique), random casing 1 bit per word,
/// and each inserted digit or symbol `log2` of its alphabet.
pub fn estimate_passphrase_entropy(settings: &PassphraseSettings) -> f64 {
    let size = f64::from(settings.dictionary.size());
    let word_bits: f64 = if settings.unique_words {
        (0..settings.words).map(|k| (size - k as f64).log2()).sum()
    } else {
        settings.words as f64 * size.log2()
    };

    let case_bits = match settings.case_style {
        CaseStyle::Random => settings.words as f64,
        _ => 0.0,
    };
    let number_bits =
        settings.number_mode.count() as f64 * (PASSPHRASE_DIGITS.len() as f64).log2();
    let symbol_bits =
        settings.symbol_mode.count() as f64 * (PASSPHRASE_SYMBOLS.len() as f64).log2();

    word_bits + case_bits + number_bits + symbol_bits
}

fn apply_case(word: String, style: CaseStyle) -> Result<String> {
    let title = match style {
        CaseStyle::Lower => false,
        CaseStyle::Title => true,
        CaseStyle::Random => random_below(2)? == 1,
    };
    if !title {
        return Ok(word);
    }
    let mut chars = word.chars();
    Ok(match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => word,
    })
}

fn insert(phrase: String, mode: InsertionMode, alphabet: &str) -> Result<String> {
    let alphabet: Vec<char> = alphabet.chars().collect();
    let draw = || -> Result<char> {
        Ok(alphabet[random_below(alphabet.len() as u32)? as usize])
    };

    Ok(match mode {
        InsertionMode::None => phrase,
        InsertionMode::Append | InsertionMode::AppendN(_) => {
            let mut out = phrase;
            for _ in 0..mode.count() {
                out.push(draw()?);
            }
            out
        }
        InsertionMode::Wrap => {
            let prefix = draw()?;
            let suffix = draw()?;
            format!("{}{}{}", prefix, phrase, suffix)
        }
    })
}
