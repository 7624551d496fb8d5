//! Text normalization and term extraction.
//!
//! Rules, applied in order:
//!
//! 1. Unicode NFKC compatibility normalization (unless `nfkc` is off), so
//!    `ﬁle` and `file` or full-width `ＣＡＴ` and `cat` index identically.
//! 2. Lower-casing of the whole text.
//! 3. A term is a maximal run of letters and digits. Combining marks that
//!    follow a letter stay attached to it.
//! 4. An apostrophe (`'` or `’`) or hyphen strictly between two such runs joins
//!    them into one term only when `keep_apostrophes` / `keep_hyphens` is set.
//!    By default both split.
//! 5. Everything else splits. Empty tokens never appear.
//!
//! No stemming and no stop-word removal happen here.

use crate::error::DecodeError;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

const WORD: &str = r"[\p{L}\p{N}][\p{L}\p{N}\p{M}]*";

fn joined(joiners: &str) -> Regex {
    Regex::new(&format!("{WORD}(?:[{joiners}]{WORD})*")).expect("valid regex")
}

lazy_static! {
    static ref PLAIN: Regex = Regex::new(WORD).expect("valid regex");
    static ref APOSTROPHE: Regex = joined("'’");
    static ref HYPHEN: Regex = joined(r"\-");
    static ref APOSTROPHE_HYPHEN: Regex = joined(r"'’\-");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    pub nfkc: bool,
    pub keep_apostrophes: bool,
    pub keep_hyphens: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self { nfkc: true, keep_apostrophes: false, keep_hyphens: false }
    }
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    config: TokenizerConfig,
    pattern: &'static Regex,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(TokenizerConfig::default())
    }
}

impl Tokenizer {
    pub fn new(config: TokenizerConfig) -> Self {
        let pattern: &'static Regex = match (config.keep_apostrophes, config.keep_hyphens) {
            (false, false) => &*PLAIN,
            (true, false) => &*APOSTROPHE,
            (false, true) => &*HYPHEN,
            (true, true) => &*APOSTROPHE_HYPHEN,
        };
        Self { config, pattern }
    }

    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    /// Normalize `text` and return its terms.
    pub fn tokenize(&self, text: &str) -> Tokens {
        let buffer = if self.config.nfkc {
            text.nfkc().collect::<String>().to_lowercase()
        } else {
            text.to_lowercase()
        };
        Tokens { buffer, pattern: self.pattern }
    }

    /// Like [`tokenize`](Self::tokenize) for raw document bytes, which must be UTF-8.
    pub fn tokenize_bytes(&self, bytes: &[u8]) -> Result<Tokens, DecodeError> {
        let text = std::str::from_utf8(bytes)?;
        Ok(self.tokenize(text))
    }
}

/// Normalized text plus the pattern that splits it into terms.
///
/// Terms are produced lazily by [`iter`](Tokens::iter); each call starts over
/// from the beginning of the text.
#[derive(Debug, Clone)]
pub struct Tokens {
    buffer: String,
    pattern: &'static Regex,
}

impl Tokens {
    /// Terms in order of appearance, duplicates included.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.pattern.find_iter(&self.buffer).map(|m| m.as_str())
    }

    /// Sorted distinct terms.
    pub fn distinct(&self) -> Vec<&str> {
        let mut terms: Vec<&str> = self.iter().collect();
        terms.sort_unstable();
        terms.dedup();
        terms
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}
