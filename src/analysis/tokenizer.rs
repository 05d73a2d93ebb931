//! Splitting raw text into tokens.

use regex::Regex;

use crate::analysis::Token;
use crate::error::{Result, TextClfError};

/// Runs of two or more word characters; single letters and punctuation
/// never become terms.
pub const WORD_PATTERN: &str = r"\b\w\w+\b";

/// Trait for tokenizers that convert text into tokens.
pub trait Tokenizer: Send + Sync {
    /// Tokens of `text` in order of appearance.
    fn tokenize(&self, text: &str) -> Vec<Token>;

    /// Get the name of this tokenizer (for logging).
    fn name(&self) -> &str;
}

/// Emits every match of a regular expression as a token.
#[derive(Clone, Debug)]
pub struct RegexTokenizer {
    regex: Regex,
}

impl RegexTokenizer {
    /// Tokenizer over [`WORD_PATTERN`].
    pub fn new() -> Result<Self> {
        Self::with_pattern(WORD_PATTERN)
    }

    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| TextClfError::config(format!("invalid token pattern {pattern:?}: {e}")))?;
        Ok(RegexTokenizer { regex })
    }
}

impl Tokenizer for RegexTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        self.regex
            .find_iter(text)
            .enumerate()
            .map(|(position, word)| Token::new(word.as_str(), position))
            .collect()
    }

    fn name(&self) -> &str {
        "regex"
    }
}
