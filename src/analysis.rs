//! Text analysis for the lexical vectorizers.
//!
//! A [`Tokenizer`] splits raw text into [`Token`]s, [`Filter`]s rewrite them
//! and an [`Analyzer`] chains the two. The vectorizers in [`crate::feature`]
//! only consume the resulting term texts.

pub mod analyzer;
pub mod filter;
pub mod tokenizer;

pub use analyzer::{Analyzer, PipelineAnalyzer, WordAnalyzer};
pub use filter::{Filter, LowercaseFilter};
pub use tokenizer::{RegexTokenizer, Tokenizer};

/// One word of a text, numbered by its position in the text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub position: usize,
}

impl Token {
    pub fn new<S: Into<String>>(text: S, position: usize) -> Self {
        Token {
            text: text.into(),
            position,
        }
    }
}
