//! Analyzers turn a text into the terms counted by the vectorizers.
//!
//! ```
//! use textclf::analysis::{Analyzer, WordAnalyzer};
//!
//! let analyzer = WordAnalyzer::new().unwrap();
//! assert_eq!(analyzer.terms("You ARE a clown!"), vec!["you", "are", "clown"]);
//! ```

use std::sync::Arc;

use crate::analysis::Token;
use crate::analysis::filter::{Filter, LowercaseFilter};
use crate::analysis::tokenizer::{RegexTokenizer, Tokenizer};
use crate::error::Result;

/// Trait for analyzers that convert text into terms.
///
/// Analyzers are shared by the vectorizers of a feature union and across
/// grid-search workers.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Vec<Token>;

    /// Get the name of this analyzer (for logging).
    fn name(&self) -> &str;

    /// Token texts in order.
    fn terms(&self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|token| token.text).collect()
    }
}

/// A tokenizer followed by a chain of filters.
#[derive(Clone)]
pub struct PipelineAnalyzer {
    tokenizer: Arc<dyn Tokenizer>,
    filters: Vec<Arc<dyn Filter>>,
    name: String,
}

impl std::fmt::Debug for PipelineAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineAnalyzer")
            .field("name", &self.name)
            .field("tokenizer", &self.tokenizer.name())
            .field(
                "filters",
                &self.filters.iter().map(|f| f.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl PipelineAnalyzer {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        PipelineAnalyzer {
            name: tokenizer.name().to_string(),
            tokenizer,
            filters: Vec::new(),
        }
    }

    /// Append a filter; filters run in insertion order.
    pub fn add_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }
}

impl Analyzer for PipelineAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        self.filters
            .iter()
            .fold(self.tokenizer.tokenize(text), |tokens, filter| {
                filter.apply(tokens)
            })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Default analyzer of the vectorizers: [`RegexTokenizer`] words, lowercased.
///
/// No stop words are removed and nothing is stemmed.
#[derive(Clone, Debug)]
pub struct WordAnalyzer {
    inner: PipelineAnalyzer,
}

impl WordAnalyzer {
    pub fn new() -> Result<Self> {
        let inner = PipelineAnalyzer::new(Arc::new(RegexTokenizer::new()?))
            .add_filter(Arc::new(LowercaseFilter::new()))
            .with_name("word");
        Ok(WordAnalyzer { inner })
    }
}

impl Analyzer for WordAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        self.inner.analyze(text)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
