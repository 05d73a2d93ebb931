//! Lexical feature extraction.
//!
//! Vectorizers turn texts into sparse [`FeatureMatrix`] rows. All of them
//! implement [`TextTransformer`]; [`factory::build_lexical_extractor`] builds
//! the count or TF-IDF extractors used by experiments, optionally unioned with
//! a bigram vectorizer.

pub mod factory;
pub mod union;
pub mod vectorizer;

pub use factory::{LexicalConfig, LexicalKind, build_lexical_extractor};
pub use union::FeatureUnion;
pub use vectorizer::{Vectorizer, Weighting};

use crate::error::Result;
use crate::matrix::FeatureMatrix;

/// A text-to-features transformer with a fit/transform life cycle.
pub trait TextTransformer: Send + Sync {
    /// Learn the vocabulary (and weights) from `corpus`.
    fn fit(&mut self, corpus: &[String]) -> Result<()>;

    /// Map each text to one row of the output matrix, in input order.
    ///
    /// Fails with [`TextClfError::NotFitted`](crate::error::TextClfError::NotFitted)
    /// when called before [`fit`](Self::fit).
    fn transform(&self, texts: &[String]) -> Result<FeatureMatrix>;

    /// Number of output columns, `0` before fitting.
    fn n_features(&self) -> usize;

    /// Get the name of this transformer (for logging).
    fn name(&self) -> &str;

    /// Fit on `corpus` and transform it.
    fn fit_transform(&mut self, corpus: &[String]) -> Result<FeatureMatrix> {
        self.fit(corpus)?;
        self.transform(corpus)
    }
}
