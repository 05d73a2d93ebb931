//! # textclf
//!
//! Binary text classification experiments over lexical and BERT-derived
//! features.
//!
//! ## Features
//!
//! - Word count and TF-IDF vectorizers, optionally with bigrams
//! - On-disk cache of BERT model outputs behind a pluggable inference trait
//! - Feature fusion by horizontal concatenation
//! - Logistic regression, linear and RBF SVMs, random forests
//! - Cross-validated grid search on a thread pool
//! - Seeded subsampling and splitting for reproducible runs

pub mod analysis;
pub mod bert;
pub mod classifier;
pub mod cli;
pub mod dataset;
pub mod error;
pub mod experiment;
pub mod feature;
pub mod fusion;
pub mod matrix;
pub mod metrics;

pub mod prelude {
    pub use crate::bert::{BertFeatureCache, BertFeatureKind, BertOutput, CacheConfig, ModelInference};
    pub use crate::classifier::{ClassifierKind, Estimator, build_classifier};
    pub use crate::dataset::{DatasetRegistry, LabeledTextSet};
    pub use crate::error::{Result, TextClfError};
    pub use crate::experiment::{ExperimentConfig, ExperimentReport, ExperimentRunner, FeatureKind};
    pub use crate::matrix::FeatureMatrix;
    pub use crate::metrics::{EvaluationResult, Scoring, baseline_f1, evaluate};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
