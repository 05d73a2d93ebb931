//! BERT-derived features.
//!
//! Inference itself happens behind the [`ModelInference`] trait; this module
//! only defines what is asked of a model and memoizes the answers on disk with
//! [`BertFeatureCache`].

pub mod cache;
pub mod imported;
pub mod inference;

pub use cache::{BertFeatureCache, BertFeatureRequest, CacheConfig};
pub use imported::ImportedInference;
pub use inference::{BertFeatureKind, BertOutput, InferenceRequest, ModelInference, NoInference};
