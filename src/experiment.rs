//! Experiment orchestration: configuration, feature assembly, training and
//! evaluation.

pub mod config;
pub mod pipeline;
pub mod runner;

pub use config::{BertSourceConfig, DEFAULT_SEED, ExperimentConfig, FeatureKind};
pub use pipeline::TextPipeline;
pub use runner::{DEFAULT_TEST_SIZE, ExperimentReport, ExperimentRunner};
