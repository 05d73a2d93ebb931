//! Labeled text sets, loaders and sampling helpers.

pub mod labeled;
pub mod loader;
pub mod split;

pub use labeled::LabeledTextSet;
pub use loader::{DatasetLoader, DatasetRegistry, JsonlDatasetLoader};
pub use split::{subsample, subsample_indices, train_test_split};
