//! Error types for textclf.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`TextClfError`] enum. Configuration problems (unknown classifier labels,
//! feature kinds, hyperparameters) surface as [`TextClfError::Config`] before
//! any computation starts.
//!
//! # Examples
//!
//! ```
//! use textclf::error::{Result, TextClfError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(TextClfError::invalid_argument("texts and labels differ in length"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for textclf operations.
#[derive(Error, Debug)]
pub enum TextClfError {
    /// I/O errors (dataset files, cache files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary (cache entry) serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration (unknown labels, kinds, parameters)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Precondition violations on inputs
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failures reported by a model inference backend
    #[error("Inference error: {0}")]
    Inference(String),

    /// A transformer or estimator was used before `fit`
    #[error("Not fitted: {0}")]
    NotFitted(String),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with TextClfError.
pub type Result<T> = std::result::Result<T, TextClfError>;

impl TextClfError {
    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        TextClfError::Config(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        TextClfError::InvalidArgument(msg.into())
    }

    /// Create a new inference error.
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        TextClfError::Inference(msg.into())
    }

    /// Create a new not-fitted error.
    pub fn not_fitted<S: Into<String>>(msg: S) -> Self {
        TextClfError::NotFitted(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        TextClfError::Other(msg.into())
    }

    /// Whether this error stems from configuration rather than data or I/O.
    pub fn is_config(&self) -> bool {
        matches!(self, TextClfError::Config(_))
    }
}

impl From<bincode::Error> for TextClfError {
    fn from(err: bincode::Error) -> Self {
        TextClfError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = TextClfError::config("unknown classifier: foo");
        assert_eq!(
            error.to_string(),
            "Configuration error: unknown classifier: foo"
        );
        assert!(error.is_config());

        let error = TextClfError::invalid_argument("length mismatch");
        assert_eq!(error.to_string(), "Invalid argument: length mismatch");
        assert!(!error.is_config());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = TextClfError::from(io_error);

        match error {
            TextClfError::Io(_) => {} // Expected
            _ => panic!("Expected IO error variant"),
        }
    }
}
