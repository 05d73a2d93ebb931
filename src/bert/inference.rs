//! The model inference seam.
//!
//! Implementations wrap a fine-tuned transformer and answer an
//! [`InferenceRequest`] with either class probabilities and predicted labels
//! or one embedding vector per text. They are expected to be deterministic
//! for a fixed model and input, which is what makes caching their output
//! sound.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TextClfError};
use crate::matrix::FeatureMatrix;

/// What a model should produce for each text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BertFeatureKind {
    /// Class probabilities plus the arg-max label.
    #[default]
    Predict,
    /// A fixed-size embedding vector.
    Transformer,
}

impl BertFeatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BertFeatureKind::Predict => "predict",
            BertFeatureKind::Transformer => "transformer",
        }
    }
}

impl FromStr for BertFeatureKind {
    type Err = TextClfError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "predict" => Ok(BertFeatureKind::Predict),
            "transformer" => Ok(BertFeatureKind::Transformer),
            other => Err(TextClfError::config(format!(
                "unknown BERT feature kind: {other}"
            ))),
        }
    }
}

impl fmt::Display for BertFeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input handed to a [`ModelInference`] backend.
#[derive(Debug, Clone)]
pub struct InferenceRequest<'a> {
    pub model: &'a str,
    pub texts: &'a [String],
    pub features: BertFeatureKind,
    pub max_sequence_length: usize,
    pub device: &'a str,
}

/// Model output, row-aligned with the input texts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BertOutput {
    /// Per-class probabilities and the predicted class of every text.
    Predictions {
        probabilities: FeatureMatrix,
        labels: Vec<usize>,
    },
    /// One embedding vector per text.
    Embeddings(FeatureMatrix),
}

impl BertOutput {
    /// The matrix that takes part in feature fusion.
    ///
    /// Predicted labels never do.
    pub fn features(&self) -> &FeatureMatrix {
        match self {
            BertOutput::Predictions { probabilities, .. } => probabilities,
            BertOutput::Embeddings(embeddings) => embeddings,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.features().n_rows()
    }

    /// Keep only `rows`, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Result<BertOutput> {
        match self {
            BertOutput::Predictions {
                probabilities,
                labels,
            } => {
                let labels = rows
                    .iter()
                    .map(|&i| {
                        labels.get(i).copied().ok_or_else(|| {
                            TextClfError::invalid_argument(format!(
                                "label index {i} out of bounds ({} labels)",
                                labels.len()
                            ))
                        })
                    })
                    .collect::<Result<Vec<usize>>>()?;
                Ok(BertOutput::Predictions {
                    probabilities: probabilities.select_rows(rows)?,
                    labels,
                })
            }
            BertOutput::Embeddings(embeddings) => {
                Ok(BertOutput::Embeddings(embeddings.select_rows(rows)?))
            }
        }
    }
}

/// Runs a BERT model over texts.
pub trait ModelInference: Send + Sync {
    /// Compute the requested features for every text of `request`.
    fn infer(&self, request: &InferenceRequest<'_>) -> Result<BertOutput>;

    /// Get the name of this backend (for logging).
    fn name(&self) -> &str;
}

/// A backend that cannot run any model.
///
/// Used when every request is expected to be served from precomputed cache
/// entries; a cache miss then fails with [`TextClfError::Inference`].
#[derive(Debug, Clone, Default)]
pub struct NoInference;

impl NoInference {
    pub fn new() -> Self {
        Self
    }
}

impl ModelInference for NoInference {
    fn infer(&self, request: &InferenceRequest<'_>) -> Result<BertOutput> {
        Err(TextClfError::inference(format!(
            "no inference backend is configured; precompute features for model {}",
            request.model
        )))
    }

    fn name(&self) -> &str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_kind_parsing() {
        assert_eq!(
            "transformer".parse::<BertFeatureKind>().unwrap(),
            BertFeatureKind::Transformer
        );
        assert_eq!(BertFeatureKind::Predict.to_string(), "predict");
        assert!("pooled".parse::<BertFeatureKind>().unwrap_err().is_config());
    }

    #[test]
    fn test_predictions_expose_probabilities_only() {
        let probabilities =
            FeatureMatrix::from_dense_rows(vec![vec![0.9, 0.1], vec![0.3, 0.7], vec![0.5, 0.5]])
                .unwrap();
        let output = BertOutput::Predictions {
            probabilities: probabilities.clone(),
            labels: vec![0, 1, 0],
        };
        assert_eq!(output.features(), &probabilities);

        let selected = output.select_rows(&[1, 2]).unwrap();
        match selected {
            BertOutput::Predictions {
                probabilities,
                labels,
            } => {
                assert_eq!(labels, vec![1, 0]);
                assert_eq!(probabilities.get(0, 1), 0.7);
            }
            BertOutput::Embeddings(_) => panic!("expected predictions"),
        }
    }

    #[test]
    fn test_select_rows_rejects_missing_labels() {
        let output = BertOutput::Predictions {
            probabilities: FeatureMatrix::from_dense_rows(vec![
                vec![0.9, 0.1],
                vec![0.3, 0.7],
                vec![0.5, 0.5],
            ])
            .unwrap(),
            labels: vec![0, 1],
        };

        assert_eq!(output.select_rows(&[1, 0]).unwrap().n_rows(), 2);
        let err = output.select_rows(&[0, 2]).unwrap_err();
        assert!(matches!(err, TextClfError::InvalidArgument(_)));
    }

    #[test]
    fn test_no_inference_fails() {
        let texts = vec!["x".to_string()];
        let request = InferenceRequest {
            model: "bert",
            texts: &texts,
            features: BertFeatureKind::Predict,
            max_sequence_length: 128,
            device: "cpu",
        };
        let err = NoInference::new().infer(&request).unwrap_err();
        assert!(matches!(err, TextClfError::Inference(_)));
    }
}
