//! Model outputs computed elsewhere and imported from JSONL.
//!
//! Each line holds one text and what the model produced for it:
//!
//! ```text
//! {"text": "...", "probabilities": [0.91, 0.09]}
//! {"text": "...", "embedding": [0.12, -0.40, ...]}
//! ```
//!
//! Predicted labels are the arg-max of the probabilities.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ahash::AHashMap;
use serde::Deserialize;

use crate::bert::inference::{BertFeatureKind, BertOutput, InferenceRequest, ModelInference};
use crate::error::{Result, TextClfError};
use crate::matrix::FeatureMatrix;

#[derive(Debug, Deserialize)]
struct OutputRecord {
    text: String,
    #[serde(default)]
    probabilities: Option<Vec<f64>>,
    #[serde(default)]
    embedding: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default)]
struct Outputs {
    probabilities: Option<Vec<f64>>,
    embedding: Option<Vec<f64>>,
}

/// A [`ModelInference`] backend answering from imported model outputs.
///
/// Serves a single model id; requests for any other model fail.
#[derive(Clone)]
pub struct ImportedInference {
    model: String,
    outputs: AHashMap<String, Outputs>,
}

impl std::fmt::Debug for ImportedInference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportedInference")
            .field("model", &self.model)
            .field("texts", &self.outputs.len())
            .finish()
    }
}

impl ImportedInference {
    pub fn new<S: Into<String>>(model: S) -> Self {
        Self {
            model: model.into(),
            outputs: AHashMap::new(),
        }
    }

    /// Read the outputs of `model` from a JSONL file.
    ///
    /// Later lines win when a text occurs twice.
    pub fn from_jsonl<S: Into<String>, P: AsRef<Path>>(model: S, path: P) -> Result<Self> {
        let mut imported = Self::new(model);
        let reader = BufReader::new(File::open(path.as_ref())?);
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: OutputRecord = serde_json::from_str(&line).map_err(|e| {
                TextClfError::config(format!(
                    "{}:{}: {e}",
                    path.as_ref().display(),
                    line_no + 1
                ))
            })?;
            imported.insert(record);
        }
        log::info!(
            "imported {} model outputs for {} from {}",
            imported.len(),
            imported.model,
            path.as_ref().display()
        );
        Ok(imported)
    }

    /// Add the probabilities of one text.
    pub fn with_probabilities<S: Into<String>>(mut self, text: S, probabilities: Vec<f64>) -> Self {
        self.outputs.entry(text.into()).or_default().probabilities = Some(probabilities);
        self
    }

    /// Add the embedding of one text.
    pub fn with_embedding<S: Into<String>>(mut self, text: S, embedding: Vec<f64>) -> Self {
        self.outputs.entry(text.into()).or_default().embedding = Some(embedding);
        self
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    fn insert(&mut self, record: OutputRecord) {
        let entry = self.outputs.entry(record.text).or_default();
        if record.probabilities.is_some() {
            entry.probabilities = record.probabilities;
        }
        if record.embedding.is_some() {
            entry.embedding = record.embedding;
        }
    }

    fn lookup(&self, text: &str, features: BertFeatureKind) -> Result<&[f64]> {
        let outputs = self.outputs.get(text);
        let row = match features {
            BertFeatureKind::Predict => outputs.and_then(|o| o.probabilities.as_deref()),
            BertFeatureKind::Transformer => outputs.and_then(|o| o.embedding.as_deref()),
        };
        row.ok_or_else(|| {
            TextClfError::inference(format!(
                "no imported {features} output of {} for text {text:?}",
                self.model
            ))
        })
    }
}

fn arg_max(row: &[f64]) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &p)| {
            if p > best.1 { (i, p) } else { best }
        })
        .0
}

impl ModelInference for ImportedInference {
    fn infer(&self, request: &InferenceRequest<'_>) -> Result<BertOutput> {
        if request.model != self.model {
            return Err(TextClfError::inference(format!(
                "imported outputs belong to {}, not {}",
                self.model, request.model
            )));
        }
        let rows = request
            .texts
            .iter()
            .map(|text| self.lookup(text, request.features).map(<[f64]>::to_vec))
            .collect::<Result<Vec<_>>>()?;

        match request.features {
            BertFeatureKind::Predict => {
                let labels = rows.iter().map(|row| arg_max(row)).collect();
                Ok(BertOutput::Predictions {
                    probabilities: FeatureMatrix::from_dense_rows(rows)?,
                    labels,
                })
            }
            BertFeatureKind::Transformer => {
                Ok(BertOutput::Embeddings(FeatureMatrix::from_dense_rows(rows)?))
            }
        }
    }

    fn name(&self) -> &str {
        "imported"
    }
}
