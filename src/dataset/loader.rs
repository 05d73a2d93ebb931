//! Dataset loaders.
//!
//! A [`DatasetLoader`] returns the texts and labels of one split of one
//! dataset. [`DatasetRegistry`] maps dataset ids (e.g. `cro`, `est`) to their
//! loaders; the BERT feature cache uses it to fetch the texts it feeds to the
//! model.
//!
//! The bundled [`JsonlDatasetLoader`] reads `<root>/<split>.jsonl`, one
//! `{"text": "...", "label": 1}` object per line. Labels may be booleans or
//! the integers `0`/`1`.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::dataset::labeled::LabeledTextSet;
use crate::error::{Result, TextClfError};

/// Loads one split of a dataset for classification.
pub trait DatasetLoader: Send + Sync {
    /// Load `(texts, labels)` of `split` (e.g. `train`, `dev`, `test`).
    fn load_for_classification(&self, split: &str) -> Result<LabeledTextSet>;

    /// Get the name of this loader (for logging).
    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LabelValue {
    Bool(bool),
    Int(i64),
}

#[derive(Debug, Deserialize)]
struct Record {
    text: String,
    label: LabelValue,
}

/// Reads `<root>/<split>.jsonl` files.
#[derive(Debug, Clone)]
pub struct JsonlDatasetLoader {
    name: String,
    root: PathBuf,
}

impl JsonlDatasetLoader {
    /// Create a loader for the dataset stored under `root`.
    pub fn new<S: Into<String>, P: AsRef<Path>>(name: S, root: P) -> Self {
        Self {
            name: name.into(),
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Path of the file holding `split`.
    pub fn split_path(&self, split: &str) -> PathBuf {
        self.root.join(format!("{split}.jsonl"))
    }
}

impl DatasetLoader for JsonlDatasetLoader {
    fn load_for_classification(&self, split: &str) -> Result<LabeledTextSet> {
        let path = self.split_path(split);
        let reader = BufReader::new(File::open(&path)?);

        let mut texts = Vec::new();
        let mut labels = Vec::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(&line).map_err(|e| {
                TextClfError::invalid_argument(format!(
                    "{}:{}: {e}",
                    path.display(),
                    line_num + 1
                ))
            })?;
            let label = match record.label {
                LabelValue::Bool(b) => b,
                LabelValue::Int(0) => false,
                LabelValue::Int(1) => true,
                LabelValue::Int(other) => {
                    return Err(TextClfError::invalid_argument(format!(
                        "{}:{}: label {other} is not binary",
                        path.display(),
                        line_num + 1
                    )));
                }
            };
            texts.push(record.text);
            labels.push(label);
        }

        log::debug!(
            "loaded {} examples from {}",
            texts.len(),
            path.display()
        );
        LabeledTextSet::new(texts, labels)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Maps dataset ids to loaders.
#[derive(Clone, Default)]
pub struct DatasetRegistry {
    loaders: HashMap<String, Arc<dyn DatasetLoader>>,
}

impl std::fmt::Debug for DatasetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.loaders.keys().collect();
        ids.sort();
        f.debug_struct("DatasetRegistry")
            .field("datasets", &ids)
            .finish()
    }
}

impl DatasetRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one JSONL loader per sub-directory of `root`, keyed by the
    /// directory name.
    pub fn from_directory<P: AsRef<Path>>(root: P) -> Result<Self> {
        let mut registry = Self::new();
        for entry in fs::read_dir(root.as_ref())? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            registry.register(id.clone(), Arc::new(JsonlDatasetLoader::new(id, entry.path())));
        }
        Ok(registry)
    }

    /// Register (or replace) the loader of `dataset`.
    pub fn register<S: Into<String>>(&mut self, dataset: S, loader: Arc<dyn DatasetLoader>) {
        self.loaders.insert(dataset.into(), loader);
    }

    /// Loader of `dataset`; unknown ids are configuration errors.
    pub fn get(&self, dataset: &str) -> Result<Arc<dyn DatasetLoader>> {
        self.loaders
            .get(dataset)
            .cloned()
            .ok_or_else(|| TextClfError::config(format!("unknown dataset: {dataset}")))
    }

    /// Load `split` of `dataset`.
    pub fn load(&self, dataset: &str, split: &str) -> Result<LabeledTextSet> {
        self.get(dataset)?.load_for_classification(split)
    }
}
