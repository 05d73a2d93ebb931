//! Experiment configuration.
//!
//! An [`ExperimentConfig`] can be built in code, deserialized from a JSON
//! file (missing fields take their defaults) or assembled from CLI flags.
//!
//! ```json
//! {
//!   "label": "cro-fused",
//!   "classifier": "logreg-grid",
//!   "balanced": true,
//!   "features": "wcount+bert",
//!   "bert": {
//!     "dataset": "cro",
//!     "train_split": "train",
//!     "test_split": "test",
//!     "model": "crosloengual-bert_42"
//!   }
//! }
//! ```

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bert::{BertFeatureKind, BertFeatureRequest};
use crate::classifier::{ClassifierKind, GridSearchOptions};
use crate::error::{Result, TextClfError};
use crate::feature::{LexicalConfig, LexicalKind};
use crate::metrics::Scoring;

/// Seed used when none is configured.
pub const DEFAULT_SEED: u64 = 572;

/// Feature sources of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    /// Cached BERT features only.
    Bert,
    Tfidf,
    Wcount,
    /// TF-IDF fused with BERT features.
    TfidfBert,
    /// Word counts fused with BERT features.
    WcountBert,
}

impl FeatureKind {
    /// The lexical part, if any.
    pub fn lexical(&self) -> Option<LexicalKind> {
        match self {
            FeatureKind::Bert => None,
            FeatureKind::Tfidf | FeatureKind::TfidfBert => Some(LexicalKind::Tfidf),
            FeatureKind::Wcount | FeatureKind::WcountBert => Some(LexicalKind::Count),
        }
    }

    /// Whether BERT features take part.
    pub fn uses_bert(&self) -> bool {
        matches!(
            self,
            FeatureKind::Bert | FeatureKind::TfidfBert | FeatureKind::WcountBert
        )
    }
}

impl FromStr for FeatureKind {
    type Err = TextClfError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bert" => Ok(FeatureKind::Bert),
            "tfidf" => Ok(FeatureKind::Tfidf),
            "wcount" => Ok(FeatureKind::Wcount),
            "tfidf+bert" => Ok(FeatureKind::TfidfBert),
            "wcount+bert" => Ok(FeatureKind::WcountBert),
            other => Err(TextClfError::config(format!("unknown feature kind: {other}"))),
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeatureKind::Bert => "bert",
            FeatureKind::Tfidf => "tfidf",
            FeatureKind::Wcount => "wcount",
            FeatureKind::TfidfBert => "tfidf+bert",
            FeatureKind::WcountBert => "wcount+bert",
        };
        f.write_str(name)
    }
}

impl Serialize for FeatureKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FeatureKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Where the BERT features of the train and test sets come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BertSourceConfig {
    pub dataset: String,
    pub train_split: String,
    pub test_split: String,
    #[serde(default)]
    pub label: String,
    pub model: String,
    #[serde(default)]
    pub features: BertFeatureKind,
}

impl BertSourceConfig {
    /// Cache request for `split`.
    pub fn request(&self, split: &str) -> BertFeatureRequest {
        BertFeatureRequest::new(self.dataset.as_str(), split, self.model.as_str(), self.features)
            .with_label(self.label.as_str())
    }

    pub fn train_request(&self) -> BertFeatureRequest {
        self.request(&self.train_split)
    }

    pub fn test_request(&self) -> BertFeatureRequest {
        self.request(&self.test_split)
    }

    /// Every field naming a cache entry must be set; `label` may be empty.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("model", &self.model),
            ("dataset", &self.dataset),
            ("train_split", &self.train_split),
            ("test_split", &self.test_split),
        ] {
            if value.is_empty() {
                return Err(TextClfError::config(format!(
                    "BERT source needs a non-empty {field}"
                )));
            }
        }
        Ok(())
    }
}

/// One classification experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Free-form name used in logs and reports.
    pub label: String,
    pub classifier: ClassifierKind,
    pub balanced: bool,
    pub features: FeatureKind,
    pub bigrams: bool,
    /// Binary word counts (ignored for TF-IDF).
    pub binary: bool,
    /// Vocabulary cap of the lexical extractor.
    pub max_features: Option<usize>,
    pub scoring: Scoring,
    pub seed: u64,
    /// Training set size after subsampling.
    pub subsample: Option<usize>,
    /// Grid search worker threads; `0` uses one per CPU.
    pub n_jobs: usize,
    /// Cross-validation folds of grid search.
    pub folds: usize,
    pub bert: Option<BertSourceConfig>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            label: String::new(),
            classifier: ClassifierKind::LogReg,
            balanced: false,
            features: FeatureKind::Bert,
            bigrams: false,
            binary: true,
            max_features: None,
            scoring: Scoring::F1,
            seed: DEFAULT_SEED,
            subsample: None,
            n_jobs: 3,
            folds: 5,
            bert: None,
        }
    }
}

impl ExperimentConfig {
    /// Read a JSON configuration file.
    ///
    /// The result is not validated: callers may still override fields, and
    /// [`ExperimentConfig::validate`] runs before an experiment starts.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&content)
            .map_err(|e| TextClfError::config(format!("{}: {e}", path.as_ref().display())))
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.features.uses_bert() {
            match &self.bert {
                None => {
                    return Err(TextClfError::config(format!(
                        "features {} need a BERT source",
                        self.features
                    )));
                }
                Some(bert) => bert.validate()?,
            }
        }
        if self.classifier.is_grid() && self.folds < 2 {
            return Err(TextClfError::config(format!(
                "grid search needs at least 2 folds, got {}",
                self.folds
            )));
        }
        Ok(())
    }

    /// Configuration of the lexical extractor, if the features have one.
    pub fn lexical_config(&self) -> Option<LexicalConfig> {
        self.features.lexical().map(|kind| LexicalConfig {
            kind,
            max_features: self.max_features,
            binary: self.binary,
            bigrams: self.bigrams,
        })
    }

    pub fn grid_options(&self) -> GridSearchOptions {
        GridSearchOptions {
            scoring: self.scoring,
            folds: self.folds,
            n_jobs: self.n_jobs,
            seed: self.seed,
        }
    }
}

impl fmt::Display for ExperimentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "classification {}: {}, bal:{}, feats:{}, bigrams:{}, binary:{}, opt:{}, seed:{}",
            self.label,
            self.classifier,
            self.balanced,
            self.features,
            self.bigrams,
            self.binary,
            self.scoring,
            self.seed
        )
    }
}
