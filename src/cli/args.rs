//! Command line argument parsing for the textclf CLI using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::bert::BertFeatureKind;
use crate::classifier::ClassifierKind;
use crate::error::Result;
use crate::experiment::{BertSourceConfig, ExperimentConfig, FeatureKind};
use crate::metrics::Scoring;

/// textclf - binary text classification experiments
#[derive(Parser, Debug, Clone)]
#[command(name = "textclf")]
#[command(about = "Binary text classification experiments over lexical and BERT features")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct TextClfArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl TextClfArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Train on one split and evaluate on another
    Run(RunArgs),

    /// Train and evaluate on a seeded random split of one dataset split
    #[command(name = "split-run")]
    SplitRun(SplitRunArgs),

    /// Fill the BERT feature cache for the splits of a dataset
    Precompute(PrecomputeArgs),

    /// Print baseline F1 scores for a minority class fraction
    Baseline(BaselineArgs),
}

/// Experiment settings shared by `run` and `split-run`.
///
/// Flags override the values of `--config`.
#[derive(Args, Debug, Clone, Default)]
pub struct ExperimentArgs {
    /// Experiment configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Name of the experiment in logs and reports
    #[arg(long)]
    pub label: Option<String>,

    /// Classifier label (logreg, svc, svm, logreg-grid, rf-grid, ...)
    #[arg(long)]
    pub classifier: Option<ClassifierKind>,

    /// Balance class weights
    #[arg(long)]
    pub balanced: bool,

    /// Feature sources (bert, tfidf, wcount, tfidf+bert, wcount+bert)
    #[arg(long)]
    pub features: Option<FeatureKind>,

    /// Add a bigram vectorizer
    #[arg(long)]
    pub bigrams: bool,

    /// Use raw word counts instead of binary ones
    #[arg(long)]
    pub no_binary: bool,

    /// Vocabulary cap of the lexical extractor
    #[arg(long)]
    pub max_features: Option<usize>,

    /// Grid search objective
    #[arg(long)]
    pub scoring: Option<Scoring>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Training set size after subsampling
    #[arg(long)]
    pub subsample: Option<usize>,

    /// Grid search worker threads (0 = one per CPU)
    #[arg(long)]
    pub n_jobs: Option<usize>,

    /// Cross-validation folds of grid search
    #[arg(long)]
    pub folds: Option<usize>,
}

impl ExperimentArgs {
    /// The configuration file (or the defaults) with the flags applied.
    pub fn to_config(&self) -> Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::from_file(path)?,
            None => ExperimentConfig::default(),
        };
        if let Some(label) = &self.label {
            config.label = label.clone();
        }
        if let Some(classifier) = self.classifier {
            config.classifier = classifier;
        }
        if let Some(features) = self.features {
            config.features = features;
        }
        if let Some(scoring) = self.scoring {
            config.scoring = scoring;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        config.balanced |= self.balanced;
        config.bigrams |= self.bigrams;
        if self.no_binary {
            config.binary = false;
        }
        config.max_features = self.max_features.or(config.max_features);
        config.subsample = self.subsample.or(config.subsample);
        config.n_jobs = self.n_jobs.unwrap_or(config.n_jobs);
        config.folds = self.folds.unwrap_or(config.folds);
        Ok(config)
    }
}

/// Arguments for `run`
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Directory with one sub-directory of `<split>.jsonl` files per dataset
    #[arg(long, value_name = "DATA_DIR")]
    pub data_dir: PathBuf,

    /// Dataset id
    #[arg(long)]
    pub dataset: String,

    /// Training split
    #[arg(long, default_value = "train")]
    pub train_split: String,

    /// Test split
    #[arg(long, default_value = "test")]
    pub test_split: String,

    /// BERT feature cache directory (required for BERT features)
    #[arg(long, value_name = "CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// BERT model id (overrides the configuration file)
    #[arg(long)]
    pub bert_model: Option<String>,

    /// BERT feature kind
    #[arg(long)]
    pub bert_features: Option<BertFeatureKind>,

    #[command(flatten)]
    pub experiment: ExperimentArgs,
}

impl RunArgs {
    /// The experiment configuration, with a BERT source derived from the
    /// dataset flags when BERT features are used.
    pub fn to_config(&self) -> Result<ExperimentConfig> {
        let mut config = self.experiment.to_config()?;
        if config.features.uses_bert() || self.bert_model.is_some() {
            let mut source = config.bert.take().unwrap_or_else(|| BertSourceConfig {
                dataset: self.dataset.clone(),
                train_split: self.train_split.clone(),
                test_split: self.test_split.clone(),
                label: String::new(),
                model: String::new(),
                features: BertFeatureKind::default(),
            });
            if let Some(model) = &self.bert_model {
                source.model = model.clone();
            }
            if let Some(features) = self.bert_features {
                source.features = features;
            }
            config.bert = Some(source);
        }
        Ok(config)
    }
}

/// Arguments for `split-run`
#[derive(Parser, Debug, Clone)]
pub struct SplitRunArgs {
    /// Directory with one sub-directory of `<split>.jsonl` files per dataset
    #[arg(long, value_name = "DATA_DIR")]
    pub data_dir: PathBuf,

    /// Dataset id
    #[arg(long)]
    pub dataset: String,

    /// Split to divide into train and test parts
    #[arg(long, default_value = "train")]
    pub split: String,

    /// Held-out fraction
    #[arg(long, default_value = "0.33")]
    pub test_size: f64,

    #[command(flatten)]
    pub experiment: ExperimentArgs,
}

/// Arguments for `precompute`
#[derive(Parser, Debug, Clone)]
pub struct PrecomputeArgs {
    /// Directory with one sub-directory of `<split>.jsonl` files per dataset
    #[arg(long, value_name = "DATA_DIR")]
    pub data_dir: PathBuf,

    /// BERT feature cache directory
    #[arg(long, value_name = "CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// Dataset id
    #[arg(long)]
    pub dataset: String,

    /// BERT model id
    #[arg(long)]
    pub model: String,

    /// Model outputs to import (JSONL, one text per line)
    #[arg(long, value_name = "OUTPUTS_FILE")]
    pub outputs: Option<PathBuf>,

    /// Splits to cache (comma-separated)
    #[arg(long, value_delimiter = ',', default_value = "train,dev,test")]
    pub splits: Vec<String>,

    /// BERT feature kind
    #[arg(long, default_value = "predict")]
    pub features: BertFeatureKind,

    /// Token limit passed to the model
    #[arg(long, default_value = "128")]
    pub max_sequence_length: usize,

    /// Compute device passed to the model
    #[arg(long, default_value = "cpu")]
    pub device: String,
}

/// Arguments for `baseline`
///
/// The minority fraction is given directly or measured as the positive share
/// of a dataset split.
#[derive(Parser, Debug, Clone)]
pub struct BaselineArgs {
    /// Fraction of the minority class, in [0, 1]
    #[arg(
        value_name = "MINORITY",
        required_unless_present = "dataset",
        conflicts_with = "dataset"
    )]
    pub minority: Option<f64>,

    /// Directory with one sub-directory of `<split>.jsonl` files per dataset
    #[arg(long, value_name = "DATA_DIR", requires = "dataset")]
    pub data_dir: Option<PathBuf>,

    /// Dataset whose positive share is the minority fraction
    #[arg(long, requires = "data_dir")]
    pub dataset: Option<String>,

    /// Split to measure
    #[arg(long, default_value = "train")]
    pub split: String,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::GridBase;

    #[test]
    fn test_run_command() {
        let args = TextClfArgs::try_parse_from([
            "textclf",
            "run",
            "--data-dir",
            "/data",
            "--dataset",
            "cro",
            "--classifier",
            "logreg-grid",
            "--features",
            "wcount",
            "--balanced",
            "--subsample",
            "1000",
        ])
        .unwrap();

        if let Command::Run(run_args) = args.command {
            assert_eq!(run_args.data_dir, PathBuf::from("/data"));
            assert_eq!(run_args.train_split, "train");
            let config = run_args.to_config().unwrap();
            assert_eq!(config.classifier, ClassifierKind::Grid(GridBase::LogReg));
            assert_eq!(config.features, FeatureKind::Wcount);
            assert!(config.balanced);
            assert_eq!(config.subsample, Some(1000));
            assert!(config.bert.is_none());
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_run_bert_source_from_flags() {
        let args = TextClfArgs::try_parse_from([
            "textclf",
            "run",
            "--data-dir",
            "/data",
            "--dataset",
            "est",
            "--test-split",
            "dev",
            "--features",
            "tfidf+bert",
            "--bert-model",
            "finest-bert",
        ])
        .unwrap();

        if let Command::Run(run_args) = args.command {
            let bert = run_args.to_config().unwrap().bert.unwrap();
            assert_eq!(bert.dataset, "est");
            assert_eq!(bert.test_split, "dev");
            assert_eq!(bert.model, "finest-bert");
            assert_eq!(bert.features, BertFeatureKind::Predict);
        } else {
            panic!("Expected Run command");
        }
    }

    fn run_config(config_path: &str, extra: &[&str]) -> ExperimentConfig {
        let mut argv = vec![
            "textclf",
            "run",
            "--data-dir",
            "/data",
            "--dataset",
            "cro",
            "--config",
            config_path,
        ];
        argv.extend_from_slice(extra);
        match TextClfArgs::try_parse_from(argv).unwrap().command {
            Command::Run(run_args) => run_args.to_config().unwrap(),
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_bert_model_flag_completes_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fused.json");
        std::fs::write(&path, r#"{"features": "wcount+bert", "balanced": true}"#).unwrap();
        let config_path = path.to_string_lossy().to_string();

        let config = run_config(&config_path, &["--bert-model", "crosloengual-bert"]);
        assert!(config.validate().is_ok());
        assert!(config.balanced);
        assert_eq!(config.bert.unwrap().model, "crosloengual-bert");

        // Without a model anywhere the configuration is rejected up front.
        let config = run_config(&config_path, &[]);
        assert_eq!(config.bert.as_ref().unwrap().model, "");
        assert!(config.validate().unwrap_err().is_config());
    }

    #[test]
    fn test_unknown_classifier_is_rejected() {
        let result = TextClfArgs::try_parse_from([
            "textclf",
            "run",
            "--data-dir",
            "/data",
            "--dataset",
            "cro",
            "--classifier",
            "knn",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_precompute_splits() {
        let args = TextClfArgs::try_parse_from([
            "textclf",
            "precompute",
            "--data-dir",
            "/data",
            "--cache-dir",
            "/cache",
            "--dataset",
            "cro",
            "--model",
            "m",
            "--splits",
            "train,test",
        ])
        .unwrap();

        if let Command::Precompute(precompute_args) = args.command {
            assert_eq!(precompute_args.splits, vec!["train", "test"]);
            assert_eq!(precompute_args.features, BertFeatureKind::Predict);
            assert_eq!(precompute_args.max_sequence_length, 128);
        } else {
            panic!("Expected Precompute command");
        }
    }

    #[test]
    fn test_baseline_sources() {
        let args = TextClfArgs::try_parse_from(["textclf", "baseline", "0.2"]).unwrap();
        if let Command::Baseline(baseline) = args.command {
            assert_eq!(baseline.minority, Some(0.2));
            assert!(baseline.dataset.is_none());
        } else {
            panic!("Expected Baseline command");
        }

        let args = TextClfArgs::try_parse_from([
            "textclf",
            "baseline",
            "--data-dir",
            "/data",
            "--dataset",
            "cro",
            "--split",
            "dev",
        ])
        .unwrap();
        if let Command::Baseline(baseline) = args.command {
            assert_eq!(baseline.minority, None);
            assert_eq!(baseline.dataset.as_deref(), Some("cro"));
            assert_eq!(baseline.split, "dev");
        } else {
            panic!("Expected Baseline command");
        }

        assert!(TextClfArgs::try_parse_from(["textclf", "baseline"]).is_err());
        assert!(TextClfArgs::try_parse_from(["textclf", "baseline", "--dataset", "cro"]).is_err());
    }

    #[test]
    fn test_verbosity_levels() {
        let args = TextClfArgs::try_parse_from(["textclf", "baseline", "0.1"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args = TextClfArgs::try_parse_from(["textclf", "-vv", "baseline", "0.1"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args = TextClfArgs::try_parse_from(["textclf", "--quiet", "baseline", "0.1"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_output_format() {
        let args =
            TextClfArgs::try_parse_from(["textclf", "--format", "json", "baseline", "0.5"]).unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
    }
}
