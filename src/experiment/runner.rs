//! Runs classification experiments end to end.
//!
//! Lexical extractors are fitted on the training and test texts together
//! before either split is transformed, so that no test term is out of
//! vocabulary. Test text therefore influences the vocabulary (and TF-IDF
//! weights); results depend on this and it is kept on purpose.

use serde::{Deserialize, Serialize};

use crate::bert::{BertFeatureCache, BertOutput};
use crate::classifier::estimator::format_params;
use crate::classifier::{CandidateScore, GridSummary, build_classifier};
use crate::dataset::{LabeledTextSet, subsample_indices, train_test_split};
use crate::error::{Result, TextClfError};
use crate::experiment::config::ExperimentConfig;
use crate::feature::build_lexical_extractor;
use crate::fusion::fuse_splits;
use crate::matrix::FeatureMatrix;
use crate::metrics::{EvaluationResult, evaluate};

/// Held-out share used by [`ExperimentRunner::run_with_split`] by default.
pub const DEFAULT_TEST_SIZE: f64 = 0.33;

/// Outcome of one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub label: String,
    pub evaluation: EvaluationResult,
    /// Training rows after subsampling.
    pub train_size: usize,
    pub test_size: usize,
    pub n_features: usize,
    /// Best grid-search candidate, for `-grid` classifiers.
    pub grid: Option<GridSummary>,
    /// Cross-validation scores of every grid candidate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<CandidateScore>,
}

/// Executes [`ExperimentConfig`]s.
#[derive(Debug, Default)]
pub struct ExperimentRunner {
    bert_cache: Option<BertFeatureCache>,
}

impl ExperimentRunner {
    /// A runner for lexical features only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve BERT features from `cache`.
    pub fn with_bert_cache(mut self, cache: BertFeatureCache) -> Self {
        self.bert_cache = Some(cache);
        self
    }

    /// Train on `train` and evaluate on `test`.
    pub fn run(
        &self,
        train: &LabeledTextSet,
        test: &LabeledTextSet,
        config: &ExperimentConfig,
    ) -> Result<ExperimentReport> {
        config.validate()?;
        if config.features.uses_bert() && self.bert_cache.is_none() {
            return Err(TextClfError::config(format!(
                "features {} need a BERT feature cache",
                config.features
            )));
        }
        let mut classifier =
            build_classifier(config.classifier, config.balanced, &config.grid_options());

        log::info!(
            "{config}, train size: {}, positive fraction: {:.3}",
            train.len(),
            train.positive_fraction()
        );

        let indices = subsample_indices(train.len(), config.subsample, config.seed);
        let train = match &indices {
            Some(indices) => train.select(indices)?,
            None => train.clone(),
        };
        if indices.is_some() {
            log::info!("subsampled training set to {} examples", train.len());
        }

        let (x_train, x_test) = self.features(&train, test, config, indices.as_deref())?;
        log::debug!(
            "features: train {:?}, test {:?}",
            x_train.shape(),
            x_test.shape()
        );

        classifier.fit(&x_train, train.labels())?;
        let predicted = classifier.predict(&x_test)?;
        let evaluation = evaluate(&predicted, test.labels())?;

        let grid = classifier.grid_summary().cloned();
        let candidates = classifier.grid_results().to_vec();
        for candidate in &candidates {
            log::debug!(
                "candidate {}: {:.3}",
                format_params(&candidate.params),
                candidate.mean_score
            );
        }
        if let Some(summary) = &grid {
            log::info!("grid search best: {summary}");
        }
        log::info!("{evaluation}");

        Ok(ExperimentReport {
            label: config.label.clone(),
            evaluation,
            train_size: train.len(),
            test_size: test.len(),
            n_features: x_train.n_cols(),
            grid,
            candidates,
        })
    }

    /// Subsample `data`, hold out `test_size` of it with a seeded shuffle and
    /// run the experiment on the two parts.
    ///
    /// Only lexical features are supported: cached BERT features are tied to
    /// named dataset splits.
    pub fn run_with_split(
        &self,
        data: &LabeledTextSet,
        config: &ExperimentConfig,
        test_size: f64,
    ) -> Result<ExperimentReport> {
        if config.features.uses_bert() {
            return Err(TextClfError::config(format!(
                "features {} are not supported on random splits",
                config.features
            )));
        }
        let data = match subsample_indices(data.len(), config.subsample, config.seed) {
            Some(indices) => data.select(&indices)?,
            None => data.clone(),
        };
        log::info!("Dataset size: {}", data.len());
        let (train, test) = train_test_split(&data, test_size, config.seed)?;

        let config = ExperimentConfig {
            subsample: None,
            ..config.clone()
        };
        self.run(&train, &test, &config)
    }

    fn features(
        &self,
        train: &LabeledTextSet,
        test: &LabeledTextSet,
        config: &ExperimentConfig,
        train_rows: Option<&[usize]>,
    ) -> Result<(FeatureMatrix, FeatureMatrix)> {
        let lexical = match config.lexical_config() {
            Some(lexical_config) => {
                let mut extractor = build_lexical_extractor(&lexical_config)?;
                let corpus: Vec<String> = train
                    .texts()
                    .iter()
                    .chain(test.texts())
                    .cloned()
                    .collect();
                extractor.fit(&corpus)?;
                Some((extractor.transform(train.texts())?, extractor.transform(test.texts())?))
            }
            None => None,
        };

        let bert = match (&config.bert, &self.bert_cache) {
            (Some(source), Some(cache)) if config.features.uses_bert() => {
                let bert_train = cache.get(&source.train_request())?;
                let bert_train = match train_rows {
                    Some(rows) => bert_train.select_rows(rows)?,
                    None => bert_train,
                };
                let bert_test = cache.get(&source.test_request())?;
                check_rows("train", &bert_train, train)?;
                check_rows("test", &bert_test, test)?;
                Some((bert_train, bert_test))
            }
            _ => None,
        };

        match (lexical, bert) {
            (Some((lex_train, lex_test)), Some((bert_train, bert_test))) => {
                fuse_splits(&lex_train, &bert_train, &lex_test, &bert_test)
            }
            (Some(lexical), None) => Ok(lexical),
            (None, Some((bert_train, bert_test))) => Ok((
                bert_train.features().clone(),
                bert_test.features().clone(),
            )),
            (None, None) => Err(TextClfError::config(format!(
                "no feature source for {}",
                config.features
            ))),
        }
    }
}

fn check_rows(split: &str, bert: &BertOutput, data: &LabeledTextSet) -> Result<()> {
    if bert.n_rows() != data.len() {
        return Err(TextClfError::invalid_argument(format!(
            "{split} BERT features have {} rows for {} texts",
            bert.n_rows(),
            data.len()
        )));
    }
    Ok(())
}
