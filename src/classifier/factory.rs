//! Classifier labels and the estimators (or grid searches) they stand for.
//!
//! Plain labels map to an estimator with fixed hyperparameters; the
//! `-cro`/`-est` variants carry values tuned offline on the Croatian and
//! Estonian comment datasets. Labels ending in `-grid` map to a base
//! estimator and a parameter grid wrapped in a [`GridSearch`].
//!
//! | label               | estimator                                                    |
//! |---------------------|--------------------------------------------------------------|
//! | `logreg`            | logistic regression, L1, C=1, 1000 iterations                |
//! | `logreg-cro`        | L1, 100 iterations, C=10 if balanced else C=1                |
//! | `logreg-cro-recall` | L1, 100 iterations, C=0.1, always balanced                   |
//! | `logreg-est`        | L1, 100 iterations, C=10                                     |
//! | `logreg-est-recall` | L1, 100 iterations, C=0.01, always balanced                  |
//! | `svc`, `svm`        | RBF kernel SVC with default parameters                       |
//! | `logreg-grid`       | logistic regression over C                                   |
//! | `svc-grid`          | linear SVC over C                                            |
//! | `rf-grid`           | random forest over size, depth and features per split        |
//! | `svm-grid`          | RBF kernel SVC over C and gamma                              |
//!
//! With `balanced`, grids gain `class_weight: ['balanced']` and the
//! dataset-tuned labels reweight classes. Nothing is trained here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classifier::estimator::{ClassWeight, Estimator, ParamGrid, ParamValue};
use crate::classifier::forest::RandomForest;
use crate::classifier::grid_search::{CandidateScore, GridSearch, GridSummary};
use crate::classifier::linear_svc::LinearSvc;
use crate::classifier::logistic::{LogisticRegression, Penalty};
use crate::classifier::svc::KernelSvc;
use crate::error::{Result, TextClfError};
use crate::matrix::FeatureMatrix;
use crate::metrics::Scoring;

/// Base estimator of a `-grid` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridBase {
    LogReg,
    Svc,
    Rf,
    Svm,
}

impl GridBase {
    fn as_str(&self) -> &'static str {
        match self {
            GridBase::LogReg => "logreg",
            GridBase::Svc => "svc",
            GridBase::Rf => "rf",
            GridBase::Svm => "svm",
        }
    }
}

/// Every supported classifier label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassifierKind {
    LogReg,
    LogRegCro,
    LogRegCroRecall,
    LogRegEst,
    LogRegEstRecall,
    Svc,
    Svm,
    Grid(GridBase),
}

impl ClassifierKind {
    pub fn is_grid(&self) -> bool {
        matches!(self, ClassifierKind::Grid(_))
    }
}

impl FromStr for ClassifierKind {
    type Err = TextClfError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(base) = s.strip_suffix("-grid") {
            let base = match base {
                "logreg" => GridBase::LogReg,
                "svc" => GridBase::Svc,
                "rf" => GridBase::Rf,
                "svm" => GridBase::Svm,
                _ => return Err(TextClfError::config(format!("unknown classifier: {s}"))),
            };
            return Ok(ClassifierKind::Grid(base));
        }
        match s {
            "logreg" => Ok(ClassifierKind::LogReg),
            "logreg-cro" => Ok(ClassifierKind::LogRegCro),
            "logreg-cro-recall" => Ok(ClassifierKind::LogRegCroRecall),
            "logreg-est" => Ok(ClassifierKind::LogRegEst),
            "logreg-est-recall" => Ok(ClassifierKind::LogRegEstRecall),
            "svc" => Ok(ClassifierKind::Svc),
            "svm" => Ok(ClassifierKind::Svm),
            _ => Err(TextClfError::config(format!("unknown classifier: {s}"))),
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifierKind::LogReg => f.write_str("logreg"),
            ClassifierKind::LogRegCro => f.write_str("logreg-cro"),
            ClassifierKind::LogRegCroRecall => f.write_str("logreg-cro-recall"),
            ClassifierKind::LogRegEst => f.write_str("logreg-est"),
            ClassifierKind::LogRegEstRecall => f.write_str("logreg-est-recall"),
            ClassifierKind::Svc => f.write_str("svc"),
            ClassifierKind::Svm => f.write_str("svm"),
            ClassifierKind::Grid(base) => write!(f, "{}-grid", base.as_str()),
        }
    }
}

impl Serialize for ClassifierKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClassifierKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label.parse().map_err(serde::de::Error::custom)
    }
}

/// Settings of the grid search wrapped around `-grid` labels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSearchOptions {
    pub scoring: Scoring,
    pub folds: usize,
    /// Worker threads; `0` uses one per CPU.
    pub n_jobs: usize,
    /// Seed of randomised estimators.
    pub seed: u64,
}

impl Default for GridSearchOptions {
    fn default() -> Self {
        Self {
            scoring: Scoring::F1,
            folds: 5,
            n_jobs: 3,
            seed: 0,
        }
    }
}

/// A ready-to-fit classifier.
#[derive(Debug)]
pub enum ClassifierConfig {
    Fixed(Box<dyn Estimator>),
    Grid(GridSearch),
}

impl ClassifierConfig {
    pub fn fit(&mut self, x: &FeatureMatrix, y: &[bool]) -> Result<()> {
        match self {
            ClassifierConfig::Fixed(estimator) => estimator.fit(x, y),
            ClassifierConfig::Grid(search) => search.fit(x, y),
        }
    }

    pub fn predict(&self, x: &FeatureMatrix) -> Result<Vec<bool>> {
        match self {
            ClassifierConfig::Fixed(estimator) => estimator.predict(x),
            ClassifierConfig::Grid(search) => search.predict(x),
        }
    }

    /// Best parameters and score of a fitted grid search.
    pub fn grid_summary(&self) -> Option<&GridSummary> {
        match self {
            ClassifierConfig::Fixed(_) => None,
            ClassifierConfig::Grid(search) => search.summary(),
        }
    }

    /// Scores of every grid candidate, empty for fixed estimators.
    pub fn grid_results(&self) -> &[CandidateScore] {
        match self {
            ClassifierConfig::Fixed(_) => &[],
            ClassifierConfig::Grid(search) => search.results(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ClassifierConfig::Fixed(estimator) => estimator.name(),
            ClassifierConfig::Grid(search) => search.estimator().name(),
        }
    }
}

fn floats(values: &[f64]) -> Vec<ParamValue> {
    values.iter().map(|&v| ParamValue::Float(v)).collect()
}

fn l1_logreg(c: f64, max_iter: usize, class_weight: ClassWeight) -> Box<dyn Estimator> {
    Box::new(
        LogisticRegression::new()
            .with_penalty(Penalty::L1)
            .with_c(c)
            .with_max_iter(max_iter)
            .with_class_weight(class_weight),
    )
}

/// Base estimator and parameter grid of a `-grid` label.
pub fn base_grid(base: GridBase, seed: u64) -> (Box<dyn Estimator>, ParamGrid) {
    let mut grid = ParamGrid::new();
    let estimator: Box<dyn Estimator> = match base {
        GridBase::LogReg => {
            grid.insert(
                "C".into(),
                floats(&[0.001, 0.01, 0.1, 1.0, 10.0, 100.0, 1000.0]),
            );
            grid.insert("penalty".into(), vec![ParamValue::str("l1")]);
            grid.insert("solver".into(), vec![ParamValue::str("liblinear")]);
            grid.insert("max_iter".into(), vec![ParamValue::Int(100)]);
            Box::new(LogisticRegression::new())
        }
        GridBase::Svc => {
            grid.insert(
                "C".into(),
                floats(&[0.001, 0.01, 0.1, 1.0, 10.0, 100.0, 1000.0]),
            );
            grid.insert("penalty".into(), vec![ParamValue::str("l2")]);
            grid.insert("max_iter".into(), vec![ParamValue::Int(1500)]);
            Box::new(LinearSvc::new().with_seed(seed))
        }
        GridBase::Rf => {
            grid.insert(
                "n_estimators".into(),
                vec![ParamValue::Int(20), ParamValue::Int(50)],
            );
            grid.insert(
                "max_features".into(),
                vec![ParamValue::Int(50), ParamValue::Float(0.5), ParamValue::None],
            );
            grid.insert("max_depth".into(), vec![ParamValue::Int(3), ParamValue::None]);
            grid.insert("criterion".into(), vec![ParamValue::str("gini")]);
            Box::new(RandomForest::new().with_seed(seed))
        }
        GridBase::Svm => {
            grid.insert("C".into(), floats(&[0.01, 0.1, 1.0, 10.0, 100.0]));
            let mut gammas = vec![ParamValue::str("auto")];
            gammas.extend(floats(&[0.01, 0.1, 1.0, 10.0, 100.0]));
            grid.insert("gamma".into(), gammas);
            Box::new(KernelSvc::new())
        }
    };
    (estimator, grid)
}

/// Build the classifier for `kind`.
pub fn build_classifier(
    kind: ClassifierKind,
    balanced: bool,
    options: &GridSearchOptions,
) -> ClassifierConfig {
    let class_weight = if balanced {
        ClassWeight::Balanced
    } else {
        ClassWeight::None
    };
    let estimator = match kind {
        ClassifierKind::LogReg => l1_logreg(1.0, 1000, ClassWeight::None),
        ClassifierKind::LogRegCro => {
            let c = if balanced { 10.0 } else { 1.0 };
            l1_logreg(c, 100, class_weight)
        }
        ClassifierKind::LogRegCroRecall => l1_logreg(0.1, 100, ClassWeight::Balanced),
        ClassifierKind::LogRegEst => l1_logreg(10.0, 100, class_weight),
        ClassifierKind::LogRegEstRecall => l1_logreg(0.01, 100, ClassWeight::Balanced),
        ClassifierKind::Svc | ClassifierKind::Svm => Box::new(KernelSvc::new()),
        ClassifierKind::Grid(base) => {
            let (estimator, mut grid) = base_grid(base, options.seed);
            if balanced {
                grid.insert("class_weight".into(), vec![ParamValue::str("balanced")]);
            }
            return ClassifierConfig::Grid(
                GridSearch::new(estimator, grid)
                    .with_scoring(options.scoring)
                    .with_folds(options.folds)
                    .with_n_jobs(options.n_jobs),
            );
        }
    };
    ClassifierConfig::Fixed(estimator)
}
