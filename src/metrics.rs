//! Binary classification metrics.
//!
//! The positive class is `true`. Ratios with a zero denominator (no predicted
//! positives for precision, no actual positives for recall) are reported as
//! `0.0`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TextClfError};

/// F1, precision, recall and accuracy of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
    pub accuracy: f64,
}

impl fmt::Display for EvaluationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "f1: {:1.3}, precision: {:1.3}, recall: {:1.3}, acc: {:1.3}",
            self.f1, self.precision, self.recall, self.accuracy
        )
    }
}

/// Confusion counts of binary predictions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confusion {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_count: usize,
}

impl Confusion {
    /// Count outcomes; `predicted` and `actual` must have the same length.
    pub fn from_predictions(predicted: &[bool], actual: &[bool]) -> Result<Self> {
        if predicted.len() != actual.len() {
            return Err(TextClfError::invalid_argument(format!(
                "{} predictions for {} labels",
                predicted.len(),
                actual.len()
            )));
        }
        let mut confusion = Confusion::default();
        for (&p, &a) in predicted.iter().zip(actual) {
            match (p, a) {
                (true, true) => confusion.tp += 1,
                (true, false) => confusion.fp += 1,
                (false, false) => confusion.tn += 1,
                (false, true) => confusion.fn_count += 1,
            }
        }
        Ok(confusion)
    }

    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_count)
    }

    pub fn f1(&self) -> f64 {
        ratio(2 * self.tp, 2 * self.tp + self.fp + self.fn_count)
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.tp + self.tn + self.fp + self.fn_count)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Compare predictions with the reference labels.
pub fn evaluate(predicted: &[bool], actual: &[bool]) -> Result<EvaluationResult> {
    let confusion = Confusion::from_predictions(predicted, actual)?;
    Ok(EvaluationResult {
        f1: confusion.f1(),
        precision: confusion.precision(),
        recall: confusion.recall(),
        accuracy: confusion.accuracy(),
    })
}

/// Objective optimised by grid search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scoring {
    #[default]
    F1,
    Precision,
    Recall,
    Accuracy,
}

impl Scoring {
    /// Score `predicted` against `actual`.
    pub fn score(&self, predicted: &[bool], actual: &[bool]) -> Result<f64> {
        let confusion = Confusion::from_predictions(predicted, actual)?;
        Ok(match self {
            Scoring::F1 => confusion.f1(),
            Scoring::Precision => confusion.precision(),
            Scoring::Recall => confusion.recall(),
            Scoring::Accuracy => confusion.accuracy(),
        })
    }
}

impl FromStr for Scoring {
    type Err = TextClfError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "f1" => Ok(Scoring::F1),
            "precision" => Ok(Scoring::Precision),
            "recall" => Ok(Scoring::Recall),
            "accuracy" => Ok(Scoring::Accuracy),
            other => Err(TextClfError::config(format!("unknown scoring metric: {other}"))),
        }
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scoring::F1 => "f1",
            Scoring::Precision => "precision",
            Scoring::Recall => "recall",
            Scoring::Accuracy => "accuracy",
        };
        f.write_str(name)
    }
}

/// F1 scores of trivial classifiers for a given minority fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineF1 {
    /// Always predict the minority class: `2p / (p + 1)`.
    pub always_minority: f64,
    /// Predict the minority class with probability 0.5: `p / (p + 0.5)`.
    pub random_half: f64,
    /// Predict the minority class with probability `p`: `p`.
    pub proportional: f64,
}

impl fmt::Display for BaselineF1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "always min F1: {:1.3}", self.always_minority)?;
        writeln!(f, "min 50% F1: {:1.3}", self.random_half)?;
        write!(f, "min min F1: {:1.3}", self.proportional)
    }
}

/// Closed-form F1 of trivial strategies, with `p` the minority class fraction.
pub fn baseline_f1(minority: f64) -> Result<BaselineF1> {
    if !(0.0..=1.0).contains(&minority) {
        return Err(TextClfError::invalid_argument(format!(
            "minority fraction must be in [0, 1], got {minority}"
        )));
    }
    let p = minority;
    Ok(BaselineF1 {
        always_minority: 2.0 * p / (p + 1.0),
        random_half: 2.0 * p * 0.5 / (p + 0.5),
        proportional: p,
    })
}
