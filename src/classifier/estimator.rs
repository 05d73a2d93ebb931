//! The estimator contract shared by every classifier and by grid search.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TextClfError};
use crate::matrix::FeatureMatrix;

/// A hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
    None,
}

impl ParamValue {
    pub fn str<S: Into<String>>(value: S) -> Self {
        ParamValue::Str(value.into())
    }

    /// Numeric value of an int or float parameter.
    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match self {
            ParamValue::Int(v) => Ok(*v as f64),
            ParamValue::Float(v) => Ok(*v),
            other => Err(invalid_value(name, other)),
        }
    }

    /// Value of a non-negative int parameter.
    pub fn as_usize(&self, name: &str) -> Result<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Ok(*v as usize),
            other => Err(invalid_value(name, other)),
        }
    }

    /// Value of a string parameter.
    pub fn as_str(&self, name: &str) -> Result<&str> {
        match self {
            ParamValue::Str(s) => Ok(s),
            other => Err(invalid_value(name, other)),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ParamValue::None)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Str(s) => write!(f, "'{s}'"),
            ParamValue::None => write!(f, "None"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

/// One assignment of hyperparameters, keyed by name.
pub type Params = BTreeMap<String, ParamValue>;

/// Candidate values per hyperparameter name.
pub type ParamGrid = BTreeMap<String, Vec<ParamValue>>;

/// Render params as `{'C': 10, 'penalty': 'l1'}`.
pub fn format_params(params: &Params) -> String {
    let body: Vec<String> = params.iter().map(|(k, v)| format!("'{k}': {v}")).collect();
    format!("{{{}}}", body.join(", "))
}

pub(crate) fn invalid_value(name: &str, value: &ParamValue) -> TextClfError {
    TextClfError::config(format!("invalid value {value} for parameter {name}"))
}

pub(crate) fn unknown_param(estimator: &str, name: &str) -> TextClfError {
    TextClfError::config(format!("{estimator} has no parameter {name}"))
}

/// Per-class sample weighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassWeight {
    /// Every sample weighs 1.
    #[default]
    None,
    /// Weights inversely proportional to class frequency, `n / (2 * n_c)`.
    Balanced,
}

impl ClassWeight {
    /// Weights of the `[false, true]` classes for labels `y`.
    pub fn weights(&self, y: &[bool]) -> [f64; 2] {
        match self {
            ClassWeight::None => [1.0, 1.0],
            ClassWeight::Balanced => {
                let n = y.len() as f64;
                let positives = y.iter().filter(|&&l| l).count() as f64;
                let negatives = n - positives;
                let weight = |count: f64| if count > 0.0 { n / (2.0 * count) } else { 1.0 };
                [weight(negatives), weight(positives)]
            }
        }
    }

    pub fn from_param(value: &ParamValue) -> Result<Self> {
        match value {
            ParamValue::None => Ok(ClassWeight::None),
            ParamValue::Str(s) if s == "balanced" => Ok(ClassWeight::Balanced),
            other => Err(invalid_value("class_weight", other)),
        }
    }

    pub fn to_param(self) -> ParamValue {
        match self {
            ClassWeight::None => ParamValue::None,
            ClassWeight::Balanced => ParamValue::str("balanced"),
        }
    }
}

/// A binary classifier over [`FeatureMatrix`] rows.
pub trait Estimator: Send + Sync + fmt::Debug {
    /// Train on `x` with labels `y` (one per row).
    fn fit(&mut self, x: &FeatureMatrix, y: &[bool]) -> Result<()>;

    /// Predict one label per row of `x`.
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<bool>>;

    /// Set one hyperparameter by name.
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()>;

    /// Current hyperparameters.
    fn params(&self) -> Params;

    /// A copy with the same hyperparameters and no fitted state.
    fn clone_unfitted(&self) -> Box<dyn Estimator>;

    /// Get the name of this estimator (for logging).
    fn name(&self) -> &str;

    /// Set several hyperparameters.
    fn set_params(&mut self, params: &Params) -> Result<()> {
        for (name, value) in params {
            self.set_param(name, value)?;
        }
        Ok(())
    }
}

/// Check the training inputs every estimator needs: one label per row and
/// both classes present.
pub(crate) fn check_fit_input(x: &FeatureMatrix, y: &[bool]) -> Result<()> {
    if x.n_rows() != y.len() {
        return Err(TextClfError::invalid_argument(format!(
            "{} rows but {} labels",
            x.n_rows(),
            y.len()
        )));
    }
    let positives = y.iter().filter(|&&l| l).count();
    if positives == 0 || positives == y.len() {
        return Err(TextClfError::invalid_argument(
            "training labels contain a single class",
        ));
    }
    Ok(())
}

/// Labels as `-1.0` / `+1.0`.
pub(crate) fn signed_labels(y: &[bool]) -> Vec<f64> {
    y.iter().map(|&l| if l { 1.0 } else { -1.0 }).collect()
}

/// Weight of every sample under `class_weight`.
pub(crate) fn sample_weights(class_weight: ClassWeight, y: &[bool]) -> Vec<f64> {
    let [neg, pos] = class_weight.weights(y);
    y.iter().map(|&l| if l { pos } else { neg }).collect()
}
