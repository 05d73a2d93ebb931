//! Ordered `(text, label)` pairs.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TextClfError};

/// Texts with binary labels; `texts[i]` is labeled `labels[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledTextSet {
    texts: Vec<String>,
    labels: Vec<bool>,
}

impl LabeledTextSet {
    /// Create a set, rejecting texts and labels of different lengths.
    pub fn new(texts: Vec<String>, labels: Vec<bool>) -> Result<Self> {
        if texts.len() != labels.len() {
            return Err(TextClfError::invalid_argument(format!(
                "{} texts but {} labels",
                texts.len(),
                labels.len()
            )));
        }
        Ok(Self { texts, labels })
    }

    /// Build a set from `(text, label)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        let (texts, labels) = pairs.into_iter().map(|(t, l)| (t.into(), l)).unzip();
        Self { texts, labels }
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn labels(&self) -> &[bool] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Fraction of positive labels, `0.0` for an empty set.
    pub fn positive_fraction(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().filter(|&&l| l).count() as f64 / self.labels.len() as f64
    }

    /// New set made of the given rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(TextClfError::invalid_argument(format!(
                "index {bad} out of bounds for {} examples",
                self.len()
            )));
        }
        Ok(Self {
            texts: indices.iter().map(|&i| self.texts[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        })
    }

    /// Split into `(texts, labels)`.
    pub fn into_parts(self) -> (Vec<String>, Vec<bool>) {
        (self.texts, self.labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_mismatch_is_rejected() {
        let err = LabeledTextSet::new(vec!["a".into(), "b".into()], vec![true]).unwrap_err();
        assert!(matches!(err, TextClfError::InvalidArgument(_)));
    }

    #[test]
    fn test_select_keeps_pairs_together() {
        let set = LabeledTextSet::from_pairs([("x", true), ("y", false), ("z", true)]);
        let selected = set.select(&[2, 1]).unwrap();
        assert_eq!(selected.texts(), &["z", "y"]);
        assert_eq!(selected.labels(), &[true, false]);
        assert!(set.select(&[3]).is_err());
    }

    #[test]
    fn test_positive_fraction() {
        let set = LabeledTextSet::from_pairs([("x", true), ("y", false), ("z", false), ("w", false)]);
        assert_eq!(set.positive_fraction(), 0.25);
        assert_eq!(LabeledTextSet::from_pairs(Vec::<(String, bool)>::new()).positive_fraction(), 0.0);
    }
}
