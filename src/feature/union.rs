//! Column-wise union of several text transformers.

use crate::error::{Result, TextClfError};
use crate::feature::TextTransformer;
use crate::matrix::FeatureMatrix;

/// Concatenates the outputs of its parts, in insertion order.
///
/// Every part is fitted on the same corpus; `transform` appends the columns
/// of each part to the right of the previous ones.
#[derive(Default)]
pub struct FeatureUnion {
    parts: Vec<(String, Box<dyn TextTransformer>)>,
}

impl std::fmt::Debug for FeatureUnion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureUnion")
            .field(
                "parts",
                &self
                    .parts
                    .iter()
                    .map(|(name, part)| (name.as_str(), part.n_features()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl FeatureUnion {
    /// Create an empty union.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named part.
    pub fn with_part<S: Into<String>>(mut self, name: S, part: Box<dyn TextTransformer>) -> Self {
        self.parts.push((name.into(), part));
        self
    }

    /// Names of the parts in column order.
    pub fn part_names(&self) -> Vec<&str> {
        self.parts.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl TextTransformer for FeatureUnion {
    fn fit(&mut self, corpus: &[String]) -> Result<()> {
        for (_, part) in self.parts.iter_mut() {
            part.fit(corpus)?;
        }
        Ok(())
    }

    fn transform(&self, texts: &[String]) -> Result<FeatureMatrix> {
        let mut parts = self.parts.iter();
        let (_, first) = parts
            .next()
            .ok_or_else(|| TextClfError::config("feature union has no parts"))?;

        let mut combined = first.transform(texts)?;
        for (_, part) in parts {
            combined = combined.horizontal_concat(&part.transform(texts)?)?;
        }
        Ok(combined)
    }

    fn n_features(&self) -> usize {
        self.parts.iter().map(|(_, part)| part.n_features()).sum()
    }

    fn name(&self) -> &str {
        "union"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::vectorizer::Vectorizer;

    #[test]
    fn test_union_puts_first_part_columns_first() {
        let corpus = vec!["red apple pie".to_string(), "green apple".to_string()];
        let mut union = FeatureUnion::new()
            .with_part("words", Box::new(Vectorizer::count().unwrap()))
            .with_part(
                "bigrams",
                Box::new(Vectorizer::count().unwrap().with_ngram_range(2, 2)),
            );

        let matrix = union.fit_transform(&corpus).unwrap();

        assert_eq!(union.part_names(), vec!["words", "bigrams"]);
        // words: apple, green, pie, red; bigrams: apple pie, green apple, red apple
        assert_eq!(union.n_features(), 7);
        assert_eq!(matrix.shape(), (2, 7));
        assert_eq!(matrix.get(0, 0), 1.0); // apple
        assert_eq!(matrix.get(1, 5), 1.0); // green apple
        assert_eq!(matrix.get(1, 4), 0.0); // apple pie
    }

    #[test]
    fn test_empty_union_is_a_config_error() {
        let union = FeatureUnion::new();
        assert!(union.transform(&["x".to_string()]).unwrap_err().is_config());
    }
}
