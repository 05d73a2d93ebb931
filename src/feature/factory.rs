//! Builds the lexical extractors used by experiments.
//!
//! | kind    | unigram part                        | bigram part (when `bigrams`)           |
//! |---------|-------------------------------------|----------------------------------------|
//! | `tfidf` | sublinear TF-IDF, `max_features`    | sublinear TF-IDF, 25000 terms          |
//! | `count` | counts (`binary`), `max_features`   | counts (`binary`), `max_features`      |
//!
//! Extractors are meant to be fitted on the union of train and test texts
//! before either split is transformed; see
//! [`ExperimentRunner`](crate::experiment::ExperimentRunner).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TextClfError};
use crate::feature::TextTransformer;
use crate::feature::union::FeatureUnion;
use crate::feature::vectorizer::Vectorizer;

/// Vocabulary cap of the TF-IDF bigram part.
pub const TFIDF_BIGRAM_MAX_FEATURES: usize = 25_000;

/// Lexical weighting family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LexicalKind {
    /// Word counts.
    Count,
    /// Sublinear TF-IDF.
    Tfidf,
}

impl FromStr for LexicalKind {
    type Err = TextClfError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "count" | "wcount" => Ok(LexicalKind::Count),
            "tfidf" => Ok(LexicalKind::Tfidf),
            other => Err(TextClfError::config(format!(
                "unknown lexical feature kind: {other}"
            ))),
        }
    }
}

impl fmt::Display for LexicalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexicalKind::Count => write!(f, "wcount"),
            LexicalKind::Tfidf => write!(f, "tfidf"),
        }
    }
}

/// Configuration of a lexical extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalConfig {
    pub kind: LexicalKind,
    /// Vocabulary cap of the unigram part (and of the count bigram part).
    pub max_features: Option<usize>,
    /// Binary counts; ignored for TF-IDF.
    pub binary: bool,
    /// Union the unigram vectorizer with a bigram vectorizer.
    pub bigrams: bool,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            kind: LexicalKind::Tfidf,
            max_features: None,
            binary: true,
            bigrams: false,
        }
    }
}

/// Build an unfitted lexical extractor for `config`.
pub fn build_lexical_extractor(config: &LexicalConfig) -> Result<Box<dyn TextTransformer>> {
    match config.kind {
        LexicalKind::Tfidf => tfidf_features(config.max_features, config.bigrams),
        LexicalKind::Count => wcount_features(config.max_features, config.binary, config.bigrams),
    }
}

/// Sublinear TF-IDF over words, optionally unioned with TF-IDF bigrams.
pub fn tfidf_features(
    max_features: Option<usize>,
    bigrams: bool,
) -> Result<Box<dyn TextTransformer>> {
    let words = Vectorizer::tfidf()?.with_max_features(max_features);
    if !bigrams {
        return Ok(Box::new(words));
    }
    let pairs = Vectorizer::tfidf()?
        .with_max_features(Some(TFIDF_BIGRAM_MAX_FEATURES))
        .with_ngram_range(2, 2);
    Ok(Box::new(
        FeatureUnion::new()
            .with_part("words", Box::new(words))
            .with_part("bigrams", Box::new(pairs)),
    ))
}

/// Word counts, optionally unioned with bigram counts.
pub fn wcount_features(
    max_features: Option<usize>,
    binary: bool,
    bigrams: bool,
) -> Result<Box<dyn TextTransformer>> {
    let words = Vectorizer::count()?
        .with_binary(binary)
        .with_max_features(max_features);
    if !bigrams {
        return Ok(Box::new(words));
    }
    let pairs = Vectorizer::count()?
        .with_binary(binary)
        .with_max_features(max_features)
        .with_ngram_range(2, 2);
    Ok(Box::new(
        FeatureUnion::new()
            .with_part("words", Box::new(words))
            .with_part("bigrams", Box::new(pairs)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "you are a horrible person".to_string(),
            "have a nice day".to_string(),
            "horrible horrible day".to_string(),
        ]
    }

    #[test]
    fn test_lexical_kind_parsing() {
        assert_eq!("wcount".parse::<LexicalKind>().unwrap(), LexicalKind::Count);
        assert_eq!("tfidf".parse::<LexicalKind>().unwrap(), LexicalKind::Tfidf);
        assert!("bow".parse::<LexicalKind>().unwrap_err().is_config());
    }

    #[test]
    fn test_unigram_extractor() {
        let config = LexicalConfig {
            kind: LexicalKind::Count,
            binary: false,
            ..Default::default()
        };
        let mut extractor = build_lexical_extractor(&config).unwrap();
        let matrix = extractor.fit_transform(&corpus()).unwrap();

        assert_eq!(extractor.name(), "count");
        assert_eq!(matrix.n_rows(), 3);
        // are, day, have, horrible, nice, person, you
        assert_eq!(matrix.n_cols(), 7);
        assert_eq!(matrix.get(2, 3), 2.0);
    }

    #[test]
    fn test_bigram_union_appends_columns() {
        let config = LexicalConfig {
            kind: LexicalKind::Tfidf,
            bigrams: true,
            ..Default::default()
        };
        let mut extractor = build_lexical_extractor(&config).unwrap();
        let matrix = extractor.fit_transform(&corpus()).unwrap();

        assert_eq!(extractor.name(), "union");
        // 7 words + 7 bigrams: "are horrible", "have nice", "horrible day",
        // "horrible horrible", "horrible person", "nice day", "you are"
        assert_eq!(matrix.n_cols(), 14);
        assert_eq!(matrix.n_rows(), 3);
    }

    #[test]
    fn test_count_bigrams_share_max_features() {
        let config = LexicalConfig {
            kind: LexicalKind::Count,
            max_features: Some(2),
            bigrams: true,
            binary: true,
        };
        let mut extractor = build_lexical_extractor(&config).unwrap();
        extractor.fit(&corpus()).unwrap();
        assert_eq!(extractor.n_features(), 4);
    }

    #[test]
    fn test_binary_wcount_keeps_widest_spread_terms() {
        let config = LexicalConfig {
            kind: LexicalKind::Count,
            max_features: Some(1),
            bigrams: false,
            binary: true,
        };
        let texts = vec!["aa aa aa".to_string(), "bb".to_string(), "bb cc".to_string()];
        let mut extractor = build_lexical_extractor(&config).unwrap();
        let matrix = extractor.fit_transform(&texts).unwrap();

        assert_eq!(matrix.n_cols(), 1);
        assert_eq!(matrix.get(0, 0), 0.0);
        assert_eq!(matrix.get(1, 0), 1.0);
        assert_eq!(matrix.get(2, 0), 1.0);
    }
}
