//! Bag-of-words vectorizers: term counts and TF-IDF.

use std::collections::HashSet;
use std::sync::Arc;

use ahash::AHashMap;

use crate::analysis::analyzer::{Analyzer, WordAnalyzer};
use crate::error::{Result, TextClfError};
use crate::feature::TextTransformer;
use crate::matrix::FeatureMatrix;

/// How term occurrences become feature values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Weighting {
    /// Raw counts, or 1.0 for any occurrence when `binary`.
    Count { binary: bool },
    /// `tf * idf` with smoothed idf and L2-normalised rows.
    ///
    /// With `sublinear_tf` the term frequency is replaced by `1 + ln(tf)`.
    Tfidf { sublinear_tf: bool },
}

/// Fitted vocabulary: terms in column order plus optional idf weights.
#[derive(Debug, Clone)]
struct Vocabulary {
    terms: Vec<String>,
    index: AHashMap<String, usize>,
    idf: Option<Vec<f64>>,
}

/// Word n-gram vectorizer.
pub struct Vectorizer {
    analyzer: Arc<dyn Analyzer>,
    weighting: Weighting,
    ngram_range: (usize, usize),
    max_features: Option<usize>,
    vocabulary: Option<Vocabulary>,
}

impl std::fmt::Debug for Vectorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vectorizer")
            .field("weighting", &self.weighting)
            .field("ngram_range", &self.ngram_range)
            .field("max_features", &self.max_features)
            .field("vocabulary_size", &self.vocabulary_size())
            .field("analyzer", &self.analyzer.name())
            .finish()
    }
}

impl Vectorizer {
    /// Create a vectorizer with the given weighting and the default
    /// [`WordAnalyzer`].
    pub fn new(weighting: Weighting) -> Result<Self> {
        Ok(Self {
            analyzer: Arc::new(WordAnalyzer::new()?),
            weighting,
            ngram_range: (1, 1),
            max_features: None,
            vocabulary: None,
        })
    }

    /// Count vectorizer (non-binary).
    pub fn count() -> Result<Self> {
        Self::new(Weighting::Count { binary: false })
    }

    /// TF-IDF vectorizer with sublinear term frequency.
    pub fn tfidf() -> Result<Self> {
        Self::new(Weighting::Tfidf { sublinear_tf: true })
    }

    /// Emit 1.0 instead of counts. Only meaningful for count weighting.
    pub fn with_binary(mut self, binary: bool) -> Self {
        if let Weighting::Count { .. } = self.weighting {
            self.weighting = Weighting::Count { binary };
        }
        self
    }

    /// Set the inclusive word n-gram range, e.g. `(2, 2)` for bigrams only.
    pub fn with_ngram_range(mut self, min_n: usize, max_n: usize) -> Self {
        let min_n = min_n.max(1);
        self.ngram_range = (min_n, max_n.max(min_n));
        self
    }

    /// Keep only the `max_features` most frequent terms of the corpus.
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Replace the analyzer producing the word tokens.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// The weighting scheme.
    pub fn weighting(&self) -> Weighting {
        self.weighting
    }

    /// The n-gram range.
    pub fn ngram_range(&self) -> (usize, usize) {
        self.ngram_range
    }

    /// Number of fitted terms.
    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.as_ref().map(|v| v.terms.len()).unwrap_or(0)
    }

    /// Fitted terms in column order.
    pub fn terms(&self) -> &[String] {
        self.vocabulary
            .as_ref()
            .map(|v| v.terms.as_slice())
            .unwrap_or(&[])
    }

    /// Column of `term`, if it is in the vocabulary.
    pub fn column_of(&self, term: &str) -> Option<usize> {
        self.vocabulary.as_ref()?.index.get(term).copied()
    }

    /// Word n-grams of `text` in the configured range.
    fn ngrams(&self, text: &str) -> Vec<String> {
        let words = self.analyzer.terms(text);
        let (min_n, max_n) = self.ngram_range;
        let mut grams = Vec::new();
        for n in min_n..=max_n {
            if n == 1 {
                grams.extend(words.iter().cloned());
            } else if words.len() >= n {
                grams.extend(words.windows(n).map(|w| w.join(" ")));
            }
        }
        grams
    }
}

impl TextTransformer for Vectorizer {
    fn fit(&mut self, corpus: &[String]) -> Result<()> {
        let mut term_frequency: AHashMap<String, usize> = AHashMap::new();
        let mut document_frequency: AHashMap<String, usize> = AHashMap::new();

        for doc in corpus {
            let grams = self.ngrams(doc);
            let unique: HashSet<&String> = grams.iter().collect();
            for gram in unique {
                *document_frequency.entry(gram.clone()).or_insert(0) += 1;
            }
            for gram in grams {
                *term_frequency.entry(gram).or_insert(0) += 1;
            }
        }

        if term_frequency.is_empty() {
            return Err(TextClfError::invalid_argument(
                "empty vocabulary: the corpus contains no terms",
            ));
        }

        // Binary counts rank terms by the number of documents they occur in.
        let frequency = match self.weighting {
            Weighting::Count { binary: true } => &document_frequency,
            _ => &term_frequency,
        };
        let mut terms: Vec<(String, usize)> = frequency
            .iter()
            .map(|(term, &count)| (term.clone(), count))
            .collect();
        if let Some(limit) = self.max_features {
            terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            terms.truncate(limit);
        }
        let mut terms: Vec<String> = terms.into_iter().map(|(term, _)| term).collect();
        terms.sort();

        let index: AHashMap<String, usize> = terms
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();

        let idf = match self.weighting {
            Weighting::Tfidf { .. } => {
                let n = corpus.len() as f64;
                Some(
                    terms
                        .iter()
                        .map(|term| {
                            let df = document_frequency.get(term).copied().unwrap_or(0) as f64;
                            ((1.0 + n) / (1.0 + df)).ln() + 1.0
                        })
                        .collect(),
                )
            }
            Weighting::Count { .. } => None,
        };

        log::debug!(
            "fitted {:?} vectorizer on {} documents: {} terms",
            self.weighting,
            corpus.len(),
            terms.len()
        );

        self.vocabulary = Some(Vocabulary { terms, index, idf });
        Ok(())
    }

    fn transform(&self, texts: &[String]) -> Result<FeatureMatrix> {
        let vocabulary = self
            .vocabulary
            .as_ref()
            .ok_or_else(|| TextClfError::not_fitted("vectorizer must be fitted before transform"))?;

        let mut rows = Vec::with_capacity(texts.len());
        for text in texts {
            let mut counts: AHashMap<usize, f64> = AHashMap::new();
            for gram in self.ngrams(text) {
                if let Some(&col) = vocabulary.index.get(&gram) {
                    *counts.entry(col).or_insert(0.0) += 1.0;
                }
            }

            let mut row: Vec<(usize, f64)> = counts.into_iter().collect();
            match self.weighting {
                Weighting::Count { binary } => {
                    if binary {
                        row.iter_mut().for_each(|(_, v)| *v = 1.0);
                    }
                }
                Weighting::Tfidf { sublinear_tf } => {
                    let idf = vocabulary.idf.as_deref().unwrap_or(&[]);
                    for (col, v) in row.iter_mut() {
                        let tf = if sublinear_tf { 1.0 + v.ln() } else { *v };
                        *v = tf * idf.get(*col).copied().unwrap_or(1.0);
                    }
                    let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
                    if norm > 0.0 {
                        row.iter_mut().for_each(|(_, v)| *v /= norm);
                    }
                }
            }
            rows.push(row);
        }

        FeatureMatrix::from_sparse_rows(vocabulary.terms.len(), rows)
    }

    fn n_features(&self) -> usize {
        self.vocabulary_size()
    }

    fn name(&self) -> &str {
        match self.weighting {
            Weighting::Count { .. } => "count",
            Weighting::Tfidf { .. } => "tfidf",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "the cat sat on the mat".to_string(),
            "the dog sat".to_string(),
            "a cat and a dog".to_string(),
        ]
    }

    #[test]
    fn test_count_vocabulary_is_sorted() {
        let mut vectorizer = Vectorizer::count().unwrap();
        vectorizer.fit(&corpus()).unwrap();

        // "a" is a single character and never becomes a term.
        assert_eq!(
            vectorizer.terms(),
            &["and", "cat", "dog", "mat", "on", "sat", "the"]
        );
    }

    #[test]
    fn test_count_and_binary_values() {
        let mut counts = Vectorizer::count().unwrap();
        let matrix = counts.fit_transform(&corpus()).unwrap();
        let the = counts.column_of("the").unwrap();
        assert_eq!(matrix.get(0, the), 2.0);

        let mut binary = Vectorizer::count().unwrap().with_binary(true);
        let matrix = binary.fit_transform(&corpus()).unwrap();
        assert_eq!(matrix.get(0, the), 1.0);
        assert_eq!(matrix.n_rows(), 3);
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let mut vectorizer = Vectorizer::count()
            .unwrap()
            .with_max_features(Some(2));
        vectorizer.fit(&corpus()).unwrap();

        // "the" occurs three times; "cat", "dog" and "sat" twice each.
        assert_eq!(vectorizer.terms(), &["cat", "the"]);
    }

    #[test]
    fn test_binary_max_features_ranks_by_document_frequency() {
        let corpus = vec!["aa aa aa".to_string(), "bb".to_string(), "bb cc".to_string()];

        let mut binary = Vectorizer::count()
            .unwrap()
            .with_binary(true)
            .with_max_features(Some(1));
        let matrix = binary.fit_transform(&corpus).unwrap();
        assert_eq!(binary.terms(), &["bb"]);
        assert_eq!(
            (0..3).map(|r| matrix.get(r, 0)).collect::<Vec<_>>(),
            vec![0.0, 1.0, 1.0]
        );

        let mut counts = Vectorizer::count().unwrap().with_max_features(Some(1));
        counts.fit(&corpus).unwrap();
        assert_eq!(counts.terms(), &["aa"]);
    }

    #[test]
    fn test_bigrams() {
        let mut vectorizer = Vectorizer::count().unwrap().with_ngram_range(2, 2);
        vectorizer.fit(&corpus()).unwrap();
        assert!(vectorizer.column_of("the cat").is_some());
        assert!(vectorizer.column_of("cat").is_none());
    }

    #[test]
    fn test_tfidf_rows_are_normalised() {
        let mut vectorizer = Vectorizer::tfidf().unwrap();
        let matrix = vectorizer.fit_transform(&corpus()).unwrap();

        for row in matrix.rows() {
            assert!((row.squared_norm() - 1.0).abs() < 1e-9);
        }

        // "on" and "mat" occur only in the first document and share a weight.
        let on = vectorizer.column_of("on").unwrap();
        let mat = vectorizer.column_of("mat").unwrap();
        assert!((matrix.get(0, on) - matrix.get(0, mat)).abs() < 1e-12);
        assert!(matrix.get(0, on) > matrix.get(0, vectorizer.column_of("sat").unwrap()));
    }

    #[test]
    fn test_transform_ignores_unknown_terms_and_keeps_rows() {
        let mut vectorizer = Vectorizer::count().unwrap();
        vectorizer.fit(&corpus()).unwrap();
        let matrix = vectorizer
            .transform(&["zebra crossing".to_string(), "cat".to_string()])
            .unwrap();
        assert_eq!(matrix.n_rows(), 2);
        assert_eq!(matrix.row(0).iter().count(), 0);
    }

    #[test]
    fn test_transform_before_fit() {
        let vectorizer = Vectorizer::tfidf().unwrap();
        let err = vectorizer.transform(&corpus()).unwrap_err();
        assert!(matches!(err, TextClfError::NotFitted(_)));
    }

    #[test]
    fn test_empty_vocabulary() {
        let mut vectorizer = Vectorizer::count().unwrap();
        assert!(vectorizer.fit(&["a b c".to_string()]).is_err());
    }
}
