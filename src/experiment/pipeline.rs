//! A text-in, label-out classifier.

use crate::classifier::Estimator;
use crate::dataset::{LabeledTextSet, subsample};
use crate::error::{Result, TextClfError};
use crate::feature::{LexicalConfig, TextTransformer, build_lexical_extractor};
use crate::metrics::{EvaluationResult, evaluate};

/// Seed of the optional test subsample in [`TextPipeline::evaluate`].
pub const DEFAULT_EVAL_SEED: u64 = 883;

/// A lexical extractor followed by an estimator.
///
/// Unlike [`ExperimentRunner`](crate::experiment::ExperimentRunner), the
/// extractor only ever sees training text.
pub struct TextPipeline {
    extractor: Box<dyn TextTransformer>,
    classifier: Box<dyn Estimator>,
    fitted: bool,
}

impl std::fmt::Debug for TextPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextPipeline")
            .field("extractor", &self.extractor.name())
            .field("classifier", &self.classifier.name())
            .field("fitted", &self.fitted)
            .finish()
    }
}

impl TextPipeline {
    pub fn new(extractor: Box<dyn TextTransformer>, classifier: Box<dyn Estimator>) -> Self {
        Self {
            extractor,
            classifier,
            fitted: false,
        }
    }

    /// Build the extractor described by `config` in front of `classifier`.
    pub fn from_config(config: &LexicalConfig, classifier: Box<dyn Estimator>) -> Result<Self> {
        Ok(Self::new(build_lexical_extractor(config)?, classifier))
    }

    /// Fit the extractor and the estimator on `train`.
    pub fn fit(&mut self, train: &LabeledTextSet) -> Result<()> {
        let features = self.extractor.fit_transform(train.texts())?;
        log::debug!(
            "{} produced {} features for {} texts",
            self.extractor.name(),
            features.n_cols(),
            train.len()
        );
        self.classifier.fit(&features, train.labels())?;
        self.fitted = true;
        Ok(())
    }

    pub fn predict(&self, texts: &[String]) -> Result<Vec<bool>> {
        if !self.fitted {
            return Err(TextClfError::not_fitted("TextPipeline"));
        }
        let features = self.extractor.transform(texts)?;
        self.classifier.predict(&features)
    }

    /// Score predictions on `test`, optionally on a seeded subsample of it.
    pub fn evaluate(
        &self,
        test: &LabeledTextSet,
        subsample_size: Option<usize>,
        seed: u64,
    ) -> Result<EvaluationResult> {
        let test = subsample(test, subsample_size, seed)?;
        let predicted = self.predict(test.texts())?;
        let result = evaluate(&predicted, test.labels())?;
        log::info!("{result}");
        Ok(result)
    }

    pub fn classifier(&self) -> &dyn Estimator {
        self.classifier.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::LogisticRegression;
    use crate::feature::LexicalKind;

    fn reviews() -> LabeledTextSet {
        LabeledTextSet::from_pairs((0..40).map(|i| {
            if i % 4 == 0 {
                (format!("awful terrible rubbish idiot {i}"), true)
            } else {
                (format!("lovely helpful kind answer {i}"), false)
            }
        }))
    }

    #[test]
    fn test_fit_predict() {
        let config = LexicalConfig {
            kind: LexicalKind::Count,
            ..Default::default()
        };
        let mut pipeline =
            TextPipeline::from_config(&config, Box::new(LogisticRegression::new())).unwrap();
        pipeline.fit(&reviews()).unwrap();

        let predicted = pipeline
            .predict(&[
                "awful terrible rubbish idiot".to_string(),
                "lovely helpful kind answer".to_string(),
            ])
            .unwrap();
        assert_eq!(predicted, vec![true, false]);

        let result = pipeline.evaluate(&reviews(), None, DEFAULT_EVAL_SEED).unwrap();
        assert_eq!(result.accuracy, 1.0);
    }

    #[test]
    fn test_predict_before_fit() {
        let pipeline =
            TextPipeline::from_config(&LexicalConfig::default(), Box::new(LogisticRegression::new()))
                .unwrap();
        let err = pipeline.predict(&["text".to_string()]).unwrap_err();
        assert!(matches!(err, TextClfError::NotFitted(_)));
    }
}
