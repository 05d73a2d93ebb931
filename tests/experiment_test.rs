//! End-to-end experiments over lexical features.

use textclf::classifier::{ClassifierKind, GridBase, LogisticRegression};
use textclf::dataset::LabeledTextSet;
use textclf::error::Result;
use textclf::experiment::{ExperimentConfig, ExperimentRunner, FeatureKind, TextPipeline};
use textclf::feature::LexicalConfig;
use textclf::metrics::{EvaluationResult, Scoring};

const INSULTS: &[&str] = &["idiot", "moron", "loser", "clown", "fool"];
const PRAISE: &[&str] = &["great", "thanks", "helpful", "insightful", "lovely"];
const FILLER: &[&str] = &["the", "article", "about", "city", "council", "budget", "today"];

/// Synthetic comments, 30% of them insulting.
fn comments(n: usize, offset: usize) -> LabeledTextSet {
    LabeledTextSet::from_pairs((0..n).map(|i| {
        let j = i + offset;
        let toxic = j % 10 < 3;
        let marker = if toxic {
            INSULTS[j % INSULTS.len()]
        } else {
            PRAISE[j % PRAISE.len()]
        };
        let text = format!(
            "{} {} {} {}",
            FILLER[j % FILLER.len()],
            marker,
            FILLER[(j / 3) % FILLER.len()],
            FILLER[(j / 7) % FILLER.len()]
        );
        (text, toxic)
    }))
}

fn in_unit_range(result: &EvaluationResult) -> bool {
    [result.f1, result.precision, result.recall, result.accuracy]
        .iter()
        .all(|m| (0.0..=1.0).contains(m))
}

#[test]
fn test_wcount_logreg() -> Result<()> {
    let config = ExperimentConfig {
        label: "synthetic".into(),
        classifier: ClassifierKind::LogReg,
        features: FeatureKind::Wcount,
        ..Default::default()
    };
    let report = ExperimentRunner::new().run(&comments(100, 0), &comments(50, 100), &config)?;

    assert!(in_unit_range(&report.evaluation));
    assert_eq!(report.label, "synthetic");
    assert_eq!(report.train_size, 100);
    assert_eq!(report.test_size, 50);
    assert!(report.n_features >= INSULTS.len() + PRAISE.len());
    Ok(())
}

#[test]
fn test_tfidf_bigrams_logreg_grid() -> Result<()> {
    let config = ExperimentConfig {
        classifier: ClassifierKind::Grid(GridBase::LogReg),
        features: FeatureKind::Tfidf,
        bigrams: true,
        balanced: true,
        scoring: Scoring::F1,
        n_jobs: 2,
        ..Default::default()
    };
    let report = ExperimentRunner::new().run(&comments(100, 0), &comments(50, 100), &config)?;

    let grid = report.grid.expect("grid summary");
    assert!((0.0..=1.0).contains(&grid.best_score));
    assert!(grid.best_params.contains_key("C"));

    // Seven values of C; the best candidate is the first with the top score.
    assert_eq!(report.candidates.len(), 7);
    let top = report
        .candidates
        .iter()
        .map(|c| c.mean_score)
        .fold(f64::NEG_INFINITY, f64::max);
    let best = report
        .candidates
        .iter()
        .find(|c| c.mean_score == top)
        .unwrap();
    assert_eq!(best.params, grid.best_params);
    assert!(report.candidates.iter().all(|c| c.fold_scores.len() == 5));
    assert!(in_unit_range(&report.evaluation));
    Ok(())
}

#[test]
fn test_same_seed_same_report() -> Result<()> {
    let config = ExperimentConfig {
        classifier: ClassifierKind::Svc,
        features: FeatureKind::Wcount,
        subsample: Some(60),
        ..Default::default()
    };
    let runner = ExperimentRunner::new();
    let first = runner.run(&comments(100, 0), &comments(40, 7), &config)?;
    let second = runner.run(&comments(100, 0), &comments(40, 7), &config)?;
    assert_eq!(first, second);
    assert_eq!(first.train_size, 60);
    assert!(first.candidates.is_empty());
    Ok(())
}

#[test]
fn test_split_run() -> Result<()> {
    let config = ExperimentConfig {
        features: FeatureKind::Wcount,
        ..Default::default()
    };
    let report = ExperimentRunner::new().run_with_split(&comments(150, 0), &config, 0.33)?;
    assert_eq!(report.test_size, 50);
    assert_eq!(report.train_size, 100);
    assert!(in_unit_range(&report.evaluation));
    Ok(())
}

#[test]
fn test_bert_features_rejected_on_random_split() {
    let config = ExperimentConfig {
        features: FeatureKind::TfidfBert,
        ..Default::default()
    };
    let err = ExperimentRunner::new()
        .run_with_split(&comments(30, 0), &config, 0.33)
        .unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_pipeline_fits_on_training_text_only() -> Result<()> {
    let mut pipeline = TextPipeline::from_config(
        &LexicalConfig::default(),
        Box::new(LogisticRegression::new()),
    )?;
    pipeline.fit(&comments(100, 0))?;
    let result = pipeline.evaluate(&comments(60, 3), Some(30), 883)?;
    assert!(in_unit_range(&result));
    Ok(())
}
