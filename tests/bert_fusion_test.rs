//! Experiments over cached BERT features, alone and fused with lexical ones.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use textclf::bert::{
    BertFeatureCache, BertFeatureKind, BertOutput, CacheConfig, ImportedInference,
    InferenceRequest, ModelInference, NoInference,
};
use textclf::classifier::ClassifierKind;
use textclf::dataset::DatasetRegistry;
use textclf::error::Result;
use textclf::experiment::{BertSourceConfig, ExperimentConfig, ExperimentRunner, FeatureKind};
use textclf::matrix::FeatureMatrix;

/// Scores texts mentioning "idiot" as toxic.
#[derive(Default)]
struct KeywordModel {
    calls: AtomicUsize,
}

impl ModelInference for KeywordModel {
    fn infer(&self, request: &InferenceRequest<'_>) -> Result<BertOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rows: Vec<Vec<f64>> = request
            .texts
            .iter()
            .map(|t| {
                if t.contains("idiot") {
                    vec![0.1, 0.9]
                } else {
                    vec![0.8, 0.2]
                }
            })
            .collect();
        let labels = rows.iter().map(|r| usize::from(r[1] > r[0])).collect();
        Ok(BertOutput::Predictions {
            probabilities: FeatureMatrix::from_dense_rows(rows)?,
            labels,
        })
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

fn write_split(dir: &Path, split: &str, n: usize) {
    let mut file = fs::File::create(dir.join(format!("{split}.jsonl"))).unwrap();
    for i in 0..n {
        let toxic = i % 4 == 0;
        let text = if toxic {
            format!("you idiot number {i}")
        } else {
            format!("a kind reply number {i}")
        };
        writeln!(
            file,
            "{}",
            serde_json::json!({"text": text, "label": u8::from(toxic)})
        )
        .unwrap();
    }
}

fn data_dir() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("cro");
    fs::create_dir_all(&dir).unwrap();
    write_split(&dir, "train", 80);
    write_split(&dir, "test", 40);
    root
}

fn config(features: FeatureKind) -> ExperimentConfig {
    ExperimentConfig {
        label: "cro".into(),
        classifier: ClassifierKind::LogReg,
        features,
        bert: Some(BertSourceConfig {
            dataset: "cro".into(),
            train_split: "train".into(),
            test_split: "test".into(),
            label: String::new(),
            model: "crosloengual-bert".into(),
            features: BertFeatureKind::Predict,
        }),
        ..Default::default()
    }
}

#[test]
fn test_fused_features_through_cache() -> Result<()> {
    let data = data_dir();
    let cache_dir = tempfile::tempdir()?;
    let registry = DatasetRegistry::from_directory(data.path())?;
    let train = registry.load("cro", "train")?;
    let test = registry.load("cro", "test")?;

    let model = Arc::new(KeywordModel::default());
    let cache = BertFeatureCache::new(CacheConfig::new(cache_dir.path()), registry, model.clone());
    let runner = ExperimentRunner::new().with_bert_cache(cache);

    let bert_only = runner.run(&train, &test, &config(FeatureKind::Bert))?;
    assert_eq!(bert_only.n_features, 2);
    assert_eq!(model.calls.load(Ordering::SeqCst), 2);

    let fused = runner.run(&train, &test, &config(FeatureKind::WcountBert))?;
    assert!(fused.n_features > 2);
    assert!(fused.evaluation.f1 > 0.9);
    // Both splits were served from disk the second time.
    assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    assert_eq!(fs::read_dir(cache_dir.path())?.count(), 2);
    Ok(())
}

#[test]
fn test_subsampling_keeps_bert_rows_aligned() -> Result<()> {
    let data = data_dir();
    let cache_dir = tempfile::tempdir()?;
    let registry = DatasetRegistry::from_directory(data.path())?;
    let train = registry.load("cro", "train")?;
    let test = registry.load("cro", "test")?;

    let cache = BertFeatureCache::new(
        CacheConfig::new(cache_dir.path()),
        registry,
        Arc::new(KeywordModel::default()),
    );
    let config = ExperimentConfig {
        subsample: Some(40),
        ..config(FeatureKind::Bert)
    };
    let report = ExperimentRunner::new()
        .with_bert_cache(cache)
        .run(&train, &test, &config)?;

    assert_eq!(report.train_size, 40);
    assert_eq!(report.evaluation.f1, 1.0);
    Ok(())
}

#[test]
fn test_imported_outputs_fill_the_cache() -> Result<()> {
    let data = data_dir();
    let cache_dir = tempfile::tempdir()?;

    let registry = DatasetRegistry::from_directory(data.path())?;
    let mut imported = ImportedInference::new("m");
    for split in ["train", "test"] {
        for text in registry.load("cro", split)?.texts() {
            let p = if text.contains("idiot") { 0.9 } else { 0.2 };
            imported = imported.with_probabilities(text.as_str(), vec![1.0 - p, p]);
        }
    }

    let splits = vec!["train".to_string(), "test".to_string()];
    let cache = BertFeatureCache::new(
        CacheConfig::new(cache_dir.path()),
        registry.clone(),
        Arc::new(imported),
    );
    let done = cache.precompute("cro", "m", &splits, BertFeatureKind::Predict)?;
    assert_eq!(done[0].1, 80);
    assert_eq!(done[1].1, 40);

    // A cache without any inference backend now serves the entries.
    let offline = BertFeatureCache::new(
        CacheConfig::new(cache_dir.path()),
        registry,
        Arc::new(NoInference::new()),
    );
    for (request, rows) in &done {
        assert!(offline.contains(request));
        assert_eq!(offline.get(request)?.n_rows(), *rows);
    }
    Ok(())
}

#[test]
fn test_missing_entry_without_backend_fails() -> Result<()> {
    let data = data_dir();
    let cache_dir = tempfile::tempdir()?;
    let registry = DatasetRegistry::from_directory(data.path())?;
    let train = registry.load("cro", "train")?;
    let test = registry.load("cro", "test")?;

    let cache = BertFeatureCache::new(
        CacheConfig::new(cache_dir.path()),
        registry,
        Arc::new(NoInference::new()),
    );
    let result = ExperimentRunner::new()
        .with_bert_cache(cache)
        .run(&train, &test, &config(FeatureKind::TfidfBert));
    assert!(result.is_err());
    assert_eq!(fs::read_dir(cache_dir.path())?.count(), 0);
    Ok(())
}
