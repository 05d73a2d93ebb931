//! On-disk memoization of BERT features.
//!
//! Every `(dataset, split, label, features, model)` tuple maps to one bincode
//! file in the cache directory:
//!
//! ```text
//! bert_features_dset_{dataset}_split_{split}_label_{label}_features_{features}_bert_[{model}].bin
//! ```
//!
//! Each field is percent-escaped (every byte outside `[A-Za-z0-9.-]`,
//! including `_`, becomes `%XX`), so the separators cannot occur inside a field
//! and distinct tuples never share a file. Entries are never invalidated;
//! the model id is part of the key.
//!
//! On a miss the texts of the split are loaded through the
//! [`DatasetRegistry`], run through the [`ModelInference`] backend and
//! written with a temporary file and a rename, so readers only ever observe
//! complete entries. Concurrent writers of the same key race harmlessly.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bert::inference::{BertFeatureKind, BertOutput, InferenceRequest, ModelInference};
use crate::dataset::DatasetRegistry;
use crate::error::{Result, TextClfError};

/// Settings of a [`BertFeatureCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Directory holding one file per cache entry.
    pub directory: PathBuf,
    /// Token limit passed to the model.
    pub max_sequence_length: usize,
    /// Compute device passed to the model (e.g. `cpu`, `cuda:0`).
    pub device: String,
}

impl CacheConfig {
    /// Default settings for entries stored under `directory`.
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            max_sequence_length: 128,
            device: "cpu".to_string(),
        }
    }

    pub fn with_max_sequence_length(mut self, max_sequence_length: usize) -> Self {
        self.max_sequence_length = max_sequence_length;
        self
    }

    pub fn with_device<S: Into<String>>(mut self, device: S) -> Self {
        self.device = device.into();
        self
    }
}

/// Identity of one set of cached BERT features.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BertFeatureRequest {
    pub dataset: String,
    pub split: String,
    /// Extra tag distinguishing variants of the same dataset split.
    pub label: String,
    pub model: String,
    pub features: BertFeatureKind,
}

impl BertFeatureRequest {
    pub fn new<D, S, M>(dataset: D, split: S, model: M, features: BertFeatureKind) -> Self
    where
        D: Into<String>,
        S: Into<String>,
        M: Into<String>,
    {
        Self {
            dataset: dataset.into(),
            split: split.into(),
            label: String::new(),
            model: model.into(),
            features,
        }
    }

    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = label.into();
        self
    }

    /// File name of the cache entry.
    pub fn cache_key(&self) -> String {
        format!(
            "bert_features_dset_{}_split_{}_label_{}_features_{}_bert_[{}].bin",
            escape(&self.dataset),
            escape(&self.split),
            escape(&self.label),
            escape(self.features.as_str()),
            escape(&self.model)
        )
    }
}

fn escape(field: &str) -> String {
    let mut escaped = String::with_capacity(field.len());
    for byte in field.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'.' || byte == b'-' {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{byte:02X}"));
        }
    }
    escaped
}

/// Read-through cache of BERT features.
pub struct BertFeatureCache {
    config: CacheConfig,
    datasets: DatasetRegistry,
    inference: Arc<dyn ModelInference>,
}

impl std::fmt::Debug for BertFeatureCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BertFeatureCache")
            .field("config", &self.config)
            .field("datasets", &self.datasets)
            .field("inference", &self.inference.name())
            .finish()
    }
}

impl BertFeatureCache {
    pub fn new(
        config: CacheConfig,
        datasets: DatasetRegistry,
        inference: Arc<dyn ModelInference>,
    ) -> Self {
        Self {
            config,
            datasets,
            inference,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Path of the entry for `request`.
    pub fn entry_path(&self, request: &BertFeatureRequest) -> PathBuf {
        self.config.directory.join(request.cache_key())
    }

    /// Whether an entry for `request` exists.
    pub fn contains(&self, request: &BertFeatureRequest) -> bool {
        self.entry_path(request).is_file()
    }

    /// Return the cached features for `request`, computing and storing them
    /// on a miss.
    pub fn get(&self, request: &BertFeatureRequest) -> Result<BertOutput> {
        let path = self.entry_path(request);
        if path.is_file() {
            log::debug!("BERT feature cache hit: {}", path.display());
            let bytes = fs::read(&path)?;
            return Ok(bincode::deserialize(&bytes)?);
        }

        log::info!(
            "BERT feature cache miss: computing {} features of {}/{} with {}",
            request.features,
            request.dataset,
            request.split,
            request.model
        );
        let texts = self
            .datasets
            .load(&request.dataset, &request.split)?
            .into_parts()
            .0;
        let output = self.inference.infer(&InferenceRequest {
            model: &request.model,
            texts: &texts,
            features: request.features,
            max_sequence_length: self.config.max_sequence_length,
            device: &self.config.device,
        })?;
        if output.n_rows() != texts.len() {
            return Err(TextClfError::inference(format!(
                "{} returned {} rows for {} texts",
                self.inference.name(),
                output.n_rows(),
                texts.len()
            )));
        }

        if let Err(e) = self.persist(&path, &output) {
            log::warn!("failed to write {}: {e}", path.display());
        }
        Ok(output)
    }

    /// Make sure entries exist for every split of `dataset`.
    ///
    /// Returns each request with the row count of its entry.
    pub fn precompute(
        &self,
        dataset: &str,
        model: &str,
        splits: &[String],
        features: BertFeatureKind,
    ) -> Result<Vec<(BertFeatureRequest, usize)>> {
        let mut done = Vec::with_capacity(splits.len());
        for split in splits {
            let request = BertFeatureRequest::new(dataset, split.as_str(), model, features);
            let rows = self.get(&request)?.n_rows();
            log::info!("{split}-{features} done: {rows} rows");
            done.push((request, rows));
        }
        Ok(done)
    }

    fn persist(&self, path: &Path, output: &BertOutput) -> Result<()> {
        fs::create_dir_all(&self.config.directory)?;
        let bytes = bincode::serialize(output)?;
        let tmp = path.with_extension(format!("{}.tmp", std::process::id()));
        fs::write(&tmp, bytes)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::dataset::JsonlDatasetLoader;
    use crate::matrix::FeatureMatrix;

    #[derive(Default)]
    struct CountingInference {
        calls: AtomicUsize,
    }

    impl ModelInference for CountingInference {
        fn infer(&self, request: &InferenceRequest<'_>) -> Result<BertOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let rows: Vec<Vec<f64>> = request
                .texts
                .iter()
                .map(|t| {
                    let p = (t.len() % 10) as f64 / 10.0;
                    vec![1.0 - p, p]
                })
                .collect();
            let labels = rows.iter().map(|r| usize::from(r[1] > r[0])).collect();
            let matrix = FeatureMatrix::from_dense_rows(rows)?;
            Ok(match request.features {
                BertFeatureKind::Predict => BertOutput::Predictions {
                    probabilities: matrix,
                    labels,
                },
                BertFeatureKind::Transformer => BertOutput::Embeddings(matrix),
            })
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    struct FailingInference;

    impl ModelInference for FailingInference {
        fn infer(&self, _request: &InferenceRequest<'_>) -> Result<BertOutput> {
            Err(TextClfError::inference("model exploded"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn registry(root: &Path) -> DatasetRegistry {
        let dir = root.join("cro");
        fs::create_dir_all(&dir).unwrap();
        for split in ["train", "test"] {
            let mut file = fs::File::create(dir.join(format!("{split}.jsonl"))).unwrap();
            for i in 0..4 {
                writeln!(file, r#"{{"text": "{split} text {i}", "label": {}}}"#, i % 2).unwrap();
            }
        }
        let mut registry = DatasetRegistry::new();
        registry.register("cro", Arc::new(JsonlDatasetLoader::new("cro", &dir)));
        registry
    }

    #[test]
    fn test_cache_key_layout() {
        let request = BertFeatureRequest::new("est", "train", "bert-base_42", BertFeatureKind::Transformer);
        assert_eq!(
            request.cache_key(),
            "bert_features_dset_est_split_train_label__features_transformer_bert_[bert-base%5F42].bin"
        );
    }

    #[test]
    fn test_cache_key_discriminates_every_field() {
        let base = BertFeatureRequest::new("cro", "train", "m1", BertFeatureKind::Predict)
            .with_label("x");
        let variants = vec![
            BertFeatureRequest { dataset: "est".into(), ..base.clone() },
            BertFeatureRequest { split: "test".into(), ..base.clone() },
            BertFeatureRequest { label: "y".into(), ..base.clone() },
            BertFeatureRequest { model: "m2".into(), ..base.clone() },
            BertFeatureRequest { features: BertFeatureKind::Transformer, ..base.clone() },
        ];
        let mut keys: Vec<String> = variants.iter().map(|r| r.cache_key()).collect();
        keys.push(base.cache_key());
        let n = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), n);

        // Separators inside fields cannot shift field boundaries.
        let a = BertFeatureRequest::new("a_split_b", "c", "m", BertFeatureKind::Predict);
        let b = BertFeatureRequest::new("a", "b_split_c", "m", BertFeatureKind::Predict);
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_second_get_is_served_from_disk() {
        let data = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let inference = Arc::new(CountingInference::default());
        let cache = BertFeatureCache::new(
            CacheConfig::new(cache_dir.path()),
            registry(data.path()),
            inference.clone(),
        );

        let request = BertFeatureRequest::new("cro", "train", "m1", BertFeatureKind::Predict);
        let first = cache.get(&request).unwrap();
        assert!(cache.contains(&request));
        let second = cache.get(&request).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.n_rows(), 4);
        assert_eq!(inference.calls.load(Ordering::SeqCst), 1);

        // A fresh cache over the same directory needs no inference either.
        let reopened = BertFeatureCache::new(
            CacheConfig::new(cache_dir.path()),
            DatasetRegistry::new(),
            Arc::new(crate::bert::NoInference::new()),
        );
        assert_eq!(reopened.get(&request).unwrap(), first);
    }

    #[test]
    fn test_inference_failure_writes_nothing() {
        let data = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = BertFeatureCache::new(
            CacheConfig::new(cache_dir.path()),
            registry(data.path()),
            Arc::new(FailingInference),
        );

        let request = BertFeatureRequest::new("cro", "test", "m1", BertFeatureKind::Predict);
        let err = cache.get(&request).unwrap_err();
        assert!(matches!(err, TextClfError::Inference(_)));
        assert_eq!(fs::read_dir(cache_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unwritable_cache_still_returns_result() {
        let data = tempfile::tempdir().unwrap();
        let blocker = tempfile::NamedTempFile::new().unwrap();
        // The "directory" is a regular file, so persisting fails.
        let cache = BertFeatureCache::new(
            CacheConfig::new(blocker.path()),
            registry(data.path()),
            Arc::new(CountingInference::default()),
        );

        let request = BertFeatureRequest::new("cro", "train", "m1", BertFeatureKind::Transformer);
        let output = cache.get(&request).unwrap();
        assert_eq!(output.n_rows(), 4);
        assert!(!cache.contains(&request));
    }

    #[test]
    fn test_precompute_warms_every_split() {
        let data = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let inference = Arc::new(CountingInference::default());
        let cache = BertFeatureCache::new(
            CacheConfig::new(cache_dir.path()).with_device("cuda:0"),
            registry(data.path()),
            inference.clone(),
        );

        let splits = vec!["train".to_string(), "test".to_string()];
        let first = cache
            .precompute("cro", "m1", &splits, BertFeatureKind::Predict)
            .unwrap();
        let second = cache
            .precompute("cro", "m1", &splits, BertFeatureKind::Predict)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first[1].0.split, "test");
        assert_eq!(inference.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fs::read_dir(cache_dir.path()).unwrap().count(), 2);
        assert_eq!(cache.config().device, "cuda:0");
    }
}
