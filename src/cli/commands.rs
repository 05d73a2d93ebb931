//! Command implementations for the textclf CLI.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;

use crate::bert::{BertFeatureCache, CacheConfig, ImportedInference, ModelInference, NoInference};
use crate::cli::args::*;
use crate::cli::output::*;
use crate::dataset::DatasetRegistry;
use crate::error::{Result, TextClfError};
use crate::experiment::ExperimentRunner;
use crate::metrics::baseline_f1;

/// Execute a CLI command.
pub fn execute_command(args: TextClfArgs) -> Result<()> {
    match &args.command {
        Command::Run(run_args) => run_experiment(run_args, &args),
        Command::SplitRun(split_args) => run_split_experiment(split_args, &args),
        Command::Precompute(precompute_args) => precompute_features(precompute_args, &args),
        Command::Baseline(baseline_args) => show_baseline(baseline_args, &args),
    }
}

/// Train on one split, evaluate on another.
fn run_experiment(args: &RunArgs, cli_args: &TextClfArgs) -> Result<()> {
    let config = args.to_config()?;
    config.validate()?;

    let registry = open_registry(&args.data_dir)?;
    let train = registry.load(&args.dataset, &args.train_split)?;
    let test = registry.load(&args.dataset, &args.test_split)?;
    log::info!(
        "loaded {}: {} train / {} test examples",
        args.dataset,
        train.len(),
        test.len()
    );

    let mut runner = ExperimentRunner::new();
    if config.features.uses_bert() {
        let cache_dir = args.cache_dir.as_ref().ok_or_else(|| {
            TextClfError::config(format!("features {} need --cache-dir", config.features))
        })?;
        // Entries must already exist; see `precompute`.
        let cache = BertFeatureCache::new(
            CacheConfig::new(cache_dir),
            registry,
            Arc::new(NoInference::new()),
        );
        runner = runner.with_bert_cache(cache);
    }

    let start_time = Instant::now();
    let report = runner.run(&train, &test, &config)?;
    log::debug!("experiment took {} ms", start_time.elapsed().as_millis());

    output_report(&report, cli_args)
}

/// Train and evaluate on a seeded random split of one split.
fn run_split_experiment(args: &SplitRunArgs, cli_args: &TextClfArgs) -> Result<()> {
    let config = args.experiment.to_config()?;
    let registry = open_registry(&args.data_dir)?;
    let data = registry.load(&args.dataset, &args.split)?;

    let report = ExperimentRunner::new().run_with_split(&data, &config, args.test_size)?;
    output_report(&report, cli_args)
}

/// Fill the BERT feature cache.
fn precompute_features(args: &PrecomputeArgs, cli_args: &TextClfArgs) -> Result<()> {
    let inference: Arc<dyn ModelInference> = match &args.outputs {
        Some(path) => Arc::new(ImportedInference::from_jsonl(args.model.as_str(), path)?),
        None => Arc::new(NoInference::new()),
    };
    if cli_args.verbosity() > 1 {
        println!(
            "Caching {} features of {} with {} inference",
            args.features,
            args.model,
            inference.name()
        );
    }

    let cache_config = CacheConfig::new(&args.cache_dir)
        .with_max_sequence_length(args.max_sequence_length)
        .with_device(args.device.as_str());
    let cache = BertFeatureCache::new(
        cache_config,
        open_registry(&args.data_dir)?,
        inference,
    );

    let done = cache.precompute(&args.dataset, &args.model, &args.splits, args.features)?;
    let entries = done
        .into_iter()
        .map(|(request, rows)| CacheEntryInfo {
            path: cache.entry_path(&request).to_string_lossy().to_string(),
            split: request.split,
            rows,
        })
        .collect();

    output_result(
        "BERT features cached",
        &PrecomputeResult {
            dataset: args.dataset.clone(),
            model: args.model.clone(),
            entries,
        },
        cli_args,
    )
}

fn open_registry(data_dir: &Path) -> Result<DatasetRegistry> {
    let registry = DatasetRegistry::from_directory(data_dir)
        .with_context(|| format!("Failed to read data directory {}", data_dir.display()))?;
    Ok(registry)
}

fn show_baseline(args: &BaselineArgs, cli_args: &TextClfArgs) -> Result<()> {
    let baseline = baseline_f1(minority_fraction(args)?)?;
    output_baseline(&baseline, cli_args)
}

/// The given minority fraction, or the positive share of the named split.
fn minority_fraction(args: &BaselineArgs) -> Result<f64> {
    if let Some(minority) = args.minority {
        return Ok(minority);
    }
    match (&args.data_dir, &args.dataset) {
        (Some(data_dir), Some(dataset)) => {
            let data = open_registry(data_dir)?.load(dataset, &args.split)?;
            let fraction = data.positive_fraction();
            log::info!(
                "{dataset}/{}: {} examples, positive fraction {fraction:.3}",
                args.split,
                data.len()
            );
            Ok(fraction)
        }
        _ => Err(TextClfError::config(
            "baseline needs a minority fraction or --data-dir with --dataset",
        )),
    }
}
