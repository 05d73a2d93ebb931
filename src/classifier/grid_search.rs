//! Exhaustive hyperparameter search with stratified cross-validation.
//!
//! Candidates are the Cartesian product of the grid, enumerated with keys in
//! sorted order and the last key varying fastest. Every candidate is scored
//! on the same stratified folds; the candidate with the highest mean fold
//! score wins (the first one on ties) and is refitted on all training rows.
//!
//! Fold fits run on a dedicated rayon pool of `n_jobs` threads. Results are
//! gathered in candidate/fold order, so the outcome does not depend on
//! scheduling.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::classifier::estimator::{Estimator, ParamGrid, Params, format_params};
use crate::error::{Result, TextClfError};
use crate::matrix::FeatureMatrix;
use crate::metrics::Scoring;

/// Best candidate found by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSummary {
    pub best_params: Params,
    /// Mean cross-validation score of the best candidate.
    pub best_score: f64,
}

impl std::fmt::Display for GridSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", format_params(&self.best_params), self.best_score)
    }
}

/// Mean and per-fold scores of one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: Params,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

/// Test-row indices of each of `k` stratified folds.
///
/// Reproduces scikit-learn's unshuffled `StratifiedKFold`: classes are
/// numbered in order of first appearance, the sorted class sequence is dealt
/// round-robin to decide how many rows of each class every fold receives, and
/// each class's rows fill the folds in row order.
pub fn stratified_folds(y: &[bool], k: usize) -> Result<Vec<Vec<usize>>> {
    if k < 2 {
        return Err(TextClfError::config(format!(
            "cross-validation needs at least 2 folds, got {k}"
        )));
    }
    if y.is_empty() {
        return Err(TextClfError::invalid_argument("no rows to split"));
    }

    // Class ids by first appearance.
    let first = y[0];
    let encoded: Vec<usize> = y.iter().map(|&l| usize::from(l != first)).collect();
    let n_classes = if encoded.contains(&1) { 2 } else { 1 };
    let mut counts = vec![0usize; n_classes];
    for &c in &encoded {
        counts[c] += 1;
    }
    let largest = counts.iter().copied().max().unwrap_or(0);
    if k > largest {
        return Err(TextClfError::invalid_argument(format!(
            "{k} folds cannot be greater than the number of members in each class"
        )));
    }
    if let Some(smallest) = counts.iter().copied().min().filter(|&m| m < k) {
        log::warn!("the least populated class has only {smallest} members, which is less than {k} folds");
    }

    let mut order = encoded.clone();
    order.sort_unstable();
    // allocation[fold][class]
    let mut allocation = vec![vec![0usize; n_classes]; k];
    for (pos, &c) in order.iter().enumerate() {
        allocation[pos % k][c] += 1;
    }

    let mut folds = vec![Vec::new(); k];
    for class in 0..n_classes {
        let fold_of_rank: Vec<usize> = (0..k)
            .flat_map(|fold| std::iter::repeat_n(fold, allocation[fold][class]))
            .collect();
        let rows = encoded
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c == class)
            .map(|(i, _)| i);
        for (rank, row) in rows.enumerate() {
            folds[fold_of_rank[rank]].push(row);
        }
    }
    for fold in folds.iter_mut() {
        fold.sort_unstable();
    }
    Ok(folds)
}

/// Every combination of grid values, keys in sorted order, last key fastest.
pub fn expand_grid(grid: &ParamGrid) -> Vec<Params> {
    let mut candidates = vec![Params::new()];
    for (name, values) in grid {
        let mut next = Vec::with_capacity(candidates.len() * values.len());
        for partial in &candidates {
            for value in values {
                let mut params = partial.clone();
                params.insert(name.clone(), value.clone());
                next.push(params);
            }
        }
        candidates = next;
    }
    candidates
}

/// Cross-validated grid search over a base estimator.
pub struct GridSearch {
    estimator: Box<dyn Estimator>,
    grid: ParamGrid,
    scoring: Scoring,
    folds: usize,
    n_jobs: usize,
    results: Vec<CandidateScore>,
    best: Option<(GridSummary, Box<dyn Estimator>)>,
}

impl std::fmt::Debug for GridSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridSearch")
            .field("estimator", &self.estimator.name())
            .field("grid", &self.grid)
            .field("scoring", &self.scoring)
            .field("folds", &self.folds)
            .field("n_jobs", &self.n_jobs)
            .field("fitted", &self.best.is_some())
            .finish()
    }
}

impl GridSearch {
    /// Search `grid` over `estimator` with 5 folds, F1 scoring and 3 jobs.
    pub fn new(estimator: Box<dyn Estimator>, grid: ParamGrid) -> Self {
        Self {
            estimator,
            grid,
            scoring: Scoring::F1,
            folds: 5,
            n_jobs: 3,
            results: Vec::new(),
            best: None,
        }
    }

    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_folds(mut self, folds: usize) -> Self {
        self.folds = folds;
        self
    }

    /// Worker threads; `0` uses one per CPU.
    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    pub fn estimator(&self) -> &dyn Estimator {
        self.estimator.as_ref()
    }

    pub fn grid(&self) -> &ParamGrid {
        &self.grid
    }

    pub fn scoring(&self) -> Scoring {
        self.scoring
    }

    pub fn folds(&self) -> usize {
        self.folds
    }

    pub fn n_jobs(&self) -> usize {
        self.n_jobs
    }

    /// Scores of every candidate from the last fit.
    pub fn results(&self) -> &[CandidateScore] {
        &self.results
    }

    /// Best candidate from the last fit.
    pub fn summary(&self) -> Option<&GridSummary> {
        self.best.as_ref().map(|(summary, _)| summary)
    }

    /// The best candidate refitted on all training rows.
    pub fn best_estimator(&self) -> Option<&dyn Estimator> {
        self.best.as_ref().map(|(_, estimator)| estimator.as_ref())
    }

    fn thread_pool(&self) -> Result<ThreadPool> {
        ThreadPoolBuilder::new()
            .num_threads(self.n_jobs)
            .thread_name(|i| format!("grid-search-{i}"))
            .build()
            .map_err(|e| TextClfError::other(format!("Failed to create thread pool: {e}")))
    }

    /// Score every candidate, then refit the best one on all of `x`.
    pub fn fit(&mut self, x: &FeatureMatrix, y: &[bool]) -> Result<()> {
        if x.n_rows() != y.len() {
            return Err(TextClfError::invalid_argument(format!(
                "{} rows but {} labels",
                x.n_rows(),
                y.len()
            )));
        }
        let candidates = expand_grid(&self.grid);
        // Reject bad names or values before any fitting.
        for params in &candidates {
            self.estimator.clone_unfitted().set_params(params)?;
        }

        let folds = stratified_folds(y, self.folds)?;
        let splits: Vec<(Vec<usize>, Vec<usize>)> = folds
            .iter()
            .map(|test| {
                let mut is_test = vec![false; y.len()];
                test.iter().for_each(|&i| is_test[i] = true);
                let train = (0..y.len()).filter(|&i| !is_test[i]).collect();
                (train, test.clone())
            })
            .collect();

        log::info!(
            "Fitting {} folds for each of {} candidates, totalling {} fits",
            splits.len(),
            candidates.len(),
            splits.len() * candidates.len()
        );

        let tasks: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..splits.len()).map(move |f| (c, f)))
            .collect();
        let pool = self.thread_pool()?;
        let scores: Vec<f64> = pool.install(|| {
            tasks
                .par_iter()
                .map(|&(c, f)| {
                    let (train, test) = &splits[f];
                    let mut estimator = self.estimator.clone_unfitted();
                    estimator.set_params(&candidates[c])?;
                    let train_labels: Vec<bool> = train.iter().map(|&i| y[i]).collect();
                    let test_labels: Vec<bool> = test.iter().map(|&i| y[i]).collect();
                    estimator.fit(&x.select_rows(train)?, &train_labels)?;
                    let predicted = estimator.predict(&x.select_rows(test)?)?;
                    let score = self.scoring.score(&predicted, &test_labels)?;
                    log::debug!(
                        "[CV {}/{}] {} {}={score:.3}",
                        f + 1,
                        splits.len(),
                        format_params(&candidates[c]),
                        self.scoring
                    );
                    Ok(score)
                })
                .collect::<Result<Vec<f64>>>()
        })?;

        let mut results = Vec::with_capacity(candidates.len());
        for (params, fold_scores) in candidates.into_iter().zip(scores.chunks(splits.len())) {
            let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
            results.push(CandidateScore {
                params,
                fold_scores: fold_scores.to_vec(),
                mean_score,
            });
        }

        let mut best_index = 0;
        for (i, result) in results.iter().enumerate() {
            if result.mean_score > results[best_index].mean_score {
                best_index = i;
            }
        }
        let best = &results[best_index];

        let mut refit = self.estimator.clone_unfitted();
        refit.set_params(&best.params)?;
        refit.fit(x, y)?;

        let summary = GridSummary {
            best_params: best.params.clone(),
            best_score: best.mean_score,
        };
        log::info!("best parameters: {summary}");
        self.best = Some((summary, refit));
        self.results = results;
        Ok(())
    }

    /// Predict with the refitted best estimator.
    pub fn predict(&self, x: &FeatureMatrix) -> Result<Vec<bool>> {
        self.best_estimator()
            .ok_or_else(|| TextClfError::not_fitted("grid search"))?
            .predict(x)
    }
}
