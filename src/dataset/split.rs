//! Seeded subsampling and train/test splitting.
//!
//! Both operations produce row indices first, so the same selection can be
//! applied to texts, labels and any precomputed feature matrix.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::{SliceRandom, index};

use crate::dataset::labeled::LabeledTextSet;
use crate::error::{Result, TextClfError};

/// Indices of a seeded sample of `size` out of `n` rows, without replacement.
///
/// Returns `None` (keep everything) when `size` is `None`, zero, or not
/// smaller than `n`.
pub fn subsample_indices(n: usize, size: Option<usize>, seed: u64) -> Option<Vec<usize>> {
    let size = size.filter(|&k| k > 0 && k < n)?;
    let mut rng = StdRng::seed_from_u64(seed);
    Some(index::sample(&mut rng, n, size).into_vec())
}

/// Seeded subsample of `data`; see [`subsample_indices`] for the no-op cases.
pub fn subsample(data: &LabeledTextSet, size: Option<usize>, seed: u64) -> Result<LabeledTextSet> {
    match subsample_indices(data.len(), size, seed) {
        Some(indices) => data.select(&indices),
        None => Ok(data.clone()),
    }
}

/// Shuffle `data` with `seed` and hold out `ceil(test_size * n)` rows.
pub fn train_test_split(
    data: &LabeledTextSet,
    test_size: f64,
    seed: u64,
) -> Result<(LabeledTextSet, LabeledTextSet)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(TextClfError::invalid_argument(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }
    let n = data.len();
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(TextClfError::invalid_argument(format!(
            "cannot hold out {n_test} of {n} examples"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test, train) = indices.split_at(n_test);
    Ok((data.select(train)?, data.select(test)?))
}
