//! Feature matrices shared by vectorizers, the BERT cache and estimators.
//!
//! A [`FeatureMatrix`] is a rows × columns matrix of `f64` values stored either
//! densely (row-major) or sparsely (compressed sparse rows). Callers never
//! branch on the representation: rows are read through [`Row`], and
//! [`FeatureMatrix::horizontal_concat`] picks the right output storage.
//!
//! Row `i` of every matrix built in this crate describes text `i` of the
//! dataset it was computed from; all row-level operations keep that order.
//!
//! # Examples
//!
//! ```
//! use textclf::matrix::FeatureMatrix;
//!
//! let lexical = FeatureMatrix::from_sparse_rows(3, vec![vec![(0, 1.0)], vec![(2, 2.0)]]).unwrap();
//! let dense = FeatureMatrix::from_dense_rows(vec![vec![0.9, 0.1], vec![0.2, 0.8]]).unwrap();
//!
//! let fused = lexical.horizontal_concat(&dense).unwrap();
//! assert_eq!(fused.shape(), (2, 5));
//! assert!(fused.is_sparse());
//! assert_eq!(fused.get(1, 4), 0.8);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, TextClfError};

/// Internal storage of a [`FeatureMatrix`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Storage {
    /// Row-major values, `n_rows * n_cols` long.
    Dense(Vec<f64>),
    /// Compressed sparse rows with strictly increasing column indices per row.
    Sparse {
        indptr: Vec<usize>,
        indices: Vec<usize>,
        values: Vec<f64>,
    },
}

/// A 2-D numeric matrix with a hidden dense/sparse representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    n_rows: usize,
    n_cols: usize,
    storage: Storage,
}

/// Borrowed view of one matrix row.
#[derive(Debug, Clone, Copy)]
pub enum Row<'a> {
    Dense(&'a [f64]),
    Sparse {
        indices: &'a [usize],
        values: &'a [f64],
    },
}

impl FeatureMatrix {
    /// Create a dense matrix from row-major values.
    pub fn dense(n_rows: usize, n_cols: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != n_rows * n_cols {
            return Err(TextClfError::invalid_argument(format!(
                "dense matrix of shape ({n_rows}, {n_cols}) needs {} values, got {}",
                n_rows * n_cols,
                values.len()
            )));
        }
        Ok(Self {
            n_rows,
            n_cols,
            storage: Storage::Dense(values),
        })
    }

    /// Create a dense matrix from equally long rows.
    pub fn from_dense_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut values = Vec::with_capacity(n_rows * n_cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(TextClfError::invalid_argument(format!(
                    "row {i} has {} columns, expected {n_cols}",
                    row.len()
                )));
            }
            values.extend(row);
        }
        Self::dense(n_rows, n_cols, values)
    }

    /// Create a sparse matrix from per-row `(column, value)` entries.
    ///
    /// Entries are sorted by column; duplicate columns are summed and
    /// explicit zeros are dropped.
    pub fn from_sparse_rows(n_cols: usize, rows: Vec<Vec<(usize, f64)>>) -> Result<Self> {
        let n_rows = rows.len();
        let mut indptr = Vec::with_capacity(n_rows + 1);
        let mut indices = Vec::new();
        let mut values = Vec::new();
        indptr.push(0);

        for (i, mut row) in rows.into_iter().enumerate() {
            row.sort_by_key(|&(col, _)| col);
            let mut last: Option<usize> = None;
            for (col, value) in row {
                if col >= n_cols {
                    return Err(TextClfError::invalid_argument(format!(
                        "column {col} out of bounds in row {i} (n_cols = {n_cols})"
                    )));
                }
                if last == Some(col) {
                    if let Some(v) = values.last_mut() {
                        *v += value;
                    }
                    continue;
                }
                indices.push(col);
                values.push(value);
                last = Some(col);
            }
            indptr.push(indices.len());
        }

        let mut matrix = Self {
            n_rows,
            n_cols,
            storage: Storage::Sparse {
                indptr,
                indices,
                values,
            },
        };
        matrix.prune_zeros();
        Ok(matrix)
    }

    /// Create an all-zero sparse matrix.
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            storage: Storage::Sparse {
                indptr: vec![0; n_rows + 1],
                indices: Vec::new(),
                values: Vec::new(),
            },
        }
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    /// Whether the matrix is stored sparsely.
    pub fn is_sparse(&self) -> bool {
        matches!(self.storage, Storage::Sparse { .. })
    }

    /// Number of stored entries (all cells for dense matrices).
    pub fn nnz(&self) -> usize {
        match &self.storage {
            Storage::Dense(values) => values.len(),
            Storage::Sparse { values, .. } => values.len(),
        }
    }

    /// Borrow row `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= n_rows`.
    pub fn row(&self, i: usize) -> Row<'_> {
        assert!(i < self.n_rows, "row {i} out of bounds ({})", self.n_rows);
        match &self.storage {
            Storage::Dense(values) => Row::Dense(&values[i * self.n_cols..(i + 1) * self.n_cols]),
            Storage::Sparse {
                indptr,
                indices,
                values,
            } => {
                let (start, end) = (indptr[i], indptr[i + 1]);
                Row::Sparse {
                    indices: &indices[start..end],
                    values: &values[start..end],
                }
            }
        }
    }

    /// Iterate over all rows in order.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        (0..self.n_rows).map(move |i| self.row(i))
    }

    /// Value at `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.row(i).get(j)
    }

    /// Convert to sparse storage (no-op if already sparse).
    pub fn to_sparse(&self) -> FeatureMatrix {
        match &self.storage {
            Storage::Sparse { .. } => self.clone(),
            Storage::Dense(values) => {
                let mut indptr = Vec::with_capacity(self.n_rows + 1);
                let mut indices = Vec::new();
                let mut data = Vec::new();
                indptr.push(0);
                for row in values.chunks(self.n_cols.max(1)).take(self.n_rows) {
                    for (j, &v) in row.iter().enumerate() {
                        if v != 0.0 {
                            indices.push(j);
                            data.push(v);
                        }
                    }
                    indptr.push(indices.len());
                }
                // Zero-width matrices have no chunks to walk.
                indptr.resize(self.n_rows + 1, indices.len());
                FeatureMatrix {
                    n_rows: self.n_rows,
                    n_cols: self.n_cols,
                    storage: Storage::Sparse {
                        indptr,
                        indices,
                        values: data,
                    },
                }
            }
        }
    }

    /// Convert to dense storage (no-op if already dense).
    pub fn to_dense(&self) -> FeatureMatrix {
        match &self.storage {
            Storage::Dense(_) => self.clone(),
            Storage::Sparse { .. } => {
                let mut values = vec![0.0; self.n_rows * self.n_cols];
                for (i, row) in self.rows().enumerate() {
                    row.add_scaled_to(1.0, &mut values[i * self.n_cols..(i + 1) * self.n_cols]);
                }
                FeatureMatrix {
                    n_rows: self.n_rows,
                    n_cols: self.n_cols,
                    storage: Storage::Dense(values),
                }
            }
        }
    }

    /// Concatenate `other`'s columns to the right of `self`'s columns.
    ///
    /// Both matrices must have the same number of rows. The result is dense
    /// only when both inputs are dense.
    pub fn horizontal_concat(&self, other: &FeatureMatrix) -> Result<FeatureMatrix> {
        if self.n_rows != other.n_rows {
            return Err(TextClfError::invalid_argument(format!(
                "cannot concatenate matrices with {} and {} rows",
                self.n_rows, other.n_rows
            )));
        }
        let n_cols = self.n_cols + other.n_cols;

        if let (Storage::Dense(left), Storage::Dense(right)) = (&self.storage, &other.storage) {
            let mut values = Vec::with_capacity(self.n_rows * n_cols);
            for i in 0..self.n_rows {
                values.extend_from_slice(&left[i * self.n_cols..(i + 1) * self.n_cols]);
                values.extend_from_slice(&right[i * other.n_cols..(i + 1) * other.n_cols]);
            }
            return FeatureMatrix::dense(self.n_rows, n_cols, values);
        }

        let mut indptr = Vec::with_capacity(self.n_rows + 1);
        let mut indices = Vec::with_capacity(self.nnz() + other.nnz());
        let mut values = Vec::with_capacity(self.nnz() + other.nnz());
        indptr.push(0);
        for i in 0..self.n_rows {
            for (j, v) in self.row(i).iter() {
                indices.push(j);
                values.push(v);
            }
            for (j, v) in other.row(i).iter() {
                indices.push(self.n_cols + j);
                values.push(v);
            }
            indptr.push(indices.len());
        }

        Ok(FeatureMatrix {
            n_rows: self.n_rows,
            n_cols,
            storage: Storage::Sparse {
                indptr,
                indices,
                values,
            },
        })
    }

    /// Build a new matrix from the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Result<FeatureMatrix> {
        if let Some(&bad) = rows.iter().find(|&&i| i >= self.n_rows) {
            return Err(TextClfError::invalid_argument(format!(
                "row index {bad} out of bounds ({} rows)",
                self.n_rows
            )));
        }
        match &self.storage {
            Storage::Dense(values) => {
                let mut selected = Vec::with_capacity(rows.len() * self.n_cols);
                for &i in rows {
                    selected.extend_from_slice(&values[i * self.n_cols..(i + 1) * self.n_cols]);
                }
                FeatureMatrix::dense(rows.len(), self.n_cols, selected)
            }
            Storage::Sparse { .. } => {
                let mut indptr = Vec::with_capacity(rows.len() + 1);
                let mut indices = Vec::new();
                let mut values = Vec::new();
                indptr.push(0);
                for &i in rows {
                    for (j, v) in self.row(i).iter() {
                        indices.push(j);
                        values.push(v);
                    }
                    indptr.push(indices.len());
                }
                Ok(FeatureMatrix {
                    n_rows: rows.len(),
                    n_cols: self.n_cols,
                    storage: Storage::Sparse {
                        indptr,
                        indices,
                        values,
                    },
                })
            }
        }
    }

    /// Variance over every cell of the matrix, implicit zeros included.
    pub fn element_variance(&self) -> f64 {
        let count = (self.n_rows * self.n_cols) as f64;
        if count == 0.0 {
            return 0.0;
        }
        let (sum, sum_sq) = self
            .rows()
            .flat_map(|row| row.iter())
            .fold((0.0, 0.0), |(s, sq), (_, v)| (s + v, sq + v * v));
        let mean = sum / count;
        (sum_sq / count - mean * mean).max(0.0)
    }

    fn prune_zeros(&mut self) {
        if let Storage::Sparse {
            indptr,
            indices,
            values,
        } = &mut self.storage
        {
            if values.iter().all(|&v| v != 0.0) {
                return;
            }
            let mut new_indptr = Vec::with_capacity(indptr.len());
            let mut new_indices = Vec::with_capacity(indices.len());
            let mut new_values = Vec::with_capacity(values.len());
            new_indptr.push(0);
            for w in indptr.windows(2) {
                for k in w[0]..w[1] {
                    if values[k] != 0.0 {
                        new_indices.push(indices[k]);
                        new_values.push(values[k]);
                    }
                }
                new_indptr.push(new_indices.len());
            }
            *indptr = new_indptr;
            *indices = new_indices;
            *values = new_values;
        }
    }
}

impl<'a> Row<'a> {
    /// Iterate over stored `(column, value)` pairs in column order.
    pub fn iter(&self) -> RowIter<'a> {
        match *self {
            Row::Dense(values) => RowIter::Dense(values.iter().enumerate()),
            Row::Sparse { indices, values } => RowIter::Sparse(indices.iter().zip(values.iter())),
        }
    }

    /// Value in column `j`.
    pub fn get(&self, j: usize) -> f64 {
        match *self {
            Row::Dense(values) => values.get(j).copied().unwrap_or(0.0),
            Row::Sparse { indices, values } => indices
                .binary_search(&j)
                .map(|k| values[k])
                .unwrap_or(0.0),
        }
    }

    /// Dot product with a dense weight vector.
    pub fn dot(&self, weights: &[f64]) -> f64 {
        self.iter()
            .map(|(j, v)| v * weights.get(j).copied().unwrap_or(0.0))
            .sum()
    }

    /// Dot product with another row of the same width.
    pub fn dot_row(&self, other: &Row<'_>) -> f64 {
        match (self, other) {
            (Row::Dense(a), Row::Dense(b)) => a.iter().zip(b.iter()).map(|(x, y)| x * y).sum(),
            (Row::Dense(a), sparse @ Row::Sparse { .. })
            | (sparse @ Row::Sparse { .. }, Row::Dense(a)) => sparse.dot(a),
            (
                Row::Sparse {
                    indices: ia,
                    values: va,
                },
                Row::Sparse {
                    indices: ib,
                    values: vb,
                },
            ) => {
                let (mut p, mut q, mut acc) = (0, 0, 0.0);
                while p < ia.len() && q < ib.len() {
                    match ia[p].cmp(&ib[q]) {
                        std::cmp::Ordering::Less => p += 1,
                        std::cmp::Ordering::Greater => q += 1,
                        std::cmp::Ordering::Equal => {
                            acc += va[p] * vb[q];
                            p += 1;
                            q += 1;
                        }
                    }
                }
                acc
            }
        }
    }

    /// Squared L2 norm.
    pub fn squared_norm(&self) -> f64 {
        self.iter().map(|(_, v)| v * v).sum()
    }

    /// `out += alpha * row`.
    pub fn add_scaled_to(&self, alpha: f64, out: &mut [f64]) {
        for (j, v) in self.iter() {
            out[j] += alpha * v;
        }
    }
}

/// Iterator over the stored entries of a [`Row`].
pub enum RowIter<'a> {
    Dense(std::iter::Enumerate<std::slice::Iter<'a, f64>>),
    Sparse(std::iter::Zip<std::slice::Iter<'a, usize>, std::slice::Iter<'a, f64>>),
}

impl Iterator for RowIter<'_> {
    type Item = (usize, f64);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            RowIter::Dense(it) => it.next().map(|(j, &v)| (j, v)),
            RowIter::Sparse(it) => it.next().map(|(&j, &v)| (j, v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sparse() -> FeatureMatrix {
        FeatureMatrix::from_sparse_rows(
            4,
            vec![vec![(3, 1.0), (0, 2.0)], vec![], vec![(1, 5.0), (1, 1.0)]],
        )
        .unwrap()
    }

    #[test]
    fn test_sparse_rows_are_sorted_and_merged() {
        let m = sample_sparse();
        assert_eq!(m.shape(), (3, 4));
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.row(0).iter().collect::<Vec<_>>(), vec![(0, 2.0), (3, 1.0)]);
        assert_eq!(m.get(2, 1), 6.0);
        assert_eq!(m.get(1, 2), 0.0);
    }

    #[test]
    fn test_sparse_rejects_out_of_bounds_column() {
        let err = FeatureMatrix::from_sparse_rows(2, vec![vec![(2, 1.0)]]).unwrap_err();
        assert!(matches!(err, TextClfError::InvalidArgument(_)));
    }

    #[test]
    fn test_dense_sparse_conversion_preserves_values() {
        let dense = FeatureMatrix::from_dense_rows(vec![vec![0.0, 1.5], vec![2.0, 0.0]]).unwrap();
        let sparse = dense.to_sparse();
        assert!(sparse.is_sparse());
        assert_eq!(sparse.nnz(), 2);
        assert_eq!(sparse.to_dense(), dense);
    }

    #[test]
    fn test_horizontal_concat_dense_dense_stays_dense() {
        let a = FeatureMatrix::from_dense_rows(vec![vec![1.0], vec![2.0]]).unwrap();
        let b = FeatureMatrix::from_dense_rows(vec![vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        let c = a.horizontal_concat(&b).unwrap();
        assert!(!c.is_sparse());
        assert_eq!(c.shape(), (2, 3));
        assert_eq!(c.get(1, 0), 2.0);
        assert_eq!(c.get(1, 2), 6.0);
    }

    #[test]
    fn test_horizontal_concat_row_mismatch() {
        let a = FeatureMatrix::zeros(2, 3);
        let b = FeatureMatrix::zeros(3, 3);
        assert!(a.horizontal_concat(&b).is_err());
    }

    #[test]
    fn test_select_rows_keeps_requested_order() {
        let m = sample_sparse();
        let s = m.select_rows(&[2, 0]).unwrap();
        assert_eq!(s.n_rows(), 2);
        assert_eq!(s.get(0, 1), 6.0);
        assert_eq!(s.get(1, 0), 2.0);
        assert!(m.select_rows(&[3]).is_err());
    }

    #[test]
    fn test_row_products() {
        let m = FeatureMatrix::from_sparse_rows(3, vec![vec![(0, 1.0), (2, 2.0)], vec![(2, 3.0)]])
            .unwrap();
        let dense = m.to_dense();
        assert_eq!(m.row(0).dot(&[1.0, 1.0, 1.0]), 3.0);
        assert_eq!(m.row(0).dot_row(&m.row(1)), 6.0);
        assert_eq!(m.row(0).dot_row(&dense.row(1)), 6.0);
        assert_eq!(m.row(0).squared_norm(), 5.0);
    }

    #[test]
    fn test_element_variance() {
        let m = FeatureMatrix::from_dense_rows(vec![vec![1.0, 3.0]]).unwrap();
        assert!((m.element_variance() - 1.0).abs() < 1e-12);
        assert!((m.to_sparse().element_variance() - 1.0).abs() < 1e-12);
    }
}
