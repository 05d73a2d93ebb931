//! Kernel support vector classifier with an RBF kernel.
//!
//! The dual problem is solved by SMO with maximal-violating-pair working set
//! selection, following the update and bias rules of LIBSVM. Kernel rows are
//! computed on demand and kept in a bounded cache.

use ahash::AHashMap;

use crate::classifier::estimator::{
    ClassWeight, Estimator, ParamValue, Params, check_fit_input, invalid_value, sample_weights,
    signed_labels, unknown_param,
};
use crate::error::{Result, TextClfError};
use crate::matrix::{FeatureMatrix, Row};

const TAU: f64 = 1e-12;

/// Cached kernel entries, in floats.
const KERNEL_CACHE_ENTRIES: usize = 1 << 24;

/// RBF kernel width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gamma {
    /// `1 / (n_features * var(X))`.
    Scale,
    /// `1 / n_features`.
    Auto,
    Value(f64),
}

impl Gamma {
    fn from_param(value: &ParamValue) -> Result<Self> {
        match value {
            ParamValue::Str(s) if s == "scale" => Ok(Gamma::Scale),
            ParamValue::Str(s) if s == "auto" => Ok(Gamma::Auto),
            ParamValue::Int(_) | ParamValue::Float(_) => {
                let gamma = value.as_f64("gamma")?;
                if gamma <= 0.0 {
                    return Err(invalid_value("gamma", value));
                }
                Ok(Gamma::Value(gamma))
            }
            other => Err(invalid_value("gamma", other)),
        }
    }

    fn to_param(self) -> ParamValue {
        match self {
            Gamma::Scale => ParamValue::str("scale"),
            Gamma::Auto => ParamValue::str("auto"),
            Gamma::Value(v) => ParamValue::Float(v),
        }
    }

    fn resolve(self, x: &FeatureMatrix) -> f64 {
        let n_features = x.n_cols().max(1) as f64;
        match self {
            Gamma::Scale => {
                let var = x.element_variance();
                if var > 0.0 { 1.0 / (n_features * var) } else { 1.0 }
            }
            Gamma::Auto => 1.0 / n_features,
            Gamma::Value(v) => v,
        }
    }
}

#[derive(Debug, Clone)]
struct Model {
    gamma: f64,
    support_vectors: FeatureMatrix,
    sv_norms: Vec<f64>,
    /// `alpha_i * y_i` of every support vector.
    dual_coef: Vec<f64>,
    rho: f64,
}

/// SVM with an RBF kernel.
#[derive(Debug, Clone)]
pub struct KernelSvc {
    c: f64,
    gamma: Gamma,
    tol: f64,
    max_iter: Option<usize>,
    class_weight: ClassWeight,
    model: Option<Model>,
}

impl Default for KernelSvc {
    fn default() -> Self {
        Self {
            c: 1.0,
            gamma: Gamma::Scale,
            tol: 1e-3,
            max_iter: None,
            class_weight: ClassWeight::None,
            model: None,
        }
    }
}

fn rbf(gamma: f64, a: &Row<'_>, a_norm: f64, b: &Row<'_>, b_norm: f64) -> f64 {
    let dist = (a_norm + b_norm - 2.0 * a.dot_row(b)).max(0.0);
    (-gamma * dist).exp()
}

/// Kernel rows `K(i, ·)` over the training set.
struct KernelRows<'a> {
    x: &'a FeatureMatrix,
    norms: &'a [f64],
    gamma: f64,
    capacity: usize,
    rows: AHashMap<usize, Vec<f64>>,
}

impl<'a> KernelRows<'a> {
    fn new(x: &'a FeatureMatrix, norms: &'a [f64], gamma: f64) -> Self {
        let capacity = (KERNEL_CACHE_ENTRIES / x.n_rows().max(1)).max(2);
        Self {
            x,
            norms,
            gamma,
            capacity,
            rows: AHashMap::new(),
        }
    }

    fn row(&mut self, i: usize) -> &[f64] {
        if !self.rows.contains_key(&i) {
            if self.rows.len() >= self.capacity {
                self.rows.clear();
            }
            let xi = self.x.row(i);
            let values = (0..self.x.n_rows())
                .map(|j| rbf(self.gamma, &xi, self.norms[i], &self.x.row(j), self.norms[j]))
                .collect();
            self.rows.insert(i, values);
        }
        &self.rows[&i]
    }
}

impl KernelSvc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_gamma(mut self, gamma: Gamma) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    pub fn gamma(&self) -> Gamma {
        self.gamma
    }

    /// Number of support vectors of the fitted model.
    pub fn n_support(&self) -> usize {
        self.model
            .as_ref()
            .map(|m| m.support_vectors.n_rows())
            .unwrap_or(0)
    }

    /// `Σ α_i y_i K(x_i, x) - ρ` for every row.
    pub fn decision_function(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| TextClfError::not_fitted("kernel SVC"))?;
        if x.n_cols() != model.support_vectors.n_cols() {
            return Err(TextClfError::invalid_argument(format!(
                "expected {} features, got {}",
                model.support_vectors.n_cols(),
                x.n_cols()
            )));
        }
        Ok(x
            .rows()
            .map(|row| {
                let norm = row.squared_norm();
                model
                    .support_vectors
                    .rows()
                    .zip(&model.sv_norms)
                    .zip(&model.dual_coef)
                    .map(|((sv, &sv_norm), &coef)| coef * rbf(model.gamma, &sv, sv_norm, &row, norm))
                    .sum::<f64>()
                    - model.rho
            })
            .collect())
    }
}

impl Estimator for KernelSvc {
    fn fit(&mut self, x: &FeatureMatrix, y: &[bool]) -> Result<()> {
        check_fit_input(x, y)?;
        let n = x.n_rows();
        let labels = signed_labels(y);
        let bounds: Vec<f64> = sample_weights(self.class_weight, y)
            .into_iter()
            .map(|s| self.c * s)
            .collect();
        let gamma = self.gamma.resolve(x);
        let norms: Vec<f64> = x.rows().map(|row| row.squared_norm()).collect();
        let mut kernel = KernelRows::new(x, &norms, gamma);
        // K(i, i) = 1 for the RBF kernel.
        let q_diag = vec![1.0; n];

        let mut alpha = vec![0.0; n];
        let mut grad = vec![-1.0; n];
        let max_iter = self.max_iter.unwrap_or_else(|| (100 * n).max(10_000_000));

        let is_upper = |a: f64, c: f64| a >= c;
        let is_lower = |a: f64| a <= 0.0;

        let mut iter = 0;
        while iter < max_iter {
            // Maximal violating pair.
            let mut g_max = f64::NEG_INFINITY;
            let mut g_max2 = f64::NEG_INFINITY;
            let mut i_sel = None;
            let mut j_sel = None;
            for t in 0..n {
                let up = if labels[t] > 0.0 {
                    !is_upper(alpha[t], bounds[t])
                } else {
                    !is_lower(alpha[t])
                };
                let low = if labels[t] > 0.0 {
                    !is_lower(alpha[t])
                } else {
                    !is_upper(alpha[t], bounds[t])
                };
                let yg = -labels[t] * grad[t];
                if up && yg >= g_max {
                    g_max = yg;
                    i_sel = Some(t);
                }
                if low && -yg >= g_max2 {
                    g_max2 = -yg;
                    j_sel = Some(t);
                }
            }
            let (Some(i), Some(j)) = (i_sel, j_sel) else {
                break;
            };
            if g_max + g_max2 < self.tol {
                break;
            }
            iter += 1;

            let k_i = kernel.row(i).to_vec();
            let k_j = kernel.row(j).to_vec();
            let q_ij = labels[i] * labels[j] * k_i[j];
            let (c_i, c_j) = (bounds[i], bounds[j]);
            let (old_i, old_j) = (alpha[i], alpha[j]);

            if labels[i] != labels[j] {
                let mut quad = q_diag[i] + q_diag[j] + 2.0 * q_ij;
                if quad <= 0.0 {
                    quad = TAU;
                }
                let delta = (-grad[i] - grad[j]) / quad;
                let diff = alpha[i] - alpha[j];
                alpha[i] += delta;
                alpha[j] += delta;
                if diff > 0.0 {
                    if alpha[j] < 0.0 {
                        alpha[j] = 0.0;
                        alpha[i] = diff;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = -diff;
                }
                if diff > c_i - c_j {
                    if alpha[i] > c_i {
                        alpha[i] = c_i;
                        alpha[j] = c_i - diff;
                    }
                } else if alpha[j] > c_j {
                    alpha[j] = c_j;
                    alpha[i] = c_j + diff;
                }
            } else {
                let mut quad = q_diag[i] + q_diag[j] - 2.0 * q_ij;
                if quad <= 0.0 {
                    quad = TAU;
                }
                let delta = (grad[i] - grad[j]) / quad;
                let sum = alpha[i] + alpha[j];
                alpha[i] -= delta;
                alpha[j] += delta;
                if sum > c_i {
                    if alpha[i] > c_i {
                        alpha[i] = c_i;
                        alpha[j] = sum - c_i;
                    }
                } else if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = sum;
                }
                if sum > c_j {
                    if alpha[j] > c_j {
                        alpha[j] = c_j;
                        alpha[i] = sum - c_j;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = sum;
                }
            }

            let d_i = alpha[i] - old_i;
            let d_j = alpha[j] - old_j;
            for t in 0..n {
                grad[t] += labels[t] * (labels[i] * k_i[t] * d_i + labels[j] * k_j[t] * d_j);
            }
        }
        log::debug!("kernel SVC finished after {iter} SMO iterations (gamma = {gamma})");

        // Bias from the free variables, or the middle of the feasible range.
        let mut upper_bound = f64::INFINITY;
        let mut lower_bound = f64::NEG_INFINITY;
        let mut free_sum = 0.0;
        let mut n_free = 0usize;
        for t in 0..n {
            let yg = labels[t] * grad[t];
            if is_upper(alpha[t], bounds[t]) {
                if labels[t] < 0.0 {
                    upper_bound = upper_bound.min(yg);
                } else {
                    lower_bound = lower_bound.max(yg);
                }
            } else if is_lower(alpha[t]) {
                if labels[t] > 0.0 {
                    upper_bound = upper_bound.min(yg);
                } else {
                    lower_bound = lower_bound.max(yg);
                }
            } else {
                n_free += 1;
                free_sum += yg;
            }
        }
        let rho = if n_free > 0 {
            free_sum / n_free as f64
        } else {
            (upper_bound + lower_bound) / 2.0
        };

        let support: Vec<usize> = (0..n).filter(|&t| alpha[t] > 0.0).collect();
        self.model = Some(Model {
            gamma,
            support_vectors: x.select_rows(&support)?,
            sv_norms: support.iter().map(|&t| norms[t]).collect(),
            dual_coef: support.iter().map(|&t| alpha[t] * labels[t]).collect(),
            rho,
        });
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<bool>> {
        Ok(self
            .decision_function(x)?
            .into_iter()
            .map(|f| f > 0.0)
            .collect())
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "C" => {
                let c = value.as_f64(name)?;
                if c <= 0.0 {
                    return Err(invalid_value(name, value));
                }
                self.c = c;
            }
            "gamma" => self.gamma = Gamma::from_param(value)?,
            "kernel" => {
                if value.as_str(name)? != "rbf" {
                    return Err(invalid_value(name, value));
                }
            }
            "tol" => self.tol = value.as_f64(name)?,
            "max_iter" => {
                self.max_iter = match value {
                    ParamValue::None | ParamValue::Int(-1) => None,
                    other => Some(other.as_usize(name)?),
                }
            }
            "class_weight" => self.class_weight = ClassWeight::from_param(value)?,
            _ => return Err(unknown_param(self.name(), name)),
        }
        self.model = None;
        Ok(())
    }

    fn params(&self) -> Params {
        let mut params = Params::new();
        params.insert("C".into(), ParamValue::Float(self.c));
        params.insert("kernel".into(), ParamValue::str("rbf"));
        params.insert("gamma".into(), self.gamma.to_param());
        params.insert("tol".into(), ParamValue::Float(self.tol));
        params.insert(
            "max_iter".into(),
            self.max_iter
                .map(|m| ParamValue::Int(m as i64))
                .unwrap_or(ParamValue::Int(-1)),
        );
        params.insert("class_weight".into(), self.class_weight.to_param());
        params
    }

    fn clone_unfitted(&self) -> Box<dyn Estimator> {
        Box::new(Self {
            model: None,
            ..self.clone()
        })
    }

    fn name(&self) -> &str {
        "SVC"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Positives inside the unit circle, negatives on a ring around it; not
    /// linearly separable.
    fn rings() -> (FeatureMatrix, Vec<bool>) {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for k in 0..24 {
            let angle = k as f64 * std::f64::consts::PI / 12.0;
            let (r, label) = if k % 2 == 0 { (0.3, true) } else { (2.0, false) };
            rows.push(vec![r * angle.cos(), r * angle.sin()]);
            y.push(label);
        }
        (FeatureMatrix::from_dense_rows(rows).unwrap(), y)
    }

    #[test]
    fn test_learns_nonlinear_boundary() {
        let (x, y) = rings();
        let mut svc = KernelSvc::new().with_c(10.0).with_gamma(Gamma::Value(1.0));
        svc.fit(&x, &y).unwrap();
        assert_eq!(svc.predict(&x).unwrap(), y);
        assert!(svc.n_support() > 0);

        let unseen = FeatureMatrix::from_dense_rows(vec![vec![0.0, 0.0], vec![3.0, 0.0]]).unwrap();
        assert_eq!(svc.predict(&unseen).unwrap(), vec![true, false]);
    }

    #[test]
    fn test_kernel_rows_stay_bounded() {
        let x = FeatureMatrix::from_dense_rows(vec![vec![0.0], vec![1.0], vec![3.0]]).unwrap();
        let norms: Vec<f64> = x.rows().map(|row| row.squared_norm()).collect();
        let mut kernel = KernelRows::new(&x, &norms, 0.5);
        kernel.capacity = 2;

        assert_eq!(kernel.row(0), &[1.0, (-0.5f64).exp(), (-4.5f64).exp()]);
        kernel.row(1);
        assert_eq!(kernel.rows.len(), 2);
        let row = kernel.row(2).to_vec();
        assert_eq!(kernel.rows.len(), 1);
        assert!((row[0] - (-4.5f64).exp()).abs() < 1e-12);
        assert!((row[1] - (-2.0f64).exp()).abs() < 1e-12);
        assert_eq!(row[2], 1.0);
    }

    #[test]
    fn test_gamma_resolution() {
        let x = FeatureMatrix::from_dense_rows(vec![vec![1.0, 3.0], vec![1.0, 3.0]]).unwrap();
        // Elements 1, 3, 1, 3: variance 1.
        assert!((Gamma::Scale.resolve(&x) - 0.5).abs() < 1e-12);
        assert_eq!(Gamma::Auto.resolve(&x), 0.5);
        assert_eq!(Gamma::Scale.resolve(&FeatureMatrix::zeros(2, 4)), 1.0);
        assert_eq!(Gamma::Value(0.1).resolve(&x), 0.1);
    }

    #[test]
    fn test_params() {
        let mut svc = KernelSvc::new();
        svc.set_param("gamma", &ParamValue::str("auto")).unwrap();
        assert_eq!(svc.gamma(), Gamma::Auto);
        svc.set_param("gamma", &ParamValue::Int(10)).unwrap();
        assert_eq!(svc.gamma(), Gamma::Value(10.0));
        svc.set_param("C", &ParamValue::Float(100.0)).unwrap();
        assert_eq!(svc.c(), 100.0);

        assert!(svc.set_param("gamma", &ParamValue::str("wide")).unwrap_err().is_config());
        assert!(svc.set_param("kernel", &ParamValue::str("poly")).unwrap_err().is_config());
        assert!(svc.set_param("penalty", &ParamValue::str("l1")).unwrap_err().is_config());
    }

    #[test]
    fn test_predict_before_fit() {
        let (x, _) = rings();
        assert!(matches!(
            KernelSvc::new().predict(&x).unwrap_err(),
            TextClfError::NotFitted(_)
        ));
    }
}
