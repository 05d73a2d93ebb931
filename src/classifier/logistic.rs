//! L1/L2-regularised logistic regression.
//!
//! Minimises
//!
//! ```text
//! C * Σ s_i * log(1 + exp(-y_i * (w·x_i + b))) + R(w)
//! ```
//!
//! with `R(w) = ‖w‖₁` (`l1`) or `½‖w‖²` (`l2`), sample weights `s_i` from the
//! class weighting and an unpenalised intercept `b`. The solver is FISTA
//! (accelerated proximal gradient) with a backtracking step size and a
//! momentum restart whenever the objective goes up.

use crate::classifier::estimator::{
    ClassWeight, Estimator, ParamValue, Params, check_fit_input, invalid_value, sample_weights,
    signed_labels, unknown_param,
};
use crate::error::{Result, TextClfError};
use crate::matrix::FeatureMatrix;

/// Regulariser of the weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Penalty {
    L1,
    L2,
}

impl Penalty {
    fn from_param(value: &ParamValue) -> Result<Self> {
        match value.as_str("penalty")? {
            "l1" => Ok(Penalty::L1),
            "l2" => Ok(Penalty::L2),
            _ => Err(invalid_value("penalty", value)),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Penalty::L1 => "l1",
            Penalty::L2 => "l2",
        }
    }

    fn value(&self, w: &[f64]) -> f64 {
        match self {
            Penalty::L1 => w.iter().map(|v| v.abs()).sum(),
            Penalty::L2 => 0.5 * w.iter().map(|v| v * v).sum::<f64>(),
        }
    }

    /// Proximal operator of `step * R`.
    fn prox(&self, w: &mut [f64], step: f64) {
        match self {
            Penalty::L1 => {
                for v in w.iter_mut() {
                    *v = v.signum() * (v.abs() - step).max(0.0);
                }
            }
            Penalty::L2 => {
                let shrink = 1.0 / (1.0 + step);
                w.iter_mut().for_each(|v| *v *= shrink);
            }
        }
    }
}

/// Solvers accepted for compatibility with experiment grids. All of them
/// run the same proximal gradient method.
const SOLVERS: &[&str] = &["liblinear", "saga"];

#[derive(Debug, Clone)]
struct Model {
    weights: Vec<f64>,
    intercept: f64,
}

/// Binary logistic regression.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    c: f64,
    penalty: Penalty,
    solver: String,
    max_iter: usize,
    tol: f64,
    class_weight: ClassWeight,
    model: Option<Model>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            c: 1.0,
            penalty: Penalty::L2,
            solver: "liblinear".to_string(),
            max_iter: 100,
            tol: 1e-4,
            class_weight: ClassWeight::None,
            model: None,
        }
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inverse regularisation strength.
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_penalty(mut self, penalty: Penalty) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    pub fn penalty(&self) -> Penalty {
        self.penalty
    }

    pub fn class_weight(&self) -> ClassWeight {
        self.class_weight
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    /// Fitted weights and intercept.
    pub fn coefficients(&self) -> Option<(&[f64], f64)> {
        self.model
            .as_ref()
            .map(|m| (m.weights.as_slice(), m.intercept))
    }

    /// Signed distance `w·x + b` of every row.
    pub fn decision_function(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| TextClfError::not_fitted("logistic regression"))?;
        if x.n_cols() != model.weights.len() {
            return Err(TextClfError::invalid_argument(format!(
                "expected {} features, got {}",
                model.weights.len(),
                x.n_cols()
            )));
        }
        Ok(x
            .rows()
            .map(|row| row.dot(&model.weights) + model.intercept)
            .collect())
    }

    /// Weighted logistic loss (times C) and its gradient at `(w, b)`.
    fn loss_and_grad(
        &self,
        x: &FeatureMatrix,
        y: &[f64],
        s: &[f64],
        w: &[f64],
        b: f64,
    ) -> (f64, Vec<f64>, f64) {
        let mut loss = 0.0;
        let mut grad = vec![0.0; w.len()];
        let mut grad_b = 0.0;
        for (i, row) in x.rows().enumerate() {
            let margin = y[i] * (row.dot(w) + b);
            loss += s[i] * log1p_exp(-margin);
            // d/dz log(1 + exp(-y z)) = -y * sigmoid(-y z)
            let g = -self.c * s[i] * y[i] * sigmoid(-margin);
            row.add_scaled_to(g, &mut grad);
            grad_b += g;
        }
        (self.c * loss, grad, grad_b)
    }

    fn loss(&self, x: &FeatureMatrix, y: &[f64], s: &[f64], w: &[f64], b: f64) -> f64 {
        let loss: f64 = x
            .rows()
            .enumerate()
            .map(|(i, row)| s[i] * log1p_exp(-y[i] * (row.dot(w) + b)))
            .sum();
        self.c * loss
    }
}

fn log1p_exp(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl Estimator for LogisticRegression {
    fn fit(&mut self, x: &FeatureMatrix, y: &[bool]) -> Result<()> {
        check_fit_input(x, y)?;
        let labels = signed_labels(y);
        let s = sample_weights(self.class_weight, y);
        let d = x.n_cols();

        // Iterate and momentum point.
        let (mut w, mut b) = (vec![0.0; d], 0.0);
        let (mut z, mut zb) = (w.clone(), b);
        let mut t = 1.0_f64;
        let mut lipschitz = 1.0_f64;
        let mut objective = self.loss(x, &labels, &s, &w, b) + self.penalty.value(&w);
        let mut converged = false;

        for iter in 0..self.max_iter {
            let (fz, grad, grad_b) = self.loss_and_grad(x, &labels, &s, &z, zb);

            let (w_next, b_next, f_next) = loop {
                let step = 1.0 / lipschitz;
                let mut cand: Vec<f64> = z.iter().zip(&grad).map(|(v, g)| v - step * g).collect();
                self.penalty.prox(&mut cand, step);
                let cand_b = zb - step * grad_b;

                let f_cand = self.loss(x, &labels, &s, &cand, cand_b);
                let mut linear = (cand_b - zb) * grad_b;
                let mut quad = (cand_b - zb) * (cand_b - zb);
                for j in 0..d {
                    let diff = cand[j] - z[j];
                    linear += diff * grad[j];
                    quad += diff * diff;
                }
                if f_cand <= fz + linear + 0.5 * lipschitz * quad + 1e-12 || lipschitz > 1e12 {
                    break (cand, cand_b, f_cand);
                }
                lipschitz *= 2.0;
            };

            let next_objective = f_next + self.penalty.value(&w_next);
            let max_change = w_next
                .iter()
                .zip(&w)
                .map(|(p, q)| (p - q).abs())
                .fold((b_next - b).abs(), f64::max);
            let scale = w_next.iter().map(|v| v.abs()).fold(b_next.abs(), f64::max).max(1.0);

            if next_objective > objective {
                // Restart momentum from the last iterate.
                t = 1.0;
                z.clone_from(&w);
                zb = b;
                lipschitz *= 2.0;
                continue;
            }

            let t_next = (1.0 + (1.0 + 4.0 * t * t).sqrt()) / 2.0;
            let momentum = (t - 1.0) / t_next;
            for j in 0..d {
                z[j] = w_next[j] + momentum * (w_next[j] - w[j]);
            }
            zb = b_next + momentum * (b_next - b);
            t = t_next;
            w = w_next;
            b = b_next;
            objective = next_objective;
            // Let the step grow again after successful iterations.
            lipschitz = (lipschitz * 0.9).max(1e-12);

            if max_change <= self.tol * scale {
                log::debug!("logistic regression converged after {} iterations", iter + 1);
                converged = true;
                break;
            }
        }
        if !converged {
            log::debug!(
                "logistic regression stopped after max_iter={} (objective {objective:.6})",
                self.max_iter
            );
        }

        self.model = Some(Model {
            weights: w,
            intercept: b,
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
            "penalty" => self.penalty = Penalty::from_param(value)?,
            "solver" => {
                let solver = value.as_str(name)?;
                if !SOLVERS.contains(&solver) {
                    return Err(invalid_value(name, value));
                }
                self.solver = solver.to_string();
            }
            "max_iter" => self.max_iter = value.as_usize(name)?,
            "tol" => self.tol = value.as_f64(name)?,
            "class_weight" => self.class_weight = ClassWeight::from_param(value)?,
            _ => return Err(unknown_param(self.name(), name)),
        }
        self.model = None;
        Ok(())
    }

    fn params(&self) -> Params {
        let mut params = Params::new();
        params.insert("C".into(), ParamValue::Float(self.c));
        params.insert("penalty".into(), ParamValue::str(self.penalty.as_str()));
        params.insert("solver".into(), ParamValue::str(self.solver.as_str()));
        params.insert("max_iter".into(), ParamValue::Int(self.max_iter as i64));
        params.insert("tol".into(), ParamValue::Float(self.tol));
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
        "LogisticRegression"
    }
}
