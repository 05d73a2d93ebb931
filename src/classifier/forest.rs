//! Random forest of impurity-split decision trees.
//!
//! Each tree is grown on a bootstrap sample, represented as per-sample
//! multiplicities, and considers a random subset of `max_features` features
//! at every node. Features that are constant within a node do not count
//! towards that subset, so a node only becomes a leaf early when no
//! feature can split it. The forest predicts the class whose averaged leaf
//! probability is larger.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::classifier::estimator::{
    ClassWeight, Estimator, ParamValue, Params, check_fit_input, invalid_value, sample_weights,
    unknown_param,
};
use crate::error::{Result, TextClfError};
use crate::matrix::FeatureMatrix;

/// Split quality measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    Gini,
    Entropy,
}

impl Criterion {
    /// Impurity of a node with weighted class totals `neg` and `pos`.
    fn impurity(&self, neg: f64, pos: f64) -> f64 {
        let total = neg + pos;
        if total <= 0.0 {
            return 0.0;
        }
        let (p, q) = (pos / total, neg / total);
        match self {
            Criterion::Gini => 1.0 - p * p - q * q,
            Criterion::Entropy => {
                let h = |v: f64| if v > 0.0 { -v * v.log2() } else { 0.0 };
                h(p) + h(q)
            }
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Criterion::Gini => "gini",
            Criterion::Entropy => "entropy",
        }
    }
}

/// Number of features examined per split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    /// A fixed count, clamped to the number of features.
    Count(usize),
    /// A fraction of the features (at least one).
    Fraction(f64),
    All,
}

impl MaxFeatures {
    fn from_param(value: &ParamValue) -> Result<Self> {
        match value {
            ParamValue::None => Ok(MaxFeatures::All),
            ParamValue::Int(v) if *v > 0 => Ok(MaxFeatures::Count(*v as usize)),
            ParamValue::Float(v) if *v > 0.0 && *v <= 1.0 => Ok(MaxFeatures::Fraction(*v)),
            ParamValue::Str(s) if s == "sqrt" => Ok(MaxFeatures::Sqrt),
            ParamValue::Str(s) if s == "log2" => Ok(MaxFeatures::Log2),
            other => Err(invalid_value("max_features", other)),
        }
    }

    fn to_param(self) -> ParamValue {
        match self {
            MaxFeatures::Sqrt => ParamValue::str("sqrt"),
            MaxFeatures::Log2 => ParamValue::str("log2"),
            MaxFeatures::Count(n) => ParamValue::Int(n as i64),
            MaxFeatures::Fraction(f) => ParamValue::Float(f),
            MaxFeatures::All => ParamValue::None,
        }
    }

    /// Resolved count for `n_features` features.
    pub fn resolve(self, n_features: usize) -> usize {
        let n = n_features as f64;
        let count = match self {
            MaxFeatures::Sqrt => n.sqrt() as usize,
            MaxFeatures::Log2 => n.log2() as usize,
            MaxFeatures::Count(c) => c,
            MaxFeatures::Fraction(f) => (f * n) as usize,
            MaxFeatures::All => n_features,
        };
        count.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        /// Weighted fraction of positive samples.
        positive: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// Settings shared by every tree of a forest.
#[derive(Debug, Clone, Copy)]
struct TreeParams {
    criterion: Criterion,
    max_depth: Option<usize>,
    max_features: usize,
    min_samples_split: usize,
}

/// One classification tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: TreeNode,
}

struct TreeBuilder<'a> {
    x: &'a FeatureMatrix,
    y: &'a [bool],
    /// Bootstrap multiplicity times class weight, per sample.
    weights: &'a [f64],
    params: TreeParams,
    /// Feature ids; a prefix is shuffled per node.
    features: Vec<usize>,
    rng: StdRng,
}

impl TreeBuilder<'_> {
    fn class_totals(&self, samples: &[usize]) -> (f64, f64) {
        samples.iter().fold((0.0, 0.0), |(neg, pos), &i| {
            if self.y[i] {
                (neg, pos + self.weights[i])
            } else {
                (neg + self.weights[i], pos)
            }
        })
    }

    fn build(&mut self, samples: Vec<usize>, depth: usize) -> TreeNode {
        let (neg, pos) = self.class_totals(&samples);
        let leaf = TreeNode::Leaf {
            positive: if neg + pos > 0.0 { pos / (neg + pos) } else { 0.0 },
        };
        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        if depth_reached
            || samples.len() < self.params.min_samples_split
            || neg == 0.0
            || pos == 0.0
        {
            return leaf;
        }

        match self.find_best_split(&samples, neg, pos) {
            Some((feature, threshold)) => {
                let (left, right): (Vec<usize>, Vec<usize>) = samples
                    .iter()
                    .partition(|&&i| self.x.get(i, feature) <= threshold);
                TreeNode::Split {
                    feature,
                    threshold,
                    left: Box::new(self.build(left, depth + 1)),
                    right: Box::new(self.build(right, depth + 1)),
                }
            }
            None => leaf,
        }
    }

    /// Best `(feature, threshold)` among up to `max_features` non-constant
    /// features, by weighted impurity decrease.
    fn find_best_split(&mut self, samples: &[usize], neg: f64, pos: f64) -> Option<(usize, f64)> {
        let criterion = self.params.criterion;
        let total = neg + pos;
        let parent = criterion.impurity(neg, pos);
        let n_features = self.features.len();

        let mut best: Option<(usize, f64)> = None;
        let mut best_score = f64::NEG_INFINITY;
        let mut examined = 0;

        for k in 0..n_features {
            if examined >= self.params.max_features {
                break;
            }
            let pick = self.rng.random_range(k..n_features);
            self.features.swap(k, pick);
            let feature = self.features[k];

            let mut values: Vec<(f64, usize)> = samples
                .iter()
                .map(|&i| (self.x.get(i, feature), i))
                .collect();
            values.sort_by(|a, b| a.0.total_cmp(&b.0));
            let (first, last) = (values[0].0, values[values.len() - 1].0);
            if first == last {
                continue;
            }
            examined += 1;

            let (mut left_neg, mut left_pos) = (0.0, 0.0);
            for w in 0..values.len() - 1 {
                let i = values[w].1;
                if self.y[i] {
                    left_pos += self.weights[i];
                } else {
                    left_neg += self.weights[i];
                }
                if values[w].0 == values[w + 1].0 {
                    continue;
                }
                let left = left_neg + left_pos;
                let right = total - left;
                let child = (left * criterion.impurity(left_neg, left_pos)
                    + right * criterion.impurity(neg - left_neg, pos - left_pos))
                    / total;
                let score = parent - child;
                if score > best_score {
                    best_score = score;
                    let mut threshold = (values[w].0 + values[w + 1].0) / 2.0;
                    if threshold == values[w + 1].0 {
                        threshold = values[w].0;
                    }
                    best = Some((feature, threshold));
                }
            }
        }
        best
    }
}

impl DecisionTree {
    fn fit(
        x: &FeatureMatrix,
        y: &[bool],
        weights: &[f64],
        params: TreeParams,
        rng: StdRng,
    ) -> Self {
        let samples: Vec<usize> = (0..x.n_rows()).filter(|&i| weights[i] > 0.0).collect();
        let mut builder = TreeBuilder {
            x,
            y,
            weights,
            params,
            features: (0..x.n_cols()).collect(),
            rng,
        };
        let root = builder.build(samples, 0);
        Self { root }
    }

    /// Positive-class probability of row `i` of `x`.
    fn predict_row(&self, x: &FeatureMatrix, i: usize) -> f64 {
        let row = x.row(i);
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { positive } => return *positive,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row.get(*feature) <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Depth of the deepest leaf.
    pub fn depth(&self) -> usize {
        fn depth_of(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth_of(left).max(depth_of(right)),
            }
        }
        depth_of(&self.root)
    }
}

/// Bagged ensemble of [`DecisionTree`]s.
#[derive(Debug, Clone)]
pub struct RandomForest {
    n_estimators: usize,
    criterion: Criterion,
    max_depth: Option<usize>,
    max_features: MaxFeatures,
    min_samples_split: usize,
    bootstrap: bool,
    class_weight: ClassWeight,
    seed: u64,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            criterion: Criterion::Gini,
            max_depth: None,
            max_features: MaxFeatures::Sqrt,
            min_samples_split: 2,
            bootstrap: true,
            class_weight: ClassWeight::None,
            seed: 0,
            trees: Vec::new(),
            n_features: 0,
        }
    }
}

impl RandomForest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Averaged positive-class probability of every row.
    pub fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        if self.trees.is_empty() {
            return Err(TextClfError::not_fitted("random forest"));
        }
        if x.n_cols() != self.n_features {
            return Err(TextClfError::invalid_argument(format!(
                "expected {} features, got {}",
                self.n_features,
                x.n_cols()
            )));
        }
        let n_trees = self.trees.len() as f64;
        Ok((0..x.n_rows())
            .map(|i| self.trees.iter().map(|t| t.predict_row(x, i)).sum::<f64>() / n_trees)
            .collect())
    }
}

impl Estimator for RandomForest {
    fn fit(&mut self, x: &FeatureMatrix, y: &[bool]) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_estimators == 0 {
            return Err(TextClfError::config("n_estimators must be positive"));
        }
        let n = x.n_rows();
        let class_weights = sample_weights(self.class_weight, y);
        let params = TreeParams {
            criterion: self.criterion,
            max_depth: self.max_depth,
            max_features: self.max_features.resolve(x.n_cols()),
            min_samples_split: self.min_samples_split,
        };

        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(t as u64));
                let mut weights = vec![0.0; n];
                if self.bootstrap {
                    for _ in 0..n {
                        weights[rng.random_range(0..n)] += 1.0;
                    }
                } else {
                    weights.iter_mut().for_each(|w| *w = 1.0);
                }
                for (w, c) in weights.iter_mut().zip(&class_weights) {
                    *w *= c;
                }
                DecisionTree::fit(x, y, &weights, params, rng)
            })
            .collect();

        log::debug!(
            "fitted {} trees (max depth {})",
            trees.len(),
            trees.iter().map(|t| t.depth()).max().unwrap_or(0)
        );
        self.trees = trees;
        self.n_features = x.n_cols();
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<bool>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| p > 0.5)
            .collect())
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = value.as_usize(name)?,
            "max_depth" => {
                self.max_depth = match value {
                    ParamValue::None => None,
                    other => Some(other.as_usize(name)?),
                }
            }
            "max_features" => self.max_features = MaxFeatures::from_param(value)?,
            "criterion" => {
                self.criterion = match value.as_str(name)? {
                    "gini" => Criterion::Gini,
                    "entropy" => Criterion::Entropy,
                    _ => return Err(invalid_value(name, value)),
                }
            }
            "min_samples_split" => {
                let min = value.as_usize(name)?;
                if min < 2 {
                    return Err(invalid_value(name, value));
                }
                self.min_samples_split = min;
            }
            "bootstrap" => {
                self.bootstrap = match value {
                    ParamValue::Int(0) => false,
                    ParamValue::Int(1) => true,
                    other => match other.as_str(name)? {
                        "true" => true,
                        "false" => false,
                        _ => return Err(invalid_value(name, value)),
                    },
                }
            }
            "class_weight" => self.class_weight = ClassWeight::from_param(value)?,
            "random_state" => self.seed = value.as_usize(name)? as u64,
            _ => return Err(unknown_param(self.name(), name)),
        }
        self.trees.clear();
        Ok(())
    }

    fn params(&self) -> Params {
        let mut params = Params::new();
        params.insert("n_estimators".into(), ParamValue::Int(self.n_estimators as i64));
        params.insert("criterion".into(), ParamValue::str(self.criterion.as_str()));
        params.insert(
            "max_depth".into(),
            self.max_depth
                .map(|d| ParamValue::Int(d as i64))
                .unwrap_or(ParamValue::None),
        );
        params.insert("max_features".into(), self.max_features.to_param());
        params.insert(
            "min_samples_split".into(),
            ParamValue::Int(self.min_samples_split as i64),
        );
        params.insert("class_weight".into(), self.class_weight.to_param());
        params.insert("random_state".into(), ParamValue::Int(self.seed as i64));
        params
    }

    fn clone_unfitted(&self) -> Box<dyn Estimator> {
        Box::new(Self {
            trees: Vec::new(),
            n_features: 0,
            ..self.clone()
        })
    }

    fn name(&self) -> &str {
        "RandomForestClassifier"
    }
}
