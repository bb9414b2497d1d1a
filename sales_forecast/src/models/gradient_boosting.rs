//! Gradient-boosted regression trees with a squared-error objective

use crate::error::{ForecastError, Result};
use crate::models::{feature_rows, Regressor, TrainedRegressor};
use feature_align::FeatureFrame;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Loss minimized by the booster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    #[serde(rename = "reg:squarederror")]
    SquaredError,
}

/// Booster hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoostingParams {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Shrinkage applied to every tree
    pub learning_rate: f64,
    /// Maximum depth of a tree
    pub max_depth: usize,
    /// Fraction of rows sampled per round
    pub subsample: f64,
    /// Fraction of columns sampled per tree
    pub colsample_bytree: f64,
    /// Minimum number of rows on each side of a split
    pub min_child_weight: f64,
    /// L1 penalty on leaf weights
    pub reg_alpha: f64,
    /// L2 penalty on leaf weights
    pub reg_lambda: f64,
    /// Minimum loss reduction required to split
    pub gamma: f64,
    pub objective: Objective,
    /// Seed for row and column sampling
    pub random_state: u64,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
            subsample: 1.0,
            colsample_bytree: 1.0,
            min_child_weight: 1.0,
            reg_alpha: 0.0,
            reg_lambda: 1.0,
            gamma: 0.0,
            objective: Objective::SquaredError,
            random_state: 42,
        }
    }
}

impl GradientBoostingParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(ForecastError::InvalidParameter(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(ForecastError::InvalidParameter(
                "learning_rate must be in (0, 1]".to_string(),
            ));
        }
        for (name, value) in [
            ("subsample", self.subsample),
            ("colsample_bytree", self.colsample_bytree),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ForecastError::InvalidParameter(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [
            ("min_child_weight", self.min_child_weight),
            ("reg_alpha", self.reg_alpha),
            ("reg_lambda", self.reg_lambda),
            ("gamma", self.gamma),
        ] {
            if !(value >= 0.0) {
                return Err(ForecastError::InvalidParameter(format!(
                    "{} must be non-negative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// A node of a fitted tree; children are indices into the tree's node list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single regression tree; rows with `value < threshold` go left
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn evaluate<F: Fn(usize) -> f64>(&self, value_of: F) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if value_of(*feature) < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn depth_of(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + depth_of(nodes, *left).max(depth_of(nodes, *right))
                }
            }
        }
        depth_of(&self.nodes, 0)
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }
}

/// Gradient-boosted tree regressor
#[derive(Debug, Clone)]
pub struct GradientBoosting {
    name: String,
    params: GradientBoostingParams,
}

impl GradientBoosting {
    pub fn new(params: GradientBoostingParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            name: format!(
                "Gradient Boosting (n_estimators={}, max_depth={})",
                params.n_estimators, params.max_depth
            ),
            params,
        })
    }

    pub fn params(&self) -> &GradientBoostingParams {
        &self.params
    }

    fn leaf_weight(&self, residual_sum: f64, count: f64) -> f64 {
        soft_threshold(residual_sum, self.params.reg_alpha) / (count + self.params.reg_lambda)
    }

    fn score(&self, residual_sum: f64, count: f64) -> f64 {
        let g = soft_threshold(residual_sum, self.params.reg_alpha);
        g * g / (count + self.params.reg_lambda)
    }

    fn grow_tree(
        &self,
        columns: &[Vec<f64>],
        residuals: &[f64],
        rows: &[usize],
        features: &[usize],
    ) -> RegressionTree {
        let mut nodes = Vec::new();
        let mut grower = Grower {
            booster: self,
            columns,
            residuals,
            features,
            nodes: &mut nodes,
        };
        grower.grow(rows, 0);
        RegressionTree { nodes }
    }
}

struct Grower<'a> {
    booster: &'a GradientBoosting,
    columns: &'a [Vec<f64>],
    residuals: &'a [f64],
    features: &'a [usize],
    nodes: &'a mut Vec<TreeNode>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl Grower<'_> {
    fn grow(&mut self, rows: &[usize], depth: usize) -> usize {
        let sum: f64 = rows.iter().map(|&i| self.residuals[i]).sum();
        let count = rows.len() as f64;
        let node_id = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            value: self.booster.leaf_weight(sum, count),
        });

        if depth >= self.booster.params.max_depth || rows.len() < 2 {
            return node_id;
        }
        let Some(split) = self.best_split(rows, sum) else {
            return node_id;
        };

        let column = &self.columns[split.feature];
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.iter().partition(|&&i| column[i] < split.threshold);
        let left = self.grow(&left_rows, depth + 1);
        let right = self.grow(&right_rows, depth + 1);

        self.nodes[node_id] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_id
    }

    fn best_split(&self, rows: &[usize], total: f64) -> Option<SplitCandidate> {
        let params = &self.booster.params;
        let parent_score = self.booster.score(total, rows.len() as f64);
        let mut best: Option<SplitCandidate> = None;
        let mut ordered = rows.to_vec();

        for &feature in self.features {
            let column = &self.columns[feature];
            ordered.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

            let mut left_sum = 0.0;
            for k in 0..ordered.len() - 1 {
                left_sum += self.residuals[ordered[k]];
                let (lo, hi) = (column[ordered[k]], column[ordered[k + 1]]);
                if lo >= hi {
                    continue;
                }

                let left_count = (k + 1) as f64;
                let right_count = (ordered.len() - k - 1) as f64;
                if left_count < params.min_child_weight || right_count < params.min_child_weight {
                    continue;
                }

                let gain = 0.5
                    * (self.booster.score(left_sum, left_count)
                        + self.booster.score(total - left_sum, right_count)
                        - parent_score)
                    - params.gamma;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: lo + (hi - lo) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }
}

fn soft_threshold(value: f64, alpha: f64) -> f64 {
    if value > alpha {
        value - alpha
    } else if value < -alpha {
        value + alpha
    } else {
        0.0
    }
}

fn sample_count(total: usize, fraction: f64) -> usize {
    ((total as f64 * fraction).round() as usize).clamp(1, total)
}

impl Regressor for GradientBoosting {
    type Trained = TrainedGradientBoosting;

    fn fit(&self, features: &FeatureFrame, target: &[f64]) -> Result<Self::Trained> {
        let n_rows = features.height();
        if n_rows == 0 {
            return Err(ForecastError::DataError(
                "cannot fit on an empty feature frame".to_string(),
            ));
        }
        if target.len() != n_rows {
            return Err(ForecastError::DataError(format!(
                "feature frame has {} rows but {} targets were given",
                n_rows,
                target.len()
            )));
        }
        if let Some(bad) = target.iter().find(|t| !t.is_finite()) {
            return Err(ForecastError::DataError(format!(
                "target contains a non-finite value: {}",
                bad
            )));
        }

        let feature_names = features.column_names();
        let columns = feature_names
            .iter()
            .map(|name| features.column(name))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let n_features = columns.len();

        let base_score = target.iter().sum::<f64>() / n_rows as f64;
        let mut predictions = vec![base_score; n_rows];
        let mut rng = StdRng::seed_from_u64(self.params.random_state);
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for round in 0..self.params.n_estimators {
            let residuals: Vec<f64> = target
                .iter()
                .zip(predictions.iter())
                .map(|(y, p)| y - p)
                .collect();

            let rows = if self.params.subsample < 1.0 {
                sample(&mut rng, n_rows, sample_count(n_rows, self.params.subsample)).into_vec()
            } else {
                (0..n_rows).collect()
            };
            let mut sampled_features = if n_features > 0 && self.params.colsample_bytree < 1.0 {
                sample(
                    &mut rng,
                    n_features,
                    sample_count(n_features, self.params.colsample_bytree),
                )
                .into_vec()
            } else {
                (0..n_features).collect()
            };
            sampled_features.sort_unstable();

            let tree = self.grow_tree(&columns, &residuals, &rows, &sampled_features);
            for (i, prediction) in predictions.iter_mut().enumerate() {
                *prediction += self.params.learning_rate * tree.evaluate(|f| columns[f][i]);
            }

            if (round + 1) % 25 == 0 {
                let mse = target
                    .iter()
                    .zip(predictions.iter())
                    .map(|(y, p)| (y - p).powi(2))
                    .sum::<f64>()
                    / n_rows as f64;
                debug!(round = round + 1, train_rmse = mse.sqrt(), "boosting progress");
            }
            trees.push(tree);
        }

        info!(
            rows = n_rows,
            features = n_features,
            trees = trees.len(),
            "fitted gradient boosting model"
        );

        Ok(TrainedGradientBoosting {
            name: self.name.clone(),
            params: self.params.clone(),
            feature_names,
            base_score,
            trees,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Fitted booster; this is the persisted model artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedGradientBoosting {
    name: String,
    params: GradientBoostingParams,
    feature_names: Vec<String>,
    base_score: f64,
    trees: Vec<RegressionTree>,
}

impl TrainedGradientBoosting {
    pub fn params(&self) -> &GradientBoostingParams {
        &self.params
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Check the structure of a deserialized model
    pub(crate) fn check(&self) -> Result<()> {
        for (i, tree) in self.trees.iter().enumerate() {
            let n = tree.nodes.len();
            // Children always follow their parent, which also rules out cycles
            let dangling = tree.nodes.iter().enumerate().any(|(idx, node)| match node {
                TreeNode::Split {
                    left,
                    right,
                    feature,
                    ..
                } => {
                    *left <= idx
                        || *right <= idx
                        || *left >= n
                        || *right >= n
                        || *feature >= self.feature_names.len()
                }
                TreeNode::Leaf { .. } => false,
            });
            if n == 0 || dangling {
                return Err(ForecastError::ModelError(format!(
                    "tree {} of the model is malformed",
                    i
                )));
            }
        }
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        self.base_score
            + self
                .trees
                .iter()
                .map(|tree| self.params.learning_rate * tree.evaluate(|f| row[f]))
                .sum::<f64>()
    }
}

impl TrainedRegressor for TrainedGradientBoosting {
    fn predict(&self, features: &FeatureFrame) -> Result<Vec<f64>> {
        let rows = feature_rows(&self.feature_names, features)?;
        Ok(rows.iter().map(|row| self.predict_row(row)).collect())
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn name(&self) -> &str {
        &self.name
    }
}
