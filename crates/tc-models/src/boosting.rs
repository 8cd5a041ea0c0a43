//! Gradient-boosted regression trees over engineered lag/rolling/calendar
//! features, forecast recursively.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use tc_types::{step_forward, FitError, Params, SeriesSlice};

use crate::decode;
use crate::features::FeatureConfig;

const FAMILY: &str = "gradient_boosting";

/// Fewest training rows (after the feature lookback) a fit accepts.
pub const MIN_TRAINING_ROWS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
        }
    }
}

impl BoostingParams {
    pub(crate) fn from_params(params: &Params) -> Result<Self, FitError> {
        let parsed = Self {
            n_estimators: decode::count(params, "n_estimators")?,
            learning_rate: decode::unit_interval(params, "learning_rate", f64::MIN_POSITIVE, 1.0)?,
            max_depth: decode::count(params, "max_depth")?,
            min_samples_leaf: decode::count_or(params, "min_samples_leaf", 1)?,
        };
        for (name, value) in [
            ("n_estimators", parsed.n_estimators),
            ("max_depth", parsed.max_depth),
            ("min_samples_leaf", parsed.min_samples_leaf),
        ] {
            if value == 0 {
                return Err(FitError::InvalidHyperparameter {
                    name: name.to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
        }
        Ok(parsed)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Squared-loss regression tree stored as a flat node arena; node 0 is the root.
#[derive(Debug, Clone, PartialEq)]
struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn fit(x: &[Vec<f64>], y: &[f64], max_depth: usize, min_samples_leaf: usize) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build(x, y, (0..y.len()).collect(), 0, max_depth, min_samples_leaf.max(1));
        tree
    }

    fn build(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        indices: Vec<usize>,
        depth: usize,
        max_depth: usize,
        min_leaf: usize,
    ) -> usize {
        let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64;
        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf(mean));

        if depth >= max_depth || indices.len() < 2 * min_leaf {
            return node_idx;
        }
        let Some((feature, threshold)) = best_split(x, y, &indices, min_leaf) else {
            return node_idx;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| x[i][feature] <= threshold);
        let left = self.build(x, y, left_idx, depth + 1, max_depth, min_leaf);
        let right = self.build(x, y, right_idx, depth + 1, max_depth, min_leaf);
        self.nodes[node_idx] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        node_idx
    }

    fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = if row[*feature] <= *threshold { *left } else { *right },
            }
        }
    }
}

/// Greedy variance-reduction split over every feature, using sorted prefix sums.
fn best_split(x: &[Vec<f64>], y: &[f64], indices: &[usize], min_leaf: usize) -> Option<(usize, f64)> {
    let n = indices.len();
    let total: f64 = indices.iter().map(|&i| y[i]).sum();
    let parent = total * total / n as f64;

    let mut best: Option<(usize, f64)> = None;
    let mut best_gain = 1e-12;
    let mut order = indices.to_vec();

    for feature in 0..x[indices[0]].len() {
        order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

        let mut left_sum = 0.0;
        for k in 1..n {
            left_sum += y[order[k - 1]];
            if k < min_leaf || n - k < min_leaf {
                continue;
            }
            let (lo, hi) = (x[order[k - 1]][feature], x[order[k]][feature]);
            if lo >= hi {
                continue;
            }
            let right_sum = total - left_sum;
            // SSE reduction up to the constant sum of squares
            let gain = left_sum * left_sum / k as f64 + right_sum * right_sum / (n - k) as f64 - parent;
            if gain > best_gain {
                best_gain = gain;
                best = Some((feature, lo + (hi - lo) / 2.0));
            }
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoostingFit {
    features: FeatureConfig,
    base: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    history: Vec<f64>,
    last_timestamp: Option<DateTime<Utc>>,
    step: Duration,
    exogenous: Vec<f64>,
}

pub fn fit(params: &BoostingParams, features: &FeatureConfig, series: &SeriesSlice<'_>) -> Result<BoostingFit, FitError> {
    let values = series.values;
    let n = values.len();
    let start = features.lookback();
    if n < start + MIN_TRAINING_ROWS {
        return Err(FitError::InsufficientData {
            family: FAMILY.to_string(),
            required: start + MIN_TRAINING_ROWS,
            available: n,
        });
    }

    let exogenous_at = |t: usize| -> Vec<f64> { series.features.iter().map(|f| f.values[t]).collect() };
    let rows: Vec<Vec<f64>> = (start..n)
        .map(|t| features.row(&values[..t], series.timestamps.get(t), &exogenous_at(t)))
        .collect();
    let targets = &values[start..];

    let base = targets.iter().sum::<f64>() / targets.len() as f64;
    let mut predictions = vec![base; targets.len()];
    let mut trees = Vec::with_capacity(params.n_estimators);

    for _ in 0..params.n_estimators {
        let residuals: Vec<f64> = targets.iter().zip(&predictions).map(|(t, p)| t - p).collect();
        let tree = RegressionTree::fit(&rows, &residuals, params.max_depth, params.min_samples_leaf);
        for (pred, row) in predictions.iter_mut().zip(&rows) {
            *pred += params.learning_rate * tree.predict(row);
        }
        trees.push(tree);
    }

    if predictions.iter().any(|p| !p.is_finite()) {
        return Err(FitError::NotConverged {
            family: FAMILY.to_string(),
            message: "boosting produced non-finite in-sample predictions".to_string(),
        });
    }
    tracing::trace!(trees = trees.len(), rows = rows.len(), "boosted trees fitted");

    Ok(BoostingFit {
        features: features.clone(),
        base,
        learning_rate: params.learning_rate,
        trees,
        history: values.to_vec(),
        last_timestamp: series.timestamps.last().copied(),
        step: series.step(),
        exogenous: exogenous_at(n - 1),
    })
}

impl BoostingFit {
    fn predict(&self, row: &[f64]) -> f64 {
        self.base + self.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    /// Recursive forecast: each prediction feeds the lag and rolling features of
    /// the next step. Exogenous columns hold their last observed value.
    pub fn forecast(&self, horizon: usize) -> Result<Vec<f64>, FitError> {
        let mut history = self.history.clone();
        for h in 1..=horizon {
            let timestamp = self
                .last_timestamp
                .map(|t| step_forward(t, self.step, h))
                .transpose()?;
            let row = self.features.row(&history, timestamp.as_ref(), &self.exogenous);
            history.push(self.predict(&row));
        }
        Ok(history.split_off(self.history.len()))
    }
}
