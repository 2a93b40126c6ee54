use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::{rngs::StdRng, seq::index};

use crate::error::{Result, RiskError};

/// growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// features tried per split
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        /// share of class 1 among the training rows that landed here
        probability: f64,
        n_samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// a fitted tree, stored as a flat node arena (root at 0)
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_features: usize,
    /// un-normalized weighted impurity decrease per feature
    impurity_decrease: Array1<f64>,
    depth: usize,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    child_impurity: f64, // weighted sum n_left*gini_left + n_right*gini_right
}

impl DecisionTree {
    /// grow a tree on `rows` (may repeat indices, e.g. a bootstrap sample)
    pub fn fit(
        features: ArrayView2<f64>,
        labels: &[bool],
        rows: &[usize],
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Result<Self> {
        if labels.len() != features.nrows() {
            return Err(RiskError::invalid_dimensions(format!(
                "labels len ({}) != feature rows ({})",
                labels.len(),
                features.nrows()
            )));
        }
        if rows.is_empty() {
            return Err(RiskError::invalid_dimensions("can't grow a tree on zero rows"));
        }
        if rows.iter().any(|&r| r >= labels.len()) {
            return Err(RiskError::invalid_dimensions("tree sample index out of bounds"));
        }
        if params.max_depth == 0 {
            return Err(RiskError::invalid_parameter("max_depth", "0"));
        }
        if params.min_samples_leaf == 0 {
            return Err(RiskError::invalid_parameter("min_samples_leaf", "0"));
        }

        let n_features = features.ncols();
        let mut tree = Self {
            nodes: Vec::new(),
            n_features,
            impurity_decrease: Array1::zeros(n_features),
            depth: 0,
        };

        let mut rows = rows.to_vec();
        let params = TreeParams {
            max_features: params.max_features.clamp(1, n_features.max(1)),
            min_samples_split: params.min_samples_split.max(2),
            ..params
        };
        tree.grow(features, labels, &mut rows, 0, params, rng);
        Ok(tree)
    }

    /// build the subtree for `rows`, returns its node id
    fn grow(
        &mut self,
        features: ArrayView2<f64>,
        labels: &[bool],
        rows: &mut [usize],
        depth: usize,
        params: TreeParams,
        rng: &mut StdRng,
    ) -> usize {
        self.depth = self.depth.max(depth);

        let n = rows.len();
        let positives = rows.iter().filter(|&&r| labels[r]).count();
        let impurity = gini(positives, n);

        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            probability: positives as f64 / n as f64,
            n_samples: n,
        });

        if depth >= params.max_depth
            || n < params.min_samples_split
            || n < 2 * params.min_samples_leaf
            || impurity <= 0.0
            || self.n_features == 0
        {
            return node_id;
        }

        let Some(best) = self.best_split(features, labels, rows, positives, params, rng) else {
            return node_id;
        };

        let decrease = n as f64 * impurity - best.child_impurity;
        if decrease <= 1e-12 {
            return node_id;
        }
        self.impurity_decrease[best.feature] += decrease;

        let split_at = partition(rows, |r| features[[r, best.feature]] <= best.threshold);
        let (left_rows, right_rows) = rows.split_at_mut(split_at);

        let left = self.grow(features, labels, left_rows, depth + 1, params, rng);
        let right = self.grow(features, labels, right_rows, depth + 1, params, rng);

        self.nodes[node_id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        node_id
    }

    /// best gini split among a random subset of features
    fn best_split(
        &self,
        features: ArrayView2<f64>,
        labels: &[bool],
        rows: &[usize],
        total_positives: usize,
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Option<BestSplit> {
        let n = rows.len();
        let candidates = index::sample(rng, self.n_features, params.max_features);

        let mut best: Option<BestSplit> = None;
        let mut sorted: Vec<(f64, bool)> = Vec::with_capacity(n);

        for feature in candidates.iter() {
            sorted.clear();
            sorted.extend(rows.iter().map(|&r| (features[[r, feature]], labels[r])));
            sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut left_positives = 0;
            for i in 0..n - 1 {
                if sorted[i].1 {
                    left_positives += 1;
                }
                let n_left = i + 1;
                let n_right = n - n_left;

                // only split between distinct values
                if sorted[i].0 >= sorted[i + 1].0 {
                    continue;
                }
                if n_left < params.min_samples_leaf || n_right < params.min_samples_leaf {
                    continue;
                }

                let right_positives = total_positives - left_positives;
                let child_impurity = n_left as f64 * gini(left_positives, n_left)
                    + n_right as f64 * gini(right_positives, n_right);

                if best.as_ref().is_none_or(|b| child_impurity < b.child_impurity) {
                    let mut threshold = 0.5 * (sorted[i].0 + sorted[i + 1].0);
                    // midpoint can round up onto the right value
                    if threshold >= sorted[i + 1].0 {
                        threshold = sorted[i].0;
                    }
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        child_impurity,
                    });
                }
            }
        }

        best
    }

    /// class-1 probability for one row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { probability, .. } => return *probability,
                Node::Split { feature, threshold, left, right } => {
                    node = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// class-1 probability per row
    pub fn predict_proba(&self, features: ArrayView2<f64>) -> Result<Array1<f64>> {
        if features.ncols() != self.n_features {
            return Err(RiskError::invalid_dimensions(format!(
                "feature count mismatch: expected {}, got {}",
                self.n_features,
                features.ncols()
            )));
        }
        Ok(features.rows().into_iter().map(|row| self.predict_row(row)).collect())
    }

    /// mean decrease in impurity, normalized to sum to 1 (all zeros for a stump)
    pub fn feature_importances(&self) -> Array1<f64> {
        let total = self.impurity_decrease.sum();
        if total > 0.0 {
            &self.impurity_decrease / total
        } else {
            Array1::zeros(self.n_features)
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }

    /// training rows under each leaf, summed
    pub fn n_leaf_samples(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| match n {
                Node::Leaf { n_samples, .. } => *n_samples,
                Node::Split { .. } => 0,
            })
            .sum()
    }
}

/// gini impurity of a two-class node
fn gini(positives: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

/// move rows matching `pred` to the front, returns how many matched
fn partition(rows: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut split = 0;
    for i in 0..rows.len() {
        if pred(rows[i]) {
            rows.swap(i, split);
            split += 1;
        }
    }
    split
}
