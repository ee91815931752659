//! CART classification tree with Gini impurity.
//!
//! Nodes live in a flat arena; a split sends rows with `x[feature] <=
//! threshold` to `left`. Leaves store the fraction of positive training rows
//! that reached them, which is the tree's probability output.
use ndarray::Array2;
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StaycastError};
use crate::models::classifier_trait::{ClassifierModel, TreeEnsemble};
use crate::models::utils::{check_predict_input, check_training_input};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        n_samples: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered at each split; `None` considers all of them.
    pub max_features: Option<usize>,
    pub seed: u64,
    nodes: Vec<TreeNode>,
    n_features: Option<usize>,
    importances: Vec<f64>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
    n_left: usize,
}

fn gini(pos: f64, n: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    let p = pos / n;
    2.0 * p * (1.0 - p)
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
            nodes: Vec::new(),
            n_features: None,
            importances: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = n;
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    pub fn with_max_features(mut self, n: Option<usize>) -> Self {
        self.max_features = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Mean decrease in Gini impurity per feature, normalized to sum to 1.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], i: usize) -> usize {
            match &nodes[i] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Leaf value reached by one row.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut i = 0;
        loop {
            match &self.nodes[i] {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature, threshold, left, right, .. } => {
                    i = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Fit on the rows named by `indices`; repeats are allowed (bootstrap).
    pub(crate) fn fit_indices(&mut self, x: &Array2<f64>, y: &[bool], indices: &[usize]) -> Result<()> {
        let p = x.ncols();
        if let Some(m) = self.max_features {
            if m == 0 || m > p {
                return Err(StaycastError::fit(format!(
                    "features per split must lie in 1..={}, got {}",
                    p, m
                )));
            }
        }
        if self.min_samples_leaf == 0 {
            return Err(StaycastError::fit("min_samples_leaf must be positive"));
        }
        if indices.is_empty() {
            return Err(StaycastError::fit("cannot grow a tree from zero rows"));
        }
        self.nodes.clear();
        self.importances = vec![0.0; p];
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut rows = indices.to_vec();
        self.grow(x, y, &mut rows, 0, indices.len() as f64, &mut rng);

        let total: f64 = self.importances.iter().sum();
        if total > 0.0 {
            self.importances.iter_mut().for_each(|v| *v /= total);
        }
        self.n_features = Some(p);
        Ok(())
    }

    fn grow(
        &mut self,
        x: &Array2<f64>,
        y: &[bool],
        rows: &mut [usize],
        depth: usize,
        n_total: f64,
        rng: &mut ChaCha8Rng,
    ) -> usize {
        let n = rows.len();
        let pos = rows.iter().filter(|&&r| y[r]).count();
        let node_id = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { value: pos as f64 / n as f64, n_samples: n });

        let depth_ok = self.max_depth.map_or(true, |d| depth < d);
        let pure = pos == 0 || pos == n;
        if !depth_ok || pure || n < self.min_samples_split.max(2) || n < 2 * self.min_samples_leaf {
            return node_id;
        }

        let parent_impurity = gini(pos as f64, n as f64);
        let Some(best) = self.best_split(x, y, rows, parent_impurity, rng) else {
            return node_id;
        };

        rows.sort_by(|&a, &b| x[[a, best.feature]].total_cmp(&x[[b, best.feature]]));
        let weighted_drop = (n as f64 / n_total) * (parent_impurity - best.impurity);
        self.importances[best.feature] += weighted_drop;

        let (left_rows, right_rows) = rows.split_at_mut(best.n_left);
        let left = self.grow(x, y, left_rows, depth + 1, n_total, rng);
        let right = self.grow(x, y, right_rows, depth + 1, n_total, rng);
        self.nodes[node_id] = TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
            n_samples: n,
        };
        node_id
    }

    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &[bool],
        rows: &[usize],
        parent_impurity: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let p = x.ncols();
        let features: Vec<usize> = match self.max_features {
            Some(m) if m < p => {
                let mut f = sample(rng, p, m).into_vec();
                f.sort_unstable();
                f
            }
            _ => (0..p).collect(),
        };

        let n = rows.len();
        let total_pos = rows.iter().filter(|&&r| y[r]).count() as f64;
        let mut best: Option<SplitCandidate> = None;
        let mut order = rows.to_vec();

        for &f in &features {
            order.sort_by(|&a, &b| x[[a, f]].total_cmp(&x[[b, f]]));
            let mut left_pos = 0.0;
            for i in 0..n - 1 {
                if y[order[i]] {
                    left_pos += 1.0;
                }
                let n_left = i + 1;
                let (v, next) = (x[[order[i], f]], x[[order[i + 1], f]]);
                if v == next || n_left < self.min_samples_leaf || n - n_left < self.min_samples_leaf {
                    continue;
                }
                let (nl, nr) = (n_left as f64, (n - n_left) as f64);
                let impurity = (nl * gini(left_pos, nl) + nr * gini(total_pos - left_pos, nr)) / n as f64;
                if impurity + 1e-12 < parent_impurity
                    && best.as_ref().map_or(true, |b| impurity < b.impurity)
                {
                    let mid = v + (next - v) / 2.0;
                    best = Some(SplitCandidate {
                        feature: f,
                        threshold: if mid < next { mid } else { v },
                        impurity,
                        n_left,
                    });
                }
            }
        }
        best
    }
}

impl ClassifierModel for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &[bool]) -> Result<()> {
        check_training_input(x, y)?;
        let all: Vec<usize> = (0..x.nrows()).collect();
        self.fit_indices(x, y, &all)?;
        log::trace!("decision tree fit: {} nodes, depth {}", self.nodes.len(), self.depth());
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        check_predict_input(x, self.n_features)?;
        Ok(x.outer_iter()
            .map(|row| match row.as_slice() {
                Some(s) => self.predict_row(s),
                None => self.predict_row(&row.to_vec()),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "decision_tree"
    }
}

impl TreeEnsemble for DecisionTree {
    fn trees(&self) -> &[DecisionTree] {
        std::slice::from_ref(self)
    }

    fn n_features(&self) -> usize {
        self.n_features.unwrap_or(0)
    }
}
