//! Exact interventional Shapley values for tree models.
//!
//! The value function of a coalition S is the expected model output when the
//! features in S take the explained row's values and the rest take a
//! reference row's values, averaged over a reference set. For a single leaf
//! and a single reference row this game has a closed form: only path
//! features on which the two rows disagree matter. With `a` features that
//! only the explained row satisfies and `b` that only the reference row
//! satisfies, each of the `a` gains `v * (a-1)! b! / (a+b)!` and each of the
//! `b` loses `v * a! (b-1)! / (a+b)!`. Summing over leaves, trees, and
//! reference rows gives contributions that add up exactly to the prediction
//! minus the mean reference prediction.
use ndarray::{Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::function::factorial::factorial;

use crate::error::{Result, StaycastError};
use crate::models::classifier_trait::TreeEnsemble;
use crate::models::decision_tree::{DecisionTree, TreeNode};

/// Interval (lo, hi] a feature must fall in to follow one root-to-leaf path.
#[derive(Debug, Clone, Copy)]
struct PathBound {
    feature: usize,
    lo: f64,
    hi: f64,
}

impl PathBound {
    #[inline]
    fn admits(&self, row: &ArrayView1<f64>) -> bool {
        let v = row[self.feature];
        v > self.lo && v <= self.hi
    }
}

#[derive(Debug, Clone)]
struct LeafPath {
    value: f64,
    bounds: Vec<PathBound>,
}

fn leaf_paths(tree: &DecisionTree) -> Vec<LeafPath> {
    fn walk(nodes: &[TreeNode], i: usize, bounds: &mut Vec<PathBound>, out: &mut Vec<LeafPath>) {
        match &nodes[i] {
            TreeNode::Leaf { value, .. } => out.push(LeafPath { value: *value, bounds: bounds.clone() }),
            TreeNode::Split { feature, threshold, left, right, .. } => {
                let pos = bounds.iter().position(|b| b.feature == *feature);
                let saved = pos.map(|p| bounds[p]);
                let slot = match pos {
                    Some(p) => p,
                    None => {
                        bounds.push(PathBound { feature: *feature, lo: f64::NEG_INFINITY, hi: f64::INFINITY });
                        bounds.len() - 1
                    }
                };

                bounds[slot].hi = bounds[slot].hi.min(*threshold);
                walk(nodes, *left, bounds, out);
                bounds[slot].hi = saved.map_or(f64::INFINITY, |s| s.hi);

                bounds[slot].lo = bounds[slot].lo.max(*threshold);
                walk(nodes, *right, bounds, out);

                match saved {
                    Some(s) => bounds[slot] = s,
                    None => {
                        bounds.pop();
                    }
                }
            }
        }
    }
    let mut out = Vec::new();
    if !tree.nodes().is_empty() {
        walk(tree.nodes(), 0, &mut Vec::new(), &mut out);
    }
    out
}

/// Shapley weights w(a, b) = (a-1)! b! / (a+b)!, indexed as [a][b] for a >= 1.
struct ShapleyWeights {
    table: Vec<Vec<f64>>,
}

impl ShapleyWeights {
    fn new(max_len: usize) -> Self {
        let mut table = vec![vec![0.0; max_len + 1]; max_len + 1];
        for a in 1..=max_len {
            for b in 0..=max_len - a {
                table[a][b] = factorial((a - 1) as u64) * factorial(b as u64) / factorial((a + b) as u64);
            }
        }
        Self { table }
    }

    #[inline]
    fn get(&self, a: usize, b: usize) -> f64 {
        self.table[a][b]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapleyExplanation {
    /// Row index within the explained matrix.
    pub row: usize,
    pub prediction: f64,
    pub baseline: f64,
    pub contributions: Vec<f64>,
}

impl ShapleyExplanation {
    /// Baseline plus every contribution; equals `prediction` up to rounding.
    pub fn reconstructed(&self) -> f64 {
        self.baseline + self.contributions.iter().sum::<f64>()
    }

    /// Sum contributions of columns that share a source feature.
    pub fn aggregate(&self, sources: &[String]) -> Vec<(String, f64)> {
        let mut out: Vec<(String, f64)> = Vec::new();
        for (s, c) in sources.iter().zip(&self.contributions) {
            match out.iter_mut().find(|(name, _)| name == s) {
                Some((_, total)) => *total += c,
                None => out.push((s.clone(), *c)),
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapleyResult {
    pub feature_names: Vec<String>,
    pub baseline: f64,
    pub n_reference: usize,
    pub explanations: Vec<ShapleyExplanation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapSummaryEntry {
    pub feature: String,
    pub mean_abs: f64,
}

impl ShapleyResult {
    /// Features ranked by mean absolute contribution.
    pub fn summary(&self) -> Vec<ShapSummaryEntry> {
        let n = self.explanations.len().max(1) as f64;
        let mut out: Vec<ShapSummaryEntry> = self
            .feature_names
            .iter()
            .enumerate()
            .map(|(j, f)| ShapSummaryEntry {
                feature: f.clone(),
                mean_abs: self.explanations.iter().map(|e| e.contributions[j].abs()).sum::<f64>() / n,
            })
            .collect();
        out.sort_by(|a, b| b.mean_abs.total_cmp(&a.mean_abs));
        out
    }
}

/// Draw at most `max_rows` reference rows without replacement.
pub fn subsample_reference(reference: &Array2<f64>, max_rows: usize, seed: u64) -> Array2<f64> {
    let n = reference.nrows();
    if max_rows == 0 || n <= max_rows {
        return reference.clone();
    }
    log::info!("Subsampling {} of {} reference rows (seed {})", max_rows, n, seed);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut idx = sample(&mut rng, n, max_rows).into_vec();
    idx.sort_unstable();
    reference.select(ndarray::Axis(0), &idx)
}

fn ensemble_predict(trees: &[DecisionTree], row: &ArrayView1<f64>) -> f64 {
    let values: Vec<f64> = row.to_vec();
    trees.iter().map(|t| t.predict_row(&values)).sum::<f64>() / trees.len() as f64
}

fn explain_row(
    paths: &[Vec<LeafPath>],
    weights: &ShapleyWeights,
    x: &ArrayView1<f64>,
    reference: &Array2<f64>,
    n_features: usize,
) -> Vec<f64> {
    let mut phi = vec![0.0; n_features];
    let mut only_x: Vec<usize> = Vec::new();
    let mut only_r: Vec<usize> = Vec::new();
    for tree_paths in paths {
        for leaf in tree_paths {
            let x_reaches: Vec<bool> = leaf.bounds.iter().map(|b| b.admits(x)).collect();
            for r in reference.outer_iter() {
                only_x.clear();
                only_r.clear();
                let mut blocked = false;
                for (b, &xo) in leaf.bounds.iter().zip(&x_reaches) {
                    match (xo, b.admits(&r)) {
                        (true, false) => only_x.push(b.feature),
                        (false, true) => only_r.push(b.feature),
                        (false, false) => {
                            blocked = true;
                            break;
                        }
                        (true, true) => {}
                    }
                }
                if blocked || (only_x.is_empty() && only_r.is_empty()) {
                    continue;
                }
                let (a, b) = (only_x.len(), only_r.len());
                if a > 0 {
                    let gain = leaf.value * weights.get(a, b);
                    for &j in &only_x {
                        phi[j] += gain;
                    }
                }
                if b > 0 {
                    let loss = leaf.value * weights.get(b, a);
                    for &j in &only_r {
                        phi[j] -= loss;
                    }
                }
            }
        }
    }
    let scale = (paths.len() * reference.nrows()) as f64;
    phi.iter_mut().for_each(|v| *v /= scale);
    phi
}

/// Shapley contributions for every row of `x` against `reference`.
pub fn tree_shap(
    model: &dyn TreeEnsemble,
    x: &Array2<f64>,
    reference: &Array2<f64>,
    feature_names: &[String],
) -> Result<ShapleyResult> {
    let trees = model.trees();
    if trees.is_empty() {
        return Err(StaycastError::fit("tree model has not been fitted"));
    }
    let p = model.n_features();
    if x.ncols() != p || reference.ncols() != p || feature_names.len() != p {
        return Err(StaycastError::schema(format!(
            "model expects {} columns; got x {}, reference {}, names {}",
            p,
            x.ncols(),
            reference.ncols(),
            feature_names.len()
        )));
    }
    if reference.nrows() == 0 {
        return Err(StaycastError::InvalidConfig("reference set is empty".to_string()));
    }

    let paths: Vec<Vec<LeafPath>> = trees.iter().map(leaf_paths).collect();
    let max_len = paths
        .iter()
        .flat_map(|t| t.iter().map(|l| l.bounds.len()))
        .max()
        .unwrap_or(0);
    let weights = ShapleyWeights::new(max_len.max(1));
    let baseline = reference
        .outer_iter()
        .map(|r| ensemble_predict(trees, &r))
        .sum::<f64>()
        / reference.nrows() as f64;

    log::debug!(
        "Explaining {} rows with {} trees against {} reference rows",
        x.nrows(),
        trees.len(),
        reference.nrows()
    );
    let rows: Vec<usize> = (0..x.nrows()).collect();
    let explanations = rows
        .par_iter()
        .map(|&i| {
            let row = x.row(i);
            ShapleyExplanation {
                row: i,
                prediction: ensemble_predict(trees, &row),
                baseline,
                contributions: explain_row(&paths, &weights, &row, reference, p),
            }
        })
        .collect();

    Ok(ShapleyResult {
        feature_names: feature_names.to_vec(),
        baseline,
        n_reference: reference.nrows(),
        explanations,
    })
}
