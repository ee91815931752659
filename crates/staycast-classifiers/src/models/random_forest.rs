//! Random forest: bootstrap-aggregated CART trees with per-split feature
//! subsampling. Tree `i` draws its bootstrap and split features from a
//! generator seeded with `seed + i`, so fits are reproducible regardless of
//! thread scheduling.
use ndarray::Array2;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StaycastError};
use crate::models::classifier_trait::{ClassifierModel, TreeEnsemble};
use crate::models::decision_tree::DecisionTree;
use crate::models::utils::{check_predict_input, check_training_input};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_trees: usize,
    pub mtry: Option<usize>,
    pub min_samples_split: usize,
    pub max_depth: Option<usize>,
    pub seed: u64,
    trees: Vec<DecisionTree>,
    n_features: Option<usize>,
}

impl RandomForest {
    pub fn new(n_trees: usize, mtry: Option<usize>, min_samples_split: usize, max_depth: Option<usize>, seed: u64) -> Self {
        Self {
            n_trees,
            mtry,
            min_samples_split,
            max_depth,
            seed,
            trees: Vec::new(),
            n_features: None,
        }
    }

    /// Features tried per split for `p` input columns.
    pub fn resolved_mtry(&self, p: usize) -> usize {
        self.mtry
            .unwrap_or_else(|| ((p as f64).sqrt().floor() as usize).max(1))
    }

    /// Impurity importances averaged over trees.
    pub fn feature_importances(&self) -> Vec<f64> {
        let p = self.n_features.unwrap_or(0);
        let mut out = vec![0.0; p];
        for t in &self.trees {
            for (o, v) in out.iter_mut().zip(t.feature_importances()) {
                *o += v;
            }
        }
        let n = self.trees.len().max(1) as f64;
        out.iter_mut().for_each(|v| *v /= n);
        out
    }
}

impl ClassifierModel for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &[bool]) -> Result<()> {
        check_training_input(x, y)?;
        let (n, p) = x.dim();
        if self.n_trees == 0 {
            return Err(StaycastError::fit("a forest needs at least one tree"));
        }
        let mtry = self.resolved_mtry(p);
        if mtry == 0 || mtry > p {
            return Err(StaycastError::fit(format!(
                "mtry must lie in 1..={}, got {}",
                p, mtry
            )));
        }
        log::debug!(
            "Growing {} trees (mtry {}, min split {}, seed {})",
            self.n_trees,
            mtry,
            self.min_samples_split,
            self.seed
        );

        let trees: Result<Vec<DecisionTree>> = (0..self.n_trees)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTree> {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(tree_idx as u64));
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut tree = DecisionTree::new()
                    .with_max_depth(self.max_depth)
                    .with_min_samples_split(self.min_samples_split)
                    .with_max_features(Some(mtry))
                    .with_seed(rng.gen());
                tree.fit_indices(x, y, &bootstrap)?;
                Ok(tree)
            })
            .collect();
        self.trees = trees?;
        self.n_features = Some(p);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        check_predict_input(x, self.n_features)?;
        let rows: Vec<Vec<f64>> = x.outer_iter().map(|r| r.to_vec()).collect();
        let n_trees = self.trees.len() as f64;
        Ok(rows
            .par_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees)
            .collect())
    }

    fn name(&self) -> &str {
        "random_forest"
    }
}

impl TreeEnsemble for RandomForest {
    fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    fn n_features(&self) -> usize {
        self.n_features.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn data() -> (Array2<f64>, Vec<bool>) {
        let n = 60;
        let mut v = Vec::with_capacity(n * 3);
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let a = i as f64 / n as f64;
            v.extend_from_slice(&[a, ((i * 7) % 11) as f64, ((i * 3) % 5) as f64]);
            y.push(a > 0.5);
        }
        (Array2::from_shape_vec((n, 3), v).unwrap(), y)
    }

    #[test]
    fn same_seed_same_forest() {
        let (x, y) = data();
        let mut a = RandomForest::new(15, None, 2, None, 9);
        let mut b = RandomForest::new(15, None, 2, None, 9);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn forest_learns_signal() {
        let (x, y) = data();
        let mut rf = RandomForest::new(25, Some(3), 2, None, 1);
        rf.fit(&x, &y).unwrap();
        let p = rf.predict_proba(&x).unwrap();
        assert!(p[59] > 0.8 && p[0] < 0.2, "p0 {} p59 {}", p[0], p[59]);
        let imp = rf.feature_importances();
        assert!(imp[0] > imp[1] && imp[0] > imp[2], "importances {:?}", imp);
    }

    #[test]
    fn oversized_mtry_is_fit_failure() {
        let (x, y) = data();
        let mut rf = RandomForest::new(5, Some(4), 2, None, 1);
        assert!(rf.fit(&x, &y).unwrap_err().is_fit_failure());
    }
}
