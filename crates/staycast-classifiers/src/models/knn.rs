//! k-nearest-neighbors classifier over Euclidean distance.
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::Weighting;
use crate::error::{Result, StaycastError};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::utils::{check_predict_input, check_training_input};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNearestNeighbors {
    pub neighbors: usize,
    pub weighting: Weighting,
    train_x: Option<Array2<f64>>,
    train_y: Vec<bool>,
}

impl KNearestNeighbors {
    const MIN_DISTANCE: f64 = 1e-9;

    pub fn new(neighbors: usize, weighting: Weighting) -> Self {
        Self {
            neighbors,
            weighting,
            train_x: None,
            train_y: Vec::new(),
        }
    }

    fn vote(&self, train_x: &Array2<f64>, row: &[f64]) -> f64 {
        let mut dist: Vec<(f64, usize)> = train_x
            .outer_iter()
            .enumerate()
            .map(|(i, t)| {
                let d2: f64 = t.iter().zip(row).map(|(a, b)| (a - b) * (a - b)).sum();
                (d2.sqrt(), i)
            })
            .collect();
        let k = self.neighbors;
        let by_distance = |a: &(f64, usize), b: &(f64, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
        if k < dist.len() {
            dist.select_nth_unstable_by(k - 1, by_distance);
            dist.truncate(k);
        }

        let (mut num, mut den) = (0.0, 0.0);
        for (d, i) in dist {
            let w = match self.weighting {
                Weighting::Uniform => 1.0,
                Weighting::InverseDistance => 1.0 / d.max(Self::MIN_DISTANCE),
            };
            if self.train_y[i] {
                num += w;
            }
            den += w;
        }
        num / den
    }
}

impl ClassifierModel for KNearestNeighbors {
    fn fit(&mut self, x: &Array2<f64>, y: &[bool]) -> Result<()> {
        check_training_input(x, y)?;
        if self.neighbors == 0 || self.neighbors > x.nrows() {
            return Err(StaycastError::fit(format!(
                "neighbors must lie in 1..={} (training rows), got {}",
                x.nrows(),
                self.neighbors
            )));
        }
        self.train_x = Some(x.clone());
        self.train_y = y.to_vec();
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        check_predict_input(x, self.train_x.as_ref().map(|t| t.ncols()))?;
        let train_x = self
            .train_x
            .as_ref()
            .ok_or_else(|| StaycastError::fit("model has not been fitted"))?;
        let rows: Vec<Vec<f64>> = x.outer_iter().map(|r| r.to_vec()).collect();
        Ok(rows.par_iter().map(|row| self.vote(train_x, row)).collect())
    }

    fn name(&self) -> &str {
        "knn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn majority_of_nearest() {
        let x = array![[0.0], [0.1], [0.2], [5.0], [5.1]];
        let y = [true, true, false, false, false];
        let mut m = KNearestNeighbors::new(3, Weighting::Uniform);
        m.fit(&x, &y).unwrap();
        let p = m.predict_proba(&array![[0.05], [5.05]]).unwrap();
        assert!((p[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((p[1] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn inverse_distance_favors_close_neighbors() {
        let x = array![[0.0], [1.0]];
        let y = [true, false];
        let mut m = KNearestNeighbors::new(2, Weighting::InverseDistance);
        m.fit(&x, &y).unwrap();
        let p = m.predict_proba(&array![[0.1]]).unwrap();
        assert!(p[0] > 0.85, "p = {}", p[0]);
    }

    #[test]
    fn too_many_neighbors_is_fit_failure() {
        let x = array![[0.0], [1.0]];
        let mut m = KNearestNeighbors::new(10_000, Weighting::Uniform);
        let err = m.fit(&x, &[true, false]).unwrap_err();
        assert!(err.is_fit_failure());
    }
}
