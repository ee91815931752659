//! Logistic regression with an optional elastic-net penalty.
//!
//! Both the plain and the lasso family use this estimator; plain logistic is
//! the `penalty = 0` case. Fitting minimizes the mean log-loss plus
//! `penalty * (mixture * |w|_1 + (1 - mixture) / 2 * |w|_2^2)` by accelerated
//! proximal gradient descent. The intercept is never penalized.
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StaycastError};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::utils::{check_predict_input, check_training_input, sigmoid};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub penalty: f64,
    pub mixture: f64,
    pub max_iter: usize,
    pub tolerance: f64,
    weights: Option<Vec<f64>>,
    intercept: f64,
    n_iter: usize,
}

impl LogisticRegression {
    pub fn new(max_iter: usize, tolerance: f64) -> Self {
        Self {
            penalty: 0.0,
            mixture: 1.0,
            max_iter,
            tolerance,
            weights: None,
            intercept: 0.0,
            n_iter: 0,
        }
    }

    pub fn lasso(penalty: f64, mixture: f64, max_iter: usize) -> Self {
        Self {
            penalty,
            mixture,
            ..Self::new(max_iter, 1e-6)
        }
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Iterations used by the last fit.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    fn validate(&self) -> Result<()> {
        if !(self.penalty >= 0.0 && self.penalty.is_finite()) {
            return Err(StaycastError::fit(format!("penalty must be >= 0, got {}", self.penalty)));
        }
        if !(0.0..=1.0).contains(&self.mixture) {
            return Err(StaycastError::fit(format!("mixture must lie in [0, 1], got {}", self.mixture)));
        }
        if self.max_iter == 0 {
            return Err(StaycastError::fit("max_iter must be positive"));
        }
        Ok(())
    }
}

fn soft_threshold(v: f64, t: f64) -> f64 {
    if v > t {
        v - t
    } else if v < -t {
        v + t
    } else {
        0.0
    }
}

impl ClassifierModel for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &[bool]) -> Result<()> {
        self.validate()?;
        check_training_input(x, y)?;
        let (n, p) = x.dim();
        let nf = n as f64;
        let target: Array1<f64> = y.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();

        let l1 = self.penalty * self.mixture;
        let l2 = self.penalty * (1.0 - self.mixture);
        // Frobenius norm bounds the largest eigenvalue of X'X, so this step
        // size is below 1/L for the smooth part of the objective.
        let frob = x.iter().map(|v| v * v).sum::<f64>() + nf;
        let lipschitz = 0.25 * frob / nf + l2;
        let step = 1.0 / lipschitz.max(1e-12);

        let mut w = Array1::<f64>::zeros(p);
        let mut b = 0.0;
        let (mut w_prev, mut b_prev) = (w.clone(), b);
        let mut momentum = 1.0f64;
        let mut iter = 0;

        while iter < self.max_iter {
            iter += 1;
            let next_momentum = (1.0 + (1.0 + 4.0 * momentum * momentum).sqrt()) / 2.0;
            let beta = (momentum - 1.0) / next_momentum;
            let v = &w + &((&w - &w_prev) * beta);
            let vb = b + beta * (b - b_prev);

            let margin = x.dot(&v) + vb;
            let resid = margin.mapv(sigmoid) - &target;
            let grad_w = x.t().dot(&resid) / nf + &v * l2;
            let grad_b = resid.sum() / nf;

            w_prev = w;
            b_prev = b;
            w = (&v - &(grad_w * step)).mapv(|c| soft_threshold(c, step * l1));
            b = vb - step * grad_b;
            momentum = next_momentum;

            let delta = (&w - &w_prev)
                .iter()
                .fold((b - b_prev).abs(), |m, d| m.max(d.abs()));
            if delta < self.tolerance {
                break;
            }
        }

        if !b.is_finite() || w.iter().any(|c| !c.is_finite()) {
            return Err(StaycastError::fit("logistic coefficients diverged"));
        }
        log::trace!(
            "logistic fit: {} rows, {} columns, {} iterations, {} non-zero coefficients",
            n,
            p,
            iter,
            w.iter().filter(|c| **c != 0.0).count()
        );
        self.weights = Some(w.to_vec());
        self.intercept = b;
        self.n_iter = iter;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        check_predict_input(x, self.weights.as_ref().map(|w| w.len()))?;
        let w = Array1::from(self.weights.clone().unwrap_or_default());
        Ok(x.dot(&w)
            .iter()
            .map(|m| sigmoid(m + self.intercept))
            .collect())
    }

    fn name(&self) -> &str {
        if self.penalty > 0.0 {
            "lasso"
        } else {
            "logistic"
        }
    }
}
