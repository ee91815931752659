use ndarray::Array2;

use crate::error::Result;
use crate::models::decision_tree::DecisionTree;

/// Contract shared by every model family driven by the search harness.
///
/// Inputs are transformed feature matrices (rows are bookings) and boolean
/// labels where `true` means canceled.
pub trait ClassifierModel {
    /// Fit the model in place. Returns `FitFailure` when the configuration
    /// cannot be fit to this data.
    fn fit(&mut self, x: &Array2<f64>, y: &[bool]) -> Result<()>;

    /// Predicted probability of the positive class, one per row.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>>;

    /// Hard class predictions at a 0.5 threshold.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<bool>> {
        Ok(self.predict_proba(x)?.into_iter().map(|p| p >= 0.5).collect())
    }

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}

/// Models whose prediction is the mean leaf value over a set of trees.
pub trait TreeEnsemble: Sync {
    fn trees(&self) -> &[DecisionTree];

    fn n_features(&self) -> usize;
}
