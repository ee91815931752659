use ndarray::Array2;

use crate::error::{Result, StaycastError};

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Reject inputs no model can be fit on.
pub fn check_training_input(x: &Array2<f64>, y: &[bool]) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(StaycastError::fit(format!(
            "feature matrix has {} rows but {} labels were given",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(StaycastError::fit(format!(
            "cannot fit on an empty {}x{} matrix",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(StaycastError::fit("feature matrix contains non-finite values"));
    }
    Ok(())
}

/// Reject prediction inputs whose width differs from the training width.
pub fn check_predict_input(x: &Array2<f64>, n_features: Option<usize>) -> Result<()> {
    match n_features {
        None => Err(StaycastError::fit("model has not been fitted")),
        Some(p) if p != x.ncols() => Err(StaycastError::schema(format!(
            "model was fitted on {} columns but received {}",
            p,
            x.ncols()
        ))),
        Some(_) => Ok(()),
    }
}
