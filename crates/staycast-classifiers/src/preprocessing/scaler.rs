//! Per-column centering and scaling.
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Standard scaler (per-column mean and sample standard deviation).
///
/// A column whose training standard deviation is below `MIN_STD` is treated
/// as constant: its `std` is stored as 0 and every transformed value is 0.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Scaler {
    /// Minimum stddev below which a column counts as constant.
    pub const MIN_STD: f64 = 1e-12;

    /// A scaler that leaves `n` columns untouched.
    pub fn identity(n: usize) -> Self {
        Self { mean: vec![0.0; n], std: vec![1.0; n] }
    }

    pub fn is_constant(&self, col: usize) -> bool {
        self.std[col] == 0.0
    }

    #[inline]
    pub fn scale(&self, col: usize, v: f64) -> f64 {
        let sd = self.std[col];
        if sd == 0.0 {
            0.0
        } else {
            (v - self.mean[col]) / sd
        }
    }
}

fn column_stats(col: ArrayView1<f64>) -> (f64, f64) {
    let n = col.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = col.sum() / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }
    let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let sd = var.sqrt();
    (mean, if sd < Scaler::MIN_STD { 0.0 } else { sd })
}

/// Fit a `Scaler` from rows-as-samples data, scaling every column.
pub fn fit_scaler(x: &Array2<f64>) -> Scaler {
    fit_scaler_masked(x, &vec![true; x.ncols()])
}

/// Fit a `Scaler` that only scales columns where `mask` is true; the rest
/// pass through unchanged.
pub fn fit_scaler_masked(x: &Array2<f64>, mask: &[bool]) -> Scaler {
    let mut sc = Scaler::identity(x.ncols());
    for (c, col) in x.axis_iter(Axis(1)).enumerate() {
        if mask[c] {
            let (mean, sd) = column_stats(col);
            sc.mean[c] = mean;
            sc.std[c] = sd;
        }
    }
    sc
}

/// Transform all rows using the provided `Scaler`.
pub fn transform_all(x: &Array2<f64>, sc: &Scaler) -> Array2<f64> {
    let mut out = x.clone();
    for ((_, c), v) in out.indexed_iter_mut() {
        *v = sc.scale(c, *v);
    }
    out
}

/// Fit a scaler and return the transformed matrix in one call.
pub fn fit_transform(x: &Array2<f64>) -> Array2<f64> {
    let sc = fit_scaler(x);
    transform_all(x, &sc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn centers_and_scales_with_sample_sd() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let sc = fit_scaler(&x);
        assert!((sc.mean[0] - 2.5).abs() < 1e-12);
        assert!((sc.std[0] - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
        let t = transform_all(&x, &sc);
        assert!(t.column(0).sum().abs() < 1e-12);
    }

    #[test]
    fn constant_column_maps_to_zero() {
        let x = array![[7.0, 1.0], [7.0, 2.0], [7.0, 3.0]];
        let sc = fit_scaler(&x);
        assert!(sc.is_constant(0));
        assert_eq!(sc.scale(0, 100.0), 0.0);
        let t = fit_transform(&x);
        assert!(t.column(0).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn masked_columns_pass_through() {
        let x = array![[1.0, 0.0], [3.0, 1.0]];
        let sc = fit_scaler_masked(&x, &[true, false]);
        let t = transform_all(&x, &sc);
        assert_eq!(t[[0, 1]], 0.0);
        assert_eq!(t[[1, 1]], 1.0);
    }
}
