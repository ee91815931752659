//! Permutation importance: how much the metric drops when a feature's values
//! are shuffled across rows, breaking its link with the label.
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::error::{Result, StaycastError};
use crate::metrics::Metric;
use crate::models::classifier_trait::ClassifierModel;

/// A named set of matrix columns permuted together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureGroup {
    pub name: String,
    pub columns: Vec<usize>,
}

impl FeatureGroup {
    /// One group per column.
    pub fn per_column(names: &[String]) -> Vec<FeatureGroup> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| FeatureGroup { name: n.clone(), columns: vec![i] })
            .collect()
    }

    /// Group columns by the predictor they were derived from, in first-seen
    /// order, so a one-hot block is permuted as a unit.
    pub fn by_source(sources: &[String]) -> Vec<FeatureGroup> {
        let mut groups: Vec<FeatureGroup> = Vec::new();
        for (i, s) in sources.iter().enumerate() {
            match groups.iter_mut().find(|g| &g.name == s) {
                Some(g) => g.columns.push(i),
                None => groups.push(FeatureGroup { name: s.clone(), columns: vec![i] }),
            }
        }
        groups
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    /// Mean drop in the metric over repeats.
    pub importance_mean: f64,
    pub importance_std: f64,
    pub importances_raw: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceResult {
    pub metric: Metric,
    pub baseline_score: f64,
    pub n_repeats: usize,
    pub seed: u64,
    /// Sorted by decreasing mean importance.
    pub features: Vec<FeatureImportance>,
}

/// Permutation importance of each group of columns.
///
/// Repeat `r` of group `g` shuffles rows with a generator seeded from
/// `seed + g * n_repeats + r`, so results do not depend on scheduling.
pub fn permutation_importance<M>(
    model: &M,
    x: &Array2<f64>,
    y: &[bool],
    groups: &[FeatureGroup],
    metric: Metric,
    n_repeats: usize,
    seed: u64,
) -> Result<ImportanceResult>
where
    M: ClassifierModel + Sync + ?Sized,
{
    if n_repeats == 0 {
        return Err(StaycastError::InvalidConfig("n_repeats must be positive".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(StaycastError::schema(format!(
            "{} rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if let Some(bad) = groups.iter().flat_map(|g| &g.columns).find(|&&c| c >= x.ncols()) {
        return Err(StaycastError::schema(format!(
            "column {} out of range for a matrix with {} columns",
            bad,
            x.ncols()
        )));
    }
    log::info!(
        "Permutation importance over {} features, {} repeats (seed {})",
        groups.len(),
        n_repeats,
        seed
    );

    let baseline_score = metric.score(&model.predict_proba(x)?, y);

    let mut features = groups
        .par_iter()
        .enumerate()
        .map(|(g, group)| -> Result<FeatureImportance> {
            let mut drops = Vec::with_capacity(n_repeats);
            for r in 0..n_repeats {
                let task_seed = seed.wrapping_add((g * n_repeats + r) as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(task_seed);
                let mut order: Vec<usize> = (0..x.nrows()).collect();
                order.shuffle(&mut rng);

                let mut shuffled = x.clone();
                for &c in &group.columns {
                    for (dst, &src) in order.iter().enumerate() {
                        shuffled[[dst, c]] = x[[src, c]];
                    }
                }
                let score = metric.score(&model.predict_proba(&shuffled)?, y);
                drops.push(baseline_score - score);
            }
            let importance_std = if drops.len() > 1 { drops.iter().std_dev() } else { 0.0 };
            Ok(FeatureImportance {
                feature: group.name.clone(),
                importance_mean: drops.iter().mean(),
                importance_std,
                importances_raw: drops,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    features.sort_by(|a, b| b.importance_mean.total_cmp(&a.importance_mean));
    Ok(ImportanceResult {
        metric,
        baseline_score,
        n_repeats,
        seed,
        features,
    })
}
