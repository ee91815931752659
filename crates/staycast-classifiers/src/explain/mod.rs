//! Explanations for a refit final model.
//!
//! Neither the model nor the datasets are modified; every random draw is
//! seeded from `ExplainConfig::seed`.
pub mod permutation;
pub mod shapley;

use serde::{Deserialize, Serialize};

use crate::data_handling::Dataset;
use crate::error::{Result, StaycastError};
use crate::metrics::Metric;
use crate::search::FinalModel;

pub use permutation::{permutation_importance, FeatureGroup, FeatureImportance, ImportanceResult};
pub use shapley::{subsample_reference, tree_shap, ShapSummaryEntry, ShapleyExplanation, ShapleyResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    pub metric: Metric,
    pub n_repeats: usize,
    /// Permute whole predictors (all of a one-hot block at once) rather than
    /// single columns.
    pub group_by_predictor: bool,
    /// Upper bound on reference rows used for the Shapley baseline; 0 keeps all.
    pub max_reference: usize,
    /// Number of leading rows of the target dataset to attribute.
    pub n_explain: usize,
    pub seed: u64,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            metric: Metric::RocAuc,
            n_repeats: 5,
            group_by_predictor: true,
            max_reference: 100,
            n_explain: 10,
            seed: 2024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub importance: ImportanceResult,
    /// Present for tree models only.
    pub shapley: Option<ShapleyResult>,
}

/// Permutation importance of `final_model` on `target`, plus Shapley values
/// for its first rows against `reference` when the model is tree based.
pub fn explain_final_model(
    final_model: &FinalModel,
    reference: &Dataset,
    target: &Dataset,
    cfg: &ExplainConfig,
) -> Result<Explanation> {
    let recipe = &final_model.recipe;
    let x_target = recipe.transform(target)?;
    let groups = if cfg.group_by_predictor {
        FeatureGroup::by_source(&recipe.source_features())
    } else {
        FeatureGroup::per_column(recipe.feature_names())
    };
    let importance = permutation_importance(
        &final_model.model,
        &x_target,
        target.labels(),
        &groups,
        cfg.metric,
        cfg.n_repeats,
        cfg.seed,
    )?;

    let shapley = match final_model.model.as_tree_ensemble() {
        Some(trees) => {
            let x_ref = subsample_reference(&recipe.transform(reference)?, cfg.max_reference, cfg.seed);
            let n = cfg.n_explain.min(x_target.nrows());
            let rows: Vec<usize> = (0..n).collect();
            let x_explain = x_target.select(ndarray::Axis(0), &rows);
            Some(tree_shap(trees, &x_explain, &x_ref, recipe.feature_names())?)
        }
        None => {
            log::info!(
                "Skipping Shapley values: {} is not a tree model",
                final_model.family()
            );
            None
        }
    };

    Ok(Explanation { importance, shapley })
}

/// Shapley values for a tree-based final model; errors for other families.
pub fn shapley_for(final_model: &FinalModel, reference: &Dataset, target: &Dataset, cfg: &ExplainConfig) -> Result<ShapleyResult> {
    let trees = final_model.model.as_tree_ensemble().ok_or_else(|| {
        StaycastError::InvalidConfig(format!(
            "Shapley values require a tree model, got {}",
            final_model.family()
        ))
    })?;
    let recipe = &final_model.recipe;
    let x_ref = subsample_reference(&recipe.transform(reference)?, cfg.max_reference, cfg.seed);
    tree_shap(trees, &recipe.transform(target)?, &x_ref, recipe.feature_names())
}
