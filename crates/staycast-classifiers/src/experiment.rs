//! End-to-end workflow stages and the artifacts passed between them.
//!
//! `prepare` splits a cleaned dataset and fixes the fold partition,
//! `tune_family` searches and refits one model family, `explain` attributes
//! a refit model's predictions. Each stage's output serializes to JSON so the
//! stages can run as separate processes.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{ModelConfig, ModelFamily, ParamValue};
use crate::cross_validation::{make_folds, CvConfig, FoldSets};
use crate::data_handling::Dataset;
use crate::error::{Result, StaycastError};
use crate::explain::{explain_final_model, ExplainConfig, ImportanceResult, ShapleyResult};
use crate::io::CleaningConfig;
use crate::metrics::Metric;
use crate::preprocessing::{FittedRecipe, Recipe};
use crate::report::TestScores;
use crate::search::{refit, search, select_best, CandidateScore, ConfigSpace, FinalModel, ParamRange, ParamScale, SearchResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { test_fraction: 0.25, seed: 2024 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub cleaning: CleaningConfig,
    pub split: SplitConfig,
    pub recipe: Recipe,
    pub cv: CvConfig,
    pub metric: Metric,
    /// One search space per family to tune.
    pub searches: Vec<ConfigSpace>,
    pub explain: ExplainConfig,
    /// Replaces the random forest chosen by the search when set.
    pub forest_override: Option<ModelConfig>,
    pub model_seed: u64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            cleaning: CleaningConfig::default(),
            split: SplitConfig::default(),
            recipe: Recipe::default(),
            cv: CvConfig::default(),
            metric: Metric::RocAuc,
            searches: ModelFamily::ALL.iter().map(|&f| default_search_space(f)).collect(),
            explain: ExplainConfig::default(),
            forest_override: None,
            model_seed: 42,
        }
    }
}

impl ExperimentConfig {
    /// Search space configured for `family`, falling back to its default.
    pub fn search_space(&self, family: ModelFamily) -> ConfigSpace {
        self.searches
            .iter()
            .find(|s| s.family() == family)
            .cloned()
            .unwrap_or_else(|| default_search_space(family))
    }

    pub fn families(&self) -> Vec<ModelFamily> {
        let mut out: Vec<ModelFamily> = Vec::new();
        for s in &self.searches {
            if !out.contains(&s.family()) {
                out.push(s.family());
            }
        }
        out
    }
}

fn grid(family: ModelFamily, params: Vec<(&str, Vec<ParamValue>)>) -> ConfigSpace {
    let params: BTreeMap<String, Vec<ParamValue>> =
        params.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    ConfigSpace::Grid { family, params }
}

fn int_range(low: f64, high: f64) -> ParamRange {
    ParamRange { low, high, scale: ParamScale::Integer }
}

pub fn default_search_space(family: ModelFamily) -> ConfigSpace {
    match family {
        ModelFamily::Logistic => ConfigSpace::Explicit {
            family,
            configs: vec![family.default_config()],
        },
        ModelFamily::Lasso => grid(
            family,
            vec![
                ("penalty", vec![1e-4.into(), 1e-3.into(), 1e-2.into(), 1e-1.into()]),
                ("mixture", vec![1.0.into()]),
            ],
        ),
        ModelFamily::DecisionTree => {
            let mut params = BTreeMap::new();
            params.insert("max_depth".to_string(), int_range(2.0, 15.0));
            params.insert("min_samples_split".to_string(), int_range(2.0, 40.0));
            params.insert("min_samples_leaf".to_string(), int_range(1.0, 20.0));
            ConfigSpace::LatinHypercube { family, params, size: 10, seed: 2024 }
        }
        ModelFamily::Knn => grid(
            family,
            vec![
                ("neighbors", vec![5.0.into(), 15.0.into(), 25.0.into(), 35.0.into()]),
                ("weighting", vec!["uniform".into(), "inverse_distance".into()]),
            ],
        ),
        ModelFamily::RandomForest => {
            let mut params = BTreeMap::new();
            params.insert("trees".to_string(), int_range(100.0, 100.0));
            params.insert("mtry".to_string(), int_range(2.0, 12.0));
            params.insert("min_samples_split".to_string(), int_range(2.0, 40.0));
            ConfigSpace::LatinHypercube { family, params, size: 6, seed: 2024 }
        }
    }
}

/// Output of `prepare`: the split, the fold partition, and the recipe
/// fitted on the full training split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedBundle {
    pub config: ExperimentConfig,
    pub train: Dataset,
    pub test: Dataset,
    pub folds: FoldSets,
    pub recipe: Recipe,
    pub fitted_recipe: FittedRecipe,
}

/// Output of `tune_family` for one model family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub family: ModelFamily,
    pub metric: Metric,
    pub search: SearchResult,
    /// Winner of the search, before any override.
    pub selected: CandidateScore,
    pub final_model: FinalModel,
    pub overridden_from: Option<ModelConfig>,
    pub train_predictions: Vec<f64>,
    pub test_predictions: Vec<f64>,
    pub test_scores: TestScores,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationBundle {
    pub family: ModelFamily,
    pub config: ModelConfig,
    pub importance: ImportanceResult,
    pub shapley: Option<ShapleyResult>,
}

/// Split `data`, generate training folds, and fit the recipe once on the
/// full training split to validate it.
pub fn prepare(data: &Dataset, config: &ExperimentConfig) -> Result<PreparedBundle> {
    log::info!(
        "Preparing {} rows ({} features, {:.1}% canceled)",
        data.n_rows(),
        data.n_features(),
        100.0 * data.positive_fraction()
    );
    let (train, test) = data.stratified_split(config.split.test_fraction, config.split.seed)?;
    let folds = make_folds(&train, &config.cv)?;
    let fitted_recipe = config.recipe.fit(&train)?;
    log::info!(
        "Recipe produces {} model columns from {} predictors",
        fitted_recipe.n_columns(),
        fitted_recipe.source_features().iter().collect::<std::collections::BTreeSet<_>>().len()
    );
    Ok(PreparedBundle {
        config: config.clone(),
        train,
        test,
        folds,
        recipe: config.recipe.clone(),
        fitted_recipe,
    })
}

/// Search `family`'s configured space, refit the winner on the training
/// split, and score it on the test split.
pub fn tune_family(prepared: &PreparedBundle, family: ModelFamily) -> Result<ModelBundle> {
    let cfg = &prepared.config;
    let space = cfg.search_space(family);
    let result = search(&prepared.recipe, &prepared.train, &prepared.folds, &space, cfg.metric, cfg.model_seed)?;
    let selected = select_best(&result.ranked)?.clone();

    let override_config = match family {
        ModelFamily::RandomForest => cfg.forest_override.as_ref(),
        _ => None,
    };
    let final_model = refit(&prepared.recipe, &prepared.train, &selected.config, override_config, cfg.model_seed)?;

    let train_predictions = final_model.predict_proba(&prepared.train)?;
    let test_predictions = final_model.predict_proba(&prepared.test)?;
    let test_scores = TestScores::compute(&test_predictions, prepared.test.labels());
    log::info!(
        "{} test AUC {:.4}, accuracy {:.4}",
        final_model.config,
        test_scores.roc_auc,
        test_scores.accuracy
    );

    Ok(ModelBundle {
        family,
        metric: cfg.metric,
        search: result,
        selected,
        overridden_from: final_model.overridden_from.clone(),
        final_model,
        train_predictions,
        test_predictions,
        test_scores,
    })
}

/// Tune every family listed in the configuration, in order.
pub fn tune_all(prepared: &PreparedBundle) -> Result<Vec<ModelBundle>> {
    let families = prepared.config.families();
    if families.is_empty() {
        return Err(StaycastError::InvalidConfig("no model families configured".to_string()));
    }
    families.into_iter().map(|f| tune_family(prepared, f)).collect()
}

/// The bundle a full run explains, chosen without looking at the test split.
///
/// The random forest is preferred when it was tuned, then the tree model
/// with the best cross-validated mean, then any model by cross-validated
/// mean. Only tree models carry Shapley values.
pub fn explanation_target(bundles: &[ModelBundle]) -> Option<&ModelBundle> {
    let by_cv = |a: &&ModelBundle, b: &&ModelBundle| a.selected.mean.total_cmp(&b.selected.mean);
    bundles
        .iter()
        .find(|b| b.family == ModelFamily::RandomForest)
        .or_else(|| bundles.iter().filter(|b| b.family.is_tree()).max_by(by_cv))
        .or_else(|| bundles.iter().max_by(by_cv))
}

/// Permutation importance on the test split and, for tree models, Shapley
/// values against the training split.
pub fn explain(prepared: &PreparedBundle, model: &ModelBundle) -> Result<ExplanationBundle> {
    let explanation = explain_final_model(
        &model.final_model,
        &prepared.train,
        &prepared.test,
        &prepared.config.explain,
    )?;
    Ok(ExplanationBundle {
        family: model.family,
        config: model.final_model.config.clone(),
        importance: explanation.importance,
        shapley: explanation.shapley,
    })
}
