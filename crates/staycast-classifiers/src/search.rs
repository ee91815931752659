//! Cross-validated hyperparameter search.
//!
//! Every candidate configuration is scored on the same fold partition. For
//! each (train, validation) pair the recipe is fit on the training rows only,
//! both sides are transformed, the model is fit, and the validation
//! probabilities are scored. Recipe fits depend only on the fold, so they are
//! computed once per fold and shared across candidates; the result is the
//! same as refitting them inside every unit.
//!
//! A candidate whose fit fails on any fold is excluded from the ranking and
//! reported in `SearchResult::failures`.
use std::cmp::Ordering;
use std::collections::BTreeMap;

use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{ModelConfig, ModelFamily, ParamValue};
use crate::cross_validation::FoldSets;
use crate::data_handling::Dataset;
use crate::error::{Result, StaycastError};
use crate::metrics::Metric;
use crate::models::classifier_trait::ClassifierModel;
use crate::models::factory::{build_model, Classifier};
use crate::preprocessing::{FittedRecipe, Recipe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamScale {
    Linear,
    Log10,
    Integer,
}

/// Continuous range sampled by the Latin hypercube.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub low: f64,
    pub high: f64,
    pub scale: ParamScale,
}

impl ParamRange {
    fn validate(&self, name: &str) -> Result<()> {
        let ok = self.low.is_finite()
            && self.high.is_finite()
            && self.low <= self.high
            && (self.scale != ParamScale::Log10 || self.low > 0.0);
        if ok {
            Ok(())
        } else {
            Err(StaycastError::InvalidConfig(format!(
                "invalid range for '{}': [{}, {}] on {:?} scale",
                name, self.low, self.high, self.scale
            )))
        }
    }

    /// Map `u` in [0, 1) onto the range.
    fn map(&self, u: f64) -> f64 {
        match self.scale {
            ParamScale::Linear => self.low + u * (self.high - self.low),
            ParamScale::Log10 => {
                let (lo, hi) = (self.low.log10(), self.high.log10());
                10f64.powf(lo + u * (hi - lo))
            }
            ParamScale::Integer => (self.low + u * (self.high - self.low + 1.0)).floor().min(self.high),
        }
    }
}

/// The candidate configurations for one model family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigSpace {
    /// Cartesian product of the listed values, in parameter-name order.
    Grid {
        family: ModelFamily,
        params: BTreeMap<String, Vec<ParamValue>>,
    },
    /// `size` space-filling samples: each parameter's range is cut into
    /// `size` strata and every stratum is used exactly once.
    LatinHypercube {
        family: ModelFamily,
        params: BTreeMap<String, ParamRange>,
        size: usize,
        seed: u64,
    },
    Explicit {
        family: ModelFamily,
        configs: Vec<ModelConfig>,
    },
}

impl ConfigSpace {
    pub fn family(&self) -> ModelFamily {
        match self {
            ConfigSpace::Grid { family, .. }
            | ConfigSpace::LatinHypercube { family, .. }
            | ConfigSpace::Explicit { family, .. } => *family,
        }
    }

    /// Enumerate the candidates in a stable order.
    pub fn candidates(&self) -> Result<Vec<ModelConfig>> {
        let configs = match self {
            ConfigSpace::Grid { family, params } => {
                let mut combos: Vec<BTreeMap<String, ParamValue>> = vec![BTreeMap::new()];
                for (name, values) in params {
                    if values.is_empty() {
                        return Err(StaycastError::InvalidConfig(format!("grid parameter '{}' has no values", name)));
                    }
                    combos = combos
                        .into_iter()
                        .flat_map(|c| {
                            values.iter().map(move |v| {
                                let mut c = c.clone();
                                c.insert(name.clone(), v.clone());
                                c
                            })
                        })
                        .collect();
                }
                combos
                    .iter()
                    .map(|c| ModelConfig::from_params(*family, c))
                    .collect::<Result<Vec<_>>>()?
            }
            ConfigSpace::LatinHypercube { family, params, size, seed } => {
                for (name, range) in params {
                    range.validate(name)?;
                }
                log::info!("Sampling {} Latin hypercube candidates for {} (seed {})", size, family, seed);
                latin_hypercube(params, *size, *seed)
                    .iter()
                    .map(|c| ModelConfig::from_params(*family, c))
                    .collect::<Result<Vec<_>>>()?
            }
            ConfigSpace::Explicit { family, configs } => {
                if let Some(bad) = configs.iter().find(|c| c.family() != *family) {
                    return Err(StaycastError::InvalidConfig(format!(
                        "configuration {} does not belong to family {}",
                        bad, family
                    )));
                }
                configs.clone()
            }
        };
        if configs.is_empty() {
            return Err(StaycastError::InvalidConfig(format!("empty search space for {}", self.family())));
        }
        Ok(configs)
    }
}

fn latin_hypercube(params: &BTreeMap<String, ParamRange>, size: usize, seed: u64) -> Vec<BTreeMap<String, ParamValue>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut samples = vec![BTreeMap::new(); size];
    for (name, range) in params {
        let mut strata: Vec<usize> = (0..size).collect();
        strata.shuffle(&mut rng);
        for (sample, stratum) in samples.iter_mut().zip(strata) {
            let u = (stratum as f64 + rng.gen::<f64>()) / size as f64;
            sample.insert(name.clone(), ParamValue::Number(range.map(u)));
        }
    }
    samples
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    /// Position of the configuration in the enumerated space.
    pub index: usize,
    pub config: ModelConfig,
    pub mean: f64,
    pub std_err: f64,
    pub fold_scores: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedCandidate {
    pub index: usize,
    pub config: ModelConfig,
    pub split_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub family: ModelFamily,
    pub metric: Metric,
    /// Successful candidates, best first.
    pub ranked: Vec<CandidateScore>,
    pub failures: Vec<FailedCandidate>,
}

impl SearchResult {
    pub fn top(&self, n: usize) -> &[CandidateScore] {
        &self.ranked[..n.min(self.ranked.len())]
    }

    pub fn n_candidates(&self) -> usize {
        self.ranked.len() + self.failures.len()
    }
}

/// Ordering used for ranking: higher mean first, then the simpler
/// configuration, then the earlier one.
fn rank_order(a: &CandidateScore, b: &CandidateScore) -> Ordering {
    b.mean
        .total_cmp(&a.mean)
        .then_with(|| a.config.cmp_complexity(&b.config))
        .then(a.index.cmp(&b.index))
}

/// Pick the configuration with the highest mean score, breaking ties by
/// lower complexity and then by lower enumeration index.
pub fn select_best(ranked: &[CandidateScore]) -> Result<&CandidateScore> {
    ranked
        .iter()
        .min_by(|a, b| rank_order(a, b))
        .ok_or(StaycastError::SearchExhausted(0))
}

struct PreparedFold {
    split_id: String,
    x_train: Array2<f64>,
    y_train: Vec<bool>,
    x_valid: Array2<f64>,
    y_valid: Vec<bool>,
}

fn prepare_folds(recipe: &Recipe, data: &Dataset, folds: &FoldSets) -> Result<Vec<PreparedFold>> {
    if folds.n_rows != data.n_rows() {
        return Err(StaycastError::InvalidConfig(format!(
            "fold assignments cover {} rows but the dataset has {}",
            folds.n_rows,
            data.n_rows()
        )));
    }
    folds
        .splits
        .par_iter()
        .map(|split| -> Result<PreparedFold> {
            let train = data.select_rows(&split.train_indices);
            let valid = data.select_rows(&split.validation_indices);
            let fitted = recipe.fit(&train)?;
            Ok(PreparedFold {
                split_id: split.id(),
                x_train: fitted.transform(&train)?,
                y_train: train.labels().to_vec(),
                x_valid: fitted.transform(&valid)?,
                y_valid: valid.labels().to_vec(),
            })
        })
        .collect()
}

fn evaluate_unit(config: &ModelConfig, fold: &PreparedFold, metric: Metric, seed: u64) -> Result<f64> {
    let mut model = build_model(config, seed);
    model.fit(&fold.x_train, &fold.y_train)?;
    let proba = model.predict_proba(&fold.x_valid)?;
    let score = metric.score(&proba, &fold.y_valid);
    if !score.is_finite() {
        return Err(StaycastError::fit(format!("non-finite {} on validation fold", metric)));
    }
    Ok(score)
}

/// Score every candidate of `space` on every split in `folds`.
///
/// Returns `SearchExhausted` when no candidate fits on all folds. Recipe
/// errors (schema or degenerate features) abort the search.
pub fn search(
    recipe: &Recipe,
    data: &Dataset,
    folds: &FoldSets,
    space: &ConfigSpace,
    metric: Metric,
    seed: u64,
) -> Result<SearchResult> {
    let family = space.family();
    let candidates = space.candidates()?;
    log::info!(
        "Tuning {}: {} candidates x {} splits on {} (model seed {})",
        family,
        candidates.len(),
        folds.len(),
        metric,
        seed
    );

    let prepared = prepare_folds(recipe, data, folds)?;

    let units: Vec<(usize, usize)> = (0..candidates.len())
        .flat_map(|c| (0..prepared.len()).map(move |f| (c, f)))
        .collect();
    let outcomes: Vec<(usize, usize, Result<f64>)> = units
        .par_iter()
        .map(|&(c, f)| (c, f, evaluate_unit(&candidates[c], &prepared[f], metric, seed)))
        .collect();

    let mut scores: Vec<Vec<f64>> = vec![Vec::with_capacity(prepared.len()); candidates.len()];
    let mut failed: Vec<Option<FailedCandidate>> = vec![None; candidates.len()];
    for (c, f, outcome) in outcomes {
        match outcome {
            Ok(score) => scores[c].push(score),
            Err(e) if e.is_fit_failure() => {
                if failed[c].is_none() {
                    failed[c] = Some(FailedCandidate {
                        index: c,
                        config: candidates[c].clone(),
                        split_id: prepared[f].split_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
            Err(e) => return Err(e),
        }
    }

    let mut ranked = Vec::new();
    let mut failures = Vec::new();
    for (c, fold_scores) in scores.into_iter().enumerate() {
        if let Some(fail) = failed[c].take() {
            log::warn!("Candidate {} failed on {}: {}", fail.config, fail.split_id, fail.reason);
            failures.push(fail);
            continue;
        }
        let n = fold_scores.len() as f64;
        let mean = fold_scores.iter().sum::<f64>() / n;
        let std_err = if fold_scores.len() > 1 {
            let var = fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0);
            (var / n).sqrt()
        } else {
            0.0
        };
        log::debug!("Candidate {}: mean {} {:.4} (+/- {:.4})", candidates[c], metric, mean, std_err);
        ranked.push(CandidateScore {
            index: c,
            config: candidates[c].clone(),
            mean,
            std_err,
            fold_scores,
        });
    }

    if ranked.is_empty() {
        return Err(StaycastError::SearchExhausted(candidates.len()));
    }
    ranked.sort_by(rank_order);
    log::info!(
        "Best {} candidate: {} with mean {} {:.4} ({} of {} candidates failed)",
        family,
        ranked[0].config,
        metric,
        ranked[0].mean,
        failures.len(),
        candidates.len()
    );

    Ok(SearchResult { family, metric, ranked, failures })
}

/// Recipe and model refit on the full training set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalModel {
    pub recipe: FittedRecipe,
    pub model: Classifier,
    pub config: ModelConfig,
    /// Configuration chosen by the search when an explicit override replaced it.
    pub overridden_from: Option<ModelConfig>,
}

impl FinalModel {
    pub fn predict_proba(&self, data: &Dataset) -> Result<Vec<f64>> {
        let x = self.recipe.transform(data)?;
        self.model.predict_proba(&x)
    }

    pub fn family(&self) -> ModelFamily {
        self.config.family()
    }
}

/// Refit the recipe and the model on the whole training set.
///
/// `override_config` replaces the selected configuration when given; the
/// replacement must belong to the same family and is logged.
pub fn refit(
    recipe: &Recipe,
    train: &Dataset,
    selected: &ModelConfig,
    override_config: Option<&ModelConfig>,
    seed: u64,
) -> Result<FinalModel> {
    let (config, overridden_from) = match override_config {
        Some(o) if o.family() != selected.family() => {
            return Err(StaycastError::InvalidConfig(format!(
                "override {} does not match the selected family {}",
                o,
                selected.family()
            )))
        }
        Some(o) if o != selected => {
            log::warn!("Overriding selected configuration {} with {}", selected, o);
            (o.clone(), Some(selected.clone()))
        }
        _ => (selected.clone(), None),
    };

    let fitted = recipe.fit(train)?;
    let x = fitted.transform(train)?;
    let mut model = build_model(&config, seed);
    model.fit(&x, train.labels())?;
    log::info!("Refit {} on {} training rows (model seed {})", config, train.n_rows(), seed);

    Ok(FinalModel {
        recipe: fitted,
        model,
        config,
        overridden_from,
    })
}
