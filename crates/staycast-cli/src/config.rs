//! Experiment configuration loading for the CLI stages.
use std::path::Path;

use anyhow::{Context, Result};

use staycast_classifiers::experiment::ExperimentConfig;

/// Load an experiment configuration from a JSON file. Sections left out of
/// the file keep their defaults.
pub fn load_experiment_config<P: AsRef<Path>>(path: P) -> Result<ExperimentConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: ExperimentConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}

/// The configuration at `path`, or the defaults (echoed to stderr) when no
/// path is given.
pub fn resolve_config<P: AsRef<Path>>(path: Option<P>) -> Result<ExperimentConfig> {
    match path {
        Some(p) => {
            eprintln!("[Staycast] Using config: {}", p.as_ref().display());
            load_experiment_config(p)
        }
        None => {
            let config = ExperimentConfig::default();
            let default_json = serde_json::to_string_pretty(&config).unwrap_or_default();
            eprintln!("[Staycast] No config provided; using defaults:\n{}", default_json);
            Ok(config)
        }
    }
}

/// Replace the model-selection sections of a prepared experiment's config.
///
/// The split, folds, and recipe were fixed when the bundle was prepared, so
/// only the metric, search spaces, explanation settings, forest override,
/// and model seed are taken from `update`.
pub fn apply_selection_overrides(base: &mut ExperimentConfig, update: ExperimentConfig) {
    base.metric = update.metric;
    base.searches = update.searches;
    base.explain = update.explain;
    base.forest_override = update.forest_override;
    base.model_seed = update.model_seed;
}
