use std::path::Path;

use anyhow::{anyhow, Context, Result};

use staycast_classifiers::experiment::{explanation_target, ExperimentConfig, ModelBundle};

use super::{clean::run_clean, compare::run_compare, explain::run_explain, prepare::run_prepare, tune::run_tune};

/// Every stage in order, writing all artifacts into `out_dir`.
///
/// The random forest is explained when tuned, otherwise the best tree model
/// by cross-validated mean.
pub fn run_all<P: AsRef<Path>, Q: AsRef<Path>>(raw_path: P, out_dir: Q, config: &ExperimentConfig) -> Result<()> {
    let out_dir = out_dir.as_ref();
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;

    let cleaned = out_dir.join("cleaned.csv");
    run_clean(raw_path, &cleaned, &config.cleaning)?;

    let prepared = run_prepare(&cleaned, out_dir.join("prepared.json"), config)?;

    let mut bundles: Vec<ModelBundle> = Vec::new();
    for family in config.families() {
        let path = out_dir.join(format!("model_{}.json", family));
        bundles.push(run_tune(&prepared, family, path)?);
    }

    let report_path = out_dir.join("report.html");
    run_compare(&bundles, out_dir.join("comparison.csv"), Some(report_path.as_path()))?;

    let target = explanation_target(&bundles).ok_or_else(|| anyhow!("no tuned models to explain"))?;
    run_explain(
        &prepared,
        target,
        out_dir.join(format!("explanation_{}.json", target.family)),
    )?;

    log::info!("All stages complete; artifacts in {}", out_dir.display());
    Ok(())
}
