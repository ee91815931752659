use std::path::Path;

use anyhow::Result;

use staycast_classifiers::experiment::{explain, ExplanationBundle, ModelBundle, PreparedBundle};
use staycast_classifiers::io::write_json;

/// Explain a tuned model and save the explanation bundle.
pub fn run_explain<P: AsRef<Path>>(
    prepared: &PreparedBundle,
    model: &ModelBundle,
    output: P,
) -> Result<ExplanationBundle> {
    let bundle = explain(prepared, model)?;
    if let Some(top) = bundle.importance.features.first() {
        log::info!(
            "Most important predictor for {}: {} ({} drop {:.4})",
            bundle.config,
            top.feature,
            bundle.importance.metric,
            top.importance_mean
        );
    }
    if let Some(shap) = &bundle.shapley {
        log::info!(
            "Shapley values for {} rows against {} reference rows (baseline {:.4})",
            shap.explanations.len(),
            shap.n_reference,
            shap.baseline
        );
    }
    write_json(&output, &bundle)?;
    log::info!("Saved explanation to {}", output.as_ref().display());
    Ok(bundle)
}
