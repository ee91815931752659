use std::path::Path;

use anyhow::Result;

use staycast_classifiers::experiment::ModelBundle;
use staycast_classifiers::report::{comparison_report, ModelComparison};

/// Rank model bundles by held-out AUC; write the CSV table and, optionally,
/// an HTML report.
pub fn run_compare<P: AsRef<Path>>(
    bundles: &[ModelBundle],
    output: P,
    html: Option<&Path>,
) -> Result<ModelComparison> {
    let comparison = ModelComparison::from_bundles(bundles);
    comparison.write_csv(&output)?;
    log::info!("Wrote comparison of {} models to {}", bundles.len(), output.as_ref().display());
    if let Some(html_path) = html {
        comparison_report(&comparison, bundles).save_to_file(html_path)?;
        log::info!("Wrote HTML report to {}", html_path.display());
    }
    Ok(comparison)
}
