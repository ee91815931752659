use std::path::Path;

use anyhow::Result;

use staycast_classifiers::config::ModelFamily;
use staycast_classifiers::experiment::{tune_family, ModelBundle, PreparedBundle};
use staycast_classifiers::io::{write_json, write_predictions_csv};

use super::sibling;

/// Tune one family on a prepared bundle and write the model bundle plus
/// train and test prediction CSVs next to it.
pub fn run_tune<P: AsRef<Path>>(prepared: &PreparedBundle, family: ModelFamily, output: P) -> Result<ModelBundle> {
    let bundle = tune_family(prepared, family)?;
    let output = output.as_ref();
    write_json(output, &bundle)?;
    write_predictions_csv(
        sibling(output, "train_predictions.csv"),
        prepared.train.labels(),
        &bundle.train_predictions,
    )?;
    write_predictions_csv(
        sibling(output, "test_predictions.csv"),
        prepared.test.labels(),
        &bundle.test_predictions,
    )?;

    if !bundle.search.failures.is_empty() {
        log::warn!(
            "{} of {} {} configurations failed to fit",
            bundle.search.failures.len(),
            bundle.search.n_candidates(),
            family
        );
    }
    log::info!("Saved {} model bundle to {}", family, output.display());
    Ok(bundle)
}
