use std::path::Path;

use anyhow::Result;

use staycast_classifiers::experiment::{prepare, ExperimentConfig, PreparedBundle};
use staycast_classifiers::io::{booking_schema, read_dataset_csv, write_json, LABEL_COLUMN};

/// Split the cleaned dataset, fix the folds, and save the prepared bundle.
pub fn run_prepare<P: AsRef<Path>, Q: AsRef<Path>>(
    cleaned_path: P,
    output: Q,
    config: &ExperimentConfig,
) -> Result<PreparedBundle> {
    let data = read_dataset_csv(&cleaned_path, &booking_schema()?, LABEL_COLUMN)?;
    let bundle = prepare(&data, config)?;
    write_json(&output, &bundle)?;
    log::info!(
        "Prepared {} training and {} test rows with {} folds; saved to {}",
        bundle.train.n_rows(),
        bundle.test.n_rows(),
        bundle.folds.len(),
        output.as_ref().display()
    );
    Ok(bundle)
}
