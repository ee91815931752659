use std::path::Path;

use anyhow::Result;

use staycast_classifiers::io::{clean_bookings, read_raw_bookings, write_dataset_csv, CleaningConfig, CleaningReport};

/// Read the raw bookings export, clean it, and write the modelling dataset.
pub fn run_clean<P: AsRef<Path>, Q: AsRef<Path>>(raw_path: P, output: Q, config: &CleaningConfig) -> Result<CleaningReport> {
    let raw = read_raw_bookings(&raw_path)?;
    let (data, report) = clean_bookings(&raw, config)?;
    write_dataset_csv(&output, &data)?;
    log::info!(
        "Wrote {} cleaned bookings ({} features, {:.1}% canceled) to {}",
        data.n_rows(),
        data.n_features(),
        100.0 * data.positive_fraction(),
        output.as_ref().display()
    );
    Ok(report)
}
