//! IO utilities: the raw bookings export, dataset and prediction CSVs, and
//! JSON artifacts passed between pipeline stages.
pub mod bookings;
pub mod cleaning;
pub mod dataset_csv;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use bookings::{read_raw_bookings, RawBooking, RawBookings, REQUIRED_COLUMNS};
pub use cleaning::{booking_schema, clean_bookings, CleaningConfig, CleaningReport, LEAKAGE_COLUMNS};
pub use dataset_csv::{
    read_dataset_csv, read_predictions_csv, write_dataset_csv, write_predictions_csv, PredictionRow,
    LABEL_COLUMN,
};

/// Serialize `value` as pretty JSON, creating parent directories as needed.
pub fn write_json<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write JSON to {}", path.display()))?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse JSON from {}", path.display()))
}
