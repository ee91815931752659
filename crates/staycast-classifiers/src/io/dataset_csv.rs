//! CSV form of a cleaned dataset and of model predictions.
use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data_handling::{Column, Dataset, FeatureKind, Schema};
use crate::error::StaycastError;

/// Header of the label column in dataset files.
pub const LABEL_COLUMN: &str = "canceled";

/// Write `data` with one column per feature, in schema order, followed by
/// the label as 0/1.
pub fn write_dataset_csv<P: AsRef<Path>>(path: P, data: &Dataset) -> Result<()> {
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to create dataset file: {}", path.as_ref().display()))?;

    let mut header: Vec<&str> = data.schema().features().iter().map(|f| f.name.as_str()).collect();
    header.push(LABEL_COLUMN);
    writer.write_record(&header)?;

    let mut row: Vec<String> = Vec::with_capacity(header.len());
    for i in 0..data.n_rows() {
        row.clear();
        for col in data.columns() {
            row.push(match col {
                Column::Numeric(v) => v[i].to_string(),
                Column::Categorical(v) => v[i].clone(),
                Column::Boolean(v) => v[i].to_string(),
            });
        }
        row.push(if data.labels()[i] { "1" } else { "0" }.to_string());
        writer
            .write_record(&row)
            .with_context(|| format!("Failed to write row {}", i + 1))?;
    }
    writer.flush()?;
    log::debug!("Wrote {} rows to {}", data.n_rows(), path.as_ref().display());
    Ok(())
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Read a dataset written by [`write_dataset_csv`], typing each column by
/// `schema`. Extra columns are ignored.
pub fn read_dataset_csv<P: AsRef<Path>>(path: P, schema: &Schema, label_column: &str) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(&path)
        .with_context(|| format!("Failed to open dataset file: {}", path.as_ref().display()))?;
    let headers = reader.headers().context("Failed to read dataset header row")?.clone();
    let index: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h, i)).collect();

    let find_column = |name: &str| -> Result<usize> {
        index.get(name).copied().ok_or_else(|| {
            anyhow!(StaycastError::schema(format!(
                "dataset file is missing column '{}'",
                name
            )))
        })
    };
    let label_idx = find_column(label_column)?;
    let feature_idx: Vec<usize> = schema
        .features()
        .iter()
        .map(|f| find_column(f.name.as_str()))
        .collect::<Result<_>>()?;

    let mut columns: Vec<Column> = schema
        .features()
        .iter()
        .map(|f| match f.kind {
            FeatureKind::Numeric => Column::Numeric(Vec::new()),
            FeatureKind::Categorical => Column::Categorical(Vec::new()),
            FeatureKind::Boolean => Column::Boolean(Vec::new()),
        })
        .collect();
    let mut labels = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        let cell = |i: usize| record.get(i).unwrap_or("");

        let label = parse_bool(cell(label_idx))
            .ok_or_else(|| anyhow!("Invalid label '{}' at row {}", cell(label_idx), row_idx + 1))?;
        labels.push(label);

        for ((spec, &i), col) in schema.features().iter().zip(&feature_idx).zip(columns.iter_mut()) {
            let raw = cell(i);
            match col {
                Column::Numeric(v) => v.push(raw.trim().parse::<f64>().with_context(|| {
                    format!("Invalid number '{}' for '{}' at row {}", raw, spec.name, row_idx + 1)
                })?),
                Column::Categorical(v) => v.push(raw.to_string()),
                Column::Boolean(v) => v.push(parse_bool(raw).ok_or_else(|| {
                    anyhow!("Invalid boolean '{}' for '{}' at row {}", raw, spec.name, row_idx + 1)
                })?),
            }
        }
    }

    let data = Dataset::new(schema.clone(), columns, labels)?;
    log::info!(
        "Loaded {} rows ({} positive) from {}",
        data.n_rows(),
        data.n_positive(),
        path.as_ref().display()
    );
    Ok(data)
}

/// One row of a predictions file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub row: usize,
    pub label: u8,
    pub probability: f64,
}

pub fn write_predictions_csv<P: AsRef<Path>>(path: P, labels: &[bool], proba: &[f64]) -> Result<()> {
    if labels.len() != proba.len() {
        return Err(anyhow!(StaycastError::schema(format!(
            "{} labels but {} predictions",
            labels.len(),
            proba.len()
        ))));
    }
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to create predictions file: {}", path.as_ref().display()))?;
    for (row, (&label, &probability)) in labels.iter().zip(proba).enumerate() {
        writer.serialize(PredictionRow { row, label: label as u8, probability })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_predictions_csv<P: AsRef<Path>>(path: P) -> Result<Vec<PredictionRow>> {
    let mut reader = csv::Reader::from_path(&path)
        .with_context(|| format!("Failed to open predictions file: {}", path.as_ref().display()))?;
    let mut rows = Vec::new();
    for (row_idx, result) in reader.deserialize().enumerate() {
        let row: PredictionRow = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        rows.push(row);
    }
    Ok(rows)
}
