//! Tabular booking data: schema, records, and the column-wise `Dataset`.
//!
//! A `Dataset` is an ordered collection of rows sharing one `Schema`. Values
//! are stored per column so the preprocessing recipe can learn statistics
//! without re-walking records. Missing values never reach this layer: they are
//! imputed during cleaning or rejected.
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StaycastError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Numeric,
    Categorical,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub kind: FeatureKind,
}

impl FeatureSpec {
    pub fn numeric(name: &str) -> Self {
        Self { name: name.to_string(), kind: FeatureKind::Numeric }
    }

    pub fn categorical(name: &str) -> Self {
        Self { name: name.to_string(), kind: FeatureKind::Categorical }
    }

    pub fn boolean(name: &str) -> Self {
        Self { name: name.to_string(), kind: FeatureKind::Boolean }
    }
}

/// Ordered feature names with their declared kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    features: Vec<FeatureSpec>,
}

impl Schema {
    pub fn new(features: Vec<FeatureSpec>) -> Result<Self> {
        let mut seen = HashSet::new();
        for f in &features {
            if !seen.insert(f.name.as_str()) {
                return Err(StaycastError::schema(format!("duplicate feature '{}'", f.name)));
            }
        }
        Ok(Self { features })
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&FeatureSpec> {
        self.features.iter().find(|f| f.name == name)
    }
}

/// A single feature value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Numeric(f64),
    Categorical(String),
}

impl Value {
    pub fn kind(&self) -> FeatureKind {
        match self {
            Value::Numeric(_) => FeatureKind::Numeric,
            Value::Categorical(_) => FeatureKind::Categorical,
            Value::Boolean(_) => FeatureKind::Boolean,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Numeric(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Categorical(v.to_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

/// One booking: feature values keyed by name plus the cancellation label.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub values: HashMap<String, Value>,
    pub label: bool,
}

impl Record {
    pub fn new(label: bool) -> Self {
        Self { values: HashMap::new(), label }
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }
}

/// Values of one feature across all rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum Column {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
    Boolean(Vec<bool>),
}

impl Column {
    pub fn kind(&self) -> FeatureKind {
        match self {
            Column::Numeric(_) => FeatureKind::Numeric,
            Column::Categorical(_) => FeatureKind::Categorical,
            Column::Boolean(_) => FeatureKind::Boolean,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Categorical(v) => v.len(),
            Column::Boolean(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn empty(kind: FeatureKind, capacity: usize) -> Self {
        match kind {
            FeatureKind::Numeric => Column::Numeric(Vec::with_capacity(capacity)),
            FeatureKind::Categorical => Column::Categorical(Vec::with_capacity(capacity)),
            FeatureKind::Boolean => Column::Boolean(Vec::with_capacity(capacity)),
        }
    }

    fn push(&mut self, value: Value) -> std::result::Result<(), Value> {
        match (self, value) {
            (Column::Numeric(v), Value::Numeric(x)) => v.push(x),
            (Column::Categorical(v), Value::Categorical(x)) => v.push(x),
            (Column::Boolean(v), Value::Boolean(x)) => v.push(x),
            (_, other) => return Err(other),
        }
        Ok(())
    }

    fn select(&self, indices: &[usize]) -> Column {
        match self {
            Column::Numeric(v) => Column::Numeric(indices.iter().map(|&i| v[i]).collect()),
            Column::Categorical(v) => {
                Column::Categorical(indices.iter().map(|&i| v[i].clone()).collect())
            }
            Column::Boolean(v) => Column::Boolean(indices.iter().map(|&i| v[i]).collect()),
        }
    }

    pub fn value(&self, row: usize) -> Value {
        match self {
            Column::Numeric(v) => Value::Numeric(v[row]),
            Column::Categorical(v) => Value::Categorical(v[row].clone()),
            Column::Boolean(v) => Value::Boolean(v[row]),
        }
    }
}

/// Column-wise table of bookings sharing one schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    schema: Schema,
    columns: Vec<Column>,
    labels: Vec<bool>,
}

impl Dataset {
    pub fn new(schema: Schema, columns: Vec<Column>, labels: Vec<bool>) -> Result<Self> {
        if columns.len() != schema.len() {
            return Err(StaycastError::schema(format!(
                "schema declares {} features but {} columns were given",
                schema.len(),
                columns.len()
            )));
        }
        for (spec, col) in schema.features().iter().zip(&columns) {
            if spec.kind != col.kind() {
                return Err(StaycastError::schema(format!(
                    "feature '{}' declared {:?} but column holds {:?}",
                    spec.name,
                    spec.kind,
                    col.kind()
                )));
            }
            if col.len() != labels.len() {
                return Err(StaycastError::schema(format!(
                    "feature '{}' has {} values but there are {} labels",
                    spec.name,
                    col.len(),
                    labels.len()
                )));
            }
        }
        Ok(Self { schema, columns, labels })
    }

    /// Build a dataset from row records. Every record must carry every schema
    /// feature with the declared kind; extra keys are ignored.
    pub fn from_records(schema: Schema, records: &[Record]) -> Result<Self> {
        let mut columns: Vec<Column> = schema
            .features()
            .iter()
            .map(|f| Column::empty(f.kind, records.len()))
            .collect();
        for (row, rec) in records.iter().enumerate() {
            for (spec, col) in schema.features().iter().zip(columns.iter_mut()) {
                let value = rec.values.get(&spec.name).cloned().ok_or_else(|| {
                    StaycastError::schema(format!("record {} is missing feature '{}'", row, spec.name))
                })?;
                col.push(value).map_err(|got| {
                    StaycastError::schema(format!(
                        "record {} feature '{}' is {:?}, expected {:?}",
                        row,
                        spec.name,
                        got.kind(),
                        spec.kind
                    ))
                })?;
            }
        }
        let labels = records.iter().map(|r| r.label).collect();
        Self::new(schema, columns, labels)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn labels(&self) -> &[bool] {
        &self.labels
    }

    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }

    pub fn n_features(&self) -> usize {
        self.schema.len()
    }

    pub fn n_positive(&self) -> usize {
        self.labels.iter().filter(|&&l| l).count()
    }

    pub fn positive_fraction(&self) -> f64 {
        if self.labels.is_empty() {
            0.0
        } else {
            self.n_positive() as f64 / self.n_rows() as f64
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.schema.position(name).map(|i| &self.columns[i])
    }

    /// Reassemble row `i` as a `Record`.
    pub fn record(&self, i: usize) -> Record {
        let mut rec = Record::new(self.labels[i]);
        for (spec, col) in self.schema.features().iter().zip(&self.columns) {
            rec.values.insert(spec.name.clone(), col.value(i));
        }
        rec
    }

    /// Rows at `indices`, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Dataset {
        Dataset {
            schema: self.schema.clone(),
            columns: self.columns.iter().map(|c| c.select(indices)).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Drop exact duplicate rows (features and label), keeping the first.
    pub fn dedup(&self) -> (Dataset, usize) {
        let mut seen = HashSet::with_capacity(self.n_rows());
        let mut keep = Vec::with_capacity(self.n_rows());
        for i in 0..self.n_rows() {
            if seen.insert(self.row_key(i)) {
                keep.push(i);
            }
        }
        let removed = self.n_rows() - keep.len();
        log::debug!("Deduplication removed {} of {} rows", removed, self.n_rows());
        (self.select_rows(&keep), removed)
    }

    fn row_key(&self, i: usize) -> String {
        let mut key = String::new();
        for col in &self.columns {
            let _ = match col {
                Column::Numeric(v) => write!(key, "{:x}\u{1f}", v[i].to_bits()),
                Column::Categorical(v) => write!(key, "{}\u{1f}", v[i]),
                Column::Boolean(v) => write!(key, "{}\u{1f}", v[i]),
            };
        }
        key.push(if self.labels[i] { '1' } else { '0' });
        key
    }

    /// Split into (train, test) preserving the label ratio in both parts.
    ///
    /// For each class, indices are shuffled with a generator seeded from
    /// `seed` and `round(n_class * test_fraction)` of them go to the test set.
    /// Both outputs keep the original row order.
    pub fn stratified_split(&self, test_fraction: f64, seed: u64) -> Result<(Dataset, Dataset)> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(StaycastError::InvalidConfig(format!(
                "test fraction must lie in (0, 1), got {}",
                test_fraction
            )));
        }
        log::info!(
            "Stratified train/test split: test fraction {:.3}, seed {}",
            test_fraction,
            seed
        );
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut test = Vec::new();
        for class in [true, false] {
            let mut idx: Vec<usize> = (0..self.n_rows()).filter(|&i| self.labels[i] == class).collect();
            idx.shuffle(&mut rng);
            let n_test = (idx.len() as f64 * test_fraction).round() as usize;
            test.extend_from_slice(&idx[..n_test]);
        }
        test.sort_unstable();
        let is_test: HashSet<usize> = test.iter().copied().collect();
        let train: Vec<usize> = (0..self.n_rows()).filter(|i| !is_test.contains(i)).collect();

        let (train, test) = (self.select_rows(&train), self.select_rows(&test));
        log::info!(
            "Split into {} training rows ({} positive) and {} test rows ({} positive)",
            train.n_rows(),
            train.n_positive(),
            test.n_rows(),
            test.n_positive()
        );
        Ok((train, test))
    }
}
