use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::encoding::{CategoryCollapse, CollapseThreshold, OneHotEncoder};
use super::scaler::{fit_scaler_masked, Scaler};
use crate::data_handling::{Column, Dataset, FeatureKind, FeatureSpec};
use crate::error::{Result, StaycastError};

/// How the binarization cutpoint is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutpointRule {
    Fixed(f64),
    TrainingMedian,
}

/// Turns one numeric count feature into a two-level categorical:
/// values above the cutpoint are "present", the rest "absent".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinarizeSpec {
    pub feature: String,
    pub rule: CutpointRule,
    pub absent_label: String,
    pub present_label: String,
}

impl BinarizeSpec {
    pub fn fixed(feature: &str, cutpoint: f64) -> Self {
        Self {
            feature: feature.to_string(),
            rule: CutpointRule::Fixed(cutpoint),
            absent_label: "none".to_string(),
            present_label: "some".to_string(),
        }
    }
}

/// Unfitted preprocessing declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recipe {
    /// Features fed to the models. Empty means every feature in the
    /// training schema.
    pub predictors: Vec<FeatureSpec>,
    pub collapse: CollapseThreshold,
    pub binarize: Option<BinarizeSpec>,
    /// Whether indicator columns are centered and scaled like numerics.
    pub scale_indicators: bool,
}

impl Default for Recipe {
    fn default() -> Self {
        Self {
            predictors: Vec::new(),
            collapse: CollapseThreshold::default(),
            binarize: Some(BinarizeSpec::fixed("previous_cancellations", 0.0)),
            scale_indicators: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
enum FittedStep {
    Numeric {
        feature: String,
    },
    Boolean {
        feature: String,
    },
    Categorical {
        collapse: CategoryCollapse,
        encoder: OneHotEncoder,
    },
    Binarized {
        feature: String,
        cutpoint: f64,
        encoder: OneHotEncoder,
    },
}

impl FittedStep {
    fn feature(&self) -> &str {
        match self {
            FittedStep::Numeric { feature } | FittedStep::Boolean { feature } => feature,
            FittedStep::Categorical { collapse, .. } => &collapse.feature,
            FittedStep::Binarized { feature, .. } => feature,
        }
    }

    fn kind(&self) -> FeatureKind {
        match self {
            FittedStep::Numeric { .. } | FittedStep::Binarized { .. } => FeatureKind::Numeric,
            FittedStep::Boolean { .. } => FeatureKind::Boolean,
            FittedStep::Categorical { .. } => FeatureKind::Categorical,
        }
    }

    fn width(&self) -> usize {
        match self {
            FittedStep::Numeric { .. } | FittedStep::Boolean { .. } => 1,
            FittedStep::Categorical { encoder, .. } | FittedStep::Binarized { encoder, .. } => {
                encoder.width()
            }
        }
    }

    fn is_indicator(&self) -> bool {
        matches!(self, FittedStep::Categorical { .. } | FittedStep::Binarized { .. })
    }

    fn column_names(&self) -> Vec<String> {
        match self {
            FittedStep::Numeric { feature } | FittedStep::Boolean { feature } => vec![feature.clone()],
            FittedStep::Categorical { encoder, .. } | FittedStep::Binarized { encoder, .. } => {
                encoder.column_names()
            }
        }
    }

    /// Write this feature's unscaled block into `out[.., offset..offset + width]`.
    fn encode(&self, column: &Column, out: &mut Array2<f64>, offset: usize) -> Result<()> {
        match (self, column) {
            (FittedStep::Numeric { feature }, Column::Numeric(values)) => {
                for (r, &v) in values.iter().enumerate() {
                    if !v.is_finite() {
                        return Err(StaycastError::degenerate(feature, format!("non-finite value at row {}", r)));
                    }
                    out[[r, offset]] = v;
                }
            }
            (FittedStep::Boolean { .. }, Column::Boolean(values)) => {
                for (r, &v) in values.iter().enumerate() {
                    out[[r, offset]] = if v { 1.0 } else { 0.0 };
                }
            }
            (FittedStep::Categorical { collapse, encoder }, Column::Categorical(values)) => {
                for (r, v) in values.iter().enumerate() {
                    let level = collapse.apply(v);
                    let idx = encoder.index_of(level).ok_or_else(|| {
                        StaycastError::schema(format!("level '{}' missing from encoder of '{}'", level, collapse.feature))
                    })?;
                    out[[r, offset + idx]] = 1.0;
                }
            }
            (FittedStep::Binarized { feature, cutpoint, .. }, Column::Numeric(values)) => {
                for (r, &v) in values.iter().enumerate() {
                    if !v.is_finite() {
                        return Err(StaycastError::degenerate(feature, format!("non-finite value at row {}", r)));
                    }
                    let idx = usize::from(v > *cutpoint);
                    out[[r, offset + idx]] = 1.0;
                }
            }
            (step, col) => {
                return Err(StaycastError::schema(format!(
                    "feature '{}' expected {:?} values, found {:?}",
                    step.feature(),
                    step.kind(),
                    col.kind()
                )))
            }
        }
        Ok(())
    }
}

/// Immutable preprocessing state learned from a training dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedRecipe {
    steps: Vec<FittedStep>,
    feature_names: Vec<String>,
    scaler: Scaler,
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n == 0 {
        0.0
    } else if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

impl Recipe {
    fn resolve_predictors(&self, data: &Dataset) -> Result<Vec<FeatureSpec>> {
        if self.predictors.is_empty() {
            return Ok(data.schema().features().to_vec());
        }
        for spec in &self.predictors {
            match data.schema().get(&spec.name) {
                None => {
                    return Err(StaycastError::schema(format!(
                        "required feature '{}' is absent",
                        spec.name
                    )))
                }
                Some(found) if found.kind != spec.kind => {
                    return Err(StaycastError::schema(format!(
                        "feature '{}' is {:?}, recipe expects {:?}",
                        spec.name, found.kind, spec.kind
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(self.predictors.clone())
    }

    /// Learn collapse rules, one-hot tables, the binarization cutpoint, and
    /// scaling statistics from `train`.
    pub fn fit(&self, train: &Dataset) -> Result<FittedRecipe> {
        if train.n_rows() == 0 {
            return Err(StaycastError::schema("cannot fit a recipe on an empty dataset"));
        }
        let predictors = self.resolve_predictors(train)?;
        let min_count = self.collapse.min_count(train.n_rows())?;

        if let Some(bin) = &self.binarize {
            match predictors.iter().find(|p| p.name == bin.feature) {
                Some(p) if p.kind == FeatureKind::Numeric => {}
                Some(p) => {
                    return Err(StaycastError::schema(format!(
                        "binarized feature '{}' must be numeric, found {:?}",
                        p.name, p.kind
                    )))
                }
                None => {
                    return Err(StaycastError::schema(format!(
                        "binarized feature '{}' is not a predictor",
                        bin.feature
                    )))
                }
            }
        }

        let mut steps = Vec::with_capacity(predictors.len());
        for spec in &predictors {
            let column = train
                .column(&spec.name)
                .ok_or_else(|| StaycastError::schema(format!("required feature '{}' is absent", spec.name)))?;
            let step = match (spec.kind, column) {
                (FeatureKind::Numeric, Column::Numeric(values)) => {
                    if let Some(r) = values.iter().position(|v| !v.is_finite()) {
                        return Err(StaycastError::degenerate(&spec.name, format!("non-finite value at row {}", r)));
                    }
                    match &self.binarize {
                        Some(bin) if bin.feature == spec.name => {
                            let cutpoint = match bin.rule {
                                CutpointRule::Fixed(c) => c,
                                CutpointRule::TrainingMedian => median(values),
                            };
                            log::debug!("Binarizing '{}' at cutpoint {}", spec.name, cutpoint);
                            FittedStep::Binarized {
                                feature: spec.name.clone(),
                                cutpoint,
                                encoder: OneHotEncoder::with_levels(
                                    &spec.name,
                                    vec![bin.absent_label.clone(), bin.present_label.clone()],
                                ),
                            }
                        }
                        _ => FittedStep::Numeric { feature: spec.name.clone() },
                    }
                }
                (FeatureKind::Boolean, Column::Boolean(_)) => FittedStep::Boolean { feature: spec.name.clone() },
                (FeatureKind::Categorical, Column::Categorical(values)) => {
                    let collapse = CategoryCollapse::fit(&spec.name, values, min_count);
                    let encoder = OneHotEncoder::from_collapse(&collapse);
                    FittedStep::Categorical { collapse, encoder }
                }
                (kind, col) => {
                    return Err(StaycastError::schema(format!(
                        "feature '{}' declared {:?} but holds {:?} values",
                        spec.name,
                        kind,
                        col.kind()
                    )))
                }
            };
            steps.push(step);
        }

        let feature_names: Vec<String> = steps.iter().flat_map(|s| s.column_names()).collect();
        let mut seen = std::collections::HashSet::with_capacity(feature_names.len());
        if let Some(dup) = feature_names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(StaycastError::schema(format!(
                "output column '{}' is produced twice; rename a feature or level",
                dup
            )));
        }
        let mut fitted = FittedRecipe {
            steps,
            scaler: Scaler::identity(feature_names.len()),
            feature_names,
        };

        let raw = fitted.encode(train)?;
        let mask: Vec<bool> = fitted
            .steps
            .iter()
            .flat_map(|s| std::iter::repeat(!s.is_indicator() || self.scale_indicators).take(s.width()))
            .collect();
        fitted.scaler = fit_scaler_masked(&raw, &mask);
        for (c, name) in fitted.feature_names.iter().enumerate() {
            if mask[c] && fitted.scaler.is_constant(c) {
                log::warn!("Column '{}' has zero variance in training data; it will be emitted as 0", name);
            }
        }

        log::info!(
            "Fitted recipe on {} rows: {} predictors -> {} columns",
            train.n_rows(),
            predictors.len(),
            fitted.n_columns()
        );
        Ok(fitted)
    }
}

impl FittedRecipe {
    /// Output column names, in matrix order.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_columns(&self) -> usize {
        self.feature_names.len()
    }

    /// Source predictor for each output column.
    pub fn source_features(&self) -> Vec<String> {
        self.steps
            .iter()
            .flat_map(|s| std::iter::repeat(s.feature().to_string()).take(s.width()))
            .collect()
    }

    fn encode(&self, data: &Dataset) -> Result<Array2<f64>> {
        let mut out = Array2::<f64>::zeros((data.n_rows(), self.n_columns()));
        let mut offset = 0;
        for step in &self.steps {
            let column = data.column(step.feature()).ok_or_else(|| {
                StaycastError::schema(format!("required feature '{}' is absent", step.feature()))
            })?;
            step.encode(column, &mut out, offset)?;
            offset += step.width();
        }
        Ok(out)
    }

    /// Apply the fitted steps: collapse rare or unseen levels, binarize,
    /// one-hot encode, then center and scale with training statistics.
    pub fn transform(&self, data: &Dataset) -> Result<Array2<f64>> {
        let mut x = self.encode(data)?;
        for ((_, c), v) in x.indexed_iter_mut() {
            *v = self.scaler.scale(c, *v);
        }
        Ok(x)
    }
}
