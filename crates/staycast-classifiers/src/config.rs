use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StaycastError};

/// The five model families compared by the workflow.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Logistic,
    Lasso,
    DecisionTree,
    Knn,
    RandomForest,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 5] = [
        ModelFamily::Logistic,
        ModelFamily::Lasso,
        ModelFamily::DecisionTree,
        ModelFamily::Knn,
        ModelFamily::RandomForest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::Logistic => "logistic",
            ModelFamily::Lasso => "lasso",
            ModelFamily::DecisionTree => "decision_tree",
            ModelFamily::Knn => "knn",
            ModelFamily::RandomForest => "random_forest",
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, ModelFamily::DecisionTree | ModelFamily::RandomForest)
    }

    /// Default hyper-parameters for the family.
    pub fn default_config(&self) -> ModelConfig {
        match self {
            ModelFamily::Logistic => ModelConfig::Logistic {
                max_iter: 500,
                tolerance: 1e-6,
            },
            ModelFamily::Lasso => ModelConfig::Lasso {
                penalty: 0.01,
                mixture: 1.0,
                max_iter: 500,
            },
            ModelFamily::DecisionTree => ModelConfig::DecisionTree {
                max_depth: 6,
                min_samples_split: 10,
                min_samples_leaf: 5,
            },
            ModelFamily::Knn => ModelConfig::Knn {
                neighbors: 15,
                weighting: Weighting::Uniform,
            },
            ModelFamily::RandomForest => ModelConfig::RandomForest {
                trees: 100,
                mtry: None,
                min_samples_split: 10,
                max_depth: None,
            },
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "logistic" | "logistic_regression" => Ok(ModelFamily::Logistic),
            "lasso" | "lasso_logistic" => Ok(ModelFamily::Lasso),
            "decision_tree" | "tree" => Ok(ModelFamily::DecisionTree),
            "knn" => Ok(ModelFamily::Knn),
            "random_forest" | "rf" => Ok(ModelFamily::RandomForest),
            _ => Err(format!(
                "Unknown model family: {}. Expected one of logistic, lasso, decision_tree, knn, random_forest",
                s
            )),
        }
    }
}

/// Neighbor vote weighting for KNN.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    Uniform,
    InverseDistance,
}

impl FromStr for Weighting {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uniform" | "rectangular" => Ok(Weighting::Uniform),
            "inverse_distance" | "inv" | "distance" => Ok(Weighting::InverseDistance),
            _ => Err(format!("Unknown neighbor weighting: {}", s)),
        }
    }
}

/// A hyper-parameter value as it appears in a search space.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(v) => write!(f, "{}", v),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

/// One concrete hyper-parameter assignment for one model family.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelConfig {
    Logistic {
        max_iter: usize,
        /// Stop once no coefficient moves by more than this.
        tolerance: f64,
    },
    Lasso {
        /// Overall penalty strength (lambda).
        penalty: f64,
        /// Share of the penalty applied as L1; the remainder is L2.
        mixture: f64,
        max_iter: usize,
    },
    DecisionTree {
        max_depth: usize,
        min_samples_split: usize,
        min_samples_leaf: usize,
    },
    Knn {
        neighbors: usize,
        weighting: Weighting,
    },
    RandomForest {
        trees: usize,
        /// Features tried per split; `None` uses floor(sqrt(p)).
        mtry: Option<usize>,
        min_samples_split: usize,
        max_depth: Option<usize>,
    },
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelFamily::Logistic.default_config()
    }
}

fn number(name: &str, v: &ParamValue) -> Result<f64> {
    match v {
        ParamValue::Number(x) if x.is_finite() => Ok(*x),
        _ => Err(StaycastError::InvalidConfig(format!(
            "parameter '{}' expects a finite number, got {}",
            name, v
        ))),
    }
}

fn count(name: &str, v: &ParamValue) -> Result<usize> {
    let x = number(name, v)?;
    if x < 0.0 {
        return Err(StaycastError::InvalidConfig(format!(
            "parameter '{}' must be non-negative, got {}",
            name, x
        )));
    }
    Ok(x.round() as usize)
}

impl ModelConfig {
    pub fn family(&self) -> ModelFamily {
        match self {
            ModelConfig::Logistic { .. } => ModelFamily::Logistic,
            ModelConfig::Lasso { .. } => ModelFamily::Lasso,
            ModelConfig::DecisionTree { .. } => ModelFamily::DecisionTree,
            ModelConfig::Knn { .. } => ModelFamily::Knn,
            ModelConfig::RandomForest { .. } => ModelFamily::RandomForest,
        }
    }

    /// Build a configuration for `family` from named values, starting from
    /// the family defaults. Unknown names are rejected.
    pub fn from_params(family: ModelFamily, params: &BTreeMap<String, ParamValue>) -> Result<Self> {
        let mut cfg = family.default_config();
        for (name, value) in params {
            cfg.set(name, value)?;
        }
        Ok(cfg)
    }

    fn set(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match (self, name) {
            (ModelConfig::Logistic { max_iter, .. }, "max_iter") => *max_iter = count(name, value)?,
            (ModelConfig::Logistic { tolerance, .. }, "tolerance") => *tolerance = number(name, value)?,
            (ModelConfig::Lasso { penalty, .. }, "penalty") => *penalty = number(name, value)?,
            (ModelConfig::Lasso { mixture, .. }, "mixture") => *mixture = number(name, value)?,
            (ModelConfig::Lasso { max_iter, .. }, "max_iter") => *max_iter = count(name, value)?,
            (ModelConfig::DecisionTree { max_depth, .. }, "max_depth" | "tree_depth") => {
                *max_depth = count(name, value)?
            }
            (ModelConfig::DecisionTree { min_samples_split, .. }, "min_samples_split" | "min_n") => {
                *min_samples_split = count(name, value)?
            }
            (ModelConfig::DecisionTree { min_samples_leaf, .. }, "min_samples_leaf") => {
                *min_samples_leaf = count(name, value)?
            }
            (ModelConfig::Knn { neighbors, .. }, "neighbors") => *neighbors = count(name, value)?,
            (ModelConfig::Knn { weighting, .. }, "weighting" | "weight_func") => {
                *weighting = match value {
                    ParamValue::Text(s) => s.parse().map_err(StaycastError::InvalidConfig)?,
                    ParamValue::Number(x) if *x == 0.0 => Weighting::Uniform,
                    ParamValue::Number(_) => Weighting::InverseDistance,
                }
            }
            (ModelConfig::RandomForest { trees, .. }, "trees") => *trees = count(name, value)?,
            (ModelConfig::RandomForest { mtry, .. }, "mtry") => *mtry = Some(count(name, value)?),
            (ModelConfig::RandomForest { min_samples_split, .. }, "min_samples_split" | "min_n") => {
                *min_samples_split = count(name, value)?
            }
            (ModelConfig::RandomForest { max_depth, .. }, "max_depth" | "tree_depth") => {
                *max_depth = Some(count(name, value)?)
            }
            (cfg, _) => {
                return Err(StaycastError::InvalidConfig(format!(
                    "unknown parameter '{}' for family {}",
                    name,
                    cfg.family()
                )))
            }
        }
        Ok(())
    }

    /// Named parameter values, in a stable order, for reports.
    pub fn params(&self) -> BTreeMap<String, ParamValue> {
        let mut out = BTreeMap::new();
        let mut put = |k: &str, v: ParamValue| {
            out.insert(k.to_string(), v);
        };
        match self {
            ModelConfig::Logistic { max_iter, tolerance } => {
                put("max_iter", (*max_iter as f64).into());
                put("tolerance", (*tolerance).into());
            }
            ModelConfig::Lasso { penalty, mixture, max_iter } => {
                put("penalty", (*penalty).into());
                put("mixture", (*mixture).into());
                put("max_iter", (*max_iter as f64).into());
            }
            ModelConfig::DecisionTree { max_depth, min_samples_split, min_samples_leaf } => {
                put("max_depth", (*max_depth as f64).into());
                put("min_samples_split", (*min_samples_split as f64).into());
                put("min_samples_leaf", (*min_samples_leaf as f64).into());
            }
            ModelConfig::Knn { neighbors, weighting } => {
                put("neighbors", (*neighbors as f64).into());
                put(
                    "weighting",
                    match weighting {
                        Weighting::Uniform => "uniform".into(),
                        Weighting::InverseDistance => "inverse_distance".into(),
                    },
                );
            }
            ModelConfig::RandomForest { trees, mtry, min_samples_split, max_depth } => {
                put("trees", (*trees as f64).into());
                put("mtry", mtry.map_or("sqrt".into(), |m| (m as f64).into()));
                put("min_samples_split", (*min_samples_split as f64).into());
                put("max_depth", max_depth.map_or("none".into(), |d| (d as f64).into()));
            }
        }
        out
    }

    /// Lexicographic complexity key; smaller means simpler.
    ///
    /// Used to break ties between configurations with equal mean scores:
    /// stronger penalties, shallower trees, larger leaves, more neighbors, and
    /// smaller forests rank as simpler.
    pub fn complexity(&self) -> Vec<f64> {
        match self {
            ModelConfig::Logistic { max_iter, .. } => vec![*max_iter as f64],
            ModelConfig::Lasso { penalty, mixture, .. } => vec![-penalty, -mixture],
            ModelConfig::DecisionTree { max_depth, min_samples_split, min_samples_leaf } => vec![
                *max_depth as f64,
                -(*min_samples_leaf as f64),
                -(*min_samples_split as f64),
            ],
            ModelConfig::Knn { neighbors, weighting } => vec![
                -(*neighbors as f64),
                match weighting {
                    Weighting::Uniform => 0.0,
                    Weighting::InverseDistance => 1.0,
                },
            ],
            ModelConfig::RandomForest { trees, mtry, min_samples_split, max_depth } => vec![
                max_depth.map_or(f64::INFINITY, |d| d as f64),
                -(*min_samples_split as f64),
                mtry.map_or(0.0, |m| m as f64),
                *trees as f64,
            ],
        }
    }

    pub fn cmp_complexity(&self, other: &ModelConfig) -> Ordering {
        let (a, b) = (self.complexity(), other.complexity());
        for (x, y) in a.iter().zip(&b) {
            match x.total_cmp(y) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        a.len().cmp(&b.len())
    }
}

impl fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self
            .params()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{}({})", self.family(), params.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_from_str_is_case_insensitive() {
        assert_eq!("KNN".parse::<ModelFamily>().unwrap(), ModelFamily::Knn);
        assert_eq!("random-forest".parse::<ModelFamily>().unwrap(), ModelFamily::RandomForest);
        assert!("svm".parse::<ModelFamily>().is_err());
    }

    #[test]
    fn from_params_overrides_defaults() {
        let mut p = BTreeMap::new();
        p.insert("neighbors".to_string(), ParamValue::Number(7.0));
        p.insert("weighting".to_string(), ParamValue::Text("inverse_distance".into()));
        let cfg = ModelConfig::from_params(ModelFamily::Knn, &p).unwrap();
        assert_eq!(
            cfg,
            ModelConfig::Knn { neighbors: 7, weighting: Weighting::InverseDistance }
        );
    }

    #[test]
    fn from_params_rejects_unknown_name() {
        let mut p = BTreeMap::new();
        p.insert("depth".to_string(), ParamValue::Number(3.0));
        let err = ModelConfig::from_params(ModelFamily::Knn, &p).unwrap_err();
        assert!(matches!(err, StaycastError::InvalidConfig(_)));
    }

    #[test]
    fn stronger_penalty_is_simpler() {
        let weak = ModelConfig::Lasso { penalty: 0.001, mixture: 1.0, max_iter: 100 };
        let strong = ModelConfig::Lasso { penalty: 0.1, mixture: 1.0, max_iter: 100 };
        assert_eq!(strong.cmp_complexity(&weak), Ordering::Less);
    }

    #[test]
    fn config_serializes_with_family_tag() {
        let cfg = ModelFamily::RandomForest.default_config();
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"family\":\"random_forest\""));
        let back: ModelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
