//! Rare-level collapsing and one-hot encoding for categorical features.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StaycastError};

/// Level that absorbs rare and unseen categories.
pub const OTHER_LEVEL: &str = "other";

/// Minimum occurrence a level needs in the training data to keep its own
/// indicator column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollapseThreshold {
    /// At least this many training rows.
    Count(usize),
    /// At least this share of training rows.
    Fraction(f64),
}

impl Default for CollapseThreshold {
    fn default() -> Self {
        CollapseThreshold::Count(100)
    }
}

impl CollapseThreshold {
    pub fn min_count(&self, n_rows: usize) -> Result<usize> {
        match *self {
            CollapseThreshold::Count(n) => Ok(n),
            CollapseThreshold::Fraction(p) if p > 0.0 && p <= 1.0 => {
                Ok((p * n_rows as f64).ceil() as usize)
            }
            CollapseThreshold::Fraction(p) => Err(StaycastError::InvalidConfig(format!(
                "collapse fraction must lie in (0, 1], got {}",
                p
            ))),
        }
    }
}

/// Learned collapse rule for one feature: which levels survive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCollapse {
    pub feature: String,
    /// Surviving levels, sorted.
    pub kept: Vec<String>,
}

impl CategoryCollapse {
    pub fn fit(feature: &str, values: &[String], min_count: usize) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for v in values {
            *counts.entry(v.as_str()).or_default() += 1;
        }
        let kept: Vec<String> = counts
            .iter()
            .filter(|&(level, &n)| n >= min_count && *level != OTHER_LEVEL)
            .map(|(level, _)| level.to_string())
            .collect();
        log::debug!(
            "Feature '{}': kept {} of {} levels (min count {})",
            feature,
            kept.len(),
            counts.len(),
            min_count
        );
        Self { feature: feature.to_string(), kept }
    }

    /// Map a raw level to its collapsed level.
    pub fn apply<'a>(&'a self, level: &'a str) -> &'a str {
        match self.kept.binary_search_by(|k| k.as_str().cmp(level)) {
            Ok(_) => level,
            Err(_) => OTHER_LEVEL,
        }
    }
}

/// Full one-hot table: one indicator column per level, no reference level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub feature: String,
    pub levels: Vec<String>,
}

impl OneHotEncoder {
    /// Levels from a collapse rule; `other` is always present and last.
    pub fn from_collapse(collapse: &CategoryCollapse) -> Self {
        let mut levels = collapse.kept.clone();
        levels.push(OTHER_LEVEL.to_string());
        Self { feature: collapse.feature.clone(), levels }
    }

    pub fn with_levels(feature: &str, levels: Vec<String>) -> Self {
        Self { feature: feature.to_string(), levels }
    }

    pub fn width(&self) -> usize {
        self.levels.len()
    }

    pub fn index_of(&self, level: &str) -> Option<usize> {
        self.levels.iter().position(|l| l == level)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.levels
            .iter()
            .map(|l| format!("{}_{}", self.feature, l))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(spec: &[(&str, usize)]) -> Vec<String> {
        spec.iter()
            .flat_map(|(l, n)| std::iter::repeat(l.to_string()).take(*n))
            .collect()
    }

    #[test]
    fn rare_levels_collapse_to_other() {
        let values = levels(&[("A", 400), ("B", 50), ("C", 3)]);
        let rule = CategoryCollapse::fit("room", &values, 100);
        assert_eq!(rule.kept, vec!["A".to_string()]);
        assert_eq!(rule.apply("A"), "A");
        assert_eq!(rule.apply("B"), OTHER_LEVEL);
        assert_eq!(rule.apply("C"), OTHER_LEVEL);
        assert_eq!(rule.apply("never-seen"), OTHER_LEVEL);

        let enc = OneHotEncoder::from_collapse(&rule);
        assert_eq!(enc.column_names(), vec!["room_A", "room_other"]);
    }

    #[test]
    fn fraction_threshold_rounds_up() {
        assert_eq!(CollapseThreshold::Fraction(0.01).min_count(250).unwrap(), 3);
        assert!(CollapseThreshold::Fraction(0.0).min_count(10).is_err());
    }

    #[test]
    fn literal_other_level_is_not_duplicated() {
        let values = levels(&[("other", 200), ("X", 200)]);
        let rule = CategoryCollapse::fit("f", &values, 100);
        let enc = OneHotEncoder::from_collapse(&rule);
        assert_eq!(enc.levels, vec!["X".to_string(), "other".to_string()]);
    }
}
