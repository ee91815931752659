//! Classification metrics over predicted probabilities.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Metric used to score validation folds. Higher is better for every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    RocAuc,
    Accuracy,
}

impl Metric {
    pub fn score(&self, proba: &[f64], labels: &[bool]) -> f64 {
        match self {
            Metric::RocAuc => roc_auc(proba, labels),
            Metric::Accuracy => accuracy(proba, labels),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::RocAuc => f.write_str("roc_auc"),
            Metric::Accuracy => f.write_str("accuracy"),
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "roc_auc" | "auc" => Ok(Metric::RocAuc),
            "accuracy" => Ok(Metric::Accuracy),
            _ => Err(format!("Unknown metric: {}", s)),
        }
    }
}

/// Area under the ROC curve by the trapezoidal rule.
///
/// Tied scores contribute half credit. Returns 0.5 when only one class is
/// present, since the curve is undefined.
pub fn roc_auc(scores: &[f64], labels: &[bool]) -> f64 {
    let mut combined: Vec<(f64, bool)> = scores.iter().copied().zip(labels.iter().copied()).collect();
    combined.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total_pos = labels.iter().filter(|&&l| l).count() as f64;
    let total_neg = labels.len() as f64 - total_pos;
    if total_pos == 0.0 || total_neg == 0.0 {
        log::debug!("AUC undefined for a single-class sample of {}; using 0.5", labels.len());
        return 0.5;
    }

    let mut auc = 0.0;
    let (mut cum_pos, mut cum_neg) = (0.0, 0.0);
    let (mut prev_pos, mut prev_neg) = (0.0, 0.0);
    let mut prev_score = f64::NEG_INFINITY;

    for (score, label) in combined {
        if score != prev_score {
            auc += (cum_pos - prev_pos) * (cum_neg + prev_neg) / 2.0;
            prev_score = score;
            prev_pos = cum_pos;
            prev_neg = cum_neg;
        }
        if label {
            cum_pos += 1.0;
        } else {
            cum_neg += 1.0;
        }
    }
    auc += (total_pos - prev_pos) * (total_neg + prev_neg) / 2.0;

    auc / (total_pos * total_neg)
}

/// Share of rows whose 0.5-thresholded prediction matches the label.
pub fn accuracy(proba: &[f64], labels: &[bool]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let hits = proba
        .iter()
        .zip(labels)
        .filter(|&(&p, &l)| (p >= 0.5) == l)
        .count();
    hits as f64 / labels.len() as f64
}

/// Mean negative log-likelihood with probabilities clipped away from 0 and 1.
pub fn log_loss(proba: &[f64], labels: &[bool]) -> f64 {
    const EPS: f64 = 1e-15;
    if labels.is_empty() {
        return 0.0;
    }
    let total: f64 = proba
        .iter()
        .zip(labels)
        .map(|(&p, &l)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            if l {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    total / labels.len() as f64
}

/// One point of a ROC curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub false_positive_rate: f64,
    pub true_positive_rate: f64,
}

/// ROC curve points from the strictest threshold to the loosest.
pub fn roc_curve(scores: &[f64], labels: &[bool]) -> Vec<RocPoint> {
    let mut combined: Vec<(f64, bool)> = scores.iter().copied().zip(labels.iter().copied()).collect();
    combined.sort_by(|a, b| b.0.total_cmp(&a.0));
    let total_pos = labels.iter().filter(|&&l| l).count().max(1) as f64;
    let total_neg = labels.iter().filter(|&&l| !l).count().max(1) as f64;

    let mut points = vec![RocPoint {
        threshold: f64::INFINITY,
        false_positive_rate: 0.0,
        true_positive_rate: 0.0,
    }];
    let (mut tp, mut fp) = (0.0, 0.0);
    let mut i = 0;
    while i < combined.len() {
        let threshold = combined[i].0;
        while i < combined.len() && combined[i].0 == threshold {
            if combined[i].1 {
                tp += 1.0;
            } else {
                fp += 1.0;
            }
            i += 1;
        }
        points.push(RocPoint {
            threshold,
            false_positive_rate: fp / total_neg,
            true_positive_rate: tp / total_pos,
        });
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_and_inverted_auc() {
        let labels = [false, false, true, true];
        assert_eq!(roc_auc(&[0.1, 0.2, 0.8, 0.9], &labels), 1.0);
        assert_eq!(roc_auc(&[0.9, 0.8, 0.2, 0.1], &labels), 0.0);
    }

    #[test]
    fn ties_get_half_credit() {
        let labels = [false, true];
        assert_eq!(roc_auc(&[0.5, 0.5], &labels), 0.5);
        // one positive above both negatives, one tied with a negative
        let labels = [false, false, true, true];
        let auc = roc_auc(&[0.1, 0.6, 0.6, 0.9], &labels);
        assert!((auc - 0.875).abs() < 1e-12, "auc = {}", auc);
    }

    #[test]
    fn single_class_auc_is_half() {
        assert_eq!(roc_auc(&[0.1, 0.9], &[true, true]), 0.5);
    }

    #[test]
    fn accuracy_and_log_loss() {
        let labels = [true, false, true];
        assert!((accuracy(&[0.9, 0.4, 0.3], &labels) - 2.0 / 3.0).abs() < 1e-12);
        assert!(log_loss(&[1.0, 0.0, 1.0], &labels) < 1e-10);
    }

    #[test]
    fn roc_curve_ends_at_one_one() {
        let pts = roc_curve(&[0.2, 0.7, 0.7, 0.9], &[false, true, false, true]);
        let last = pts.last().unwrap();
        assert_eq!((last.false_positive_rate, last.true_positive_rate), (1.0, 1.0));
        assert_eq!(pts.len(), 4);
    }
}
