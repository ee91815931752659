//! Repeated stratified k-fold assignments.
//!
//! Each repeat is an independent partition of the row indices into `k`
//! validation groups. Within a stratum, rows are shuffled and dealt out
//! round-robin, continuing the deal across strata, so group sizes differ by at
//! most one and each group's share of every stratum is within one row of the
//! overall share.
use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::data_handling::Dataset;
use crate::error::{Result, StaycastError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CvConfig {
    pub folds: usize,
    pub repeats: usize,
    pub seed: u64,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self {
            folds: 5,
            repeats: 1,
            seed: 2024,
        }
    }
}

/// One (train, validation) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvSplit {
    pub repeat: usize,
    pub fold: usize,
    pub train_indices: Vec<usize>,
    pub validation_indices: Vec<usize>,
}

impl CvSplit {
    pub fn id(&self) -> String {
        format!("Repeat{}/Fold{}", self.repeat + 1, self.fold + 1)
    }
}

/// All splits of a repeated k-fold scheme, ordered by repeat then fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldSets {
    pub k: usize,
    pub repeats: usize,
    pub seed: u64,
    pub n_rows: usize,
    pub splits: Vec<CvSplit>,
}

impl FoldSets {
    pub fn len(&self) -> usize {
        self.splits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CvSplit> {
        self.splits.iter()
    }

    /// Splits belonging to one repeat.
    pub fn repeat(&self, r: usize) -> impl Iterator<Item = &CvSplit> {
        self.splits.iter().filter(move |s| s.repeat == r)
    }
}

/// Stratified on the dataset label.
pub fn make_folds(dataset: &Dataset, cfg: &CvConfig) -> Result<FoldSets> {
    make_folds_stratified(dataset.labels(), cfg.folds, cfg.repeats, cfg.seed)
}

/// Build `repeats` stratified partitions of `0..strata.len()` into `k`
/// groups. Repeat `r` is shuffled by a generator seeded with `seed + r`, so
/// the same inputs always give the same folds.
pub fn make_folds_stratified<K: Ord + Clone>(
    strata: &[K],
    k: usize,
    repeats: usize,
    seed: u64,
) -> Result<FoldSets> {
    let n = strata.len();
    if k < 2 {
        return Err(StaycastError::InvalidConfig(format!("need at least 2 folds, got {}", k)));
    }
    if k > n {
        return Err(StaycastError::InvalidConfig(format!(
            "cannot make {} folds from {} rows",
            k, n
        )));
    }
    if repeats == 0 {
        return Err(StaycastError::InvalidConfig("repeats must be positive".to_string()));
    }

    let mut groups: BTreeMap<K, Vec<usize>> = BTreeMap::new();
    for (i, key) in strata.iter().enumerate() {
        groups.entry(key.clone()).or_default().push(i);
    }
    for members in groups.values() {
        if members.len() < k {
            log::warn!(
                "A stratum has {} rows, fewer than {} folds; some folds will not contain it",
                members.len(),
                k
            );
        }
    }
    log::info!(
        "Creating {} x {}-fold stratified splits over {} rows (seed {})",
        repeats,
        k,
        n,
        seed
    );

    let mut splits = Vec::with_capacity(k * repeats);
    for r in 0..repeats {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(r as u64));
        let mut assignment = vec![0usize; n];
        let mut dealt = 0usize;
        for members in groups.values() {
            let mut shuffled = members.clone();
            shuffled.shuffle(&mut rng);
            for idx in shuffled {
                assignment[idx] = dealt % k;
                dealt += 1;
            }
        }
        for fold in 0..k {
            let (validation_indices, train_indices): (Vec<usize>, Vec<usize>) =
                (0..n).partition(|&i| assignment[i] == fold);
            log::trace!(
                "Repeat{}/Fold{}: {} train, {} validation",
                r + 1,
                fold + 1,
                train_indices.len(),
                validation_indices.len()
            );
            splits.push(CvSplit {
                repeat: r,
                fold,
                train_indices,
                validation_indices,
            });
        }
    }

    Ok(FoldSets { k, repeats, seed, n_rows: n, splits })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_settings() {
        let labels = vec![true, false, true];
        assert!(make_folds_stratified(&labels, 1, 1, 0).is_err());
        assert!(make_folds_stratified(&labels, 4, 1, 0).is_err());
        assert!(make_folds_stratified(&labels, 2, 0, 0).is_err());
    }

    #[test]
    fn split_ids_are_one_based() {
        let labels = vec![true, false, true, false];
        let folds = make_folds_stratified(&labels, 2, 2, 5).unwrap();
        assert_eq!(folds.len(), 4);
        assert_eq!(folds.splits[3].id(), "Repeat2/Fold2");
        assert_eq!(folds.repeat(1).count(), 2);
    }
}
