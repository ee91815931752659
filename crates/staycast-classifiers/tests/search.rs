mod common;

use staycast_classifiers::config::{ModelConfig, ModelFamily, Weighting};
use staycast_classifiers::cross_validation::{make_folds, CvConfig};
use staycast_classifiers::error::StaycastError;
use staycast_classifiers::metrics::Metric;
use staycast_classifiers::preprocessing::Recipe;
use staycast_classifiers::search::{refit, search, select_best, CandidateScore, ConfigSpace};

fn knn(neighbors: usize) -> ModelConfig {
    ModelConfig::Knn { neighbors, weighting: Weighting::Uniform }
}

fn plain_recipe() -> Recipe {
    Recipe { binarize: None, ..Default::default() }
}

#[test]
fn test_failing_configuration_is_excluded() {
    let data = common::separable(60);
    let folds = make_folds(&data, &CvConfig { folds: 2, repeats: 1, seed: 3 }).unwrap();
    let space = ConfigSpace::Explicit {
        family: ModelFamily::Knn,
        configs: vec![knn(3), knn(10_000), knn(5)],
    };

    let result = search(&plain_recipe(), &data, &folds, &space, Metric::RocAuc, 0).unwrap();

    let mut indices: Vec<usize> = result.ranked.iter().map(|c| c.index).collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![0, 2]);
    assert!(result.ranked.iter().all(|c| c.fold_scores.len() == 2));

    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].index, 1);
    assert_eq!(result.failures[0].config, knn(10_000));
    assert_eq!(result.n_candidates(), 3);
}

#[test]
fn test_all_failures_exhaust_the_search() {
    let data = common::separable(40);
    let folds = make_folds(&data, &CvConfig { folds: 2, repeats: 1, seed: 3 }).unwrap();
    let space = ConfigSpace::Explicit {
        family: ModelFamily::Knn,
        configs: vec![knn(500), knn(0)],
    };
    let err = search(&plain_recipe(), &data, &folds, &space, Metric::RocAuc, 0).unwrap_err();
    assert!(matches!(err, StaycastError::SearchExhausted(2)));
}

#[test]
fn test_recipe_errors_abort_the_search() {
    let data = common::separable(40);
    let folds = make_folds(&data, &CvConfig { folds: 2, repeats: 1, seed: 3 }).unwrap();
    let space = ConfigSpace::Explicit { family: ModelFamily::Knn, configs: vec![knn(3)] };
    // default recipe binarizes a feature this dataset does not have
    let err = search(&Recipe::default(), &data, &folds, &space, Metric::RocAuc, 0).unwrap_err();
    assert!(matches!(err, StaycastError::Schema(_)));
}

#[test]
fn test_search_is_deterministic() {
    let data = common::synthetic_bookings(240, 21);
    let folds = make_folds(&data, &CvConfig { folds: 3, repeats: 2, seed: 8 }).unwrap();
    let space = ConfigSpace::Explicit {
        family: ModelFamily::RandomForest,
        configs: vec![
            ModelConfig::RandomForest { trees: 15, mtry: Some(3), min_samples_split: 10, max_depth: Some(5) },
            ModelConfig::RandomForest { trees: 15, mtry: None, min_samples_split: 4, max_depth: None },
        ],
    };
    let a = search(&Recipe::default(), &data, &folds, &space, Metric::RocAuc, 11).unwrap();
    let b = search(&Recipe::default(), &data, &folds, &space, Metric::RocAuc, 11).unwrap();
    assert_eq!(a, b);
    assert!(a.ranked.iter().all(|c| c.fold_scores.len() == 6));
}

#[test]
fn test_models_beat_chance_on_synthetic_bookings() {
    let data = common::synthetic_bookings(400, 12);
    let folds = make_folds(&data, &CvConfig { folds: 4, repeats: 1, seed: 2 }).unwrap();
    for family in ModelFamily::ALL {
        let space = ConfigSpace::Explicit { family, configs: vec![family.default_config()] };
        let result = search(&Recipe::default(), &data, &folds, &space, Metric::RocAuc, 5).unwrap();
        let best = select_best(&result.ranked).unwrap();
        assert!(best.mean > 0.6, "{} mean AUC {}", family, best.mean);
    }
}

#[test]
fn test_select_best_tie_breaks_on_complexity_then_index() {
    let score = |index: usize, config: ModelConfig, mean: f64| CandidateScore {
        index,
        config,
        mean,
        std_err: 0.0,
        fold_scores: vec![mean, mean],
    };
    let tree = |depth: usize| ModelConfig::DecisionTree {
        max_depth: depth,
        min_samples_split: 10,
        min_samples_leaf: 5,
    };

    let ranked = vec![score(0, tree(8), 0.81), score(1, tree(3), 0.81), score(2, tree(2), 0.79)];
    assert_eq!(select_best(&ranked).unwrap().index, 1);

    let same = vec![score(4, tree(3), 0.81), score(1, tree(3), 0.81)];
    assert_eq!(select_best(&same).unwrap().index, 1);

    assert!(matches!(select_best(&[]), Err(StaycastError::SearchExhausted(_))));
}

#[test]
fn test_refit_override_is_explicit() {
    let data = common::synthetic_bookings(200, 6);
    let selected = ModelConfig::RandomForest { trees: 10, mtry: None, min_samples_split: 10, max_depth: None };
    let hand_picked = ModelConfig::RandomForest { trees: 20, mtry: Some(2), min_samples_split: 5, max_depth: Some(6) };

    let plain = refit(&Recipe::default(), &data, &selected, None, 1).unwrap();
    assert_eq!(plain.config, selected);
    assert!(plain.overridden_from.is_none());

    let overridden = refit(&Recipe::default(), &data, &selected, Some(&hand_picked), 1).unwrap();
    assert_eq!(overridden.config, hand_picked);
    assert_eq!(overridden.overridden_from, Some(selected.clone()));
    assert_eq!(overridden.predict_proba(&data).unwrap().len(), data.n_rows());

    let wrong_family = ModelFamily::Knn.default_config();
    let err = refit(&Recipe::default(), &data, &selected, Some(&wrong_family), 1).unwrap_err();
    assert!(matches!(err, StaycastError::InvalidConfig(_)));
}
