mod common;

use staycast_classifiers::config::{ModelConfig, ModelFamily};
use staycast_classifiers::cross_validation::CvConfig;
use staycast_classifiers::experiment::{explain, explanation_target, prepare, tune_all, ExperimentConfig};
use staycast_classifiers::explain::ExplainConfig;
use staycast_classifiers::search::ConfigSpace;

fn explicit(config: ModelConfig) -> ConfigSpace {
    ConfigSpace::Explicit { family: config.family(), configs: vec![config] }
}

fn experiment(searches: Vec<ConfigSpace>) -> ExperimentConfig {
    ExperimentConfig {
        cv: CvConfig { folds: 3, repeats: 1, seed: 11 },
        searches,
        explain: ExplainConfig { n_repeats: 2, max_reference: 30, n_explain: 5, ..Default::default() },
        ..Default::default()
    }
}

fn logistic() -> ModelConfig {
    ModelFamily::Logistic.default_config()
}

#[test]
fn test_forest_is_explained_when_tuned() {
    let data = common::synthetic_bookings(600, 5);
    let forest = ModelConfig::RandomForest { trees: 15, mtry: Some(3), min_samples_split: 10, max_depth: Some(5) };
    let cfg = experiment(vec![explicit(logistic()), explicit(forest)]);
    let prepared = prepare(&data, &cfg).unwrap();
    let bundles = tune_all(&prepared).unwrap();

    let target = explanation_target(&bundles).unwrap();
    assert_eq!(target.family, ModelFamily::RandomForest);
    let explanation = explain(&prepared, target).unwrap();
    let shapley = explanation.shapley.expect("tree model has Shapley values");
    assert_eq!(shapley.explanations.len(), 5);
}

#[test]
fn test_best_cv_tree_is_explained_without_forest() {
    let data = common::synthetic_bookings(400, 6);
    let shallow = ModelConfig::DecisionTree { max_depth: 1, min_samples_split: 2, min_samples_leaf: 1 };
    let cfg = experiment(vec![explicit(logistic()), explicit(shallow)]);
    let prepared = prepare(&data, &cfg).unwrap();
    let bundles = tune_all(&prepared).unwrap();

    let target = explanation_target(&bundles).unwrap();
    assert_eq!(target.family, ModelFamily::DecisionTree);
    assert!(explain(&prepared, target).unwrap().shapley.is_some());
}

#[test]
fn test_non_tree_models_fall_back_to_cv_mean() {
    let data = common::synthetic_bookings(300, 7);
    let knn = ModelConfig::Knn { neighbors: 9, weighting: staycast_classifiers::config::Weighting::Uniform };
    let cfg = experiment(vec![explicit(logistic()), explicit(knn)]);
    let prepared = prepare(&data, &cfg).unwrap();
    let bundles = tune_all(&prepared).unwrap();

    let best_cv = bundles.iter().map(|b| b.selected.mean).fold(f64::NEG_INFINITY, f64::max);
    let target = explanation_target(&bundles).unwrap();
    assert_eq!(target.selected.mean, best_cv);
    assert!(explanation_target(&[]).is_none());
}
