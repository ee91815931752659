use staycast_classifiers::config::{ModelConfig, ModelFamily, Weighting};
use staycast_classifiers::experiment::ExperimentConfig;
use staycast_classifiers::metrics::Metric;
use staycast_classifiers::preprocessing::CollapseThreshold;
use staycast_classifiers::search::ConfigSpace;

#[test]
fn test_default_experiment_config_round_trips() {
    let cfg = ExperimentConfig::default();
    let json = serde_json::to_string_pretty(&cfg).unwrap();
    let back: ExperimentConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn test_partial_config_fills_defaults() {
    let json = r#"{
        "cv": { "folds": 10, "repeats": 2 },
        "metric": "accuracy",
        "recipe": { "collapse": { "fraction": 0.01 } },
        "forest_override": {
            "family": "random_forest",
            "trees": 500,
            "mtry": 4,
            "min_samples_split": 5,
            "max_depth": null
        }
    }"#;
    let cfg: ExperimentConfig = serde_json::from_str(json).unwrap();
    assert_eq!(cfg.cv.folds, 10);
    assert_eq!(cfg.cv.repeats, 2);
    assert_eq!(cfg.cv.seed, 2024);
    assert_eq!(cfg.metric, Metric::Accuracy);
    assert_eq!(cfg.recipe.collapse, CollapseThreshold::Fraction(0.01));
    assert_eq!(cfg.split.test_fraction, 0.25);
    assert_eq!(cfg.searches.len(), ModelFamily::ALL.len());
    assert_eq!(
        cfg.forest_override,
        Some(ModelConfig::RandomForest { trees: 500, mtry: Some(4), min_samples_split: 5, max_depth: None })
    );
}

#[test]
fn test_search_spaces_from_json() {
    let json = r#"[
        { "kind": "grid", "family": "knn",
          "params": { "neighbors": [5, 11], "weighting": ["uniform", "inverse_distance"] } },
        { "kind": "latin_hypercube", "family": "lasso", "size": 4, "seed": 1,
          "params": { "penalty": { "low": 0.0001, "high": 1.0, "scale": "log10" } } },
        { "kind": "explicit", "family": "decision_tree",
          "configs": [ { "family": "decision_tree", "max_depth": 3, "min_samples_split": 20, "min_samples_leaf": 10 } ] }
    ]"#;
    let spaces: Vec<ConfigSpace> = serde_json::from_str(json).unwrap();
    assert_eq!(spaces.len(), 3);

    let knn = spaces[0].candidates().unwrap();
    assert_eq!(knn.len(), 4);
    assert_eq!(knn[3], ModelConfig::Knn { neighbors: 11, weighting: Weighting::InverseDistance });

    let lasso = spaces[1].candidates().unwrap();
    assert_eq!(lasso.len(), 4);
    for c in &lasso {
        match c {
            ModelConfig::Lasso { penalty, mixture, .. } => {
                assert!((1e-4..=1.0).contains(penalty));
                assert_eq!(*mixture, 1.0);
            }
            other => panic!("unexpected {}", other),
        }
    }

    assert_eq!(spaces[2].family(), ModelFamily::DecisionTree);
    assert_eq!(spaces[2].candidates().unwrap().len(), 1);
}

#[test]
fn test_unknown_parameter_is_rejected() {
    let json = r#"{ "kind": "grid", "family": "knn", "params": { "depth": [3] } }"#;
    let space: ConfigSpace = serde_json::from_str(json).unwrap();
    assert!(space.candidates().is_err());
}

#[test]
fn test_family_names_parse() {
    for family in ModelFamily::ALL {
        assert_eq!(family.as_str().parse::<ModelFamily>().unwrap(), family);
    }
    assert_eq!("RF".parse::<ModelFamily>().unwrap(), ModelFamily::RandomForest);
    assert!("svm".parse::<ModelFamily>().is_err());
}
