use std::fs;

use staycast_classifiers::config::ModelFamily;
use staycast_classifiers::experiment::ExperimentConfig;
use staycast_cli::config::{load_experiment_config, resolve_config};
use tempfile::tempdir;

#[test]
fn test_load_partial_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{ "cleaning": { "max_adr": 1000.0 }, "model_seed": 7,
             "searches": [ { "kind": "explicit", "family": "logistic",
                             "configs": [ { "family": "logistic", "max_iter": 50, "tolerance": 1e-6 } ] } ] }"#,
    )
    .unwrap();

    let config = load_experiment_config(&path).unwrap();
    assert_eq!(config.cleaning.max_adr, 1000.0);
    assert!(config.cleaning.drop_duplicates);
    assert_eq!(config.model_seed, 7);
    assert_eq!(config.families(), vec![ModelFamily::Logistic]);
    assert_eq!(config.cv, ExperimentConfig::default().cv);
}

#[test]
fn test_malformed_config_names_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ \"cv\": ").unwrap();
    let err = load_experiment_config(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("broken.json"));
}

#[test]
fn test_resolve_without_path_uses_defaults() {
    let config = resolve_config(None::<&str>).unwrap();
    assert_eq!(config, ExperimentConfig::default());
}
