mod common;

use staycast_classifiers::data_handling::{Dataset, FeatureSpec, Record, Schema};
use staycast_classifiers::error::StaycastError;
use staycast_classifiers::preprocessing::{BinarizeSpec, CollapseThreshold, CutpointRule, Recipe};

fn level_dataset(counts: &[(&str, usize)]) -> Dataset {
    let schema = Schema::new(vec![FeatureSpec::categorical("level")]).unwrap();
    let records: Vec<Record> = counts
        .iter()
        .flat_map(|&(level, n)| (0..n).map(move |i| Record::new(i % 2 == 0).with("level", level)))
        .collect();
    Dataset::from_records(schema, &records).unwrap()
}

fn categorical_only() -> Recipe {
    Recipe { binarize: None, ..Default::default() }
}

#[test]
fn test_rare_levels_collapse_to_other() {
    let train = level_dataset(&[("A", 400), ("B", 50), ("C", 3)]);
    let recipe = Recipe { collapse: CollapseThreshold::Count(100), ..categorical_only() };
    let fitted = recipe.fit(&train).unwrap();
    assert_eq!(fitted.feature_names(), ["level_A", "level_other"]);

    // a dataset holding only the rare level still yields the full block
    let only_c = level_dataset(&[("C", 1)]);
    let x = fitted.transform(&only_c).unwrap();
    assert_eq!(x.shape(), &[1, 2]);
    assert_eq!(x[[0, 0]], 0.0);
    assert_eq!(x[[0, 1]], 1.0);

    // unseen levels also land in "other"
    let unseen = level_dataset(&[("Z", 2)]);
    let x = fitted.transform(&unseen).unwrap();
    assert_eq!(x.column(1).sum(), 2.0);
}

#[test]
fn test_column_count_independent_of_levels_present() {
    let train = common::synthetic_bookings(400, 11);
    let fitted = Recipe::default().fit(&train).unwrap();
    let x = fitted.transform(&train).unwrap();
    assert_eq!(x.ncols(), fitted.n_columns());
    assert!(x.iter().all(|v| v.is_finite()));

    let city_rows: Vec<usize> = (0..train.n_rows())
        .filter(|&i| train.column("hotel").map(|c| c.value(i)) == Some("City Hotel".into()))
        .take(5)
        .collect();
    let subset = train.select_rows(&city_rows);
    let xs = fitted.transform(&subset).unwrap();
    assert_eq!(xs.ncols(), fitted.n_columns());
    assert_eq!(xs.nrows(), city_rows.len());
}

#[test]
fn test_transform_is_deterministic() {
    let train = common::synthetic_bookings(300, 5);
    let fitted = Recipe::default().fit(&train).unwrap();
    let a = fitted.transform(&train).unwrap();
    let b = fitted.transform(&train).unwrap();
    assert_eq!(a, b);
    // bit-identical, not just approximately equal
    assert!(a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits()));
}

#[test]
fn test_numeric_columns_are_standardized() {
    let train = common::synthetic_bookings(500, 8);
    let fitted = Recipe::default().fit(&train).unwrap();
    let x = fitted.transform(&train).unwrap();
    let j = fitted.feature_names().iter().position(|n| n == "lead_time").unwrap();
    let col = x.column(j);
    let mean = col.sum() / col.len() as f64;
    let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (col.len() as f64 - 1.0);
    assert!(mean.abs() < 1e-9, "mean = {}", mean);
    assert!((var - 1.0).abs() < 1e-9, "var = {}", var);

    // indicators are left as 0/1 by default
    let k = fitted.feature_names().iter().position(|n| n == "deposit_type_No Deposit").unwrap();
    assert!(x.column(k).iter().all(|&v| v == 0.0 || v == 1.0));
}

#[test]
fn test_binarized_feature_uses_fit_time_cutpoint() {
    let train = common::synthetic_bookings(300, 2);
    let fitted = Recipe::default().fit(&train).unwrap();
    let names = fitted.feature_names();
    assert!(names.contains(&"previous_cancellations_none".to_string()));
    assert!(names.contains(&"previous_cancellations_some".to_string()));
    assert!(!names.contains(&"previous_cancellations".to_string()));

    let recipe = Recipe {
        binarize: Some(BinarizeSpec {
            feature: "lead_time".to_string(),
            rule: CutpointRule::TrainingMedian,
            absent_label: "short".to_string(),
            present_label: "long".to_string(),
        }),
        ..Default::default()
    };
    let fitted = recipe.fit(&train).unwrap();
    let x = fitted.transform(&train).unwrap();
    let long = fitted.feature_names().iter().position(|n| n == "lead_time_long").unwrap();
    let n_long = x.column(long).sum() as usize;
    // at most half the rows sit strictly above the median
    assert!(n_long <= train.n_rows() / 2 + 1);
}

#[test]
fn test_zero_variance_column_maps_to_zero() {
    let schema = Schema::new(vec![FeatureSpec::numeric("flat"), FeatureSpec::numeric("x")]).unwrap();
    let records: Vec<Record> = (0..10)
        .map(|i| Record::new(i % 2 == 0).with("flat", 3.0).with("x", i as f64))
        .collect();
    let data = Dataset::from_records(schema, &records).unwrap();
    let fitted = Recipe { binarize: None, ..Default::default() }.fit(&data).unwrap();
    let x = fitted.transform(&data).unwrap();
    assert!(x.column(0).iter().all(|&v| v == 0.0));
}

#[test]
fn test_schema_errors() {
    let train = common::synthetic_bookings(50, 1);

    let missing = Recipe {
        predictors: vec![FeatureSpec::numeric("total_nights")],
        binarize: None,
        ..Default::default()
    };
    assert!(matches!(missing.fit(&train), Err(StaycastError::Schema(_))));

    let wrong_kind = Recipe {
        predictors: vec![FeatureSpec::numeric("hotel")],
        binarize: None,
        ..Default::default()
    };
    assert!(matches!(wrong_kind.fit(&train), Err(StaycastError::Schema(_))));

    let bad_binarize = Recipe {
        binarize: Some(BinarizeSpec::fixed("hotel", 0.0)),
        ..Default::default()
    };
    assert!(matches!(bad_binarize.fit(&train), Err(StaycastError::Schema(_))));

    // transform against a dataset lacking a fitted feature
    let fitted = Recipe::default().fit(&train).unwrap();
    let other = common::separable(10);
    assert!(matches!(fitted.transform(&other), Err(StaycastError::Schema(_))));
}

#[test]
fn test_non_finite_values_are_degenerate() {
    let schema = Schema::new(vec![FeatureSpec::numeric("adr")]).unwrap();
    let records = vec![
        Record::new(true).with("adr", 10.0),
        Record::new(false).with("adr", f64::NAN),
    ];
    let data = Dataset::from_records(schema, &records).unwrap();
    let err = Recipe { binarize: None, ..Default::default() }.fit(&data).unwrap_err();
    assert!(matches!(err, StaycastError::DegenerateFeature { ref feature, .. } if feature == "adr"));
}

#[test]
fn test_colliding_indicator_names_are_rejected() {
    // `a` + level `b_c` and `a_b` + level `c` would both produce `a_b_c`
    let schema = Schema::new(vec![FeatureSpec::categorical("a"), FeatureSpec::categorical("a_b")]).unwrap();
    let records: Vec<Record> = (0..10)
        .map(|i| Record::new(i % 2 == 0).with("a", "b_c").with("a_b", "c"))
        .collect();
    let data = Dataset::from_records(schema, &records).unwrap();

    let recipe = Recipe { collapse: CollapseThreshold::Count(1), ..categorical_only() };
    let err = recipe.fit(&data).unwrap_err();
    assert!(matches!(err, StaycastError::Schema(ref msg) if msg.contains("a_b_c")), "{}", err);

    // distinct names fit fine
    let schema = Schema::new(vec![FeatureSpec::categorical("a"), FeatureSpec::categorical("b")]).unwrap();
    let records: Vec<Record> = (0..10).map(|i| Record::new(i % 2 == 0).with("a", "x").with("b", "x")).collect();
    let data = Dataset::from_records(schema, &records).unwrap();
    assert_eq!(recipe.fit(&data).unwrap().n_columns(), 4);
}
