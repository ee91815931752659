use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::Result;
use crate::models::classifier_trait::{ClassifierModel, TreeEnsemble};
use crate::models::decision_tree::DecisionTree;
use crate::models::knn::KNearestNeighbors;
use crate::models::logistic::LogisticRegression;
use crate::models::random_forest::RandomForest;

/// A fitted or unfitted estimator of any supported family.
///
/// Kept as an enum rather than a trait object so final models can be
/// serialized into model bundles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Classifier {
    Logistic(LogisticRegression),
    DecisionTree(DecisionTree),
    Knn(KNearestNeighbors),
    RandomForest(RandomForest),
}

/// Build an unfitted classifier from a `ModelConfig`. `seed` drives the
/// randomized families and is ignored by the others.
pub fn build_model(config: &ModelConfig, seed: u64) -> Classifier {
    match config {
        ModelConfig::Logistic { max_iter, tolerance } => {
            Classifier::Logistic(LogisticRegression::new(*max_iter, *tolerance))
        }
        ModelConfig::Lasso { penalty, mixture, max_iter } => {
            Classifier::Logistic(LogisticRegression::lasso(*penalty, *mixture, *max_iter))
        }
        ModelConfig::DecisionTree { max_depth, min_samples_split, min_samples_leaf } => Classifier::DecisionTree(
            DecisionTree::new()
                .with_max_depth(Some(*max_depth))
                .with_min_samples_split(*min_samples_split)
                .with_min_samples_leaf(*min_samples_leaf)
                .with_seed(seed),
        ),
        ModelConfig::Knn { neighbors, weighting } => {
            Classifier::Knn(KNearestNeighbors::new(*neighbors, *weighting))
        }
        ModelConfig::RandomForest { trees, mtry, min_samples_split, max_depth } => Classifier::RandomForest(
            RandomForest::new(*trees, *mtry, *min_samples_split, *max_depth, seed),
        ),
    }
}

impl Classifier {
    fn inner(&self) -> &dyn ClassifierModel {
        match self {
            Classifier::Logistic(m) => m,
            Classifier::DecisionTree(m) => m,
            Classifier::Knn(m) => m,
            Classifier::RandomForest(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ClassifierModel {
        match self {
            Classifier::Logistic(m) => m,
            Classifier::DecisionTree(m) => m,
            Classifier::Knn(m) => m,
            Classifier::RandomForest(m) => m,
        }
    }

    /// Tree view of the model, when it has one.
    pub fn as_tree_ensemble(&self) -> Option<&dyn TreeEnsemble> {
        match self {
            Classifier::DecisionTree(m) => Some(m),
            Classifier::RandomForest(m) => Some(m),
            _ => None,
        }
    }
}

impl ClassifierModel for Classifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[bool]) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        self.inner().predict_proba(x)
    }

    fn name(&self) -> &str {
        self.inner().name()
    }
}
