//! Fit-once, reapply-many feature engineering.
//!
//! `Recipe` declares the predictors and transformation rules. `Recipe::fit`
//! learns everything data-dependent from a training `Dataset` and returns an
//! immutable `FittedRecipe`, whose `transform` is a pure function of its input.
pub mod encoding;
pub mod recipe;
pub mod scaler;

pub use encoding::{CategoryCollapse, CollapseThreshold, OneHotEncoder, OTHER_LEVEL};
pub use recipe::{BinarizeSpec, CutpointRule, FittedRecipe, Recipe};
pub use scaler::{fit_scaler, fit_transform, transform_all, Scaler};
