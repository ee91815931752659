//! staycast-classifiers: cancellation modeling for hotel-booking data.
//!
//! This crate provides the cleaning and ingestion helpers for the raw
//! booking export, a fit-once preprocessing recipe, natively implemented
//! classifiers (logistic, lasso, decision tree, k-nearest-neighbors, random
//! forest), a repeated stratified cross-validation harness with grid and
//! Latin-hypercube hyperparameter search, and an explanation layer
//! (permutation importance and interventional Shapley values).
//!
//! Every randomized step takes an explicit seed so that a full experiment is
//! reproducible end to end.
pub mod config;
pub mod cross_validation;
pub mod data_handling;
pub mod error;
pub mod experiment;
pub mod explain;
pub mod io;
pub mod metrics;
pub mod models;
pub mod preprocessing;
pub mod report;
pub mod search;
