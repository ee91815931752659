//! Batch stages behind the `staycast` binary.
pub mod config;
pub mod stages;
