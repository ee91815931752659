//! One module per CLI stage. Each stage reads the previous stage's
//! artifacts from disk and writes its own.
pub mod clean;
pub mod compare;
pub mod explain;
pub mod prepare;
pub mod run;
pub mod tune;

use std::path::{Path, PathBuf};

/// `dir/<stem>_<suffix>` for a file next to `path`.
pub(crate) fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "staycast".to_string());
    path.with_file_name(format!("{}_{}", stem, suffix))
}
