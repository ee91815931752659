use thiserror::Error;

/// Errors raised by the modeling workflow.
///
/// `Schema` and `SearchExhausted` are fatal to the stage that raised them.
/// `FitFailure` is recovered by the search harness, which records the failing
/// configuration and moves on.
#[derive(Debug, Error)]
pub enum StaycastError {
    #[error("schema error: {0}")]
    Schema(String),

    #[error("degenerate feature '{feature}': {reason}")]
    DegenerateFeature { feature: String, reason: String },

    #[error("model fit failed: {0}")]
    FitFailure(String),

    #[error("all {0} candidate configurations failed to fit")]
    SearchExhausted(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StaycastError {
    pub fn schema(msg: impl Into<String>) -> Self {
        StaycastError::Schema(msg.into())
    }

    pub fn fit(msg: impl Into<String>) -> Self {
        StaycastError::FitFailure(msg.into())
    }

    pub fn degenerate(feature: impl Into<String>, reason: impl Into<String>) -> Self {
        StaycastError::DegenerateFeature {
            feature: feature.into(),
            reason: reason.into(),
        }
    }

    /// True for errors the search harness treats as a per-configuration failure.
    pub fn is_fit_failure(&self) -> bool {
        matches!(self, StaycastError::FitFailure(_))
    }
}

pub type Result<T> = std::result::Result<T, StaycastError>;
