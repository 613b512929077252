// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all engine failures.
///
/// Numerical edge cases inside the dynamics are guarded, never raised;
/// non-convergence is a reported trace state, not an error.
#[derive(Error, Debug)]
pub enum HotcoError {
    /// Input value out of range or non-finite.
    #[error("validation error: {0}")]
    Validation(String),

    /// Named-key payload lacks a required entry.
    #[error("missing key `{key}` in `{section}`")]
    MissingKey { section: String, key: String },

    /// Batched tensor has the wrong length.
    #[error("shape error: {what} expected {expected} values, got {got}")]
    Shape {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Numerical error (NaN/Inf surfaced to a caller).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Passport or payload (de)serialisation failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Calibration loss diverged or received no data.
    #[error("calibration error: {0}")]
    Calibration(String),
}

pub type HotcoResult<T> = Result<T, HotcoError>;

impl From<serde_json::Error> for HotcoError {
    fn from(e: serde_json::Error) -> Self {
        HotcoError::Serialization(e.to_string())
    }
}
