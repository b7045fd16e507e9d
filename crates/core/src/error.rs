//! Error taxonomy for the measurement engine
//!
//! Every failure is a caller precondition violation. Nothing here is
//! transient and nothing is retried internally.

use crate::ledger::EntryId;

/// Errors returned by calibration, region, calculator and ledger operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeasureError {
    /// Zero-length segment, fewer than 3 polygon points, coincident angle vectors
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("unknown unit: {0:?}")]
    UnknownUnit(String),

    /// Text looked like a calibration label but could not be read
    #[error("unparsable calibration annotation: {0}")]
    UnparsableAnnotation(String),

    #[error("no active calibration")]
    NoActiveCalibration,

    /// Non-positive or non-finite distance, height, size or correction factor
    #[error("invalid numeric input: {0}")]
    InvalidNumericInput(String),

    #[error("ledger entry not found: {0}")]
    EntryNotFound(EntryId),
}

pub type MeasureResult<T> = Result<T, MeasureError>;

/// Reject values that are not finite and strictly positive.
pub(crate) fn require_positive(value: f64, what: &str) -> MeasureResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(MeasureError::InvalidNumericInput(format!(
            "{what} must be a positive number, got {value}"
        )))
    }
}
