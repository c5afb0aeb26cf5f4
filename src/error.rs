//! Error types for the banded blocked QR factorization

use thiserror::Error;

/// Main error type for banded QR operations
#[derive(Error, Debug, Clone)]
pub enum QrError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("numerical error: {0}")]
    NumericalError(String),

    #[error("factorization has not been run yet - call factorize() first")]
    NotInitialized,
}

/// Result type for banded QR operations
pub type QrResult<T> = Result<T, QrError>;

/// Coarse status mirrored by [`QrError`], exposed through `info()` for callers
/// that prefer to check a status code rather than match on the error enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrInfo {
    Success,
    NumericalError,
    InvalidInput,
    NotInitialized,
}

impl From<&QrError> for QrInfo {
    fn from(e: &QrError) -> Self {
        match e {
            QrError::InvalidInput(_) => QrInfo::InvalidInput,
            QrError::NumericalError(_) => QrInfo::NumericalError,
            QrError::NotInitialized => QrInfo::NotInitialized,
        }
    }
}
