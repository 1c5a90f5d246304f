use thiserror::Error;

/// Failures surfaced by the projection engine.
///
/// `InsufficientData` and `InvalidOdds` are item-level: a batch caller skips
/// the player/line and keeps going. The other two indicate a caller bug.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("invalid odds: {0}")]
    InvalidOdds(String),
}

impl EngineError {
    /// Whether the caller can skip this item and continue the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientData(_) | EngineError::InvalidOdds(_)
        )
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
