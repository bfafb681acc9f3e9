use thiserror::Error;

/// Error taxonomy for the engine surface.
///
/// Degenerate numeric inputs (zero-magnitude vectors, single-observation
/// series) are handled inside the similarity layer and never surface here;
/// per-request calls degrade to smaller result sets instead of failing.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("unknown strategy: {0}")]
    InvalidStrategy(String),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
