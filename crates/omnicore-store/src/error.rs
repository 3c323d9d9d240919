use omnicore_domain::Pointer;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("resource not found: {0}")]
    NotFound(Pointer),

    #[error("resource already exists: {0}")]
    AlreadyExists(Pointer),

    #[error("version conflict updating {pointer}: expected {expected:?}, found {found}")]
    Conflict {
        pointer: Pointer,
        expected: Option<u64>,
        found: u64,
    },

    #[error("owner mismatch updating {pointer}: expected owner '{expected}', found '{found}'")]
    OwnerMismatch {
        pointer: Pointer,
        expected: String,
        found: String,
    },

    #[error("{0} still has finalizers and cannot be destroyed")]
    HasFinalizers(Pointer),

    #[error("operation not valid in phase {phase} for {pointer}")]
    PhaseViolation {
        pointer: Pointer,
        phase: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal store error: {0}")]
    Internal(String),
}
