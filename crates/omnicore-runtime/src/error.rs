use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("store error: {0}")]
    Store(#[from] omnicore_store::StoreError),

    #[error("controller '{0}' panicked during reconcile")]
    ControllerPanicked(String),

    #[error("internal runtime error: {0}")]
    Internal(String),
}
