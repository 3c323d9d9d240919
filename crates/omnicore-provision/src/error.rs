use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("deprovision failed: {0}")]
    DeprovisionFailed(String),

    #[error("join token is malformed: {0}")]
    InvalidJoinToken(String),

    #[error("join token provider id '{found}' does not match expected '{expected}'")]
    ProviderIdMismatch { expected: String, found: String },

    #[error("join config yaml is missing a {0} document")]
    MissingJoinConfigDocument(&'static str),

    #[error("join config endpoint does not match connection params: {0}")]
    JoinConfigMismatch(String),

    #[error("store error: {0}")]
    Store(#[from] omnicore_store::StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
