use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid resource pointer: {0}")]
    InvalidPointer(String),

    #[error("invalid label selector: {0}")]
    InvalidLabelSelector(String),

    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
