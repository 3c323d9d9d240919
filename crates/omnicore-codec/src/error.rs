use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("compression config already initialized")]
    AlreadyInitialized,

    #[error("compressed field observed before compression config was initialized")]
    NotInitialized,

    #[error("zstd encode failed: {0}")]
    Encode(String),

    #[error("zstd decode failed: {0}")]
    Decode(String),
}
