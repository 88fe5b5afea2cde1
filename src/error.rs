use thiserror::Error;

/// Errors raised by the data pipeline and the likelihood scorer.
#[derive(Debug, Error)]
pub enum LmError {
    #[error("token {0:?} is not in the vocabulary")]
    UnknownToken(String),

    #[error("input stream has {inputs} tokens but target stream has {targets}")]
    StreamLengthMismatch { inputs: usize, targets: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot score an empty batch")]
    EmptyBatch,

    #[error("sequence {index} has no tokens to score")]
    EmptySequence { index: usize },

    #[error("failed to read tensor data: {0}")]
    TensorData(String),
}

pub type Result<T> = std::result::Result<T, LmError>;
