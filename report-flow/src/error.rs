use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlowError>;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("stage not found: {0}")]
    StageNotFound(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("missing context value: {0}")]
    ContextMissing(String),

    #[error("stage execution failed: {0}")]
    StageFailed(String),

    #[error("storage error: {0}")]
    Storage(String),
}
