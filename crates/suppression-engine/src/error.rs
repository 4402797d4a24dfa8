use thiserror::Error;

/// Errors raised by the refresh engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] suppression_store::StoreError),

    /// Missing token, unparseable URL, or other setup problem that
    /// stops a source before acquisition even starts.
    #[error("config error: {0}")]
    Config(String),

    #[error("a cycle is already running")]
    AlreadyRunning,

    #[error("no cycle is currently running")]
    NotRunning,
}

pub type EngineResult<T> = Result<T, EngineError>;
