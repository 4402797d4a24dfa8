use thiserror::Error;

/// Errors raised by the cross-reference sampler.
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error(transparent)]
    Store(#[from] suppression_store::StoreError),

    #[error("audience source error: {0}")]
    Audience(String),
}

pub type SamplerResult<T> = Result<T, SamplerError>;
