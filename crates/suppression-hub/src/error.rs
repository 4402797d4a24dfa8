use thiserror::Error;

/// Errors raised by the Global Suppression Hub.
#[derive(Debug, Error)]
pub enum HubError {
    /// The hub has not finished streaming `export_fingerprints` from
    /// the store yet. This implementation picks "refuse queries" over
    /// fail-safe-true: a caller that sees this can retry or back off,
    /// whereas a silent fail-true is easy to miss and would suppress
    /// legitimate sends indefinitely if warmup never completes.
    #[error("hub is still warming up ({loaded} fingerprints loaded so far)")]
    WarmingUp { loaded: usize },

    #[error(transparent)]
    Store(#[from] suppression_store::StoreError),
}

pub type HubResult<T> = Result<T, HubError>;
