//! Error kinds raised while acquiring a suppression artifact from a
//! provider.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("provider returned {status} for {url}: {body_preview:?}")]
    BadResponse {
        url: String,
        status: u16,
        content_type: Option<String>,
        /// Up to 512 bytes of the response body.
        body_preview: String,
    },

    #[error("optizmo prepare step failed: {0}")]
    OptizmoPrepareError(String),

    #[error("optizmo prepare response had no download_link")]
    OptizmoMissingDownloadLink,

    #[error("could not extract a mailer access key (mak) from {0}")]
    OptizmoMissingMak(String),

    #[error(
        "optizmo download never became ready after {attempts} polls over ~{elapsed_secs}s"
    )]
    DownloadNeverReady { attempts: u32, elapsed_secs: u64 },

    #[error("the archive had no suitable entry to extract")]
    NoSuitableArchiveEntry,

    #[error("archive error: {0}")]
    Archive(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("acquisition was cancelled")]
    Cancelled,
}

/// Recoverable signal distinguished from a hard [`AcquireError`]: the
/// Optizmo poll loop treats a 404 as "not ready yet", not a failure,
/// until the attempt ceiling is reached.
#[derive(Debug, Error)]
#[error("artifact not ready yet (404)")]
pub struct DownloadNotReady;

pub type AcquireResult<T> = Result<T, AcquireError>;
