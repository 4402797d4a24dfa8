use thiserror::Error;

/// Errors raised by the persistent store.
///
/// `Transactional` errors mean the enclosing transaction was rolled
/// back and nothing was committed. `IndexRebuildFailed` is
/// deliberately non-fatal: the caller already has committed data and
/// should log and continue rather than unwind.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlite::Error),

    #[error("database io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("replace_list for {list_id} rolled back: {cause} (after {error_count} row errors)")]
    BulkLoadRolledBack {
        list_id: uuid::Uuid,
        cause: String,
        error_count: usize,
    },

    #[error("index rebuild failed after replace_list for {list_id}: {0}", list_id = .list_id)]
    IndexRebuildFailed {
        list_id: uuid::Uuid,
        #[source]
        source: sqlite::Error,
    },

    #[error("list {0} was not found")]
    ListNotFound(uuid::Uuid),

    #[error("source {0} was not found")]
    SourceNotFound(uuid::Uuid),

    #[error("cycle {0} was not found")]
    CycleNotFound(uuid::Uuid),

    #[error("a cycle is already running ({0})")]
    CycleAlreadyRunning(uuid::Uuid),

    #[error("a refresh group named {0:?} already exists")]
    DuplicateGroupName(String),

    #[error("group {0} was not found")]
    GroupNotFound(uuid::Uuid),

    #[error("blocking task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type StoreResult<T> = Result<T, StoreError>;
