use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the partitioned table engine and federation layer.
///
/// Variant names track the kind of failure rather than any particular
/// call site: invalid argument, not found, already exists, storage open
/// race, and task failure. Cleanup failures are never represented here --
/// they are logged and swallowed at the call site.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("table not found: namespace={namespace}, name={name}")]
    NotFound { namespace: String, name: String },

    #[error("table already exists: namespace={namespace}, name={name}")]
    AlreadyExists { namespace: String, name: String },

    #[error("failed to open storage environment at {path}: {source}")]
    StorageOpen { path: PathBuf, source: heed::Error },

    #[error("{op} failed on partition {partition}: {source}")]
    TaskFailed {
        op: &'static str,
        partition: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        left: Option<Vec<u8>>,
        right: Option<Vec<u8>>,
    },

    #[error("federation object missing for key {0:?}")]
    FederationMissingObject(String),

    #[error("session {0} has been stopped; its worker pool no longer accepts tasks")]
    SessionStopped(String),

    #[error(transparent)]
    Storage(#[from] heed::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

impl Error {
    /// Wraps a `join`/`union` merge-function failure, attaching both raw
    /// byte payloads that were being combined so the caller can inspect
    /// what triggered it.
    pub fn merge_failed(
        op: &'static str,
        partition: u32,
        source: Box<dyn std::error::Error + Send + Sync>,
        left: &[u8],
        right: &[u8],
    ) -> Error {
        Error::TaskFailed {
            op,
            partition,
            source,
            left: Some(left.to_vec()),
            right: Some(right.to_vec()),
        }
    }

    pub fn task_failed(
        op: &'static str,
        partition: u32,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Error {
        Error::TaskFailed {
            op,
            partition,
            source,
            left: None,
            right: None,
        }
    }
}
