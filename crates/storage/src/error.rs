use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Network or server failure on a persistence call. Deliberately a
    /// single untyped bucket: dirty records stay dirty and the next save
    /// cycle retries the full set.
    #[error("remote error: {0}")]
    Remote(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),
}
