use flowboard_core::CoreError;
use flowboard_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// The node has no mesh yet. Callers treat this as "not yet present",
    /// not as a failure.
    #[error("mesh not found: {0}")]
    MeshNotFound(String),

    #[error("socket error: {0}")]
    Socket(String),
}
