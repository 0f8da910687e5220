use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StreamerError {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
    #[error("local store error: {0}")]
    Store(#[from] basin_store::StoreError),
    #[error("replication error: {0}")]
    Replication(#[from] basin_replication::ReplicationError),
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
    #[error("workspace directory {0} is locked by another process")]
    WorkspaceLocked(PathBuf),
    #[error("relation has no columns to replicate")]
    EmptySchema,
}
