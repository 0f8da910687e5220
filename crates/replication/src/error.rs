#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("transient replication error: {0}")]
    Transient(String),
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
    #[error("malformed wal2json payload: {0}")]
    MalformedPayload(String),
    #[error("commit {commit_lsn} arrived with no matching begin")]
    UnmatchedCommit { commit_lsn: u64 },
    #[error("source already shut down")]
    Closed,
}
