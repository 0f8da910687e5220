#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("embedded database error: {0}")]
    Duckdb(#[from] duckdb::Error),
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Schema(#[from] basin_typemap::TypeMapError),
    #[error("no live database is open")]
    NoLiveDatabase,
}
