#[derive(Debug, thiserror::Error)]
pub enum BasinError {
    #[error("invalid vault identifier: {0}")]
    InvalidVaultId(String),
    #[error("{0}")]
    Custom(String),
}
