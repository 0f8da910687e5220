#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    #[error("vault provider error: {0}")]
    Vault(#[from] basin_vault::VaultError),
    #[error("network fetch error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid gateway url: {0}")]
    Url(#[from] url::ParseError),
    #[error("malformed CAR container: {0}")]
    Car(#[from] iroh_car::Error),
    #[error("invalid content identifier: {0}")]
    InvalidCid(String),
    #[error("CAR container carried no payload blocks")]
    EmptyPayload,
}
