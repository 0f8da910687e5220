#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid provider url: {0}")]
    Url(#[from] url::ParseError),
    #[error("not found")]
    NotFound,
    #[error("vault provider returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}
