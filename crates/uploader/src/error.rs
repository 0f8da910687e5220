#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to read export file: {0}")]
    Io(#[from] std::io::Error),
    #[error("signing failed: {0}")]
    Signer(#[from] basin_signer::SignerError),
    #[error("vault provider error: {0}")]
    Vault(#[from] basin_vault::VaultError),
    #[error("upload exhausted {attempts} attempts")]
    Exhausted { attempts: u32 },
}

impl UploadError {
    /// Whether a failure is worth retrying with backoff, per spec §7:
    /// transport/5xx failures are transient, `NotFound`/4xx-with-body are
    /// permanent (`UploadPermanent`) and should not be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            UploadError::Io(_) => true,
            UploadError::Vault(basin_vault::VaultError::Http(_)) => true,
            UploadError::Vault(basin_vault::VaultError::Server { status, .. }) => {
                *status >= 500
            }
            _ => false,
        }
    }
}
