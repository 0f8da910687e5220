//! Uploader (spec §4.5): chunks a sealed export file through a fresh
//! `Signer`, then hands the whole body plus the finalized signature to the
//! vault's write-event endpoint, retrying transient failures with
//! exponential backoff.

mod error;

pub use error::UploadError;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use basin_signer::Signer;
use basin_vault::VaultClient;
use secp256k1::SecretKey;

const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
const DEFAULT_MAX_ATTEMPTS: u32 = 10;
const INITIAL_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Fed one chunk at a time as the uploader walks the export file, so
/// callers (e.g. a CLI progress bar) can report upload progress.
pub trait ProgressSink: Send + Sync {
    fn on_chunk(&self, bytes_sent: u64, total_bytes: u64);
}

/// A `ProgressSink` that does nothing, for callers that don't care.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_chunk(&self, _bytes_sent: u64, _total_bytes: u64) {}
}

pub struct Uploader {
    vault: Arc<dyn VaultClient>,
    vault_id: String,
    private_key: SecretKey,
    max_attempts: u32,
    chunk_size: usize,
}

impl Uploader {
    pub fn new(vault: Arc<dyn VaultClient>, vault_id: impl Into<String>, private_key: SecretKey) -> Self {
        Self {
            vault,
            vault_id: vault_id.into(),
            private_key,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Uploads one export file, retrying up to `max_attempts` sessions.
    /// Each retried session re-reads the file through a brand new `Signer`,
    /// since the accumulator's state is tied to one attempted byte stream
    /// (spec §4.5 "Retries").
    pub async fn upload(
        &self,
        export_path: &Path,
        timestamp: Option<i64>,
        progress: &dyn ProgressSink,
    ) -> Result<(), UploadError> {
        let filename = export_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("export")
            .to_string();
        let timestamp = timestamp.unwrap_or_else(basin_common::timestamp::now_unix);

        let mut delay = INITIAL_BACKOFF;
        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            match self
                .try_upload(export_path, &filename, timestamp, progress)
                .await
            {
                Ok(()) => return Ok(()),
                Err(error) if error.is_transient() && attempt < self.max_attempts => {
                    tracing::warn!(attempt, %error, "transient upload failure, retrying with a fresh signer");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_BACKOFF);
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }
        }
        Err(last_error.unwrap_or(UploadError::Exhausted {
            attempts: self.max_attempts,
        }))
    }

    async fn try_upload(
        &self,
        export_path: &Path,
        filename: &str,
        timestamp: i64,
        progress: &dyn ProgressSink,
    ) -> Result<(), UploadError> {
        let bytes = tokio::fs::read(export_path).await?;
        let total = bytes.len() as u64;

        let mut signer = Signer::new(self.private_key);
        let mut sent = 0u64;
        for chunk in bytes.chunks(self.chunk_size) {
            signer.update(chunk);
            sent += chunk.len() as u64;
            progress.on_chunk(sent, total);
        }
        let signature = signer.finalize()?;
        let signature_hex = hex::encode(signature);

        self.vault
            .write_event(&self.vault_id, filename, bytes, timestamp, &signature_hex)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basin_vault::InMemoryMockClient;
    use rand::thread_rng;
    use std::io::Write;

    fn random_key() -> SecretKey {
        SecretKey::new(&mut thread_rng())
    }

    #[tokio::test]
    async fn uploads_file_and_records_progress() {
        let vault = Arc::new(InMemoryMockClient::new());
        vault.create_vault("v1", "0xabc", None).await.unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![7u8; 2 * 1024 * 1024 + 10]).unwrap();

        let uploader = Uploader::new(vault.clone(), "v1", random_key());
        uploader
            .upload(file.path(), Some(12345), &NoopProgress)
            .await
            .unwrap();

        let events = vault
            .list_events("v1", Default::default())
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, 12345);
    }

    #[tokio::test]
    async fn write_to_unknown_vault_is_not_transient_and_not_retried() {
        let vault = Arc::new(InMemoryMockClient::new());
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"data").unwrap();

        let uploader = Uploader::new(vault, "missing", random_key());
        let result = uploader.upload(file.path(), None, &NoopProgress).await;
        assert!(matches!(result, Err(UploadError::Vault(basin_vault::VaultError::NotFound))));
    }
}
