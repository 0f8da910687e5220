use std::path::Path;

use async_trait::async_trait;
use basin_store::SealUploader;
use basin_uploader::{NoopProgress, Uploader};

/// Bridges `basin-uploader`'s retrying chunked uploader into the
/// `SealUploader` seam `basin-store` calls out to, without `basin-store`
/// having to depend on `basin-uploader` directly.
pub struct SealUploaderAdapter {
    inner: Uploader,
}

impl SealUploaderAdapter {
    pub fn new(inner: Uploader) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl SealUploader for SealUploaderAdapter {
    async fn upload(&self, export_path: &Path, timestamp: Option<i64>) -> Result<(), String> {
        self.inner
            .upload(export_path, timestamp, &NoopProgress)
            .await
            .map_err(|e| e.to_string())
    }
}
