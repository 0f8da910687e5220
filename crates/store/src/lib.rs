//! The Local Store Manager (spec §4.4): a rolling embedded DuckDB database
//! that buffers replicated rows between window rollovers, and the seal
//! procedure that exports, uploads, and cleans up a window's worth of data.

mod error;
mod manager;

pub use error::StoreError;
pub use manager::LocalStoreManager;

use std::path::Path;

use async_trait::async_trait;

/// What the seal procedure hands a finished export file to. `basin-uploader`
/// implements this for its retrying chunked uploader; `basin-streamer` wires
/// the two crates together so `basin-store` never has to depend on
/// `basin-uploader` directly.
#[async_trait]
pub trait SealUploader: Send + Sync {
    async fn upload(&self, export_path: &Path, timestamp: Option<i64>) -> Result<(), String>;
}
