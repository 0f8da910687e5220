//! Retriever (spec §4.8): a two-tier fetch for a content identifier — first
//! the vault's own cache endpoint, falling back to a content-addressed
//! network fetch of a CARv1 container on a cache miss or transport error.

mod error;

pub use error::RetrieverError;

use std::io::Cursor;
use std::sync::Arc;

use basin_vault::VaultClient;
use iroh_car::CarReader;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use url::Url;

/// Scopes a gateway CAR request to the full DAG rooted at the requested
/// CID, per the IPFS trustless-gateway `dag-scope` query parameter.
const DAG_SCOPE_ALL: &str = "all";

pub struct Retriever {
    vault: Arc<dyn VaultClient>,
    network: reqwest::Client,
    gateway_base: Url,
}

impl Retriever {
    pub fn new(vault: Arc<dyn VaultClient>, network: reqwest::Client, gateway_base: Url) -> Self {
        Self {
            vault,
            network,
            gateway_base,
        }
    }

    /// Fetches `cid`, writing its bytes to `sink`. Tries the vault's cache
    /// first; on cache miss or transport error, falls back to a
    /// content-addressed network fetch.
    pub async fn retrieve(
        &self,
        cid: &str,
        sink: &mut (impl AsyncWrite + Unpin),
    ) -> Result<(), RetrieverError> {
        match self.vault.retrieve_event(cid).await {
            Ok(bytes) => {
                sink.write_all(&bytes).await?;
                return Ok(());
            }
            Err(error) => {
                tracing::debug!(%error, cid, "cache miss; falling back to content-addressed fetch");
            }
        }

        let body = self.fetch_car_container(cid).await?;
        let payload = extract_payload(&body).await?;
        sink.write_all(&payload).await?;
        Ok(())
    }

    async fn fetch_car_container(&self, cid: &str) -> Result<Vec<u8>, RetrieverError> {
        let url = self.gateway_base.join(cid)?;
        let response = self
            .network
            .get(url)
            .query(&[("dag-scope", DAG_SCOPE_ALL)])
            .header("Accept", "application/vnd.ipld.car")
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Reads every block out of a CARv1 container and concatenates their data
/// in container order. Basin vault exports are single, unchunked blobs, so
/// this is the whole of the original payload.
async fn extract_payload(car_bytes: &[u8]) -> Result<Vec<u8>, RetrieverError> {
    let mut reader = CarReader::new(Cursor::new(car_bytes)).await?;
    let mut payload = Vec::new();
    let mut blocks_seen = 0usize;
    while let Some(item) = reader.next_block().await {
        let (_cid, data) = item?;
        payload.extend_from_slice(&data);
        blocks_seen += 1;
    }
    if blocks_seen == 0 {
        return Err(RetrieverError::EmptyPayload);
    }
    Ok(payload)
}
