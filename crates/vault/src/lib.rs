//! Vault Provider Client (spec §4.7): the verbatim HTTP surface used by both
//! the CLI and the streamer orchestrator to talk to the remote vault
//! service. Two capability variants behind one trait, per spec §9 "Dynamic
//! dispatch": `Https` talks to a real server, `InMemoryMock` is used in
//! tests and by the uploader/retriever test suites.

mod error;
mod https;
mod mock;

pub use error::VaultError;
pub use https::HttpsVaultClient;
pub use mock::InMemoryMockClient;

use async_trait::async_trait;

/// Query parameters accepted by the list-events endpoint.
#[derive(Debug, Clone, Default)]
pub struct ListEventsQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub before: Option<i64>,
    pub after: Option<i64>,
}

/// One entry in a vault's event list.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EventSummary {
    pub cid: String,
    pub timestamp: i64,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    error: String,
}

#[async_trait]
pub trait VaultClient: Send + Sync {
    /// `POST /vaults/{vault_id}` with `account=<hex>&cache=<minutes>`.
    async fn create_vault(
        &self,
        vault_id: &str,
        account: &str,
        cache_minutes: Option<u32>,
    ) -> Result<(), VaultError>;

    /// `GET /vaults/?account=<hex>`.
    async fn list_vaults(&self, account: &str) -> Result<Vec<String>, VaultError>;

    /// `GET /vaults/{vault_id}/events?limit&offset&before&after`.
    async fn list_events(
        &self,
        vault_id: &str,
        query: ListEventsQuery,
    ) -> Result<Vec<EventSummary>, VaultError>;

    /// `POST /vaults/{vault_id}/events?timestamp&signature` with `filename`
    /// header and raw body.
    async fn write_event(
        &self,
        vault_id: &str,
        filename: &str,
        body: Vec<u8>,
        timestamp: i64,
        signature: &str,
    ) -> Result<EventSummary, VaultError>;

    /// `GET /events/{cid}` — cache fetch, used by the retriever's first
    /// tier and by ad-hoc CLI retrieval.
    async fn retrieve_event(&self, cid: &str) -> Result<Vec<u8>, VaultError>;
}

/// Maps an HTTP status + body onto `VaultError`, per spec §4.7: `404` means
/// not found, any other non-2xx surfaces the decoded `error` field.
async fn map_error_response(response: reqwest::Response) -> VaultError {
    let status = response.status();
    if status.as_u16() == 404 {
        return VaultError::NotFound;
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or(text);
    VaultError::Server {
        status: status.as_u16(),
        message,
    }
}
