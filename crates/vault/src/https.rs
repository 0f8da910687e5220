use async_trait::async_trait;
use url::Url;

use crate::{map_error_response, EventSummary, ListEventsQuery, VaultClient, VaultError};

/// `reqwest`-backed client for a real vault provider service.
pub struct HttpsVaultClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpsVaultClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> Url {
        self.base_url
            .join(path)
            .expect("path segments are statically well-formed")
    }
}

#[async_trait]
impl VaultClient for HttpsVaultClient {
    async fn create_vault(
        &self,
        vault_id: &str,
        account: &str,
        cache_minutes: Option<u32>,
    ) -> Result<(), VaultError> {
        let mut form = vec![("account", account.to_string())];
        if let Some(cache) = cache_minutes {
            form.push(("cache", cache.to_string()));
        }
        let response = self
            .client
            .post(self.url(&format!("vaults/{vault_id}")))
            .form(&form)
            .send()
            .await?;
        if response.status().as_u16() == 201 {
            Ok(())
        } else {
            Err(map_error_response(response).await)
        }
    }

    async fn list_vaults(&self, account: &str) -> Result<Vec<String>, VaultError> {
        let response = self
            .client
            .get(self.url("vaults/"))
            .query(&[("account", account)])
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(map_error_response(response).await)
        }
    }

    async fn list_events(
        &self,
        vault_id: &str,
        query: ListEventsQuery,
    ) -> Result<Vec<EventSummary>, VaultError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(offset) = query.offset {
            params.push(("offset", offset.to_string()));
        }
        if let Some(before) = query.before {
            params.push(("before", before.to_string()));
        }
        if let Some(after) = query.after {
            params.push(("after", after.to_string()));
        }
        let response = self
            .client
            .get(self.url(&format!("vaults/{vault_id}/events")))
            .query(&params)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(map_error_response(response).await)
        }
    }

    async fn write_event(
        &self,
        vault_id: &str,
        filename: &str,
        body: Vec<u8>,
        timestamp: i64,
        signature: &str,
    ) -> Result<EventSummary, VaultError> {
        let response = self
            .client
            .post(self.url(&format!("vaults/{vault_id}/events")))
            .query(&[
                ("timestamp", timestamp.to_string()),
                ("signature", signature.to_string()),
            ])
            .header("filename", filename)
            .body(body)
            .send()
            .await?;
        if response.status().as_u16() == 201 {
            Ok(response.json().await?)
        } else {
            Err(map_error_response(response).await)
        }
    }

    async fn retrieve_event(&self, cid: &str) -> Result<Vec<u8>, VaultError> {
        let response = self
            .client
            .get(self.url(&format!("events/{cid}")))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.bytes().await?.to_vec())
        } else {
            Err(map_error_response(response).await)
        }
    }
}
