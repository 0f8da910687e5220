use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{EventSummary, ListEventsQuery, VaultClient, VaultError};

struct VaultState {
    account: String,
    events: Vec<(EventSummary, Vec<u8>)>,
}

/// In-memory `VaultClient` used by tests and by `retrieve`/`write` test
/// harnesses that don't want to stand up a real provider.
#[derive(Default)]
pub struct InMemoryMockClient {
    vaults: Mutex<HashMap<String, VaultState>>,
    next_cid: Mutex<u64>,
}

impl InMemoryMockClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_cid(&self) -> String {
        let mut counter = self.next_cid.lock().unwrap();
        *counter += 1;
        format!("mockcid{:08x}", *counter)
    }
}

#[async_trait]
impl VaultClient for InMemoryMockClient {
    async fn create_vault(
        &self,
        vault_id: &str,
        account: &str,
        _cache_minutes: Option<u32>,
    ) -> Result<(), VaultError> {
        self.vaults.lock().unwrap().insert(
            vault_id.to_string(),
            VaultState {
                account: account.to_string(),
                events: Vec::new(),
            },
        );
        Ok(())
    }

    async fn list_vaults(&self, account: &str) -> Result<Vec<String>, VaultError> {
        Ok(self
            .vaults
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, v)| v.account == account)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn list_events(
        &self,
        vault_id: &str,
        query: ListEventsQuery,
    ) -> Result<Vec<EventSummary>, VaultError> {
        let vaults = self.vaults.lock().unwrap();
        let vault = vaults.get(vault_id).ok_or(VaultError::NotFound)?;
        let mut events: Vec<EventSummary> = vault
            .events
            .iter()
            .map(|(summary, _)| summary.clone())
            .filter(|e| query.after.map_or(true, |a| e.timestamp >= a))
            .filter(|e| query.before.map_or(true, |b| e.timestamp <= b))
            .collect();
        if let Some(offset) = query.offset {
            events = events.into_iter().skip(offset as usize).collect();
        }
        if let Some(limit) = query.limit {
            events.truncate(limit as usize);
        }
        Ok(events)
    }

    async fn write_event(
        &self,
        vault_id: &str,
        filename: &str,
        body: Vec<u8>,
        timestamp: i64,
        _signature: &str,
    ) -> Result<EventSummary, VaultError> {
        let cid = self.next_cid();
        let summary = EventSummary {
            cid: cid.clone(),
            timestamp,
            filename: Some(filename.to_string()),
        };
        let mut vaults = self.vaults.lock().unwrap();
        let vault = vaults.get_mut(vault_id).ok_or(VaultError::NotFound)?;
        vault.events.push((summary.clone(), body));
        Ok(summary)
    }

    async fn retrieve_event(&self, cid: &str) -> Result<Vec<u8>, VaultError> {
        let vaults = self.vaults.lock().unwrap();
        for vault in vaults.values() {
            if let Some((_, body)) = vault.events.iter().find(|(s, _)| s.cid == cid) {
                return Ok(body.clone());
            }
        }
        Err(VaultError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_write_then_retrieve_round_trips() {
        let client = InMemoryMockClient::new();
        client.create_vault("v1", "0xabc", Some(60)).await.unwrap();
        let summary = client
            .write_event("v1", "export.parquet", b"payload".to_vec(), 100, "sig")
            .await
            .unwrap();
        let fetched = client.retrieve_event(&summary.cid).await.unwrap();
        assert_eq!(fetched, b"payload");
    }

    #[tokio::test]
    async fn write_to_unknown_vault_is_not_found() {
        let client = InMemoryMockClient::new();
        let result = client
            .write_event("missing", "f", Vec::new(), 0, "sig")
            .await;
        assert!(matches!(result, Err(VaultError::NotFound)));
    }

    #[tokio::test]
    async fn list_vaults_filters_by_account() {
        let client = InMemoryMockClient::new();
        client.create_vault("v1", "0xabc", None).await.unwrap();
        client.create_vault("v2", "0xdef", None).await.unwrap();
        let vaults = client.list_vaults("0xabc").await.unwrap();
        assert_eq!(vaults, vec!["v1".to_string()]);
    }
}
