//! Real `ReplicationSource` backed by a Postgres logical replication slot
//! running the wal2json output plugin, per spec §4.3.
//!
//! One connection is used for both catalog queries (does the slot exist?)
//! and the replication protocol itself, by connecting with
//! `replication=database` — Postgres allows ordinary SQL and replication
//! commands on the same socket in that mode.

use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_postgres::config::ReplicationMode;
use tokio_postgres::{Config, NoTls};

use crate::error::ReplicationError;
use crate::state_machine::{TransactionAssembler, PLUGIN_NAME};
use crate::wal2json::parse_message;
use crate::{ReplicationSource, ReplicationStream};

/// Microseconds between the Unix epoch and the Postgres epoch (2000-01-01).
const PG_EPOCH_OFFSET_MICROS: i64 = 946_684_800_000_000;

pub struct PostgresSource {
    config: Config,
    slot_name: String,
    schema_relation: String,
    commit_tx: Option<mpsc::UnboundedSender<u64>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl PostgresSource {
    pub fn new(
        config: Config,
        slot_name: impl Into<String>,
        schema_relation: impl Into<String>,
    ) -> Self {
        Self {
            config,
            slot_name: slot_name.into(),
            schema_relation: schema_relation.into(),
            commit_tx: None,
            task: None,
        }
    }

    async fn connect(&self) -> Result<tokio_postgres::Client, ReplicationError> {
        let mut config = self.config.clone();
        config.replication_mode(ReplicationMode::Logical);
        let (client, connection) = config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(error) = connection.await {
                tracing::warn!(%error, "replication connection closed with error");
            }
        });
        Ok(client)
    }

    async fn ensure_slot(&self, client: &tokio_postgres::Client) -> Result<(), ReplicationError> {
        ensure_slot_exists(client, &self.slot_name).await
    }

    fn start_replication_query(&self) -> String {
        let options = [
            ("pretty-print", "false"),
            ("include-transaction", "true"),
            ("include-lsn", "true"),
            ("include-timestamp", "true"),
            ("include-pk", "true"),
            ("format-version", "2"),
            ("include-xids", "true"),
        ];
        let mut parts: Vec<String> = options
            .iter()
            .map(|(k, v)| format!("\"{k}\" '{v}'"))
            .collect();
        parts.push(format!("\"add-tables\" '{}'", self.schema_relation));
        format!(
            "START_REPLICATION SLOT {} LOGICAL 0/0 ({})",
            self.slot_name,
            parts.join(", ")
        )
    }
}

/// Creates the named logical replication slot running the wal2json plugin
/// if it does not already exist. Idempotent: safe to call on every `create`
/// invocation and every `stream` startup.
pub async fn ensure_slot_exists(
    client: &tokio_postgres::Client,
    slot_name: &str,
) -> Result<(), ReplicationError> {
    let existing = client
        .query(
            "SELECT 1 FROM pg_replication_slots WHERE slot_name = $1",
            &[&slot_name],
        )
        .await?;
    if !existing.is_empty() {
        return Ok(());
    }

    let query = format!(
        "CREATE_REPLICATION_SLOT {slot_name} LOGICAL {PLUGIN_NAME} NOEXPORT_SNAPSHOT"
    );
    client.simple_query(&query).await?;
    tracing::info!(slot_name, "created replication slot");
    Ok(())
}

/// Connects to `config` with plain SQL semantics (no `replication=database`
/// needed for a one-off `CREATE_REPLICATION_SLOT`) and provisions the slot.
/// Used by `basin create --dburi ...` to stand up the source publication
/// ahead of the first `stream` run.
pub async fn provision_slot(
    config: &Config,
    slot_name: &str,
) -> Result<(), ReplicationError> {
    let mut config = config.clone();
    config.replication_mode(ReplicationMode::Logical);
    let (client, connection) = config.connect(NoTls).await?;
    tokio::spawn(async move {
        if let Err(error) = connection.await {
            tracing::warn!(%error, "slot-provisioning connection closed with error");
        }
    });
    ensure_slot_exists(&client, slot_name).await
}

fn standby_status_update(write_lsn: u64, reply_requested: bool) -> Bytes {
    let now_micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as i64
        - PG_EPOCH_OFFSET_MICROS;

    let mut buf = BytesMut::with_capacity(1 + 8 * 3 + 8 + 1);
    buf.put_u8(b'r');
    buf.put_u64(write_lsn);
    buf.put_u64(write_lsn);
    buf.put_u64(write_lsn);
    buf.put_i64(now_micros);
    buf.put_u8(if reply_requested { 1 } else { 0 });
    buf.freeze()
}

#[async_trait]
impl ReplicationSource for PostgresSource {
    async fn start(&mut self) -> Result<ReplicationStream, ReplicationError> {
        let client = self.connect().await?;
        self.ensure_slot(&client).await?;

        let query = self.start_replication_query();
        let mut duplex = client
            .copy_both_simple::<Bytes>(&query)
            .await
            .map_err(ReplicationError::from)?;

        let (tx_out, rx_out) = mpsc::channel(256);
        let (commit_tx, mut commit_rx) = mpsc::unbounded_channel::<u64>();
        self.commit_tx = Some(commit_tx);

        let slot_id = self.slot_name.clone();
        let task = tokio::spawn(async move {
            let mut assembler = TransactionAssembler::new();
            let mut last_committed: u64 = 0;

            loop {
                tokio::select! {
                    biased;

                    ack = commit_rx.recv() => {
                        match ack {
                            Some(lsn) => {
                                last_committed = last_committed.max(lsn);
                                let update = standby_status_update(last_committed, false);
                                if let Err(error) = Pin::new(&mut duplex).send(update).await {
                                    tracing::warn!(%error, "failed to send standby status update");
                                    break;
                                }
                            }
                            None => break,
                        }
                    }

                    next = duplex.next() => {
                        let Some(chunk) = next else { break };
                        let chunk = match chunk {
                            Ok(c) => c,
                            Err(error) => {
                                tracing::warn!(%error, "replication stream error");
                                break;
                            }
                        };
                        if chunk.is_empty() {
                            continue;
                        }
                        match chunk[0] {
                            b'w' if chunk.len() > 25 => {
                                let payload = &chunk[25..];
                                match parse_message(payload) {
                                    Ok(message) => match assembler.feed(message) {
                                        Ok(Some(transaction)) => {
                                            if tx_out.send(transaction).await.is_err() {
                                                break;
                                            }
                                        }
                                        Ok(None) => {}
                                        Err(error) => {
                                            tracing::warn!(%error, "dropping malformed wal2json message");
                                        }
                                    },
                                    Err(error) => {
                                        tracing::warn!(%error, "failed to parse wal2json payload");
                                    }
                                }
                            }
                            b'k' if chunk.len() >= 18 => {
                                let reply_requested = chunk[17] != 0;
                                if reply_requested {
                                    let update = standby_status_update(last_committed, false);
                                    if let Err(error) = Pin::new(&mut duplex).send(update).await {
                                        tracing::warn!(%error, "failed to send keepalive reply");
                                        break;
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        });
        self.task = Some(task);

        Ok(ReplicationStream {
            transactions: rx_out,
            slot_id,
        })
    }

    async fn commit(&mut self, lsn: u64) -> Result<(), ReplicationError> {
        match &self.commit_tx {
            Some(tx) => tx.send(lsn).map_err(|_| ReplicationError::Closed),
            None => Err(ReplicationError::SourceUnavailable(
                "replication source not started".into(),
            )),
        }
    }

    async fn shutdown(&mut self) -> Result<(), ReplicationError> {
        self.commit_tx.take();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_update_has_expected_layout() {
        let update = standby_status_update(42, true);
        assert_eq!(update[0], b'r');
        assert_eq!(update.len(), 1 + 24 + 8 + 1);
        assert_eq!(update[update.len() - 1], 1);
    }

    #[test]
    fn start_replication_query_includes_pinned_plugin_options() {
        let source = PostgresSource::new(
            Config::new(),
            "basin_events".to_string(),
            "public.events".to_string(),
        );
        let query = source.start_replication_query();
        assert!(query.contains("format-version"));
        assert!(query.contains("'2'"));
        assert!(query.contains("add-tables"));
        assert!(query.contains("public.events"));
    }
}
