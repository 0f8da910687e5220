//! The Streamer orchestrator (spec §4.6): wires the Replication Source, the
//! Local Store Manager, and the Uploader together, owns the workspace lock
//! file, and runs the single-threaded apply-then-commit loop.

mod error;
mod lock;
mod schema;
mod uploader_adapter;

pub use error::StreamerError;
pub use lock::WorkspaceLock;
pub use schema::inspect_schema;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use basin_common::ColumnDescriptor;
use basin_replication::{PostgresSource, ReplicationSource};
use basin_store::LocalStoreManager;
use basin_uploader::Uploader;
use basin_vault::VaultClient;
use secp256k1::SecretKey;
use tokio_util::sync::CancellationToken;
use uploader_adapter::SealUploaderAdapter;

/// Everything the orchestrator needs to start a live pipeline for one
/// `namespace.relation` vault.
pub struct StreamerConfig {
    pub workspace_dir: PathBuf,
    pub vault: Arc<dyn VaultClient>,
    pub vault_id: String,
    pub private_key: SecretKey,
    pub pg_config: tokio_postgres::Config,
    pub schema: String,
    pub relation: String,
    pub slot_name: String,
    pub window: Duration,
}

pub struct Streamer {
    store: LocalStoreManager<SealUploaderAdapter>,
    source: Box<dyn ReplicationSource>,
    _lock: WorkspaceLock,
}

impl Streamer {
    /// Startup sequence (spec §4.6): acquire the workspace lock, inspect the
    /// source schema, instantiate the store and run backfill, then build
    /// (but do not yet start) the replication source.
    pub async fn start(config: StreamerConfig) -> Result<Self, StreamerError> {
        let (client, connection) = config.pg_config.connect(tokio_postgres::NoTls).await?;
        tokio::spawn(async move {
            if let Err(error) = connection.await {
                tracing::warn!(%error, "schema-inspection connection closed with error");
            }
        });
        let columns = inspect_schema(&client, &config.schema, &config.relation).await?;

        Self::start_with_columns(config, columns).await
    }

    /// Variant of `start` for callers that already know the column list
    /// (used by tests, and by `create` after provisioning a fresh source
    /// publication).
    pub async fn start_with_columns(
        config: StreamerConfig,
        columns: Vec<ColumnDescriptor>,
    ) -> Result<Self, StreamerError> {
        let lock = match WorkspaceLock::acquire(&config.workspace_dir) {
            Ok(lock) => lock,
            Err(StreamerError::WorkspaceLocked(_)) => {
                return Err(StreamerError::WorkspaceLocked(config.workspace_dir))
            }
            Err(e) => return Err(e),
        };

        let uploader = Uploader::new(config.vault.clone(), config.vault_id.clone(), config.private_key);
        let seal_uploader = Arc::new(SealUploaderAdapter::new(uploader));

        let mut store = LocalStoreManager::new(
            config.workspace_dir.clone(),
            config.relation.clone(),
            columns,
            config.window,
            seal_uploader,
        )?;
        store.upload_all().await?;

        let schema_relation = format!("{}.{}", config.schema, config.relation);
        let source: Box<dyn ReplicationSource> = Box::new(PostgresSource::new(
            config.pg_config,
            config.slot_name,
            schema_relation,
        ));

        Ok(Self {
            store,
            source,
            _lock: lock,
        })
    }

    /// Wires a pre-built store and replication source directly, bypassing
    /// Postgres connectivity. Used by integration tests running against
    /// `MockSource` and an in-memory vault.
    pub fn from_parts(
        store: LocalStoreManager<SealUploaderAdapter>,
        source: Box<dyn ReplicationSource>,
        lock: WorkspaceLock,
    ) -> Self {
        Self {
            store,
            source,
            _lock: lock,
        }
    }

    /// Runs the apply→commit loop until the source's channel closes or
    /// `shutdown` is cancelled. A `LocalStoreManager` error aborts the loop
    /// without acking the in-flight transaction, so the source will
    /// redeliver it on restart (spec §7, §5 ordering guarantee 2).
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), StreamerError> {
        let mut stream = self.source.start().await?;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                next = stream.transactions.recv() => {
                    match next {
                        Some(tx) => {
                            let lsn = tx.commit_lsn;
                            self.store.apply(&tx).await?;
                            self.source.commit(lsn).await?;
                        }
                        None => break,
                    }
                }
            }
        }
        self.source.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basin_common::transaction::{Action, ColumnValue, Record};
    use basin_common::Transaction;
    use basin_replication::MockSource;
    use basin_vault::InMemoryMockClient;
    use rand::thread_rng;

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id", "integer", false, true),
            ColumnDescriptor::new("name", "text", true, false),
        ]
    }

    fn tx(lsn: u64, id: i64, name: &str) -> Transaction {
        Transaction {
            commit_lsn: lsn,
            records: vec![Record {
                action: Action::Insert,
                schema: "public".into(),
                table: "t".into(),
                columns: vec![
                    ColumnValue {
                        name: "id".into(),
                        sql_type: "integer".into(),
                        value: serde_json::json!(id),
                    },
                    ColumnValue {
                        name: "name".into(),
                        sql_type: "text".into(),
                        value: serde_json::json!(name),
                    },
                ],
                primary_key_columns: vec!["id".into()],
            }],
        }
    }

    #[tokio::test]
    async fn runs_mock_source_to_completion_acking_every_commit() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(InMemoryMockClient::new());
        vault.create_vault("v1", "0xabc", None).await.unwrap();

        let uploader = Uploader::new(vault.clone(), "v1", SecretKey::new(&mut thread_rng()));
        let seal_uploader = Arc::new(SealUploaderAdapter::new(uploader));
        let store = LocalStoreManager::new(
            dir.path().to_path_buf(),
            "t".into(),
            columns(),
            Duration::from_secs(3600),
            seal_uploader,
        )
        .unwrap();

        let source: Box<dyn ReplicationSource> =
            Box::new(MockSource::new("basin_t", vec![tx(1, 1, "a"), tx(2, 2, "b")]));
        let lock = WorkspaceLock::acquire(dir.path()).unwrap();
        let streamer = Streamer::from_parts(store, source, lock);

        let shutdown = CancellationToken::new();
        streamer.run(shutdown).await.unwrap();
    }
}
