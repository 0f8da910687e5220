use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use basin_common::{ColumnDescriptor, Transaction};
use basin_typemap::{create_table_statement, render_literal};

use crate::error::StoreError;
use crate::SealUploader;

struct LiveDb {
    conn: duckdb::Connection,
    path: PathBuf,
    created_at: Instant,
}

/// Owns at most one live embedded database for a single relation, rolling it
/// over to a sealed, uploaded file once its age exceeds the configured
/// window (spec §4.4). Sole-owned by the orchestrator (spec §5): nothing
/// else may open `current.db` while this is alive.
pub struct LocalStoreManager<U> {
    dir: PathBuf,
    relation: String,
    columns: Vec<ColumnDescriptor>,
    window: Duration,
    uploader: Arc<U>,
    live: Option<LiveDb>,
}

impl<U: SealUploader> LocalStoreManager<U> {
    pub fn new(
        dir: PathBuf,
        relation: String,
        columns: Vec<ColumnDescriptor>,
        window: Duration,
        uploader: Arc<U>,
    ) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            relation,
            columns,
            window,
            uploader,
            live: None,
        })
    }

    fn live_path(&self) -> PathBuf {
        self.dir.join("current.db")
    }

    /// Opens `current.db` and applies the schema if it isn't already open.
    fn ensure_live(&mut self) -> Result<(), StoreError> {
        if self.live.is_some() {
            return Ok(());
        }
        let path = self.live_path();
        let conn = duckdb::Connection::open(&path)?;
        let statement = create_table_statement(&self.relation, &self.columns)?;
        conn.execute_batch(&statement)?;
        self.live = Some(LiveDb {
            conn,
            path,
            created_at: Instant::now(),
        });
        Ok(())
    }

    /// Applies one committed transaction: seals first if the live database
    /// has aged past the window, then inserts every record as one
    /// multi-row `INSERT`. The whole transaction fails together if any
    /// record carries an unsupported type (spec §4.4, §7 `UnsupportedType`).
    pub async fn apply(&mut self, tx: &Transaction) -> Result<(), StoreError> {
        self.ensure_live()?;
        let age = self
            .live
            .as_ref()
            .expect("ensured above")
            .created_at
            .elapsed();
        if age > self.window {
            self.seal().await?;
            self.ensure_live()?;
        }
        self.insert_transaction(tx)
    }

    fn insert_transaction(&mut self, tx: &Transaction) -> Result<(), StoreError> {
        let mut inserts = tx.inserts().peekable();
        if inserts.peek().is_none() {
            return Ok(());
        }
        let live = self.live.as_mut().ok_or(StoreError::NoLiveDatabase)?;

        let mut rows = Vec::new();
        let mut columns: Vec<&str> = Vec::new();
        for record in inserts {
            if columns.is_empty() {
                columns = record.columns.iter().map(|c| c.name.as_str()).collect();
            }
            let mut rendered = Vec::with_capacity(record.columns.len());
            for column in &record.columns {
                rendered.push(render_literal(&column.sql_type, &column.value)?);
            }
            rows.push(format!("({})", rendered.join(", ")));
        }

        let statement = format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.relation,
            columns.join(", "),
            rows.join(", ")
        );
        live.conn.execute_batch(&statement)?;
        Ok(())
    }

    /// Export → close → upload → cleanup, then reopen a fresh live database.
    /// Renames `current.db` to `<nanoseconds>.db` first so a new
    /// `current.db` can be opened the moment the rename completes, per the
    /// open question pinned in spec §9.
    async fn seal(&mut self) -> Result<(), StoreError> {
        let live = self.live.take().ok_or(StoreError::NoLiveDatabase)?;
        drop(live.conn);

        let sealed_path = self.dir.join(format!("{}.db", now_nanos()));
        std::fs::rename(&live.path, &sealed_path)?;
        let (live_wal, sealed_wal) = (wal_sidecar(&live.path), wal_sidecar(&sealed_path));
        if live_wal.exists() {
            std::fs::rename(&live_wal, &sealed_wal)?;
        }

        self.export_and_upload(&sealed_path).await
    }

    /// Exports one sealed database file to parquet and hands it to the
    /// uploader. On success, removes the database, its WAL sidecar, and the
    /// export, in that order, ignoring not-found errors so cleanup is
    /// idempotent (spec §4.4 step 4). On failure, leaves all three in place
    /// as backfill targets.
    async fn export_and_upload(&mut self, sealed_path: &Path) -> Result<(), StoreError> {
        let export_path = sealed_path.with_extension("parquet");
        {
            let conn = duckdb::Connection::open(sealed_path)?;
            let copy_sql = format!(
                "COPY (SELECT * FROM {}) TO '{}' (FORMAT PARQUET)",
                self.relation,
                export_path.display()
            );
            conn.execute_batch(&copy_sql)?;
        }

        match self.uploader.upload(&export_path, None).await {
            Ok(()) => {
                remove_if_exists(sealed_path)?;
                remove_if_exists(&wal_sidecar(sealed_path))?;
                remove_if_exists(&export_path)?;
            }
            Err(error) => {
                tracing::warn!(
                    error,
                    path = %sealed_path.display(),
                    "upload failed; leaving sealed database for later backfill"
                );
            }
        }
        Ok(())
    }

    /// Uploads every orphaned sealed database in the store directory, plus
    /// `current.db` if one is present, in filename (creation) order (spec
    /// §4.4, scenario E). Run once at startup before the replication source
    /// is started.
    pub async fn upload_all(&mut self) -> Result<(), StoreError> {
        let mut sealed = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if is_sealed_name(name) {
                    sealed.push(path);
                }
            }
        }
        sealed.sort();
        for path in sealed {
            self.export_and_upload(&path).await?;
        }

        if self.live_path().exists() {
            self.ensure_live()?;
            self.seal().await?;
        }
        Ok(())
    }
}

fn is_sealed_name(name: &str) -> bool {
    name.strip_suffix(".db")
        .map(|stem| !stem.is_empty() && stem.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

fn wal_sidecar(db_path: &Path) -> PathBuf {
    let mut name: OsString = db_path.as_os_str().to_owned();
    name.push(".wal");
    PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::Io(e)),
    }
}

fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use basin_common::transaction::{Action, ColumnValue, Record};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingUploader {
        uploaded: Mutex<Vec<PathBuf>>,
    }

    #[async_trait::async_trait]
    impl SealUploader for RecordingUploader {
        async fn upload(&self, export_path: &Path, _timestamp: Option<i64>) -> Result<(), String> {
            self.uploaded.lock().unwrap().push(export_path.to_path_buf());
            Ok(())
        }
    }

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
    async fn applies_transaction_without_sealing_within_window() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = Arc::new(RecordingUploader::default());
        let mut manager = LocalStoreManager::new(
            dir.path().to_path_buf(),
            "t".into(),
            columns(),
            Duration::from_secs(3600),
            uploader.clone(),
        )
        .unwrap();

        manager.apply(&tx(1, 200232, "100")).await.unwrap();
        assert!(uploader.uploaded.lock().unwrap().is_empty());
        assert!(dir.path().join("current.db").exists());
    }

    #[tokio::test]
    async fn seals_when_window_elapses_before_next_apply() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = Arc::new(RecordingUploader::default());
        let mut manager = LocalStoreManager::new(
            dir.path().to_path_buf(),
            "t".into(),
            columns(),
            Duration::from_millis(10),
            uploader.clone(),
        )
        .unwrap();

        manager.apply(&tx(1, 200232, "100")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        manager.apply(&tx(2, 200233, "200")).await.unwrap();

        assert_eq!(uploader.uploaded.lock().unwrap().len(), 1);
        assert!(dir.path().join("current.db").exists());
    }

    #[tokio::test]
    async fn upload_all_drains_orphaned_and_live_databases() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = Arc::new(RecordingUploader::default());
        {
            let mut manager = LocalStoreManager::new(
                dir.path().to_path_buf(),
                "t".into(),
                columns(),
                Duration::from_secs(3600),
                uploader.clone(),
            )
            .unwrap();
            manager.apply(&tx(1, 1, "a")).await.unwrap();
        }

        let mut manager = LocalStoreManager::new(
            dir.path().to_path_buf(),
            "t".into(),
            columns(),
            Duration::from_secs(3600),
            uploader.clone(),
        )
        .unwrap();
        manager.upload_all().await.unwrap();

        assert_eq!(uploader.uploaded.lock().unwrap().len(), 1);
        assert!(!dir.path().join("current.db").exists());
    }

    #[tokio::test]
    async fn non_insert_records_are_ignored_even_when_mixed_with_an_insert() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = Arc::new(RecordingUploader::default());
        let mut manager = LocalStoreManager::new(
            dir.path().to_path_buf(),
            "t".into(),
            columns(),
            Duration::from_secs(3600),
            uploader,
        )
        .unwrap();

        let mut mixed = tx(1, 1, "a");
        mixed.records.push(Record {
            action: Action::Delete,
            schema: "public".into(),
            table: "t".into(),
            columns: vec![ColumnValue {
                name: "id".into(),
                sql_type: "integer".into(),
                value: serde_json::json!(1),
            }],
            primary_key_columns: vec!["id".into()],
        });

        manager.apply(&mixed).await.unwrap();

        let live = manager.live.as_ref().unwrap();
        let count: i64 = live
            .conn
            .query_row("SELECT count(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
