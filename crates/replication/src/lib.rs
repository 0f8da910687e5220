//! Maintains a logical replication slot and yields a stream of committed
//! transactions (spec §4.3). Two capability variants behind one trait, per
//! spec §9 "Dynamic dispatch": `Postgres` talks to a real server, `Mock`
//! replays a canned transaction list for tests.

mod error;
mod mock;
mod postgres_source;
mod state_machine;
mod wal2json;

pub use error::ReplicationError;
pub use mock::MockSource;
pub use postgres_source::{ensure_slot_exists, provision_slot, PostgresSource};
pub use state_machine::{TransactionAssembler, PLUGIN_NAME};

use async_trait::async_trait;
use basin_common::Transaction;
use tokio::sync::mpsc;

/// What `ReplicationSource::start` hands back: a channel of commit-ordered
/// transactions, and the slot id the source is streaming from.
pub struct ReplicationStream {
    pub transactions: mpsc::Receiver<Transaction>,
    pub slot_id: String,
}

/// A source of committed, insert-filtered-at-the-edges source transactions.
/// Implemented by `PostgresSource` (real) and `MockSource` (tests).
#[async_trait]
pub trait ReplicationSource: Send {
    async fn start(&mut self) -> Result<ReplicationStream, ReplicationError>;

    /// Advances the server's flush pointer. Must only be called once the
    /// transaction with this LSN is durable downstream (spec Invariant 5).
    async fn commit(&mut self, lsn: u64) -> Result<(), ReplicationError>;

    async fn shutdown(&mut self) -> Result<(), ReplicationError>;
}
