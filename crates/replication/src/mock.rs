//! An in-memory `ReplicationSource` that replays a fixed transaction list.
//! Used by `basin-streamer` integration tests and anywhere a live Postgres
//! server isn't available.

use async_trait::async_trait;
use basin_common::Transaction;
use tokio::sync::mpsc;

use crate::error::ReplicationError;
use crate::{ReplicationSource, ReplicationStream};

pub struct MockSource {
    slot_id: String,
    transactions: Vec<Transaction>,
    acked: Vec<u64>,
    started: bool,
}

impl MockSource {
    pub fn new(slot_id: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        Self {
            slot_id: slot_id.into(),
            transactions,
            acked: Vec::new(),
            started: false,
        }
    }

    /// The LSNs acknowledged via `commit` so far, in call order. Useful for
    /// asserting a caller committed every transaction it was handed.
    pub fn acknowledged(&self) -> &[u64] {
        &self.acked
    }
}

#[async_trait]
impl ReplicationSource for MockSource {
    async fn start(&mut self) -> Result<ReplicationStream, ReplicationError> {
        if self.started {
            return Err(ReplicationError::SourceUnavailable(
                "mock source already started".into(),
            ));
        }
        self.started = true;

        let (tx, rx) = mpsc::channel(self.transactions.len().max(1));
        for transaction in self.transactions.drain(..) {
            tx.send(transaction)
                .await
                .map_err(|_| ReplicationError::Closed)?;
        }

        Ok(ReplicationStream {
            transactions: rx,
            slot_id: self.slot_id.clone(),
        })
    }

    async fn commit(&mut self, lsn: u64) -> Result<(), ReplicationError> {
        if !self.started {
            return Err(ReplicationError::SourceUnavailable(
                "mock source not started".into(),
            ));
        }
        self.acked.push(lsn);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), ReplicationError> {
        self.started = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basin_common::Record;

    fn tx(lsn: u64) -> Transaction {
        Transaction {
            commit_lsn: lsn,
            records: Vec::<Record>::new(),
        }
    }

    #[tokio::test]
    async fn replays_transactions_in_order_and_tracks_commits() {
        let mut source = MockSource::new("basin_t", vec![tx(1), tx(2), tx(3)]);
        let mut stream = source.start().await.unwrap();

        let first = stream.transactions.recv().await.unwrap();
        assert_eq!(first.commit_lsn, 1);
        source.commit(first.commit_lsn).await.unwrap();

        let second = stream.transactions.recv().await.unwrap();
        assert_eq!(second.commit_lsn, 2);
        source.commit(second.commit_lsn).await.unwrap();

        assert_eq!(source.acknowledged(), &[1, 2]);
    }

    #[tokio::test]
    async fn cannot_start_twice() {
        let mut source = MockSource::new("basin_t", vec![tx(1)]);
        source.start().await.unwrap();
        assert!(source.start().await.is_err());
    }
}
