//! The per-connection state machine described in spec §4.3: assembles the
//! Begin/Insert/Update/Delete/Commit message sequence wal2json emits into
//! commit-LSN-ordered `Transaction`s. Pure and synchronous so it can be
//! tested without any I/O, then driven by both `PostgresSource` (over a real
//! socket) and any test harness that wants to feed it messages directly.

use basin_common::Transaction;

use crate::error::ReplicationError;
use crate::wal2json::{parse_lsn, WalMessage};

pub const PLUGIN_NAME: &str = "wal2json";

#[derive(Debug, Default)]
pub struct TransactionAssembler {
    current_commit_lsn: Option<u64>,
    current_records: Vec<basin_common::Record>,
}

impl TransactionAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one parsed wal2json message in. Returns `Some(Transaction)`
    /// exactly when a Commit closes out a Begin whose remembered LSN
    /// matches the Commit's own LSN; otherwise `None`.
    pub fn feed(&mut self, message: WalMessage) -> Result<Option<Transaction>, ReplicationError> {
        match message {
            WalMessage::Begin { nextlsn } => {
                self.current_commit_lsn = Some(parse_lsn(&nextlsn)?);
                self.current_records.clear();
                Ok(None)
            }
            WalMessage::Commit { lsn } => {
                let commit_lsn = parse_lsn(&lsn)?;
                match self.current_commit_lsn.take() {
                    Some(expected) if expected == commit_lsn => {
                        let records = std::mem::take(&mut self.current_records);
                        Ok(Some(Transaction { commit_lsn, records }))
                    }
                    Some(expected) => {
                        tracing::warn!(
                            expected,
                            commit_lsn,
                            "commit lsn did not match begin; dropping buffered records"
                        );
                        self.current_records.clear();
                        Ok(None)
                    }
                    None => {
                        tracing::warn!(commit_lsn, "commit with no matching begin; dropping");
                        Ok(None)
                    }
                }
            }
            other => {
                if self.current_commit_lsn.is_none() {
                    tracing::warn!("row change outside of a transaction; dropping");
                    return Ok(None);
                }
                if let Some((mut record, pk)) = other.into_record() {
                    record.primary_key_columns = pk.into_iter().map(|p| p.name).collect();
                    self.current_records.push(record);
                }
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal2json::parse_message;

    fn feed_json(assembler: &mut TransactionAssembler, json: &[u8]) -> Option<Transaction> {
        let message = parse_message(json).unwrap();
        assembler.feed(message).unwrap()
    }

    #[test]
    fn assembles_begin_insert_commit_into_one_transaction() {
        let mut assembler = TransactionAssembler::new();
        assert!(feed_json(&mut assembler, br#"{"action":"B","nextlsn":"0/100"}"#).is_none());
        assert!(feed_json(
            &mut assembler,
            br#"{"action":"I","schema":"public","table":"t","columns":[{"name":"id","type":"integer","value":1}],"pk":[{"name":"id"}]}"#
        )
        .is_none());
        let tx = feed_json(&mut assembler, br#"{"action":"C","lsn":"0/100"}"#).unwrap();
        assert_eq!(tx.commit_lsn, 0x100);
        assert_eq!(tx.records.len(), 1);
        assert_eq!(tx.records[0].primary_key_columns, vec!["id".to_string()]);
    }

    #[test]
    fn mismatched_commit_lsn_drops_transaction() {
        let mut assembler = TransactionAssembler::new();
        feed_json(&mut assembler, br#"{"action":"B","nextlsn":"0/100"}"#);
        feed_json(
            &mut assembler,
            br#"{"action":"I","schema":"public","table":"t","columns":[{"name":"id","type":"integer","value":1}],"pk":[]}"#,
        );
        let result = feed_json(&mut assembler, br#"{"action":"C","lsn":"0/200"}"#);
        assert!(result.is_none());
    }

    #[test]
    fn commit_without_begin_is_dropped_not_fatal() {
        let mut assembler = TransactionAssembler::new();
        let result = feed_json(&mut assembler, br#"{"action":"C","lsn":"0/100"}"#);
        assert!(result.is_none());
    }

    #[test]
    fn multiple_inserts_accumulate_in_order() {
        let mut assembler = TransactionAssembler::new();
        feed_json(&mut assembler, br#"{"action":"B","nextlsn":"0/100"}"#);
        feed_json(
            &mut assembler,
            br#"{"action":"I","schema":"public","table":"t","columns":[{"name":"id","type":"integer","value":1}],"pk":[]}"#,
        );
        feed_json(
            &mut assembler,
            br#"{"action":"I","schema":"public","table":"t","columns":[{"name":"id","type":"integer","value":2}],"pk":[]}"#,
        );
        let tx = feed_json(&mut assembler, br#"{"action":"C","lsn":"0/100"}"#).unwrap();
        assert_eq!(tx.records.len(), 2);
        assert_eq!(tx.records[0].columns[0].value, serde_json::json!(1));
        assert_eq!(tx.records[1].columns[0].value, serde_json::json!(2));
    }
}
