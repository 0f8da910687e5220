use serde_json::Value;

/// The kind of row-level change a `Record` carries.
///
/// Only `Insert` is ever replayed; the other variants exist so a
/// `Record` can be parsed uniformly and then dropped by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Insert,
    Update,
    Delete,
}

/// One column value within a `Record`, as decoded from the wal2json payload.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColumnValue {
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    pub value: Value,
}

/// A single row-level change within a committed transaction.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Record {
    pub action: Action,
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnValue>,
    pub primary_key_columns: Vec<String>,
}

impl Record {
    pub fn is_insert(&self) -> bool {
        self.action == Action::Insert
    }
}

/// An ordered sequence of `Record`s sharing a commit LSN.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub commit_lsn: u64,
    pub records: Vec<Record>,
}

impl Transaction {
    /// The `Insert` records in this transaction, in order.
    pub fn inserts(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|r| r.is_insert())
    }
}
