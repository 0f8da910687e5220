//! Parses wal2json `format-version=2` per-message JSON payloads (one JSON
//! object per WAL record, emitted because `include-transaction=true`
//! produces separate Begin/Commit framing messages rather than one
//! combined change array).

use basin_common::transaction::{Action, ColumnValue, Record};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ReplicationError;

#[derive(Debug, Deserialize)]
#[serde(tag = "action")]
pub enum WalMessage {
    #[serde(rename = "B")]
    Begin { nextlsn: String },
    #[serde(rename = "C")]
    Commit { lsn: String },
    #[serde(rename = "I")]
    Insert {
        schema: String,
        table: String,
        columns: Vec<WalColumn>,
        #[serde(default)]
        pk: Vec<WalPkColumn>,
    },
    #[serde(rename = "U")]
    Update {
        schema: String,
        table: String,
        columns: Vec<WalColumn>,
        #[serde(default)]
        pk: Vec<WalPkColumn>,
    },
    #[serde(rename = "D")]
    Delete {
        schema: String,
        table: String,
        #[serde(default)]
        identity: Vec<WalColumn>,
        #[serde(default)]
        pk: Vec<WalPkColumn>,
    },
}

#[derive(Debug, Deserialize)]
pub struct WalColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct WalPkColumn {
    pub name: String,
}

/// Parses the commit LSN out of a `0/1A2B3C` style Postgres LSN string.
pub fn parse_lsn(lsn: &str) -> Result<u64, ReplicationError> {
    let (hi, lo) = lsn
        .split_once('/')
        .ok_or_else(|| ReplicationError::MalformedPayload(format!("bad lsn: {lsn}")))?;
    let hi = u64::from_str_radix(hi, 16)
        .map_err(|_| ReplicationError::MalformedPayload(format!("bad lsn: {lsn}")))?;
    let lo = u64::from_str_radix(lo, 16)
        .map_err(|_| ReplicationError::MalformedPayload(format!("bad lsn: {lsn}")))?;
    Ok((hi << 32) | lo)
}

pub fn parse_message(payload: &[u8]) -> Result<WalMessage, ReplicationError> {
    serde_json::from_slice(payload)
        .map_err(|e| ReplicationError::MalformedPayload(e.to_string()))
}

impl WalMessage {
    pub fn into_record(self) -> Option<(Record, Vec<WalPkColumn>)> {
        match self {
            WalMessage::Insert { schema, table, columns, pk } => Some((
                Record {
                    action: Action::Insert,
                    schema,
                    table,
                    columns: columns.into_iter().map(WalColumn::into_value).collect(),
                    primary_key_columns: Vec::new(),
                },
                pk,
            )),
            WalMessage::Update { schema, table, columns, pk } => Some((
                Record {
                    action: Action::Update,
                    schema,
                    table,
                    columns: columns.into_iter().map(WalColumn::into_value).collect(),
                    primary_key_columns: Vec::new(),
                },
                pk,
            )),
            WalMessage::Delete { schema, table, identity, pk } => Some((
                Record {
                    action: Action::Delete,
                    schema,
                    table,
                    columns: identity.into_iter().map(WalColumn::into_value).collect(),
                    primary_key_columns: Vec::new(),
                },
                pk,
            )),
            WalMessage::Begin { .. } | WalMessage::Commit { .. } => None,
        }
    }
}

impl WalColumn {
    fn into_value(self) -> ColumnValue {
        ColumnValue {
            name: self.name,
            sql_type: self.sql_type,
            value: self.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lsn() {
        assert_eq!(parse_lsn("0/1A2B3C").unwrap(), 0x1A2B3C);
    }

    #[test]
    fn parses_insert_message() {
        let json = br#"{"action":"I","schema":"public","table":"t","columns":[{"name":"id","type":"integer","value":1}],"pk":[{"name":"id"}]}"#;
        let msg = parse_message(json).unwrap();
        let (record, pk) = msg.into_record().unwrap();
        assert_eq!(record.table, "t");
        assert_eq!(record.columns.len(), 1);
        assert_eq!(pk.len(), 1);
    }

    #[test]
    fn parses_begin_and_commit() {
        let begin = parse_message(br#"{"action":"B","nextlsn":"0/100"}"#).unwrap();
        matches!(begin, WalMessage::Begin { .. });
        let commit = parse_message(br#"{"action":"C","lsn":"0/100"}"#).unwrap();
        matches!(commit, WalMessage::Commit { .. });
    }
}
