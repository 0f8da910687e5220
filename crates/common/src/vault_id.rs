use std::fmt;
use std::str::FromStr;

use crate::error::BasinError;

/// A `(namespace, relation)` pair naming a vault, rendered as `namespace.relation`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct VaultId {
    pub namespace: String,
    pub relation: String,
}

impl VaultId {
    pub fn new(namespace: impl Into<String>, relation: impl Into<String>) -> Result<Self, BasinError> {
        let namespace = namespace.into();
        let relation = relation.into();
        validate_identifier(&namespace)?;
        validate_identifier(&relation)?;
        Ok(Self { namespace, relation })
    }

    /// The replication slot name for this vault: `basin_<relation>`.
    pub fn slot_name(&self) -> String {
        format!("basin_{}", self.relation)
    }
}

fn validate_identifier(s: &str) -> Result<(), BasinError> {
    let mut chars = s.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if first_ok && rest_ok {
        Ok(())
    } else {
        Err(BasinError::InvalidVaultId(s.to_string()))
    }
}

impl fmt::Display for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.relation)
    }
}

impl FromStr for VaultId {
    type Err = BasinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, relation) = s
            .split_once('.')
            .ok_or_else(|| BasinError::InvalidVaultId(s.to_string()))?;
        VaultId::new(namespace, relation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_id() {
        let id: VaultId = "public.events".parse().unwrap();
        assert_eq!(id.namespace, "public");
        assert_eq!(id.relation, "events");
        assert_eq!(id.to_string(), "public.events");
        assert_eq!(id.slot_name(), "basin_events");
    }

    #[test]
    fn rejects_missing_dot() {
        assert!("public_events".parse::<VaultId>().is_err());
    }

    #[test]
    fn rejects_leading_digit() {
        assert!(VaultId::new("1ns", "rel").is_err());
        assert!(VaultId::new("ns", "1rel").is_err());
    }

    #[test]
    fn accepts_underscore_prefixed() {
        assert!(VaultId::new("_ns", "_rel").is_ok());
    }
}
