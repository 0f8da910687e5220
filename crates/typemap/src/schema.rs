use basin_common::ColumnDescriptor;

use crate::error::TypeMapError;
use crate::family::classify;

/// Renders `CREATE TABLE IF NOT EXISTS <relation> (…)` for the embedded
/// store from a column descriptor list, per spec §4.1 / §4.4.
pub fn create_table_statement(
    relation: &str,
    columns: &[ColumnDescriptor],
) -> Result<String, TypeMapError> {
    if columns.is_empty() {
        return Err(TypeMapError::EmptySchema);
    }

    let mut column_defs = Vec::with_capacity(columns.len());
    let mut primary_key = Vec::new();

    for column in columns {
        let (store_type, _) = classify(&column.sql_type)?;
        let mut def = format!("{} {}", column.name, store_type);
        if !column.nullable {
            def.push_str(" NOT NULL");
        }
        column_defs.push(def);

        if column.primary_key {
            primary_key.push(column.name.clone());
        }
    }

    let mut clauses = column_defs;
    if !primary_key.is_empty() {
        clauses.push(format!("PRIMARY KEY ({})", primary_key.join(", ")));
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {relation} ({})",
        clauses.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_create_table_with_primary_key() {
        let columns = vec![
            ColumnDescriptor::new("id", "integer", false, true),
            ColumnDescriptor::new("name", "text", true, false),
        ];
        let stmt = create_table_statement("t", &columns).unwrap();
        assert_eq!(
            stmt,
            "CREATE TABLE IF NOT EXISTS t (id INTEGER NOT NULL, name VARCHAR, PRIMARY KEY (id))"
        );
    }

    #[test]
    fn pk_only_table_is_valid() {
        let columns = vec![ColumnDescriptor::new("id", "integer", false, true)];
        let stmt = create_table_statement("t", &columns).unwrap();
        assert_eq!(
            stmt,
            "CREATE TABLE IF NOT EXISTS t (id INTEGER NOT NULL, PRIMARY KEY (id))"
        );
    }

    #[test]
    fn empty_schema_is_error() {
        assert!(create_table_statement("t", &[]).is_err());
    }

    #[test]
    fn unsupported_column_type_is_error() {
        let columns = vec![ColumnDescriptor::new("c", "enum_type_foo[]", true, false)];
        assert!(create_table_statement("t", &columns).is_err());
    }
}
