use std::collections::HashSet;

use basin_common::ColumnDescriptor;

use crate::error::StreamerError;

/// Inspects a source relation's column list (type, nullability, primary-key
/// membership) via `pg_catalog`, the way `format_type` + `pg_index` report
/// it rather than `information_schema` (whose `data_type` column collapses
/// every array type down to the unhelpful literal `"ARRAY"`).
pub async fn inspect_schema(
    client: &tokio_postgres::Client,
    schema: &str,
    relation: &str,
) -> Result<Vec<ColumnDescriptor>, StreamerError> {
    let qualified = format!("{schema}.{relation}");

    let pk_rows = client
        .query(
            "SELECT a.attname FROM pg_index i \
             JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
             WHERE i.indrelid = $1::regclass AND i.indisprimary",
            &[&qualified],
        )
        .await?;
    let pk_columns: HashSet<String> = pk_rows.iter().map(|row| row.get(0)).collect();

    let rows = client
        .query(
            "SELECT a.attname, format_type(a.atttypid, a.atttypmod), a.attnotnull \
             FROM pg_attribute a \
             JOIN pg_class t ON t.oid = a.attrelid \
             JOIN pg_namespace n ON n.oid = t.relnamespace \
             WHERE n.nspname = $1 AND t.relname = $2 AND a.attnum > 0 AND NOT a.attisdropped \
             ORDER BY a.attnum",
            &[&schema, &relation],
        )
        .await?;

    let columns: Vec<ColumnDescriptor> = rows
        .into_iter()
        .map(|row| {
            let name: String = row.get(0);
            let sql_type: String = row.get(1);
            let not_null: bool = row.get(2);
            let primary_key = pk_columns.contains(&name);
            ColumnDescriptor::new(name, sql_type, !not_null, primary_key)
        })
        .collect();

    if columns.is_empty() {
        return Err(StreamerError::EmptySchema);
    }
    Ok(columns)
}
