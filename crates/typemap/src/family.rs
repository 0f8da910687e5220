use crate::error::TypeMapError;

/// The literal-rendering family a scalar source type belongs to. Grouping by
/// family (rather than switching on the exact type name everywhere) keeps
/// `render_literal` and `store_type_name` in lock-step with the table in
/// spec §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFamily {
    Boolean,
    Numeric,
    Varchar,
    Bytea,
    Json,
    Uuid,
    Macaddr,
    Temporal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar(ScalarFamily),
    Array(ScalarFamily),
}

/// Maps a scalar (non-array) source type name to its store type name and
/// literal-rendering family. Returns `None` for anything not in the accepted
/// set (enums, composites, and anything else unknown).
fn scalar(source_type: &str) -> Option<(&'static str, ScalarFamily)> {
    Some(match source_type {
        "boolean" => ("BOOLEAN", ScalarFamily::Boolean),
        "smallint" => ("SMALLINT", ScalarFamily::Numeric),
        "integer" => ("INTEGER", ScalarFamily::Numeric),
        "bigint" => ("BIGINT", ScalarFamily::Numeric),
        "oid" => ("UINTEGER", ScalarFamily::Numeric),
        "real" => ("FLOAT", ScalarFamily::Numeric),
        "double precision" => ("DOUBLE", ScalarFamily::Numeric),
        "numeric" => ("DOUBLE", ScalarFamily::Numeric),
        "\"char\"" => ("VARCHAR", ScalarFamily::Varchar),
        "character" => ("VARCHAR", ScalarFamily::Varchar),
        "character varying" => ("VARCHAR", ScalarFamily::Varchar),
        "text" => ("VARCHAR", ScalarFamily::Varchar),
        "bpchar" => ("VARCHAR", ScalarFamily::Varchar),
        "bytea" => ("BLOB", ScalarFamily::Bytea),
        "json" => ("VARCHAR", ScalarFamily::Json),
        "jsonb" => ("VARCHAR", ScalarFamily::Json),
        "uuid" => ("UUID", ScalarFamily::Uuid),
        "macaddr" => ("VARCHAR", ScalarFamily::Macaddr),
        "date" => ("DATE", ScalarFamily::Temporal),
        "time" | "time without time zone" => ("TIME", ScalarFamily::Temporal),
        "time with time zone" => ("TIMETZ", ScalarFamily::Temporal),
        "timestamp" | "timestamp without time zone" => ("TIMESTAMP", ScalarFamily::Temporal),
        "timestamp with time zone" => ("TIMESTAMPTZ", ScalarFamily::Temporal),
        "interval" => ("INTERVAL", ScalarFamily::Temporal),
        _ => return None,
    })
}

/// Classifies a full source type name (scalar or single-dimension array),
/// returning its store type name and shape, or `UnsupportedType` for
/// anything the system doesn't accept: unknown scalars, enums, composites,
/// and multi-dimensional arrays.
pub fn classify(source_type: &str) -> Result<(String, Shape), TypeMapError> {
    let mut base = source_type;
    let mut dimensions = 0u32;
    while let Some(stripped) = base.strip_suffix("[]") {
        base = stripped;
        dimensions += 1;
    }

    if dimensions > 1 {
        return Err(TypeMapError::UnsupportedType(source_type.to_string()));
    }

    let (store_base, family) = scalar(base)
        .ok_or_else(|| TypeMapError::UnsupportedType(source_type.to_string()))?;

    if dimensions == 1 {
        Ok((format!("{store_base}[]"), Shape::Array(family)))
    } else {
        Ok((store_base.to_string(), Shape::Scalar(family)))
    }
}
