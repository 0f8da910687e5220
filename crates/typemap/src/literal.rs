use serde_json::Value;

use crate::error::TypeMapError;
use crate::family::{classify, ScalarFamily, Shape};

/// Renders the literal fragment used inside an `INSERT ... VALUES (…)`
/// statement for a single column value, given its source SQL type and
/// JSON-encoded value as received from the replication stream.
pub fn render_literal(source_type: &str, value: &Value) -> Result<String, TypeMapError> {
    if value.is_null() {
        return Ok("null".to_string());
    }

    let (_, shape) = classify(source_type)?;
    let encoded = serde_json::to_string(value).expect("Value always serializes");

    match shape {
        Shape::Scalar(ScalarFamily::Boolean) | Shape::Scalar(ScalarFamily::Numeric) => {
            Ok(strip_outer_quotes(&encoded))
        }
        Shape::Scalar(ScalarFamily::Json) => {
            let stripped = strip_outer_quotes(&encoded);
            let unescaped = unescape_backslashes(&stripped);
            Ok(format!("'{unescaped}'"))
        }
        Shape::Scalar(
            ScalarFamily::Varchar
            | ScalarFamily::Bytea
            | ScalarFamily::Uuid
            | ScalarFamily::Macaddr
            | ScalarFamily::Temporal,
        ) => Ok(replace_quotes(&encoded)),
        Shape::Array(inner) => render_array(&encoded, inner),
    }
}

fn strip_outer_quotes(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

fn replace_quotes(s: &str) -> String {
    s.replace('"', "'")
}

fn unescape_backslashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('"') => {
                    out.push('"');
                    chars.next();
                }
                Some('\\') => {
                    out.push('\\');
                    chars.next();
                }
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Renders a Postgres array literal (arriving as a brace-delimited string,
/// e.g. `"{1,-2,NULL}"`) as a DuckDB `list_value(…)` expression.
fn render_array(encoded: &str, inner: ScalarFamily) -> Result<String, TypeMapError> {
    let stripped = strip_outer_quotes(encoded);
    let inner_text = stripped
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(stripped.as_str());

    if inner_text.is_empty() {
        return Ok("list_value()".to_string());
    }

    let elements: Vec<String> = inner_text
        .split(',')
        .map(|raw| render_array_element(raw.trim(), inner))
        .collect();

    Ok(format!("list_value({})", elements.join(", ")))
}

fn render_array_element(raw: &str, family: ScalarFamily) -> String {
    if raw == "NULL" {
        return "null".to_string();
    }

    match family {
        ScalarFamily::Boolean => match raw {
            "t" => "true".to_string(),
            "f" => "false".to_string(),
            other => other.to_string(),
        },
        ScalarFamily::Numeric => raw.to_string(),
        ScalarFamily::Bytea => {
            let stripped = raw.strip_prefix("\\\\x").or_else(|| raw.strip_prefix("\\x")).unwrap_or(raw);
            format!("'{stripped}'::BLOB")
        }
        ScalarFamily::Uuid => format!("'{raw}'::UUID"),
        ScalarFamily::Varchar | ScalarFamily::Macaddr | ScalarFamily::Temporal | ScalarFamily::Json => {
            format!("'{raw}'")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_renders_as_null() {
        assert_eq!(render_literal("integer", &Value::Null).unwrap(), "null");
    }

    #[test]
    fn integer_strips_quotes() {
        assert_eq!(render_literal("integer", &json!(200232)).unwrap(), "200232");
        assert_eq!(
            render_literal("bigint", &json!("200232")).unwrap(),
            "200232"
        );
    }

    #[test]
    fn boolean_strips_quotes() {
        assert_eq!(render_literal("boolean", &json!(true)).unwrap(), "true");
    }

    #[test]
    fn text_replaces_quotes() {
        assert_eq!(
            render_literal("text", &json!("100")).unwrap(),
            "'100'"
        );
    }

    #[test]
    fn bytea_replaces_quotes() {
        assert_eq!(
            render_literal("bytea", &json!("\\x0102")).unwrap(),
            "'\\x0102'"
        );
    }

    #[test]
    fn uuid_replaces_quotes() {
        assert_eq!(
            render_literal("uuid", &json!("11111111-1111-1111-1111-111111111111")).unwrap(),
            "'11111111-1111-1111-1111-111111111111'"
        );
    }

    #[test]
    fn jsonb_unescapes_and_wraps() {
        let value = json!("{\"a\":1}");
        assert_eq!(render_literal("jsonb", &value).unwrap(), "'{\"a\":1}'");
    }

    #[test]
    fn integer_array_renders_list_value() {
        let value = json!("{1,-2,NULL}");
        assert_eq!(
            render_literal("integer[]", &value).unwrap(),
            "list_value(1, -2, null)"
        );
    }

    #[test]
    fn boolean_array_renders_true_false() {
        let value = json!("{t,f,NULL}");
        assert_eq!(
            render_literal("boolean[]", &value).unwrap(),
            "list_value(true, false, null)"
        );
    }

    #[test]
    fn text_array_wraps_elements() {
        let value = json!("{hello,world}");
        assert_eq!(
            render_literal("text[]", &value).unwrap(),
            "list_value('hello', 'world')"
        );
    }

    #[test]
    fn unsupported_enum_array_is_error() {
        let value = json!("{a,b}");
        assert!(render_literal("enum_type_foo[]", &value).is_err());
    }

    #[test]
    fn multi_dim_array_is_error() {
        let value = json!("{{1,2},{3,4}}");
        assert!(render_literal("integer[][]", &value).is_err());
    }
}
