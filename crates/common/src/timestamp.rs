use chrono::{DateTime, NaiveDate, Utc};

use crate::error::BasinError;

/// Parses a timestamp accepted on the CLI surface: Unix seconds, `YYYY-MM-DD`,
/// or RFC 3339. Returns the value as Unix seconds.
pub fn parse_timestamp(input: &str) -> Result<i64, BasinError> {
    if let Ok(seconds) = input.parse::<i64>() {
        return Ok(seconds);
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| BasinError::Custom(format!("invalid date: {input}")))?;
        return Ok(midnight.and_utc().timestamp());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.timestamp());
    }

    Err(BasinError::Custom(format!(
        "could not parse timestamp '{input}' as Unix seconds, YYYY-MM-DD, or RFC 3339"
    )))
}

/// The current time, in Unix seconds, used when no timestamp is supplied.
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_seconds() {
        assert_eq!(parse_timestamp("1700000000").unwrap(), 1700000000);
    }

    #[test]
    fn parses_date() {
        assert_eq!(parse_timestamp("2024-01-01").unwrap(), 1704067200);
    }

    #[test]
    fn parses_rfc3339() {
        assert_eq!(
            parse_timestamp("2024-01-01T00:00:00Z").unwrap(),
            1704067200
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("not-a-timestamp").is_err());
    }
}
