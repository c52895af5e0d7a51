//! Column type declarations
//!
//! Client values arrive as text. A declared column type decides the SQL cast
//! applied to each bound value, so `bigint`, `uuid` and timestamp columns
//! compare against values of their own type instead of `text`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::fmt;

/// PostgreSQL type of a declared column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Text,
    /// `BIGINT`; narrower integer columns compare fine against it
    Integer,
    Numeric,
    Boolean,
    /// `TIMESTAMP WITH TIME ZONE`
    Timestamp,
    Date,
    Uuid,
    /// `JSONB`
    Json,
}

impl ColumnType {
    /// Name used in `$n::<type>` casts
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Integer => "bigint",
            ColumnType::Numeric => "numeric",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamp => "timestamptz",
            ColumnType::Date => "date",
            ColumnType::Uuid => "uuid",
            ColumnType::Json => "jsonb",
        }
    }

    /// Whether `value` casts to this type without a database error
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (ColumnType::Json, _) => true,
            (_, Value::Array(_) | Value::Object(_)) => false,
            (ColumnType::Text, _) => true,
            (ColumnType::Integer, Value::Number(number)) => number.is_i64() || number.is_u64(),
            (ColumnType::Integer, Value::String(raw)) => raw.trim().parse::<i64>().is_ok(),
            (ColumnType::Numeric, Value::Number(_)) => true,
            (ColumnType::Numeric, Value::String(raw)) => {
                raw.trim().parse::<f64>().is_ok_and(f64::is_finite)
            }
            (ColumnType::Boolean, Value::Bool(_)) => true,
            (ColumnType::Boolean, Value::Number(number)) => {
                matches!(number.as_i64(), Some(0) | Some(1))
            }
            (ColumnType::Boolean, Value::String(raw)) => matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "t" | "f" | "true" | "false" | "1" | "0" | "yes" | "no" | "on" | "off"
            ),
            (ColumnType::Timestamp, Value::String(raw)) => is_timestamp(raw.trim()),
            (ColumnType::Date, Value::String(raw)) => is_date(raw.trim()),
            (ColumnType::Uuid, Value::String(raw)) => uuid::Uuid::parse_str(raw.trim()).is_ok(),
            _ => false,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_type())
    }
}

fn is_date(raw: &str) -> bool {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
}

fn is_timestamp(raw: &str) -> bool {
    const LOCAL_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

    is_date(raw)
        || DateTime::parse_from_rfc3339(raw).is_ok()
        || LOCAL_FORMATS
            .iter()
            .any(|format| NaiveDateTime::parse_from_str(raw, format).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_admits_whole_numbers_only() {
        assert!(ColumnType::Integer.admits(&json!(7)));
        assert!(ColumnType::Integer.admits(&json!("42")));
        assert!(!ColumnType::Integer.admits(&json!("4.2")));
        assert!(!ColumnType::Integer.admits(&json!("abc")));
        assert!(!ColumnType::Integer.admits(&json!(true)));
    }

    #[test]
    fn test_temporal_and_uuid_values() {
        assert!(ColumnType::Timestamp.admits(&json!("2024-01-31")));
        assert!(ColumnType::Timestamp.admits(&json!("2024-01-31 10:15:00")));
        assert!(ColumnType::Timestamp.admits(&json!("2024-01-31T10:15:00+02:00")));
        assert!(!ColumnType::Timestamp.admits(&json!("yesterday")));
        assert!(ColumnType::Date.admits(&json!("2024-02-29")));
        assert!(!ColumnType::Date.admits(&json!("2023-02-29")));

        assert!(ColumnType::Uuid.admits(&json!("67e55044-10b1-426f-9247-bb680e5fe0c8")));
        assert!(!ColumnType::Uuid.admits(&json!("67e55044")));
    }

    #[test]
    fn test_text_admits_any_scalar() {
        assert!(ColumnType::Text.admits(&json!("67e55044-10b1-426f-9247-bb680e5fe0c8")));
        assert!(ColumnType::Text.admits(&json!(12)));
        assert!(!ColumnType::Text.admits(&json!(["a"])));
        assert!(ColumnType::Boolean.admits(&json!("yes")));
        assert_eq!(ColumnType::Timestamp.to_string(), "timestamptz");
    }
}
