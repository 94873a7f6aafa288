use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::Attributes;

/// A record as stored in redb
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: u64,
    pub attributes: Attributes,
}

/// Storage key of a record. Ids are zero-padded so keys of one table sort numerically.
pub fn record_key(table: &str, id: u64) -> String {
    format!("{table}/{id:020}")
}

/// Half-open key range `[start, end)` covering every record of `table`.
pub fn table_range(table: &str) -> (String, String) {
    // '0' is the character after '/'
    (format!("{table}/"), format!("{table}0"))
}

/// Interpret a submitted value as a primary key (`3` or `"3"`).
pub fn key_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Compare two attribute values the way form input is compared against stored data:
/// strings and numbers match when their text forms match.
pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x == y,
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            match (s.trim().parse::<f64>(), n.as_f64()) {
                (Ok(x), Some(y)) => x == y,
                _ => false,
            }
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_key_sorts_numerically() {
        assert!(record_key("paintings", 9) < record_key("paintings", 10));
        let (start, end) = table_range("paintings");
        let key = record_key("paintings", 42);
        assert!(start.as_str() <= key.as_str() && key.as_str() < end.as_str());
        assert!(record_key("paintings_archive", 1).as_str() >= end.as_str());
    }

    #[test]
    fn test_key_from_value() {
        assert_eq!(key_from_value(&json!(3)), Some(3));
        assert_eq!(key_from_value(&json!(" 12 ")), Some(12));
        assert_eq!(key_from_value(&json!("abc")), None);
        assert_eq!(key_from_value(&json!(-1)), None);
    }

    #[test]
    fn test_loosely_equal() {
        assert!(loosely_equal(&json!("3"), &json!(3)));
        assert!(loosely_equal(&json!(3), &json!("3.0")));
        assert!(loosely_equal(&json!("Foo"), &json!("Foo")));
        assert!(!loosely_equal(&json!("Foo"), &json!("foo")));
        assert!(!loosely_equal(&json!(true), &json!("true")));
    }
}
