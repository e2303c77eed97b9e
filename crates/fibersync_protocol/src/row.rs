//! Row representation and value ordering.
//!
//! Rows travel as JSON objects. Ordering follows the convention of
//! client-side indexed stores: `null < bool < number < string < array <
//! object`, numbers compare numerically and strings lexicographically
//! (so ISO-8601 timestamps sort chronologically).

use std::cmp::Ordering;

pub use serde_json::Value;

/// A single row as returned by the remote service and stored locally.
pub type Row = serde_json::Map<String, Value>;

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Compares two JSON values using index ordering.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Returns true if `row` holds a non-null value for `column`.
pub fn is_present(row: &Row, column: &str) -> bool {
    row.get(column).is_some_and(|v| !v.is_null())
}

/// Returns the greatest non-null value of `column` across `rows`.
pub fn max_value<'a, I>(rows: I, column: &str) -> Option<&'a Value>
where
    I: IntoIterator<Item = &'a Row>,
{
    rows.into_iter()
        .filter_map(|row| row.get(column))
        .filter(|v| !v.is_null())
        .max_by(|a, b| compare_values(a, b))
}
