//! Column filters for paged reads.
//!
//! A filter set maps a column name to either a bare literal (implicit
//! equality) or an `{ "operator": ..., "value": ... }` comparison.

use crate::error::ProtocolError;
use crate::row::{compare_values, Row, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of an explicit filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// Strictly greater than.
    #[serde(rename = ">", alias = "gt")]
    Gt,
    /// Greater than or equal.
    #[serde(rename = ">=", alias = "gte")]
    Gte,
    /// Strictly less than.
    #[serde(rename = "<", alias = "lt")]
    Lt,
    /// Less than or equal.
    #[serde(rename = "<=", alias = "lte")]
    Lte,
    /// Equal.
    #[serde(rename = "eq", alias = "=")]
    Eq,
    /// Not equal.
    #[serde(rename = "neq", alias = "!=")]
    Neq,
    /// Member of a list.
    #[serde(rename = "in")]
    In,
    /// Identity check, used for `null`.
    #[serde(rename = "is")]
    Is,
}

impl Operator {
    /// Returns the wire symbol.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::In => "in",
            Operator::Is => "is",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" | "gt" => Ok(Operator::Gt),
            ">=" | "gte" => Ok(Operator::Gte),
            "<" | "lt" => Ok(Operator::Lt),
            "<=" | "lte" => Ok(Operator::Lte),
            "eq" | "=" => Ok(Operator::Eq),
            "neq" | "!=" => Ok(Operator::Neq),
            "in" => Ok(Operator::In),
            "is" => Ok(Operator::Is),
            other => Err(ProtocolError::UnknownOperator(other.to_string())),
        }
    }
}

/// A single column filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Filter {
    /// Explicit comparison.
    Compare {
        /// Comparison operator.
        operator: Operator,
        /// Right-hand operand.
        value: Value,
    },
    /// Bare literal, compared for equality.
    Equals(Value),
}

impl Filter {
    /// Creates a comparison filter.
    pub fn compare(operator: Operator, value: impl Into<Value>) -> Self {
        Self::Compare {
            operator,
            value: value.into(),
        }
    }

    /// Creates an equality filter.
    pub fn equals(value: impl Into<Value>) -> Self {
        Self::Equals(value.into())
    }

    /// Evaluates this filter against a column value (`None` when absent).
    ///
    /// Ordered comparisons never match a null or missing column.
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        let actual = actual.unwrap_or(&Value::Null);
        match self {
            Filter::Equals(expected) => actual == expected,
            Filter::Compare { operator, value } => match operator {
                Operator::Eq => actual == value,
                Operator::Neq => !actual.is_null() && actual != value,
                Operator::Is => actual == value,
                Operator::In => value
                    .as_array()
                    .is_some_and(|items| items.iter().any(|item| item == actual)),
                ordered => {
                    if actual.is_null() || value.is_null() {
                        return false;
                    }
                    let ord = compare_values(actual, value);
                    match ordered {
                        Operator::Gt => ord == Ordering::Greater,
                        Operator::Gte => ord != Ordering::Less,
                        Operator::Lt => ord == Ordering::Less,
                        Operator::Lte => ord != Ordering::Greater,
                        _ => false,
                    }
                }
            },
        }
    }
}

/// A set of column filters, all of which must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filters(BTreeMap<String, Filter>);

impl Filters {
    /// Creates an empty filter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the filter for `column`.
    pub fn with(mut self, column: impl Into<String>, filter: Filter) -> Self {
        self.insert(column, filter);
        self
    }

    /// Adds or replaces the filter for `column`.
    pub fn insert(&mut self, column: impl Into<String>, filter: Filter) {
        self.0.insert(column.into(), filter);
    }

    /// Returns the filter for `column`.
    pub fn get(&self, column: &str) -> Option<&Filter> {
        self.0.get(column)
    }

    /// Returns true if there are no filters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of filtered columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over `(column, filter)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Filter)> {
        self.0.iter()
    }

    /// Returns true if `row` satisfies every filter.
    pub fn matches(&self, row: &Row) -> bool {
        self.0
            .iter()
            .all(|(column, filter)| filter.matches(row.get(column)))
    }
}
