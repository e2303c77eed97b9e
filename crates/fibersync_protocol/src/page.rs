//! Paged-read request and response types.

use crate::error::{ProtocolError, ProtocolResult};
use crate::filter::Filters;
use crate::row::{Row, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort direction for ordered reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDir {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl fmt::Display for OrderDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDir::Asc => f.write_str("asc"),
            OrderDir::Desc => f.write_str("desc"),
        }
    }
}

/// One paged read against a remote relation (table or view).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    /// Remote relation name.
    pub view_name: String,
    /// Maximum rows to return.
    pub limit: u32,
    /// Rows to skip.
    pub offset: u64,
    /// Column filters.
    #[serde(default)]
    pub filters: Filters,
    /// Column to order by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    /// Sort direction for `order_by`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_dir: Option<OrderDir>,
}

impl PageRequest {
    /// Creates an unfiltered, unordered request.
    pub fn new(view_name: impl Into<String>, limit: u32, offset: u64) -> Self {
        Self {
            view_name: view_name.into(),
            limit,
            offset,
            filters: Filters::new(),
            order_by: None,
            order_dir: None,
        }
    }

    /// Sets the filters.
    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    /// Orders the read by `column`.
    pub fn with_order(mut self, column: impl Into<String>, dir: OrderDir) -> Self {
        self.order_by = Some(column.into());
        self.order_dir = Some(dir);
        self
    }

    /// Encodes the request as parameters of the `get_paged_data` remote
    /// procedure (`p_view_name`, `p_limit`, ...).
    pub fn to_rpc_params(&self) -> ProtocolResult<Value> {
        let mut params = Row::new();
        params.insert("p_view_name".into(), Value::from(self.view_name.clone()));
        params.insert("p_limit".into(), Value::from(self.limit));
        params.insert("p_offset".into(), Value::from(self.offset));
        params.insert("p_filters".into(), serde_json::to_value(&self.filters)?);
        if let Some(order_by) = &self.order_by {
            params.insert("p_order_by".into(), Value::from(order_by.clone()));
        }
        if let Some(dir) = self.order_dir {
            params.insert("p_order_dir".into(), Value::from(dir.to_string()));
        }
        Ok(Value::Object(params))
    }
}

/// Decoded response of one paged read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResponse {
    /// Rows that decoded as JSON objects, in remote order.
    pub rows: Vec<Row>,
    /// Entries of `data` that were not objects and were dropped.
    pub malformed: usize,
}

impl PageResponse {
    /// Creates a response from rows.
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows, malformed: 0 }
    }

    /// Decodes `{ "data": [...] }`.
    ///
    /// A null body or a null `data` field decodes as an empty page. An
    /// object without `data` is malformed, so it can never empty a table.
    pub fn from_value(body: Value) -> ProtocolResult<Self> {
        let data = match body {
            Value::Null => return Ok(Self::default()),
            Value::Object(mut map) => map
                .remove("data")
                .ok_or_else(|| ProtocolError::malformed("response object has no `data` field"))?,
            other => {
                return Err(ProtocolError::malformed(format!(
                    "expected object with `data`, got {}",
                    kind(&other)
                )))
            }
        };

        let items = match data {
            Value::Null => return Ok(Self::default()),
            Value::Array(items) => items,
            other => {
                return Err(ProtocolError::malformed(format!(
                    "expected `data` array, got {}",
                    kind(&other)
                )))
            }
        };

        let total = items.len();
        let rows: Vec<Row> = items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect();
        let malformed = total - rows.len();
        Ok(Self { rows, malformed })
    }

    /// Number of entries the remote returned, malformed ones included.
    pub fn fetched(&self) -> usize {
        self.rows.len() + self.malformed
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One fetched page together with the size that was requested.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePage {
    /// Rows in remote order.
    pub rows: Vec<Row>,
    /// Entries the remote returned, including dropped malformed ones.
    pub fetched: usize,
    /// Page size that was requested.
    pub requested: u32,
}

impl RemotePage {
    /// Wraps a decoded response.
    pub fn new(response: PageResponse, requested: u32) -> Self {
        let fetched = response.fetched();
        Self {
            rows: response.rows,
            fetched,
            requested,
        }
    }

    /// True when the page was full, so another page may follow.
    ///
    /// A page strictly shorter than the request ends the read.
    pub fn has_more(&self) -> bool {
        self.fetched >= self.requested as usize && self.requested > 0
    }

    /// Returns true if the remote returned nothing.
    pub fn is_empty(&self) -> bool {
        self.fetched == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Filter, Operator};
    use serde_json::json;

    #[test]
    fn rpc_params_for_incremental_read() {
        let request = PageRequest::new("v_audit_logs", 2500, 5000)
            .with_filters(Filters::new().with("created_at", Filter::compare(Operator::Gt, "t1")))
            .with_order("created_at", OrderDir::Asc);

        assert_eq!(
            request.to_rpc_params().unwrap(),
            json!({
                "p_view_name": "v_audit_logs",
                "p_limit": 2500,
                "p_offset": 5000,
                "p_filters": {"created_at": {"operator": ">", "value": "t1"}},
                "p_order_by": "created_at",
                "p_order_dir": "asc"
            })
        );
    }

    #[test]
    fn rpc_params_omit_missing_order() {
        let params = PageRequest::new("nodes", 10, 0).to_rpc_params().unwrap();
        assert_eq!(params["p_filters"], json!({}));
        assert!(params.get("p_order_by").is_none());
        assert!(params.get("p_order_dir").is_none());
    }

    #[test]
    fn request_uses_camel_case_contract() {
        let request = PageRequest::new("rings", 2, 4).with_order("name", OrderDir::Desc);
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["viewName"], json!("rings"));
        assert_eq!(encoded["orderDir"], json!("desc"));
    }

    #[test]
    fn response_decoding() {
        let response = PageResponse::from_value(json!({"data": [{"id": 1}, 7, {"id": 2}]})).unwrap();
        assert_eq!(response.rows.len(), 2);
        assert_eq!(response.malformed, 1);
        assert_eq!(response.fetched(), 3);

        assert_eq!(PageResponse::from_value(Value::Null).unwrap().fetched(), 0);
        assert_eq!(PageResponse::from_value(json!({"data": null})).unwrap().fetched(), 0);
        assert!(PageResponse::from_value(json!("nope")).is_err());
        assert!(PageResponse::from_value(json!({"data": 3})).is_err());
        assert!(matches!(
            PageResponse::from_value(json!({})),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(PageResponse::from_value(json!({"rows": [{"id": 1}]})).is_err());
    }

    #[test]
    fn short_page_ends_read() {
        let full = RemotePage::new(PageResponse::new(vec![Row::new(), Row::new()]), 2);
        assert!(full.has_more());

        let short = RemotePage::new(PageResponse::new(vec![Row::new()]), 2);
        assert!(!short.has_more());

        let empty = RemotePage::new(PageResponse::default(), 2);
        assert!(empty.is_empty());
        assert!(!empty.has_more());
    }
}
