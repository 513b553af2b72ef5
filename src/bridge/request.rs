//! Inbound request marshalling.

use axum::body::Bytes;
use axum::http::Method;

use crate::bridge::value::{ScriptTable, ScriptValue};
use crate::routing::PathParams;

/// A request as delivered by the transport. Read-only to the core.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    /// Raw query string, empty when the URI has none.
    pub query: String,
    /// Header pairs in the order received.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: String::new(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Builds the request record handed to a callback as its first argument.
///
/// Every field is always present: `method`, `path`, `query`, `headers`,
/// `body` and `params` (named path captures). Repeated header names keep the
/// last value.
pub fn to_script_request(request: &HttpRequest, params: &PathParams) -> ScriptValue {
    let headers: ScriptTable = request
        .headers
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let params: ScriptTable = params.iter().collect();

    let mut record = ScriptTable::new();
    record.insert("method", request.method.as_str());
    record.insert("path", request.path.as_str());
    record.insert("query", request.query.as_str());
    record.insert("headers", headers);
    record.insert("body", request.body.clone());
    record.insert("params", params);
    ScriptValue::Table(record)
}
