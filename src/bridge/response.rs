//! Outbound response demarshalling.
//!
//! # Design Decisions
//! - A callback must return a table; anything else is an invalid response
//! - Field coercion failures fall back to defaults, never abort the request
//! - `Content-Type` in the returned headers (any case) replaces the default

use axum::body::Bytes;
use thiserror::Error;

use crate::bridge::value::ScriptValue;

pub const DEFAULT_STATUS: u16 = 200;
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

pub const NOT_FOUND_BODY: &str = "Not Found";
pub const INTERNAL_ERROR_BODY: &str = "Internal Server Error";
pub const INVALID_RESPONSE_BODY: &str = "Invalid response from Lua function";
pub const UNAVAILABLE_BODY: &str = "Service Unavailable";

/// The callback returned something other than a table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("callback returned {found}, expected a table")]
pub struct InvalidResponse {
    pub found: &'static str,
}

/// A response under construction, handed to the transport once complete.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Header pairs as returned by the callback, `Content-Type` included.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub content_type: String,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self {
            status: DEFAULT_STATUS,
            headers: Vec::new(),
            body: Bytes::new(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

impl HttpResponse {
    /// A plain-text response with the given status and body.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: Bytes::from(body.into()),
            ..Self::default()
        }
    }

    pub fn not_found() -> Self {
        Self::text(404, NOT_FOUND_BODY)
    }

    pub fn internal_error() -> Self {
        Self::text(500, INTERNAL_ERROR_BODY)
    }

    pub fn invalid_response() -> Self {
        Self::text(500, INVALID_RESPONSE_BODY)
    }

    pub fn unavailable() -> Self {
        Self::text(503, UNAVAILABLE_BODY)
    }

    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Converts a callback's return value into a response.
pub fn from_script_response(value: &ScriptValue) -> Result<HttpResponse, InvalidResponse> {
    let table = value.as_table().ok_or(InvalidResponse {
        found: value.type_name(),
    })?;

    let mut response = HttpResponse {
        status: table
            .get("status")
            .and_then(ScriptValue::to_integer)
            .and_then(|status| u16::try_from(status).ok())
            .filter(|status| (100..=999).contains(status))
            .unwrap_or(DEFAULT_STATUS),
        ..HttpResponse::default()
    };

    if let Some(headers) = table.get("headers").and_then(ScriptValue::as_table) {
        for (key, value) in headers.iter() {
            let (Some(key), Some(value)) = (key.to_text(), value.to_text()) else {
                tracing::debug!(
                    key_type = key.type_name(),
                    value_type = value.type_name(),
                    "Skipping non-text response header"
                );
                continue;
            };
            if key.eq_ignore_ascii_case("content-type") {
                response.content_type = value.clone();
            }
            response.headers.push((key, value));
        }
    }

    response.body = table
        .get("body")
        .and_then(ScriptValue::to_bytes)
        .unwrap_or_default();

    Ok(response)
}
