//! Request handling and transformation.
//!
//! # Design Decisions
//! - The body is read fully, up to the configured limit, before dispatch
//! - Header values that are not valid UTF-8 are passed on lossily

use axum::body::Body;
use axum::http::{HeaderName, Request, StatusCode};
use thiserror::Error;

use crate::bridge::HttpRequest;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Debug, Error)]
pub enum RequestError {
    /// The body exceeded the limit, or the client stopped sending it.
    #[error("failed to read request body (limit {limit} bytes): {source}")]
    Body {
        limit: usize,
        #[source]
        source: axum::Error,
    },
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::Body { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

/// Buffers an axum request into the transport-neutral form.
pub async fn read_request(request: Request<Body>, max_body_size: usize) -> Result<HttpRequest, RequestError> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, max_body_size)
        .await
        .map_err(|source| RequestError::Body {
            limit: max_body_size,
            source,
        })?;

    let headers = parts
        .headers
        .iter()
        .map(|(name, value)| {
            let value = match value.to_str() {
                Ok(v) => v.to_string(),
                Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
            };
            (name.as_str().to_string(), value)
        })
        .collect();

    Ok(HttpRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().unwrap_or_default().to_string(),
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[tokio::test]
    async fn test_reads_parts() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/echo?x=1&y=2")
            .header("X-Custom", "abc")
            .body(Body::from("ping"))
            .unwrap();

        let request = read_request(request, 1024).await.unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path, "/echo");
        assert_eq!(request.query, "x=1&y=2");
        assert_eq!(request.header("x-custom"), Some("abc"));
        assert_eq!(&request.body[..], b"ping");
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let request = Request::builder()
            .uri("/")
            .body(Body::from(vec![b'a'; 64]))
            .unwrap();

        let err = read_request(request, 16).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
