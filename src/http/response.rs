//! Response handling and transformation.
//!
//! # Design Decisions
//! - `Content-Type` always comes from the response's content type, never
//!   from the raw header list
//! - Header pairs the transport cannot represent are dropped with a warning

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::bridge::response::DEFAULT_CONTENT_TYPE;
use crate::bridge::HttpResponse;

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or_else(|_| {
            tracing::warn!(status = self.status, "Unrepresentable status, sending 200");
            StatusCode::OK
        });

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case(header::CONTENT_TYPE.as_str()) {
                continue;
            }
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header"),
            }
        }

        let content_type = HeaderValue::from_str(&self.content_type).unwrap_or_else(|_| {
            tracing::warn!(content_type = %self.content_type, "Invalid content type, using default");
            HeaderValue::from_static(DEFAULT_CONTENT_TYPE)
        });
        headers.insert(header::CONTENT_TYPE, content_type);

        response
    }
}
