//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, body limit)
//!     → request.rs (axum request → HttpRequest)
//!     → [dispatcher runs the script callback]
//!     → response.rs (HttpResponse → axum response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{read_request, RequestError, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
