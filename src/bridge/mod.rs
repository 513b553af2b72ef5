//! Value bridge between transport data and script values.
//!
//! # Data Flow
//! ```text
//! HttpRequest + PathParams
//!     → request.rs (to_script_request: record table)
//!     → [script callback]
//!     → response.rs (from_script_response: status, headers, body)
//!     → HttpResponse
//! ```
//!
//! # Design Decisions
//! - The bridge speaks `ScriptValue`, never engine types, so it is testable
//!   without an interpreter
//! - Pure functions: no side effects beyond building the result

pub mod request;
pub mod response;
pub mod value;

pub use request::{to_script_request, HttpRequest};
pub use response::{from_script_response, HttpResponse, InvalidResponse};
pub use value::{ScriptTable, ScriptValue};
