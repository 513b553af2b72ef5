//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! HttpRequest (from the transport)
//!     → routing (lookup; HEAD falls back to GET)
//!     → bridge (request record + captures as positional args)
//!     → script host (Invoke::submit, bounded wait)
//!     → bridge (response table → HttpResponse)
//!     → transport
//! ```
//!
//! # Design Decisions
//! - Every failure becomes a response; nothing propagates to the transport
//! - Script error detail is logged, never sent to the client

pub mod dispatcher;

pub use dispatcher::{DispatchError, Dispatcher};
