//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Registration (while the script loads):
//!     app.get("/hello/:name", fn)
//!     → router.rs (validate method, compile pattern)
//!     → matcher.rs (parse template into segments)
//!     → append to the method's ordered list
//!     → Freeze as immutable RouteRegistry
//!
//! Incoming Request (method, path)
//!     → router.rs (per-method scan in registration order)
//!     → matcher.rs (anchored template match)
//!     → Return: RouteMatch (entry + captures) or None
//! ```
//!
//! # Design Decisions
//! - Routes fixed at script load, immutable at runtime
//! - No regex: segment comparison only
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod matcher;
pub mod router;

pub use matcher::{match_path, PathParams, PatternError, RoutePattern};
pub use router::{RegistrationError, RouteEntry, RouteId, RouteMatch, RouteRegistry};
