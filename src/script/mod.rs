//! Script host subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (engine thread):
//!     engine.rs initialize (Lua 5.4, safe stdlib, deadline hook)
//!     → api.rs expose `app.*` registration functions and `json`
//!     → engine.rs load_script (routes land in a RouteRegistry)
//!     → registry handed back to the caller, frozen
//!
//! Per request:
//!     Dispatcher → Invoke::submit(Invocation)
//!     → bounded queue → engine thread (one callback at a time)
//!     → convert.rs (ScriptValue ⇄ Lua values)
//!     → oneshot reply → Dispatcher
//! ```
//!
//! # Design Decisions
//! - The Lua state is owned by one dedicated thread; the queue in host.rs is
//!   the only serialization point in the process
//! - Callbacks are addressed by opaque `CallbackHandle`s; functions stay in
//!   the engine's registry for the process lifetime
//! - Invocation deadlines are enforced on both sides: the dispatcher stops
//!   waiting, the engine aborts the running callback from an instruction hook

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use tokio::sync::oneshot;

use crate::bridge::ScriptValue;

pub mod api;
pub mod convert;
pub mod engine;
pub mod error;
pub mod host;

pub use error::{InvocationError, ScriptLoadError};
pub use host::ScriptHost;

/// Opaque reference to a callback living inside the script engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle(usize);

impl CallbackHandle {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub(crate) fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for CallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "callback-{}", self.0)
    }
}

/// One callback call: the handle, its positional arguments and the instant
/// after which the result is no longer wanted.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub callback: CallbackHandle,
    pub args: Vec<ScriptValue>,
    pub deadline: Instant,
}

/// Pending result of a submitted invocation.
pub type InvocationReply = oneshot::Receiver<Result<ScriptValue, InvocationError>>;

/// Submits callback invocations to a serialized executor.
pub trait Invoke: Send + Sync {
    /// Queue `invocation`. Fails fast when the executor cannot accept it.
    fn submit(&self, invocation: Invocation) -> Result<InvocationReply, InvocationError>;
}

/// Where the script comes from.
#[derive(Debug, Clone)]
pub enum ScriptSource {
    File(PathBuf),
    Inline { name: String, source: String },
}

impl ScriptSource {
    pub fn inline(name: impl Into<String>, source: impl Into<String>) -> Self {
        ScriptSource::Inline {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Name used in diagnostics and engine error messages.
    pub fn name(&self) -> String {
        match self {
            ScriptSource::File(path) => path.display().to_string(),
            ScriptSource::Inline { name, .. } => name.clone(),
        }
    }
}
