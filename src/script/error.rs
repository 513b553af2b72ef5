//! Script host error definitions.

use std::path::PathBuf;
use thiserror::Error;

use crate::routing::RegistrationError;
use crate::script::CallbackHandle;

/// Errors that prevent the script from loading. All are fatal to startup.
#[derive(Debug, Error)]
pub enum ScriptLoadError {
    /// The script file could not be read.
    #[error("cannot read script {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The script does not compile.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The script raised an error while running its top level.
    #[error("script error: {0}")]
    Runtime(String),

    /// A route registration was rejected.
    #[error("route registration failed: {0}")]
    Registration(#[from] RegistrationError),

    /// The engine itself could not be set up.
    #[error("script engine unavailable: {0}")]
    Engine(String),
}

/// Errors from a single callback invocation. Recovered per request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    /// The callback raised an error.
    #[error("callback failed: {0}")]
    Script(String),

    /// The callback did not finish before its deadline.
    #[error("callback exceeded its deadline")]
    Timeout,

    /// The invocation queue is full.
    #[error("invocation queue is full")]
    QueueFull,

    /// The engine thread is gone.
    #[error("script engine stopped")]
    EngineStopped,

    /// The handle does not name a stored callback.
    #[error("unknown {0}")]
    UnknownCallback(CallbackHandle),
}
