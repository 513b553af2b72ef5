//! luaserve: HTTP routes defined by a Lua script.

// Core subsystems
pub mod bridge;
pub mod dispatch;
pub mod routing;
pub mod script;

// Transport and cross-cutting concerns
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::{ServerContext, Shutdown, StartupError};
