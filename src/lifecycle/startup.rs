//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the engine thread and load the script
//! - Build the dispatcher and HTTP server around the loaded routes
//! - Bind the listener last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;
use crate::script::{Invoke, ScriptHost, ScriptLoadError, ScriptSource};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load script: {0}")]
    Script(#[from] ScriptLoadError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// A loaded script behind a bound, not yet serving, listener.
pub struct ServerContext {
    host: Arc<ScriptHost>,
    server: HttpServer,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl ServerContext {
    /// Loads the script named by `config.script.path`, then binds.
    pub async fn start(config: &ServerConfig) -> Result<Self, StartupError> {
        Self::start_with(config, ScriptSource::File(config.script.path.clone())).await
    }

    pub async fn start_with(config: &ServerConfig, source: ScriptSource) -> Result<Self, StartupError> {
        let (host, registry) = ScriptHost::start(source, config.script.queue_capacity).await?;
        for entry in registry.entries() {
            tracing::info!(
                route_id = %entry.id(),
                method = %entry.method(),
                pattern = %entry.pattern(),
                "Route registered"
            );
        }
        metrics::set_routes_registered(registry.len());

        let host = Arc::new(host);
        let invoker: Arc<dyn Invoke> = host.clone();
        let dispatcher = Dispatcher::new(Arc::new(registry), invoker, config.script.invoke_timeout());
        let server = HttpServer::new(Arc::new(dispatcher), &config.timeouts, &config.limits);

        let addr = config.listener.bind_address();
        let bound = match TcpListener::bind(&addr).await {
            Ok(listener) => listener.local_addr().map(|local| (listener, local)),
            Err(e) => Err(e),
        };
        let (listener, local_addr) = match bound {
            Ok(bound) => bound,
            Err(source) => {
                host.shutdown().await;
                return Err(StartupError::Bind { addr, source });
            }
        };

        tracing::info!(
            address = %local_addr,
            script = %host.script_name(),
            "Listening for connections"
        );

        Ok(Self {
            host,
            server,
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn router(&self) -> Router {
        self.server.router()
    }

    /// Serves until `shutdown` fires, then stops the engine thread.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), StartupError> {
        let result = self.server.run(self.listener, shutdown.wait()).await;
        self.host.shutdown().await;
        result.map_err(StartupError::Serve)
    }
}
