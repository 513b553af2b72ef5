//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use luaserve::config::ServerConfig;
use luaserve::lifecycle::{ServerContext, Shutdown, StartupError};
use tokio::task::JoinHandle;

static NEXT_SCRIPT: AtomicUsize = AtomicUsize::new(0);

/// Writes `source` to a fresh file under the system temp directory.
pub fn write_script(name: &str, source: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("luaserve-tests");
    std::fs::create_dir_all(&dir).unwrap();
    let n = NEXT_SCRIPT.fetch_add(1, Ordering::SeqCst);
    let path = dir.join(format!("{}-{}-{}.lua", std::process::id(), n, name));
    std::fs::write(&path, source).unwrap();
    path
}

/// Default config pointing at `script`, listening on a free local port.
pub fn test_config(script: PathBuf) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.host = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.script.path = script;
    config
}

pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Shutdown,
    handle: JoinHandle<Result<(), StartupError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

pub async fn start_with_config(config: ServerConfig) -> TestServer {
    let context = ServerContext::start(&config).await.unwrap();
    let addr = context.local_addr();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(context.run(shutdown.clone()));
    TestServer {
        addr,
        shutdown,
        handle,
    }
}

/// Loads `source` and serves it on a free port.
pub async fn start_server(source: &str) -> TestServer {
    start_with_config(test_config(write_script("app", source))).await
}

/// Non-pooled client so every request opens its own connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
