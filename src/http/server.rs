//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a single fallback handler
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Bind server to listener
//! - Hand every request to the dispatcher

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::bridge::HttpResponse;
use crate::config::{LimitsConfig, TimeoutConfig};
use crate::dispatch::Dispatcher;
use crate::http::request::read_request;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub max_body_size: usize,
}

/// HTTP server fronting the script.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(dispatcher: Arc<Dispatcher>, timeouts: &TimeoutConfig, limits: &LimitsConfig) -> Self {
        let state = AppState {
            dispatcher,
            max_body_size: limits.max_body_size,
        };
        let router = Self::build_router(state, Duration::from_secs(timeouts.request_secs));
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        let max_body_size = state.max_body_size;
        Router::new()
            .fallback(script_handler)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(max_body_size))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` resolves, then drain open requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Fallback handler: every method and path goes to the dispatcher.
async fn script_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request = match read_request(request, state.max_body_size).await {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting request");
            let status = e.status();
            return HttpResponse::text(status.as_u16(), status.canonical_reason().unwrap_or_default())
                .into_response();
        }
    };

    state.dispatcher.dispatch(request).await.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RouteRegistry;
    use crate::script::{CallbackHandle, Invocation, InvocationError, InvocationReply, Invoke};
    use crate::bridge::{ScriptTable, ScriptValue};
    use axum::http::{Method, StatusCode};
    use tokio::sync::oneshot;
    use tower::ServiceExt;

    /// Answers every invocation with the request id it was given.
    struct EchoRequestId;

    impl Invoke for EchoRequestId {
        fn submit(&self, invocation: Invocation) -> Result<InvocationReply, InvocationError> {
            let id = invocation.args[0]
                .as_table()
                .and_then(|r| r.get("headers"))
                .and_then(ScriptValue::as_table)
                .and_then(|h| h.get("x-request-id"))
                .cloned()
                .unwrap_or(ScriptValue::Nil);
            let mut response = ScriptTable::new();
            response.insert("body", id);
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(Ok(ScriptValue::Table(response)));
            Ok(rx)
        }
    }

    fn server(max_body_size: usize) -> HttpServer {
        let mut registry = RouteRegistry::new();
        registry.register("GET", "/id", CallbackHandle::new(0)).unwrap();
        registry.register("POST", "/id", CallbackHandle::new(0)).unwrap();
        let dispatcher = Dispatcher::new(Arc::new(registry), Arc::new(EchoRequestId), Duration::from_secs(1));
        HttpServer::new(
            Arc::new(dispatcher),
            &TimeoutConfig::default(),
            &LimitsConfig { max_body_size },
        )
    }

    #[tokio::test]
    async fn test_request_id_reaches_script_and_response() {
        let response = server(1024)
            .router()
            .oneshot(Request::builder().uri("/id").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let header = response.headers()["x-request-id"].to_str().unwrap().to_string();
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(body, header.as_bytes());
        assert!(!header.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let response = server(1024)
            .router()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/id")
            .body(Body::from(vec![b'x'; 4096]))
            .unwrap();
        let response = server(128).router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
