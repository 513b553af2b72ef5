//! Match, marshal, invoke, demarshal.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::Method;
use thiserror::Error;

use crate::bridge::{
    from_script_response, to_script_request, HttpRequest, HttpResponse, InvalidResponse, ScriptValue,
};
use crate::http::X_REQUEST_ID;
use crate::observability::metrics;
use crate::routing::{RouteMatch, RouteRegistry};
use crate::script::{Invocation, InvocationError, Invoke};

/// Why a request did not produce a script response.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no route for {method} {path}")]
    NoRoute { method: Method, path: String },

    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error(transparent)]
    InvalidResponse(#[from] InvalidResponse),
}

impl DispatchError {
    /// Client-facing response. Never carries script error detail.
    pub fn to_response(&self) -> HttpResponse {
        match self {
            DispatchError::NoRoute { .. } => HttpResponse::not_found(),
            DispatchError::Invocation(InvocationError::QueueFull | InvocationError::EngineStopped) => {
                HttpResponse::unavailable()
            }
            DispatchError::Invocation(_) => HttpResponse::internal_error(),
            DispatchError::InvalidResponse(_) => HttpResponse::invalid_response(),
        }
    }
}

/// Turns transport requests into script invocations.
pub struct Dispatcher {
    registry: Arc<RouteRegistry>,
    invoker: Arc<dyn Invoke>,
    invoke_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<RouteRegistry>, invoker: Arc<dyn Invoke>, invoke_timeout: Duration) -> Self {
        Self {
            registry,
            invoker,
            invoke_timeout,
        }
    }

    /// Handles one request. Always produces a response.
    pub async fn dispatch(&self, request: HttpRequest) -> HttpResponse {
        let start = Instant::now();
        let request_id = request
            .header(X_REQUEST_ID.as_str())
            .unwrap_or("unknown")
            .to_string();

        let response = match self.try_dispatch(&request, &request_id).await {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    DispatchError::NoRoute { .. } => {
                        tracing::debug!(request_id = %request_id, error = %e, "No route matched");
                    }
                    DispatchError::Invocation(InvocationError::QueueFull | InvocationError::EngineStopped) => {
                        tracing::warn!(request_id = %request_id, error = %e, "Script engine unavailable");
                    }
                    _ => {
                        tracing::error!(
                            request_id = %request_id,
                            method = %request.method,
                            path = %request.path,
                            error = %e,
                            "Request failed"
                        );
                    }
                }
                e.to_response()
            }
        };

        metrics::record_request(request.method.as_str(), response.status, start);
        response
    }

    async fn try_dispatch(&self, request: &HttpRequest, request_id: &str) -> Result<HttpResponse, DispatchError> {
        let matched = self
            .lookup(&request.method, &request.path)
            .ok_or_else(|| DispatchError::NoRoute {
                method: request.method.clone(),
                path: request.path.clone(),
            })?;

        tracing::debug!(
            request_id = %request_id,
            route = %matched.entry.id(),
            pattern = %matched.entry.pattern(),
            "Route matched"
        );

        let mut args = Vec::with_capacity(1 + matched.params.len());
        args.push(to_script_request(request, &matched.params));
        args.extend(matched.params.values().map(ScriptValue::from));

        let invocation = Invocation {
            callback: matched.entry.callback(),
            args,
            deadline: Instant::now() + self.invoke_timeout,
        };

        let start = Instant::now();
        let value = match self.invoke(invocation).await {
            Ok(value) => value,
            Err(e) => {
                metrics::record_invocation(outcome_label(&e), start);
                return Err(e.into());
            }
        };

        match from_script_response(&value) {
            Ok(response) => {
                metrics::record_invocation("ok", start);
                Ok(response)
            }
            Err(e) => {
                metrics::record_invocation("invalid", start);
                Err(e.into())
            }
        }
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.registry.lookup(method, path).or_else(|| {
            if *method == Method::HEAD {
                self.registry.lookup(&Method::GET, path)
            } else {
                None
            }
        })
    }

    async fn invoke(&self, invocation: Invocation) -> Result<ScriptValue, InvocationError> {
        let reply = self.invoker.submit(invocation)?;
        match tokio::time::timeout(self.invoke_timeout, reply).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(InvocationError::EngineStopped),
            Err(_) => Err(InvocationError::Timeout),
        }
    }
}

fn outcome_label(error: &InvocationError) -> &'static str {
    match error {
        InvocationError::Timeout => "timeout",
        InvocationError::QueueFull | InvocationError::EngineStopped => "rejected",
        InvocationError::Script(_) | InvocationError::UnknownCallback(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ScriptTable;
    use crate::bridge::response::{INTERNAL_ERROR_BODY, INVALID_RESPONSE_BODY, NOT_FOUND_BODY, UNAVAILABLE_BODY};
    use crate::script::{CallbackHandle, InvocationReply};
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    type Behavior = Box<dyn Fn(&Invocation) -> Option<Result<ScriptValue, InvocationError>> + Send + Sync>;

    /// Records invocations and answers them with `behavior`. `None` leaves
    /// the reply pending forever.
    struct FakeInvoker {
        calls: Mutex<Vec<Invocation>>,
        pending: Mutex<Vec<oneshot::Sender<Result<ScriptValue, InvocationError>>>>,
        behavior: Behavior,
    }

    impl FakeInvoker {
        fn new(
            behavior: impl Fn(&Invocation) -> Option<Result<ScriptValue, InvocationError>> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                pending: Mutex::new(Vec::new()),
                behavior: Box::new(behavior),
            })
        }

        fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Invoke for FakeInvoker {
        fn submit(&self, invocation: Invocation) -> Result<InvocationReply, InvocationError> {
            let outcome = (self.behavior)(&invocation);
            self.calls.lock().unwrap().push(invocation);
            let (tx, rx) = oneshot::channel();
            match outcome {
                Some(Err(InvocationError::QueueFull)) => return Err(InvocationError::QueueFull),
                Some(result) => {
                    let _ = tx.send(result);
                }
                None => self.pending.lock().unwrap().push(tx),
            }
            Ok(rx)
        }
    }

    fn table(pairs: &[(&str, ScriptValue)]) -> ScriptValue {
        ScriptValue::Table(pairs.iter().cloned().collect::<ScriptTable>())
    }

    fn dispatcher(invoker: Arc<FakeInvoker>) -> Dispatcher {
        let mut registry = RouteRegistry::new();
        registry.register("GET", "/hello/:name", CallbackHandle::new(0)).unwrap();
        registry.register("GET", "/pair/:a/:b", CallbackHandle::new(1)).unwrap();
        registry.register("POST", "/echo", CallbackHandle::new(2)).unwrap();
        Dispatcher::new(Arc::new(registry), invoker, Duration::from_millis(100))
    }

    fn ok_body(body: &str) -> Option<Result<ScriptValue, InvocationError>> {
        Some(Ok(table(&[("body", ScriptValue::from(body))])))
    }

    #[tokio::test]
    async fn test_captures_follow_request_record() {
        let invoker = FakeInvoker::new(|_| ok_body("ok"));
        let d = dispatcher(invoker.clone());

        let response = d.dispatch(HttpRequest::new(Method::GET, "/pair/x/y")).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "ok");

        let calls = invoker.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].callback, CallbackHandle::new(1));
        let args = &calls[0].args;
        assert_eq!(args.len(), 3);
        let record = args[0].as_table().unwrap();
        assert_eq!(record.get("path"), Some(&ScriptValue::from("/pair/x/y")));
        assert_eq!(&args[1..], &[ScriptValue::from("x"), ScriptValue::from("y")]);
    }

    #[tokio::test]
    async fn test_no_route_is_404_without_invocation() {
        let invoker = FakeInvoker::new(|_| ok_body("unreachable"));
        let d = dispatcher(invoker.clone());

        let response = d.dispatch(HttpRequest::new(Method::GET, "/missing")).await;
        assert_eq!(response.status, 404);
        assert_eq!(response.body, NOT_FOUND_BODY);
        assert_eq!(response.content_type, "text/plain");

        let response = d.dispatch(HttpRequest::new(Method::GET, "/echo")).await;
        assert_eq!(response.status, 404);
        assert!(invoker.calls().is_empty());
    }

    #[tokio::test]
    async fn test_head_falls_back_to_get() {
        let invoker = FakeInvoker::new(|_| ok_body("hi"));
        let d = dispatcher(invoker.clone());

        let response = d.dispatch(HttpRequest::new(Method::HEAD, "/hello/Ann")).await;
        assert_eq!(response.status, 200);
        assert_eq!(invoker.calls()[0].callback, CallbackHandle::new(0));
    }

    #[tokio::test]
    async fn test_script_error_is_generic_500() {
        let invoker = FakeInvoker::new(|_| Some(Err(InvocationError::Script("db password is hunter2".into()))));
        let d = dispatcher(invoker);

        let response = d.dispatch(HttpRequest::new(Method::GET, "/hello/Ann")).await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body, INTERNAL_ERROR_BODY);
        assert!(!String::from_utf8_lossy(&response.body).contains("hunter2"));
    }

    #[tokio::test]
    async fn test_non_table_return_is_invalid_response() {
        let invoker = FakeInvoker::new(|_| Some(Ok(ScriptValue::from("just a string"))));
        let d = dispatcher(invoker);

        let response = d.dispatch(HttpRequest::new(Method::GET, "/hello/Ann")).await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body, INVALID_RESPONSE_BODY);
        assert_eq!(response.content_type, "text/plain");
    }

    #[tokio::test]
    async fn test_slow_callback_times_out() {
        let invoker = FakeInvoker::new(|_| None);
        let d = dispatcher(invoker);

        let started = Instant::now();
        let response = d.dispatch(HttpRequest::new(Method::GET, "/hello/Ann")).await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body, INTERNAL_ERROR_BODY);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_full_queue_and_stopped_engine_are_503() {
        let d = dispatcher(FakeInvoker::new(|_| Some(Err(InvocationError::QueueFull))));
        let response = d.dispatch(HttpRequest::new(Method::POST, "/echo")).await;
        assert_eq!(response.status, 503);
        assert_eq!(response.body, UNAVAILABLE_BODY);

        let d = dispatcher(FakeInvoker::new(|_| Some(Err(InvocationError::EngineStopped))));
        let response = d.dispatch(HttpRequest::new(Method::POST, "/echo")).await;
        assert_eq!(response.status, 503);
    }

    #[tokio::test]
    async fn test_response_fields_are_demarshaled() {
        let invoker = FakeInvoker::new(|_| {
            let headers = table(&[("Content-Type", ScriptValue::from("application/json"))]);
            Some(Ok(table(&[
                ("status", ScriptValue::Integer(201)),
                ("headers", headers),
                ("body", ScriptValue::from("{}")),
            ])))
        });
        let d = dispatcher(invoker);

        let response = d
            .dispatch(HttpRequest::new(Method::POST, "/echo").with_body("ping"))
            .await;
        assert_eq!(response.status, 201);
        assert_eq!(response.content_type, "application/json");
        assert_eq!(response.body, "{}");
    }
}
