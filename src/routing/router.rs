//! Route registration and lookup.
//!
//! # Responsibilities
//! - Store routes per HTTP method, in registration order
//! - Validate method and pattern at registration time
//! - Look up the first route matching a request
//!
//! # Design Decisions
//! - Populated while the script loads, then frozen behind an `Arc`
//!   (lock-free concurrent lookups)
//! - First registered wins when several patterns match the same path
//! - Explicit `None` on no match; the dispatcher decides the response

use std::collections::HashMap;
use std::fmt;

use axum::http::Method;
use thiserror::Error;

use crate::routing::matcher::{PathParams, PatternError, RoutePattern};
use crate::script::CallbackHandle;

/// Errors raised while the script registers routes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: PatternError },

    #[error("route pattern must be a string, got {found}")]
    PatternNotText { found: &'static str },

    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),

    #[error("route callback must be a function, got {found}")]
    InvalidCallback { found: &'static str },

    #[error("routes can only be registered while the script is loading")]
    Closed,
}

/// Stable identifier of a registered route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteId(usize);

impl RouteId {
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "route-{}", self.0)
    }
}

/// A registered (method, pattern, callback) triple.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    id: RouteId,
    method: Method,
    pattern: RoutePattern,
    callback: CallbackHandle,
}

impl RouteEntry {
    pub fn id(&self) -> RouteId {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn callback(&self) -> CallbackHandle {
        self.callback
    }
}

/// Result of a successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub entry: &'a RouteEntry,
    pub params: PathParams,
}

/// Ordered route table, one list per method.
#[derive(Debug, Default)]
pub struct RouteRegistry {
    routes: HashMap<Method, Vec<RouteEntry>>,
    count: usize,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. `method` is case-insensitive.
    pub fn register(
        &mut self,
        method: &str,
        pattern: &str,
        callback: CallbackHandle,
    ) -> Result<RouteId, RegistrationError> {
        let method = parse_method(method)?;
        let pattern = RoutePattern::parse(pattern).map_err(|reason| {
            RegistrationError::InvalidPattern {
                pattern: pattern.to_string(),
                reason,
            }
        })?;

        let id = RouteId(self.count);
        let entries = self.routes.entry(method.clone()).or_default();
        if entries.iter().any(|e| e.pattern == pattern) {
            tracing::warn!(
                method = %method,
                pattern = %pattern,
                "Route registered twice; the earlier registration wins"
            );
        }

        entries.push(RouteEntry {
            id,
            method,
            pattern,
            callback,
        });
        self.count += 1;
        Ok(id)
    }

    /// First route for `method` whose pattern matches `path`.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.routes.get(method)?.iter().find_map(|entry| {
            entry
                .pattern
                .matches(path)
                .map(|params| RouteMatch { entry, params })
        })
    }

    /// All routes in registration order.
    pub fn entries(&self) -> Vec<&RouteEntry> {
        let mut entries: Vec<_> = self.routes.values().flatten().collect();
        entries.sort_by_key(|entry| entry.id().as_usize());
        entries
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

fn parse_method(method: &str) -> Result<Method, RegistrationError> {
    let upper = method.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return Err(RegistrationError::InvalidMethod(method.to_string()));
    }
    Method::from_bytes(upper.as_bytes())
        .map_err(|_| RegistrationError::InvalidMethod(method.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(n: usize) -> CallbackHandle {
        CallbackHandle::new(n)
    }

    #[test]
    fn test_first_registered_wins() {
        let mut registry = RouteRegistry::new();
        registry.register("GET", "/users/:id", handle(0)).unwrap();
        registry.register("GET", "/users/{name}", handle(1)).unwrap();
        registry.register("GET", "/users/me", handle(2)).unwrap();

        let matched = registry.lookup(&Method::GET, "/users/me").unwrap();
        assert_eq!(matched.entry.callback(), handle(0));
        assert_eq!(matched.params.get("id"), Some("me"));
    }

    #[test]
    fn test_methods_are_separate() {
        let mut registry = RouteRegistry::new();
        registry.register("get", "/echo", handle(0)).unwrap();
        registry.register("Post", "/echo", handle(1)).unwrap();

        assert_eq!(registry.lookup(&Method::GET, "/echo").unwrap().entry.callback(), handle(0));
        assert_eq!(registry.lookup(&Method::POST, "/echo").unwrap().entry.callback(), handle(1));
        assert!(registry.lookup(&Method::PUT, "/echo").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_ids_follow_registration_order() {
        let mut registry = RouteRegistry::new();
        let a = registry.register("GET", "/a", handle(0)).unwrap();
        let b = registry.register("POST", "/b", handle(1)).unwrap();
        assert_eq!(a.as_usize(), 0);
        assert_eq!(b.as_usize(), 1);
    }

    #[test]
    fn test_entries_in_registration_order() {
        let mut registry = RouteRegistry::new();
        registry.register("POST", "/b", handle(0)).unwrap();
        registry.register("GET", "/a", handle(1)).unwrap();
        registry.register("POST", "/c", handle(2)).unwrap();

        let listed: Vec<_> = registry
            .entries()
            .into_iter()
            .map(|e| (e.method().clone(), e.pattern().to_string()))
            .collect();
        assert_eq!(
            listed,
            vec![
                (Method::POST, "/b".to_string()),
                (Method::GET, "/a".to_string()),
                (Method::POST, "/c".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_registrations() {
        let mut registry = RouteRegistry::new();
        assert_eq!(
            registry.register("GET", "", handle(0)),
            Err(RegistrationError::InvalidPattern {
                pattern: String::new(),
                reason: PatternError::Empty,
            })
        );
        assert!(matches!(
            registry.register("GET", "no-slash", handle(0)),
            Err(RegistrationError::InvalidPattern { .. })
        ));
        assert_eq!(
            registry.register("GE T", "/a", handle(0)),
            Err(RegistrationError::InvalidMethod("GE T".into()))
        );
        assert_eq!(
            registry.register("", "/a", handle(0)),
            Err(RegistrationError::InvalidMethod(String::new()))
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_no_match() {
        let mut registry = RouteRegistry::new();
        registry.register("GET", "/hello/:name", handle(0)).unwrap();
        assert!(registry.lookup(&Method::GET, "/hello").is_none());
        assert!(registry.lookup(&Method::GET, "/other").is_none());
        assert!(RouteRegistry::new().lookup(&Method::GET, "/").is_none());
    }
}
