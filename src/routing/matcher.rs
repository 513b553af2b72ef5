//! Path template matching.
//!
//! # Responsibilities
//! - Parse route templates into segments at registration time
//! - Match a request path against a template, whole-path anchored
//! - Extract captures in left-to-right template order
//!
//! # Design Decisions
//! - Segment syntax: literal, `:name`, `{name}`, trailing `*name` / `{*name}`
//! - Literal segments compare byte-for-byte; no regex, so metacharacters
//!   in paths are plain text and matching is O(segments)
//! - Trailing slashes are significant (`/a/` does not match `/a`)
//! - A non-matching or malformed path is `None`, never a panic

use std::fmt;
use thiserror::Error;

/// Reasons a route template is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,

    #[error("pattern must start with '/'")]
    MissingLeadingSlash,

    #[error("placeholder in segment {0:?} has no name")]
    EmptyParamName(String),

    #[error("placeholder name {0:?} may only contain letters, digits and '_'")]
    InvalidParamName(String),

    #[error("segment {0:?} has a misplaced '{{' or '}}'")]
    MisplacedBrace(String),

    #[error("placeholder {0:?} appears more than once")]
    DuplicateParam(String),

    #[error("wildcard {0:?} must be the last segment")]
    WildcardNotLast(String),
}

/// One `/`-separated piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard(String),
}

/// A compiled route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse a template such as `/users/:id/files/*path`.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        let rest = pattern
            .strip_prefix('/')
            .ok_or(PatternError::MissingLeadingSlash)?;

        let raw: Vec<&str> = rest.split('/').collect();
        let mut segments = Vec::with_capacity(raw.len());
        let mut names: Vec<String> = Vec::new();

        for (index, part) in raw.iter().enumerate() {
            let segment = parse_segment(part)?;
            if let Segment::Param(name) | Segment::Wildcard(name) = &segment {
                if names.contains(name) {
                    return Err(PatternError::DuplicateParam(name.clone()));
                }
                if matches!(segment, Segment::Wildcard(_)) && index + 1 != raw.len() {
                    return Err(PatternError::WildcardNotLast(name.clone()));
                }
                names.push(name.clone());
            }
            segments.push(segment);
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// The template as registered.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Capture names in template order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) | Segment::Wildcard(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match `path` against this template.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let rest = path.strip_prefix('/')?;

        let parts: Vec<&str> = match self.segments.last() {
            Some(Segment::Wildcard(_)) => rest.splitn(self.segments.len(), '/').collect(),
            _ => rest.split('/').collect(),
        };
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::default();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.push(name, part);
                }
                Segment::Wildcard(name) => params.push(name, part),
            }
        }
        Some(params)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Match `path` against `pattern`, returning captures on success.
pub fn match_path(pattern: &RoutePattern, path: &str) -> Option<PathParams> {
    pattern.matches(path)
}

fn parse_segment(part: &str) -> Result<Segment, PatternError> {
    if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
        return match inner.strip_prefix('*') {
            Some(name) => Ok(Segment::Wildcard(validate_name(part, name)?)),
            None => Ok(Segment::Param(validate_name(part, inner)?)),
        };
    }
    if part.contains('{') || part.contains('}') {
        return Err(PatternError::MisplacedBrace(part.to_string()));
    }
    if let Some(name) = part.strip_prefix(':') {
        return Ok(Segment::Param(validate_name(part, name)?));
    }
    if let Some(name) = part.strip_prefix('*') {
        return Ok(Segment::Wildcard(validate_name(part, name)?));
    }
    Ok(Segment::Literal(part.to_string()))
}

fn validate_name(part: &str, name: &str) -> Result<String, PatternError> {
    if name.is_empty() {
        return Err(PatternError::EmptyParamName(part.to_string()));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(PatternError::InvalidParamName(name.to_string()));
    }
    Ok(name.to_string())
}

/// Captured path parameters, in template order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    entries: Vec<(String, String)>,
}

impl PathParams {
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Captured values, positionally.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captures(pattern: &str, path: &str) -> Option<Vec<String>> {
        let pattern = RoutePattern::parse(pattern).unwrap();
        match_path(&pattern, path).map(|p| p.values().map(String::from).collect())
    }

    #[test]
    fn test_literal_match() {
        assert_eq!(captures("/echo", "/echo"), Some(vec![]));
        assert_eq!(captures("/echo", "/echo/more"), None);
        assert_eq!(captures("/echo", "/ech"), None);
        assert_eq!(captures("/", "/"), Some(vec![]));
        assert_eq!(captures("/", "/x"), None);
    }

    #[test]
    fn test_named_params() {
        assert_eq!(captures("/hello/:name", "/hello/Ann"), Some(vec!["Ann".into()]));
        assert_eq!(
            captures("/users/{id}/posts/:post", "/users/7/posts/99"),
            Some(vec!["7".into(), "99".into()])
        );

        let pattern = RoutePattern::parse("/users/{id}/posts/:post").unwrap();
        let params = pattern.matches("/users/7/posts/99").unwrap();
        assert_eq!(params.get("id"), Some("7"));
        assert_eq!(params.get("post"), Some("99"));
        assert_eq!(pattern.param_names().collect::<Vec<_>>(), vec!["id", "post"]);
    }

    #[test]
    fn test_params_reject_empty_segment() {
        assert_eq!(captures("/hello/:name", "/hello/"), None);
        assert_eq!(captures("/hello/:name", "/hello"), None);
    }

    #[test]
    fn test_anchored_and_trailing_slash() {
        assert_eq!(captures("/a", "/a/"), None);
        assert_eq!(captures("/a/", "/a"), None);
        assert_eq!(captures("/a/:b", "/x/a/b"), None);
        assert_eq!(captures("/a", "a"), None);
        assert_eq!(captures("/a", ""), None);
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert_eq!(captures("/a.b", "/a.b"), Some(vec![]));
        assert_eq!(captures("/a.b", "/axb"), None);
        assert_eq!(captures("/(x)+", "/xx"), None);
        assert_eq!(captures("/hello/:name", "/hello/(.*)"), Some(vec!["(.*)".into()]));
    }

    #[test]
    fn test_wildcard() {
        assert_eq!(
            captures("/static/*path", "/static/css/site.css"),
            Some(vec!["css/site.css".into()])
        );
        assert_eq!(captures("/static/{*path}", "/static/"), Some(vec!["".into()]));
        assert_eq!(captures("/static/*path", "/static"), None);
        assert_eq!(captures("/*all", "/"), Some(vec!["".into()]));
        assert_eq!(captures("/*all", "/a/b/c"), Some(vec!["a/b/c".into()]));
    }

    #[test]
    fn test_malformed_patterns() {
        assert_eq!(RoutePattern::parse(""), Err(PatternError::Empty));
        assert_eq!(RoutePattern::parse("hello"), Err(PatternError::MissingLeadingSlash));
        assert!(matches!(RoutePattern::parse("/a/:"), Err(PatternError::EmptyParamName(_))));
        assert!(matches!(RoutePattern::parse("/a/{}"), Err(PatternError::EmptyParamName(_))));
        assert!(matches!(RoutePattern::parse("/a/{id"), Err(PatternError::MisplacedBrace(_))));
        assert!(matches!(RoutePattern::parse("/a/x{id}"), Err(PatternError::MisplacedBrace(_))));
        assert!(matches!(RoutePattern::parse("/a/:na-me"), Err(PatternError::InvalidParamName(_))));
        assert_eq!(
            RoutePattern::parse("/:id/:id"),
            Err(PatternError::DuplicateParam("id".into()))
        );
        assert_eq!(
            RoutePattern::parse("/*rest/more"),
            Err(PatternError::WildcardNotLast("rest".into()))
        );
    }

    #[test]
    fn test_hostile_paths_do_not_panic() {
        let pattern = RoutePattern::parse("/files/:name/*rest").unwrap();
        for path in ["", "/", "//", "///", "/files//", "\u{0}", "/files/\u{1F600}/x", "/files/%2F/.."] {
            let _ = pattern.matches(path);
        }
    }
}
