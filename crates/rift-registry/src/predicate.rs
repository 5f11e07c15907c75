//! Request patterns: the predicate half of an expectation.
//!
//! A [`RequestPattern`] constrains up to four dimensions of an inbound request:
//! the URL (a regex searched against path and query), the method (exact), a set
//! of headers (name case-insensitive, value exact) and the body (exact bytes).
//! An unspecified dimension imposes no constraint. A pattern with no
//! constraints at all is a wildcard and matches every request.
//!
//! Patterns are values: every `with_*` method consumes the pattern and returns
//! a new one, so a pattern shared between registrations can never be changed
//! behind the registry's back.

use crate::error::{RegistryError, Result};
use crate::registry::MissReason;
use crate::request::RecordedRequest;
use base64::Engine;
use bytes::Bytes;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct UrlPattern {
    source: String,
    regex: Arc<Regex>,
}

/// Describes which inbound requests an expectation accepts.
#[derive(Debug, Clone, Default)]
pub struct RequestPattern {
    url: Option<UrlPattern>,
    method: Option<String>,
    headers: BTreeMap<String, String>,
    body: Option<Bytes>,
    name: Option<String>,
}

/// Serializable view of a pattern used in miss diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternSummary {
    pub url: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    /// Base64 encoded body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl RequestPattern {
    /// The wildcard pattern.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pattern constraining method and URL.
    pub fn method_and_url(method: &str, url: &str) -> Result<Self> {
        Self::new().with_method(method).with_url(url)
    }

    /// Pattern constraining method and URL that also requires a JSON content type.
    pub fn json(method: &str, url: &str) -> Result<Self> {
        Ok(Self::method_and_url(method, url)?.with_header("Content-Type", "application/json"))
    }

    /// Constrain the URL. The pattern is a regex searched (not anchored)
    /// against the request path and query. An empty pattern removes the
    /// constraint.
    pub fn with_url(mut self, pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            self.url = None;
            return Ok(self);
        }
        let regex = Regex::new(pattern).map_err(|source| RegistryError::InvalidUrlPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.url = Some(UrlPattern {
            source: pattern.to_string(),
            regex: Arc::new(regex),
        });
        Ok(self)
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = (!method.is_empty()).then(|| method.to_string());
        self
    }

    /// Require a header. A later call with the same name (in any case) wins.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        headers
            .into_iter()
            .fold(self, |pattern, (k, v)| pattern.with_header(k.as_ref(), v.as_ref()))
    }

    /// Require an exact body. An empty body removes the constraint.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.body = (!body.is_empty()).then_some(body);
        self
    }

    pub fn with_json_body<T: Serialize + ?Sized>(self, body: &T) -> Result<Self> {
        Ok(self.with_body(serde_json::to_vec(body)?))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_ref().map(|u| u.source.as_str())
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// True when no dimension is constrained. The display name does not count.
    pub fn is_wildcard(&self) -> bool {
        self.url.is_none()
            && self.method.is_none()
            && self.headers.is_empty()
            && self.body.is_none()
    }

    /// True when both patterns impose the same constraints, ignoring names.
    pub fn same_constraints(&self, other: &Self) -> bool {
        self.url() == other.url()
            && self.method == other.method
            && self.headers == other.headers
            && self.body == other.body
    }

    /// Whether the URL constraint, if any, accepts `url`.
    pub fn url_matches(&self, url: &str) -> bool {
        self.url.as_ref().map_or(true, |u| u.regex.is_match(url))
    }

    /// Evaluate every constrained dimension against `request`.
    ///
    /// Returns one reason per failing dimension (one per failing header), so
    /// an empty result means the request matches.
    pub fn mismatches(&self, request: &RecordedRequest) -> Vec<MissReason> {
        if self.is_wildcard() {
            return Vec::new();
        }

        let mut reasons = Vec::new();

        if let Some(ref url) = self.url {
            if !url.regex.is_match(request.url()) {
                reasons.push(MissReason::PathMismatch);
            }
        }

        if let Some(ref method) = self.method {
            if request.method.as_str() != method {
                reasons.push(MissReason::MethodMismatch);
            }
        }

        for (name, expected) in &self.headers {
            if request.header(name) != Some(expected.as_str()) {
                reasons.push(MissReason::HeaderMismatch);
            }
        }

        if let Some(ref body) = self.body {
            if request.body() != body {
                reasons.push(MissReason::BodyMismatch);
            }
        }

        reasons
    }

    pub fn matches(&self, request: &RecordedRequest) -> bool {
        self.mismatches(request).is_empty()
    }

    pub fn summary(&self) -> PatternSummary {
        PatternSummary {
            url: self.url().unwrap_or_default().to_string(),
            method: self.method.clone().unwrap_or_default(),
            headers: (!self.headers.is_empty()).then(|| self.headers.clone()),
            body: self
                .body
                .as_ref()
                .map(|b| base64::engine::general_purpose::STANDARD.encode(b)),
        }
    }

    /// Name shown in diagnostics; falls back to the JSON summary.
    pub fn display_name(&self) -> String {
        match self.name {
            Some(ref name) => name.clone(),
            None => serde_json::to_string(&self.summary()).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{HeaderName, HeaderValue};
    use hyper::{Method, Uri};

    fn get(uri: &'static str) -> RecordedRequest {
        RecordedRequest::new(Method::GET, Uri::from_static(uri))
    }

    #[test]
    fn test_wildcard_matches_everything() {
        let pattern = RequestPattern::new();
        assert!(pattern.is_wildcard());
        assert!(pattern.matches(&get("/anything")));
        assert!(pattern.matches(
            &RecordedRequest::new(Method::PATCH, Uri::from_static("/x?y=1")).with_body("z")
        ));
    }

    #[test]
    fn test_named_wildcard_is_still_wildcard() {
        let pattern = RequestPattern::new().with_name("default request");
        assert!(pattern.is_wildcard());
    }

    #[test]
    fn test_url_is_a_regex_search() {
        let cases = [
            ("/test", "/test"),
            ("/users/(.*?)", "/users/123"),
            ("/foo\\?bar=(.*?)", "/foo?bar=10"),
            ("users", "/api/users/list"),
        ];
        for (pattern, url) in cases {
            let pattern = RequestPattern::new().with_url(pattern).unwrap();
            let request = RecordedRequest::new(Method::GET, url.parse().unwrap());
            assert!(pattern.matches(&request), "{url} should match");
        }
    }

    #[test]
    fn test_invalid_url_pattern_is_rejected() {
        let err = RequestPattern::new().with_url("/users/(").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidUrlPattern { .. }));
    }

    #[test]
    fn test_empty_values_remove_constraints() {
        let pattern = RequestPattern::new()
            .with_url("")
            .unwrap()
            .with_method("")
            .with_body("");
        assert!(pattern.is_wildcard());
    }

    #[test]
    fn test_all_dimensions_must_hold() {
        let pattern = RequestPattern::method_and_url("GET", "/users").unwrap();
        assert!(pattern.matches(&get("/users")));
        assert_eq!(
            pattern.mismatches(&get("/other")),
            vec![MissReason::PathMismatch]
        );
        assert_eq!(
            pattern.mismatches(&RecordedRequest::new(Method::POST, Uri::from_static("/users"))),
            vec![MissReason::MethodMismatch]
        );
    }

    #[test]
    fn test_every_failing_dimension_is_reported() {
        let pattern = RequestPattern::method_and_url("POST", "/users")
            .unwrap()
            .with_header("X-Api-Key", "secret");
        let reasons = pattern.mismatches(&get("/users"));
        assert_eq!(
            reasons,
            vec![MissReason::MethodMismatch, MissReason::HeaderMismatch]
        );
    }

    #[test]
    fn test_header_names_are_case_insensitive() {
        let pattern = RequestPattern::new().with_header("X-Api-Key", "secret");
        let request = get("/").with_header(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_static("secret"),
        );
        assert!(pattern.matches(&request));

        let wrong = get("/").with_header(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_static("Secret"),
        );
        assert_eq!(pattern.mismatches(&wrong), vec![MissReason::HeaderMismatch]);
        assert_eq!(pattern.mismatches(&get("/")), vec![MissReason::HeaderMismatch]);
    }

    #[test]
    fn test_one_reason_per_failing_header() {
        let pattern = RequestPattern::new().with_headers([("a", "1"), ("b", "2")]);
        assert_eq!(
            pattern.mismatches(&get("/")),
            vec![MissReason::HeaderMismatch, MissReason::HeaderMismatch]
        );
    }

    #[test]
    fn test_body_must_match_exactly() {
        let pattern = RequestPattern::new().with_body("hello");
        assert!(pattern.matches(&get("/").with_body("hello")));
        assert_eq!(
            pattern.mismatches(&get("/").with_body("hello!")),
            vec![MissReason::BodyMismatch]
        );
    }

    #[test]
    fn test_json_pattern_requires_content_type() {
        let pattern = RequestPattern::json("POST", "/items")
            .unwrap()
            .with_json_body(&serde_json::json!({"id": 1}))
            .unwrap();
        let request = RecordedRequest::new(Method::POST, Uri::from_static("/items"))
            .with_header(
                HeaderName::from_static("content-type"),
                HeaderValue::from_static("application/json"),
            )
            .with_body(r#"{"id":1}"#);
        assert!(pattern.matches(&request));
    }

    #[test]
    fn test_with_methods_return_new_values() {
        let base = RequestPattern::method_and_url("GET", "/a").unwrap();
        let derived = base.clone().with_header("x", "y");
        assert!(base.headers().is_empty());
        assert_eq!(derived.headers().len(), 1);
        assert!(!base.same_constraints(&derived));
        assert!(base.same_constraints(&base.clone().with_name("renamed")));
    }

    #[test]
    fn test_summary_serialization() {
        let pattern = RequestPattern::method_and_url("GET", "/foo").unwrap();
        assert_eq!(
            serde_json::to_string(&pattern.summary()).unwrap(),
            r#"{"url":"/foo","method":"GET"}"#
        );

        let with_body = RequestPattern::new().with_body("hi").with_header("K", "v");
        assert_eq!(
            serde_json::to_string(&with_body.summary()).unwrap(),
            r#"{"url":"","method":"","headers":{"k":"v"},"body":"aGk="}"#
        );
    }

    #[test]
    fn test_display_name_falls_back_to_summary() {
        let pattern = RequestPattern::method_and_url("DELETE", "/bar").unwrap();
        assert_eq!(pattern.display_name(), r#"{"url":"/bar","method":"DELETE"}"#);
        assert_eq!(pattern.with_name("bar deletion").display_name(), "bar deletion");
    }
}
