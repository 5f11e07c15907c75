//! Buffered snapshot of an inbound HTTP request.
//!
//! Request bodies arrive as one-shot streams. Before a request is matched or
//! archived its body is read once into an immutable [`Bytes`] buffer; every
//! clone of a [`RecordedRequest`] then shares that buffer and can be read any
//! number of times without disturbing the others.

use crate::error::{RegistryError, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Method, Request, Uri};
use serde::de::DeserializeOwned;
use std::fmt::Write as _;

/// An inbound request whose body has been fully buffered.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub received_at: DateTime<Utc>,
}

impl RecordedRequest {
    /// Create a request with no headers and an empty body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            received_at: Utc::now(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Read the body of `req` into memory.
    ///
    /// Returns the snapshot together with a rebuilt request carrying a fresh
    /// readable copy of the same body, so the caller can keep using the
    /// request as if it had never been inspected.
    pub async fn buffer<B>(req: Request<B>) -> Result<(Self, Request<Full<Bytes>>)>
    where
        B: Body<Data = Bytes>,
        B::Error: std::fmt::Display,
    {
        let (parts, body) = req.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| RegistryError::Body(e.to_string()))?
            .to_bytes();

        let recorded = Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            body: body.clone(),
            received_at: Utc::now(),
        };

        Ok((recorded, Request::from_parts(parts, Full::new(body))))
    }

    /// Path and query string, the value URL patterns are searched against.
    pub fn url(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// First value of the named header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn body_json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Rebuild an independent `hyper` request from this snapshot.
    pub fn to_http_request(&self) -> Request<Full<Bytes>> {
        let mut req = Request::new(Full::new(self.body.clone()));
        *req.method_mut() = self.method.clone();
        *req.uri_mut() = self.uri.clone();
        *req.headers_mut() = self.headers.clone();
        req
    }

    /// Human readable dump: request line, headers, blank line, body.
    pub fn dump(&self) -> String {
        let mut out = format!("{} {}\n", self.method, self.url());
        for (name, value) in &self.headers {
            let _ = writeln!(out, "{}: {}", name, String::from_utf8_lossy(value.as_bytes()));
        }
        if !self.body.is_empty() {
            out.push('\n');
            out.push_str(&self.body_text());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buffer_keeps_body_readable() {
        let req = Request::builder()
            .method("POST")
            .uri("/users?page=2")
            .header("x-api-key", "secret")
            .body(Full::new(Bytes::from_static(b"{\"name\":\"ada\"}")))
            .unwrap();

        let before = Utc::now();
        let (recorded, rebuilt) = RecordedRequest::buffer(req).await.unwrap();
        assert!(recorded.received_at >= before);
        assert!(recorded.received_at <= Utc::now());

        assert_eq!(recorded.method, Method::POST);
        assert_eq!(recorded.url(), "/users?page=2");
        assert_eq!(recorded.path(), "/users");
        assert_eq!(recorded.query(), Some("page=2"));
        assert_eq!(recorded.header("X-Api-Key"), Some("secret"));
        assert_eq!(recorded.body_text(), "{\"name\":\"ada\"}");

        let original = rebuilt.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(original, recorded.body);
    }

    #[test]
    fn test_clones_share_an_independent_body() {
        let recorded = RecordedRequest::new(Method::PUT, Uri::from_static("/a"))
            .with_body("payload");
        let first = recorded.clone();
        let second = recorded.clone();

        assert_eq!(first.body_text(), "payload");
        assert_eq!(first.body_text(), "payload");
        assert_eq!(second.body(), recorded.body());
    }

    #[test]
    fn test_body_json() {
        let recorded = RecordedRequest::new(Method::POST, Uri::from_static("/a"))
            .with_body(r#"{"id": 7}"#);
        let value: serde_json::Value = recorded.body_json().unwrap();
        assert_eq!(value["id"], 7);
    }

    #[tokio::test]
    async fn test_to_http_request_round_trips_parts() {
        let recorded = RecordedRequest::new(Method::DELETE, Uri::from_static("/items/3"))
            .with_header(
                HeaderName::from_static("x-trace"),
                HeaderValue::from_static("abc"),
            )
            .with_body("bye");

        let req = recorded.to_http_request();
        assert_eq!(req.method(), Method::DELETE);
        assert_eq!(req.uri().path(), "/items/3");
        assert_eq!(req.headers()["x-trace"], "abc");
        let body = req.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"bye"));
    }

    #[test]
    fn test_dump_includes_request_line_and_body() {
        let recorded = RecordedRequest::new(Method::GET, Uri::from_static("/foo?x=1"))
            .with_header(
                HeaderName::from_static("accept"),
                HeaderValue::from_static("*/*"),
            )
            .with_body("hi");
        let dump = recorded.dump();
        assert!(dump.starts_with("GET /foo?x=1\n"));
        assert!(dump.contains("accept: */*"));
        assert!(dump.ends_with("\nhi"));
    }
}
