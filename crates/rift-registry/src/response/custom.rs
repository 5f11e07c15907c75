//! Responses computed from the inbound request at render time.

use crate::request::RecordedRequest;
use bytes::Bytes;
use http_body_util::Full;
use hyper::http::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Response, StatusCode};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

type Handler = dyn Fn(&RecordedRequest, &mut ResponseSink) + Send + Sync;

/// Response produced by a closure over the matched request.
///
/// ```
/// use rift_registry::CustomResponse;
///
/// let echo = CustomResponse::new(|req, sink| {
///     sink.insert_header("Content-Type", "text/plain");
///     sink.write(req.body());
/// })
/// .with_name("echo");
/// assert_eq!(echo.name(), Some("echo"));
/// ```
#[derive(Clone)]
pub struct CustomResponse {
    name: Option<String>,
    handler: Arc<Handler>,
}

impl CustomResponse {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest, &mut ResponseSink) + Send + Sync + 'static,
    {
        Self {
            name: None,
            handler: Arc::new(handler),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }

    pub fn render(&self, request: &RecordedRequest) -> Response<Full<Bytes>> {
        let mut sink = ResponseSink::new();
        (self.handler)(request, &mut sink);
        sink.into_response()
    }
}

impl fmt::Debug for CustomResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomResponse")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Writer handed to a [`CustomResponse`] handler. Starts as an empty `200 OK`.
#[derive(Debug)]
pub struct ResponseSink {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseSink {
    fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Set a header, replacing previous values. Invalid names or values are skipped.
    pub fn insert_header(&mut self, name: &str, value: &str) {
        match (HeaderName::from_str(name), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => warn!("Skipping invalid response header '{}: {}'", name, value),
        }
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Append bytes to the body.
    pub fn write(&mut self, bytes: impl AsRef<[u8]>) {
        self.body.extend_from_slice(bytes.as_ref());
    }

    /// Append `value` encoded as JSON and set the JSON content type.
    ///
    /// # Panics
    ///
    /// Panics if `value` cannot be encoded. A handler producing an unencodable
    /// body is a broken test setup, not a condition to recover from.
    pub fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) {
        let encoded = serde_json::to_vec(value)
            .unwrap_or_else(|e| panic!("custom response body cannot be encoded as JSON: {e}"));
        self.insert_header("Content-Type", "application/json");
        self.body.extend_from_slice(&encoded);
    }

    fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(self.body)));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
