//! Static response descriptors.

use crate::error::{RegistryError, Result};
use base64::Engine;
use bytes::Bytes;
use http_body_util::Full;
use hyper::http::{HeaderName, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

/// A fixed status, header set and body.
#[derive(Debug, Clone)]
pub struct ResponseTemplate {
    status: StatusCode,
    headers: BTreeMap<String, String>,
    body: Bytes,
    name: Option<String>,
}

#[derive(Serialize)]
struct TemplateSummary<'a> {
    status: u16,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
}

impl ResponseTemplate {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: Bytes::new(),
            name: None,
        }
    }

    /// Status code from a raw integer, rejecting values outside 100..=999.
    pub fn from_u16(status: u16) -> Result<Self> {
        StatusCode::from_u16(status)
            .map(Self::new)
            .map_err(|_| RegistryError::InvalidStatus(status))
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// Response with a JSON encoded body and `Content-Type: application/json`.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Result<Self> {
        Self::new(status).with_json_body(body)
    }

    /// Set a header. Later values for the same name replace earlier ones.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
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
            .fold(self, |template, (k, v)| template.with_header(k.as_ref(), v.as_ref()))
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Encode `body` as JSON. The content type is forced to `application/json`.
    pub fn with_json_body<T: Serialize + ?Sized>(self, body: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(body)?;
        Ok(self
            .with_body(encoded)
            .with_header("Content-Type", "application/json"))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }

    /// Name shown in diagnostics; falls back to a JSON summary.
    pub fn display_name(&self) -> String {
        if let Some(ref name) = self.name {
            return name.clone();
        }
        let summary = TemplateSummary {
            status: self.status.as_u16(),
            headers: &self.headers,
            body: (!self.body.is_empty())
                .then(|| base64::engine::general_purpose::STANDARD.encode(&self.body)),
        };
        serde_json::to_string(&summary).unwrap_or_default()
    }

    /// Build the HTTP response. Headers that are not valid HTTP are skipped.
    pub fn render(&self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(self.body.clone()));
        *response.status_mut() = self.status;

        for (key, value) in &self.headers {
            match (HeaderName::from_str(key), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => warn!("Skipping invalid response header '{}: {}'", key, value),
            }
        }

        response
    }
}
