//! File-based registry configuration.
//!
//! Lets the standalone binary load expectations from YAML (or JSON, which
//! YAML parses as well):
//!
//! ```yaml
//! listen:
//!   host: 127.0.0.1
//!   port: 8080
//! expectations:
//!   - name: list users
//!     request:
//!       method: GET
//!       url: ^/users$
//!     mode: fixed
//!     responses:
//!       - status: 200
//!         json: [{"id": 1}]
//! ```

use crate::error::{RegistryError, Result};
use crate::predicate::RequestPattern;
use crate::registry::{Registry, ResponseSource};
use crate::response::{MockResponse, ResponseTemplate};
use crate::sink::ReportSink;
use hyper::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub expectations: Vec<ExpectationConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// 0 lets the OS pick a free port
    #[serde(default)]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExpectationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub request: RequestConfig,
    #[serde(default)]
    pub responses: Vec<ResponseConfig>,
    #[serde(default)]
    pub mode: SourceMode,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RequestConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseConfig {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Encoded as the body with `Content-Type: application/json`; wins over `body`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

fn default_status() -> u16 {
    200
}

/// How an expectation hands out its responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Each response once, in order
    #[default]
    Sequence,
    /// The single response forever, still reported as unused
    Fixed,
    /// The single response forever, never reported
    Infinite,
}

impl RegistryConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, anyhow::Error> {
        let config: RegistryConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for (index, expectation) in self.expectations.iter().enumerate() {
            let label = expectation
                .name
                .clone()
                .unwrap_or_else(|| format!("expectation {}", index + 1));

            expectation
                .request
                .to_pattern()
                .map_err(|e| anyhow::anyhow!("Invalid request in '{}': {}", label, e))?;

            for response in &expectation.responses {
                response
                    .to_response()
                    .map_err(|e| anyhow::anyhow!("Invalid response in '{}': {}", label, e))?;
            }

            match (expectation.mode, expectation.responses.len()) {
                (SourceMode::Sequence, 0) => {
                    anyhow::bail!("'{}' needs at least one response", label);
                }
                (SourceMode::Fixed | SourceMode::Infinite, n) if n != 1 => {
                    anyhow::bail!(
                        "'{}' uses mode {:?} and needs exactly one response, got {}",
                        label,
                        expectation.mode,
                        n
                    );
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Register every expectation, in file order, on a fresh registry.
    pub fn build_registry(&self, sink: Arc<dyn ReportSink>) -> Result<Registry> {
        let registry = Registry::new(sink);
        for expectation in &self.expectations {
            let mut pattern = expectation.request.to_pattern()?;
            if let Some(ref name) = expectation.name {
                pattern = pattern.with_name(name.clone());
            }

            let responses = expectation
                .responses
                .iter()
                .map(ResponseConfig::to_response)
                .collect::<Result<Vec<_>>>()?;

            let source = match expectation.mode {
                SourceMode::Sequence => ResponseSource::sequence(responses),
                SourceMode::Fixed => ResponseSource::fixed(single(responses)),
                SourceMode::Infinite => ResponseSource::infinite(single(responses)),
            };
            registry.add(pattern, source);
        }
        Ok(registry)
    }
}

// Validation guarantees exactly one response for the single-response modes.
fn single(responses: Vec<MockResponse>) -> MockResponse {
    responses
        .into_iter()
        .next()
        .unwrap_or_else(|| ResponseTemplate::ok().into())
}

/// Reject header names and values that could never appear on the wire.
fn check_headers(headers: &BTreeMap<String, String>) -> Result<()> {
    for (name, value) in headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err()
            || HeaderValue::from_str(value).is_err()
        {
            return Err(RegistryError::InvalidHeader(format!("{}: {}", name, value)));
        }
    }
    Ok(())
}

impl RequestConfig {
    pub fn to_pattern(&self) -> Result<RequestPattern> {
        check_headers(&self.headers)?;
        let mut pattern = RequestPattern::new()
            .with_method(self.method.as_deref().unwrap_or_default())
            .with_url(self.url.as_deref().unwrap_or_default())?
            .with_headers(self.headers.iter());
        if let Some(ref body) = self.body {
            pattern = pattern.with_body(body.clone());
        }
        Ok(pattern)
    }
}

impl ResponseConfig {
    pub fn to_response(&self) -> Result<MockResponse> {
        check_headers(&self.headers)?;
        let mut template =
            ResponseTemplate::from_u16(self.status)?.with_headers(self.headers.iter());
        if let Some(ref body) = self.body {
            template = template.with_body(body.clone());
        }
        if let Some(ref json) = self.json {
            template = template.with_json_body(json)?;
        }
        if let Some(ref name) = self.name {
            template = template.with_name(name.clone());
        }
        Ok(template.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RecordedRequest;
    use crate::sink::RecordingSink;
    use hyper::{Method, StatusCode, Uri};
    use std::io::Write;

    const YAML: &str = r#"
listen:
  port: 8080
expectations:
  - name: list users
    request:
      method: GET
      url: ^/users$
    mode: fixed
    responses:
      - status: 200
        json: [{"id": 1}]
  - request:
      method: POST
      url: /users
      headers:
        Content-Type: application/json
    responses:
      - status: 201
      - status: 409
        body: duplicate
"#;

    #[test]
    fn test_parse_config() {
        let config = RegistryConfig::from_yaml(YAML).unwrap();
        assert_eq!(config.listen.host, "127.0.0.1");
        assert_eq!(config.listen.port, 8080);
        assert_eq!(config.expectations.len(), 2);
        assert_eq!(config.expectations[0].mode, SourceMode::Fixed);
        assert_eq!(config.expectations[1].mode, SourceMode::Sequence);
        assert_eq!(config.expectations[1].responses[1].status, 409);
    }

    #[test]
    fn test_json_config_is_accepted() {
        let json = r#"{"expectations": [{"request": {"url": "/ping"}, "mode": "infinite", "responses": [{"status": 204}]}]}"#;
        let config = RegistryConfig::from_yaml(json).unwrap();
        assert_eq!(config.listen.port, 0);
        assert_eq!(config.expectations[0].mode, SourceMode::Infinite);
    }

    #[test]
    fn test_build_registry_preserves_order_and_modes() {
        let config = RegistryConfig::from_yaml(YAML).unwrap();
        let sink = Arc::new(RecordingSink::new());
        let registry = config.build_registry(sink.clone()).unwrap();
        assert_eq!(registry.len(), 2);

        let get = RecordedRequest::new(Method::GET, Uri::from_static("/users"));
        for _ in 0..3 {
            assert_eq!(registry.dispatch(&get).status(), StatusCode::OK);
        }

        let post = RecordedRequest::new(Method::POST, Uri::from_static("/users")).with_header(
            hyper::header::CONTENT_TYPE,
            hyper::header::HeaderValue::from_static("application/json"),
        );
        assert_eq!(registry.dispatch(&post).status(), StatusCode::CREATED);
        assert_eq!(registry.dispatch(&post).status(), StatusCode::CONFLICT);

        assert_eq!(registry.check_all_consumed(), 1);
        assert_eq!(
            sink.messages(),
            vec!["request list users has mock response #1 as unused response"]
        );
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let yaml = r#"
expectations:
  - request:
      url: "/users/("
    responses:
      - status: 200
"#;
        let err = RegistryConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("expectation 1"));
    }

    #[test]
    fn test_invalid_status_is_rejected() {
        let yaml = r#"
expectations:
  - name: broken
    responses:
      - status: 42
"#;
        let err = RegistryConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_invalid_response_header_is_rejected() {
        let yaml = r#"
expectations:
  - name: spaced
    responses:
      - status: 200
        headers:
          "bad header": x
"#;
        let err = RegistryConfig::from_yaml(yaml).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("spaced"));
        assert!(message.contains("Invalid header 'bad header: x'"));
    }

    #[test]
    fn test_invalid_request_header_value_is_rejected() {
        let mut config = RegistryConfig::default();
        config.expectations.push(ExpectationConfig {
            name: None,
            request: RequestConfig {
                headers: BTreeMap::from([("X-Token".to_string(), "a\nb".to_string())]),
                ..RequestConfig::default()
            },
            responses: vec![ResponseConfig {
                status: 200,
                headers: BTreeMap::new(),
                body: None,
                json: None,
                name: None,
            }],
            mode: SourceMode::Sequence,
        });

        assert!(config.validate().is_err());
        let sink = Arc::new(RecordingSink::new());
        assert!(matches!(
            config.build_registry(sink),
            Err(RegistryError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_mode_response_counts() {
        let empty = "expectations:\n  - responses: []\n";
        assert!(RegistryConfig::from_yaml(empty).is_err());

        let fixed_two = r#"
expectations:
  - mode: fixed
    responses:
      - status: 200
      - status: 201
"#;
        let err = RegistryConfig::from_yaml(fixed_two).unwrap_err();
        assert!(err.to_string().contains("exactly one response"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = RegistryConfig::from_file(file.path()).unwrap();
        assert_eq!(config.expectations[0].name.as_deref(), Some("list users"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(RegistryConfig::from_file("/nonexistent/registry.yaml").is_err());
    }
}
