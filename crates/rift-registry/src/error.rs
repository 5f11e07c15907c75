//! Error types for registry configuration and the HTTP transport.
//!
//! Matching and response consumption never produce these errors: a request
//! that fails to match is a [`Miss`](crate::registry::Miss), not an error.

use crate::registry::ExpectationId;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid URL pattern '{pattern}': {source}")]
    InvalidUrlPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Invalid status code {0}")]
    InvalidStatus(u16),
    #[error("Invalid header '{0}'")]
    InvalidHeader(String),
    #[error("Expectation {0} is not registered")]
    UnknownExpectation(ExpectationId),
    #[error("Failed to encode JSON body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to read request body: {0}")]
    Body(String),
    #[error("Failed to bind {0}: {1}")]
    Bind(std::net::SocketAddr, #[source] std::io::Error),
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
