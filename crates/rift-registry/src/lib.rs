//! Ordered HTTP expectations for tests.
//!
//! A [`Registry`] holds request patterns bound to response sources. Each
//! inbound request is answered by the first expectation that matches it and
//! still has a response to give; a request nothing answers is reported to the
//! registry's [`ReportSink`] and rendered as a 500 explaining every miss.
//! [`MockServer`] puts a registry behind a real HTTP listener.
//!
//! ```no_run
//! use rift_registry::{MockServer, RecordingSink, Registry};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), rift_registry::RegistryError> {
//! let sink = Arc::new(RecordingSink::new());
//! let registry = Registry::new(sink.clone());
//! registry.add_method_and_url("GET", "/users")?;
//!
//! let server = MockServer::start(registry.clone()).await?;
//! // point the client under test at server.url("/users") ...
//!
//! registry.check_all_consumed();
//! assert!(!sink.has_failed());
//! # drop(server);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod predicate;
pub mod registry;
pub mod request;
pub mod response;
pub mod server;
pub mod sink;

pub use config::RegistryConfig;
pub use error::{RegistryError, Result};
pub use predicate::{PatternSummary, RequestPattern};
pub use registry::{ExpectationId, Miss, MissReason, Registry, ResponseSource};
pub use request::RecordedRequest;
pub use response::{CustomResponse, MockResponse, ResponseSink, ResponseTemplate};
pub use server::MockServer;
pub use sink::{RecordingSink, ReportSink, TracingSink};
