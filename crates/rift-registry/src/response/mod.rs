//! Response descriptors returned when an expectation matches.
//!
//! - `template`: fixed status, headers and body
//! - `custom`: responses computed from the matched request

mod custom;
mod template;

pub use custom::{CustomResponse, ResponseSink};
pub use template::ResponseTemplate;

use crate::request::RecordedRequest;
use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;

/// Anything that can render an outbound response for an inbound request.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Template(ResponseTemplate),
    Custom(CustomResponse),
}

impl MockResponse {
    pub fn render(&self, request: &RecordedRequest) -> Response<Full<Bytes>> {
        match self {
            MockResponse::Template(template) => template.render(),
            MockResponse::Custom(custom) => custom.render(request),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            MockResponse::Template(template) => template.name(),
            MockResponse::Custom(custom) => custom.name(),
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            MockResponse::Template(template) => template.display_name(),
            MockResponse::Custom(custom) => custom.name().unwrap_or("custom response").to_string(),
        }
    }

    pub(crate) fn set_name(&mut self, name: String) {
        match self {
            MockResponse::Template(template) => template.set_name(name),
            MockResponse::Custom(custom) => custom.set_name(name),
        }
    }
}

impl From<ResponseTemplate> for MockResponse {
    fn from(template: ResponseTemplate) -> Self {
        MockResponse::Template(template)
    }
}

impl From<CustomResponse> for MockResponse {
    fn from(custom: CustomResponse) -> Self {
        MockResponse::Custom(custom)
    }
}
