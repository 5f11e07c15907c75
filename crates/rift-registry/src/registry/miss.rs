//! Diagnostics explaining why an expectation did not answer a request.

use crate::predicate::{PatternSummary, RequestPattern};
use serde::Serialize;
use std::fmt;

/// Why a single expectation did not produce a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MissReason {
    #[serde(rename = "the path does not match")]
    PathMismatch,
    #[serde(rename = "the method does not match")]
    MethodMismatch,
    #[serde(rename = "the header does not match")]
    HeaderMismatch,
    #[serde(rename = "the body does not match")]
    BodyMismatch,
    #[serde(rename = "the route matches but there was no response available")]
    ResponsesExhausted,
}

impl MissReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissReason::PathMismatch => "the path does not match",
            MissReason::MethodMismatch => "the method does not match",
            MissReason::HeaderMismatch => "the header does not match",
            MissReason::BodyMismatch => "the body does not match",
            MissReason::ResponsesExhausted => {
                "the route matches but there was no response available"
            }
        }
    }
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One expectation failing one request for one reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Miss {
    /// Display name of the missed expectation's pattern
    #[serde(skip)]
    pub name: String,
    pub request: PatternSummary,
    pub why: MissReason,
}

impl Miss {
    pub fn new(pattern: &RequestPattern, why: MissReason) -> Self {
        Self {
            name: pattern.display_name(),
            request: pattern.summary(),
            why,
        }
    }
}

impl fmt::Display for Miss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} missed because {}", self.name, self.why)
    }
}

/// JSON array of misses, the body of the fatal no-match response.
pub fn misses_to_json(misses: &[Miss]) -> String {
    serde_json::to_string(misses).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_wire_strings() {
        let reasons = [
            MissReason::PathMismatch,
            MissReason::MethodMismatch,
            MissReason::HeaderMismatch,
            MissReason::BodyMismatch,
            MissReason::ResponsesExhausted,
        ];
        for reason in reasons {
            assert_eq!(
                serde_json::to_string(&reason).unwrap(),
                format!("\"{}\"", reason.as_str())
            );
        }
    }

    #[test]
    fn test_miss_json_shape() {
        let pattern = RequestPattern::method_and_url("GET", "/foo")
            .unwrap()
            .with_name("mock request #1");
        let misses = vec![Miss::new(&pattern, MissReason::ResponsesExhausted)];
        assert_eq!(
            misses_to_json(&misses),
            r#"[{"request":{"url":"/foo","method":"GET"},"why":"the route matches but there was no response available"}]"#
        );
    }

    #[test]
    fn test_miss_display() {
        let pattern = RequestPattern::new().with_name("mock request #1");
        let miss = Miss::new(&pattern, MissReason::ResponsesExhausted);
        assert_eq!(
            miss.to_string(),
            "mock request #1 missed because the route matches but there was no response available"
        );
    }

    #[test]
    fn test_empty_misses_serialize_as_empty_array() {
        assert_eq!(misses_to_json(&[]), "[]");
    }
}
