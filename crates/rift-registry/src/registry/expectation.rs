//! An expectation binds one request pattern to one response source and keeps
//! the history of every request it answered.

use super::miss::{Miss, MissReason};
use super::source::ResponseSource;
use crate::predicate::RequestPattern;
use crate::request::RecordedRequest;
use crate::response::MockResponse;

#[derive(Debug)]
pub struct Expectation {
    pattern: RequestPattern,
    source: ResponseSource,
    matched: Vec<RecordedRequest>,
}

impl Expectation {
    pub fn new(pattern: RequestPattern, source: ResponseSource) -> Self {
        Self {
            pattern,
            source,
            matched: Vec::new(),
        }
    }

    /// Try to answer `request`.
    ///
    /// On a pattern mismatch every failing dimension is returned as a miss.
    /// On a match with an exhausted source a single `ResponsesExhausted` miss
    /// is returned. Otherwise the request is archived and the drawn response
    /// returned.
    pub fn try_dispatch(&mut self, request: &RecordedRequest) -> Result<MockResponse, Vec<Miss>> {
        let reasons = self.pattern.mismatches(request);
        if !reasons.is_empty() {
            return Err(reasons
                .into_iter()
                .map(|why| Miss::new(&self.pattern, why))
                .collect());
        }

        match self.source.next_response() {
            Some(response) => {
                self.matched.push(request.clone());
                Ok(response)
            }
            None => Err(vec![Miss::new(
                &self.pattern,
                MissReason::ResponsesExhausted,
            )]),
        }
    }

    pub fn call_count(&self) -> usize {
        self.matched.len()
    }

    /// Fresh copies of every answered request, oldest first.
    pub fn history(&self) -> Vec<RecordedRequest> {
        self.matched.clone()
    }

    pub fn pattern(&self) -> &RequestPattern {
        &self.pattern
    }

    pub fn source(&self) -> &ResponseSource {
        &self.source
    }

    /// The response the next successful dispatch would use.
    pub fn pending_response(&self) -> Option<&MockResponse> {
        self.source.peek()
    }
}
