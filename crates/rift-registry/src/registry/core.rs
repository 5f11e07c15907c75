//! Core Registry struct and the dispatch loop.
//!
//! The registry owns an ordered, append-only list of expectations. Dispatch
//! walks that list in registration order and answers with the first
//! expectation whose pattern matches and whose source still has a response.
//! Every expectation that declines records why, so a request nothing answers
//! can be explained in full.

use super::expectation::Expectation;
use super::miss::{misses_to_json, Miss};
use super::names::NameGenerator;
use super::source::ResponseSource;
use crate::error::{RegistryError, Result};
use crate::predicate::RequestPattern;
use crate::request::RecordedRequest;
use crate::response::{MockResponse, ResponseTemplate};
use crate::sink::ReportSink;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// Handle to a registered expectation, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpectationId(usize);

impl ExpectationId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ExpectationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything dispatch mutates - protected by a single lock
struct RegistryState {
    expectations: Vec<Expectation>,
    last_misses: Vec<Miss>,
    request_names: NameGenerator,
    response_names: NameGenerator,
    custom_names: NameGenerator,
}

impl RegistryState {
    fn new() -> Self {
        Self {
            expectations: Vec::new(),
            last_misses: Vec::new(),
            request_names: NameGenerator::new("mock request"),
            response_names: NameGenerator::new("mock response"),
            custom_names: NameGenerator::new("custom response"),
        }
    }
}

/// Ordered set of expectations answering inbound requests.
///
/// Cloning is cheap and every clone shares the same expectations, so a clone
/// can be moved into the HTTP server while the test keeps another to register
/// expectations and inspect history.
#[derive(Clone)]
pub struct Registry {
    state: Arc<Mutex<RegistryState>>,
    sink: Arc<dyn ReportSink>,
}

impl Registry {
    pub fn new(sink: Arc<dyn ReportSink>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState::new())),
            sink,
        }
    }

    /// Append an expectation. Patterns and responses without a display name
    /// get one from this registry's name generators.
    pub fn add(&self, pattern: RequestPattern, mut source: ResponseSource) -> ExpectationId {
        let mut state = self.state.lock();

        let pattern = match pattern.name() {
            Some(_) => pattern,
            None => {
                let name = state.request_names.next_name();
                pattern.with_name(name)
            }
        };

        for response in source.responses_mut() {
            if response.name().is_none() {
                let name = match response {
                    MockResponse::Template(_) => state.response_names.next_name(),
                    MockResponse::Custom(_) => state.custom_names.next_name(),
                };
                response.set_name(name);
            }
        }

        debug!(
            "Registered expectation {} ({:?} responses)",
            pattern.display_name(),
            source.remaining()
        );
        state.expectations.push(Expectation::new(pattern, source));
        ExpectationId(state.expectations.len() - 1)
    }

    /// `200 OK` once, for any request.
    pub fn add_any(&self) -> ExpectationId {
        self.add(
            RequestPattern::new(),
            ResponseSource::sequence([ResponseTemplate::ok()]),
        )
    }

    /// `200 OK` once, for a request whose URL matches `url`.
    pub fn add_url(&self, url: &str) -> Result<ExpectationId> {
        self.add_url_with_status(url, StatusCode::OK)
    }

    pub fn add_url_with_status(&self, url: &str, status: StatusCode) -> Result<ExpectationId> {
        Ok(self.add(
            RequestPattern::new().with_url(url)?,
            ResponseSource::sequence([ResponseTemplate::new(status)]),
        ))
    }

    /// `200 OK` once, for a request with the given method.
    pub fn add_method(&self, method: &str) -> ExpectationId {
        self.add_method_with_status(method, StatusCode::OK)
    }

    pub fn add_method_with_status(&self, method: &str, status: StatusCode) -> ExpectationId {
        self.add(
            RequestPattern::new().with_method(method),
            ResponseSource::sequence([ResponseTemplate::new(status)]),
        )
    }

    /// `200 OK` once, for a request matching both method and URL.
    pub fn add_method_and_url(&self, method: &str, url: &str) -> Result<ExpectationId> {
        self.add_method_and_url_with_status(method, url, StatusCode::OK)
    }

    pub fn add_method_and_url_with_status(
        &self,
        method: &str,
        url: &str,
        status: StatusCode,
    ) -> Result<ExpectationId> {
        Ok(self.add(
            RequestPattern::method_and_url(method, url)?,
            ResponseSource::sequence([ResponseTemplate::new(status)]),
        ))
    }

    /// `200 OK` once, for a request carrying exactly `body`.
    pub fn add_body(&self, body: impl Into<Bytes>) -> ExpectationId {
        self.add(
            RequestPattern::new().with_body(body),
            ResponseSource::sequence([ResponseTemplate::ok()]),
        )
    }

    /// `200 OK` once, for a request matching `pattern`.
    pub fn add_request(&self, pattern: RequestPattern) -> ExpectationId {
        self.add(pattern, ResponseSource::sequence([ResponseTemplate::ok()]))
    }

    /// `response` once, for any request.
    pub fn add_response(&self, response: impl Into<MockResponse>) -> ExpectationId {
        self.add(RequestPattern::new(), ResponseSource::sequence([response]))
    }

    /// Each of `responses` once, in order, for any request.
    pub fn add_responses<I, R>(&self, responses: I) -> ExpectationId
    where
        I: IntoIterator<Item = R>,
        R: Into<MockResponse>,
    {
        self.add(RequestPattern::new(), ResponseSource::sequence(responses))
    }

    pub fn add_request_with_response(
        &self,
        pattern: RequestPattern,
        response: impl Into<MockResponse>,
    ) -> ExpectationId {
        self.add(pattern, ResponseSource::sequence([response]))
    }

    /// Each of `responses` once, in order, for requests matching `pattern`.
    pub fn add_request_with_responses<I, R>(
        &self,
        pattern: RequestPattern,
        responses: I,
    ) -> ExpectationId
    where
        I: IntoIterator<Item = R>,
        R: Into<MockResponse>,
    {
        self.add(pattern, ResponseSource::sequence(responses))
    }

    /// `response` for every request matching `pattern`. Still reported by
    /// [`check_all_consumed`](Self::check_all_consumed).
    pub fn add_fixed_response(
        &self,
        pattern: RequestPattern,
        response: impl Into<MockResponse>,
    ) -> ExpectationId {
        self.add(pattern, ResponseSource::fixed(response))
    }

    /// `response` for every request, never reported as unused.
    pub fn add_infinite_response(&self, response: impl Into<MockResponse>) -> ExpectationId {
        self.add_request_with_infinite_response(RequestPattern::new(), response)
    }

    pub fn add_request_with_infinite_response(
        &self,
        pattern: RequestPattern,
        response: impl Into<MockResponse>,
    ) -> ExpectationId {
        self.add(pattern, ResponseSource::infinite(response))
    }

    pub fn len(&self) -> usize {
        self.state.lock().expectations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn call_count(&self, id: ExpectationId) -> Result<usize> {
        self.with_expectation(id, Expectation::call_count)
    }

    /// Independent copies of the requests `id` answered, oldest first.
    pub fn history(&self, id: ExpectationId) -> Result<Vec<RecordedRequest>> {
        self.with_expectation(id, Expectation::history)
    }

    fn with_expectation<T>(&self, id: ExpectationId, f: impl FnOnce(&Expectation) -> T) -> Result<T> {
        let state = self.state.lock();
        state
            .expectations
            .get(id.0)
            .map(f)
            .ok_or(RegistryError::UnknownExpectation(id))
    }

    /// History of the first expectation whose pattern imposes the same
    /// constraints as `pattern` (and carries the same name, if `pattern` has one).
    pub fn matches_for_request(&self, pattern: &RequestPattern) -> Vec<RecordedRequest> {
        self.first_history(|candidate| {
            candidate.same_constraints(pattern)
                && pattern.name().map_or(true, |name| candidate.name() == Some(name))
        })
    }

    /// History of the first expectation whose URL pattern accepts `url`, whatever the method.
    pub fn matches_for_url(&self, url: &str) -> Vec<RecordedRequest> {
        self.first_history(|candidate| candidate.url_matches(url))
    }

    /// History of the first expectation accepting `url` and requiring exactly `method`.
    pub fn matches_for_url_and_method(&self, url: &str, method: &str) -> Vec<RecordedRequest> {
        self.first_history(|candidate| {
            candidate.url_matches(url) && candidate.method() == Some(method)
        })
    }

    fn first_history(&self, predicate: impl Fn(&RequestPattern) -> bool) -> Vec<RecordedRequest> {
        let state = self.state.lock();
        state
            .expectations
            .iter()
            .find(|e| predicate(e.pattern()))
            .map(Expectation::history)
            .unwrap_or_default()
    }

    /// Misses accumulated by the most recent dispatch.
    pub fn last_misses(&self) -> Vec<Miss> {
        self.state.lock().last_misses.clone()
    }

    /// JSON array explaining why the most recent dispatch missed.
    pub fn why(&self) -> String {
        misses_to_json(&self.state.lock().last_misses)
    }

    /// Answer one inbound request.
    ///
    /// Matching, consumption and history recording happen under the registry
    /// lock; rendering happens after it is released, so a custom response may
    /// call back into the registry.
    pub fn dispatch(&self, request: &RecordedRequest) -> Response<Full<Bytes>> {
        let outcome = {
            let mut guard = self.state.lock();
            let RegistryState {
                expectations,
                last_misses,
                ..
            } = &mut *guard;

            last_misses.clear();
            let mut answer = None;
            for expectation in expectations.iter_mut() {
                match expectation.try_dispatch(request) {
                    Ok(response) => {
                        debug!(
                            "{} {} (received {}) matched {}",
                            request.method,
                            request.url(),
                            request.received_at.to_rfc3339(),
                            expectation.pattern().display_name()
                        );
                        answer = Some(response);
                        break;
                    }
                    Err(misses) => {
                        for miss in &misses {
                            debug!("{}", miss);
                        }
                        last_misses.extend(misses);
                    }
                }
            }

            answer.ok_or_else(|| misses_to_json(last_misses))
        };

        match outcome {
            Ok(response) => response.render(request),
            Err(why) => {
                error!(
                    "No registered request matched {} {}",
                    request.method,
                    request.url()
                );
                self.sink.errorf(format_args!(
                    "no registered request matched {}\n The reasons why this is the case are returned in the body",
                    request.dump()
                ));
                no_match_response(why)
            }
        }
    }

    /// Hand a failure that happened outside dispatch, such as a panicking
    /// custom response, to the report sink.
    pub fn report_failure(&self, args: fmt::Arguments<'_>) {
        self.sink.errorf(args);
    }

    /// Report every expectation that still has a response to give.
    ///
    /// Sequences are inspected without being consumed. Fixed sources always
    /// have one and are therefore always reported; infinite sources are
    /// skipped. Returns the number of reports.
    pub fn check_all_consumed(&self) -> usize {
        let unused: Vec<(String, String)> = {
            let state = self.state.lock();
            state
                .expectations
                .iter()
                .filter(|e| e.source().is_verified())
                .filter_map(|e| {
                    e.pending_response()
                        .map(|r| (e.pattern().display_name(), r.display_name()))
                })
                .collect()
        };

        for (request, response) in &unused {
            self.sink.errorf(format_args!(
                "request {request} has {response} as unused response"
            ));
        }
        unused.len()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("expectations", &self.len())
            .finish_non_exhaustive()
    }
}

fn no_match_response(why: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(why)));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
