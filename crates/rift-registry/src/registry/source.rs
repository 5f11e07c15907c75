//! Response supply strategies.

use crate::response::MockResponse;
use std::collections::VecDeque;

/// How many times, and with what, an expectation can answer.
///
/// Any variant may hold a [`MockResponse::Custom`], in which case the response
/// is computed from the request when it is rendered.
#[derive(Debug, Clone)]
pub enum ResponseSource {
    /// The same response every time. Never exhausted, and always reported by
    /// the end-of-run unused response check.
    Fixed(MockResponse),
    /// Responses handed out head first, each exactly once.
    Sequence(VecDeque<MockResponse>),
    /// The same response every time. Never exhausted, and skipped by the
    /// end-of-run unused response check.
    Infinite(MockResponse),
}

impl ResponseSource {
    pub fn fixed(response: impl Into<MockResponse>) -> Self {
        ResponseSource::Fixed(response.into())
    }

    pub fn sequence<I, R>(responses: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<MockResponse>,
    {
        ResponseSource::Sequence(responses.into_iter().map(Into::into).collect())
    }

    pub fn infinite(response: impl Into<MockResponse>) -> Self {
        ResponseSource::Infinite(response.into())
    }

    /// Draw the next response, consuming it for sequences.
    pub fn next_response(&mut self) -> Option<MockResponse> {
        match self {
            ResponseSource::Fixed(response) | ResponseSource::Infinite(response) => {
                Some(response.clone())
            }
            ResponseSource::Sequence(queue) => queue.pop_front(),
        }
    }

    /// The response the next draw would return, without consuming it.
    pub fn peek(&self) -> Option<&MockResponse> {
        match self {
            ResponseSource::Fixed(response) | ResponseSource::Infinite(response) => Some(response),
            ResponseSource::Sequence(queue) => queue.front(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.peek().is_none()
    }

    /// Responses left to hand out; `None` when unbounded.
    pub fn remaining(&self) -> Option<usize> {
        match self {
            ResponseSource::Sequence(queue) => Some(queue.len()),
            ResponseSource::Fixed(_) | ResponseSource::Infinite(_) => None,
        }
    }

    /// Whether leftover responses count as a failure at the end of a run.
    pub fn is_verified(&self) -> bool {
        !matches!(self, ResponseSource::Infinite(_))
    }

    pub(crate) fn responses_mut(&mut self) -> Vec<&mut MockResponse> {
        match self {
            ResponseSource::Fixed(response) | ResponseSource::Infinite(response) => {
                vec![response]
            }
            ResponseSource::Sequence(queue) => queue.iter_mut().collect(),
        }
    }
}
