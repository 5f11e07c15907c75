//! Expectation registry and request dispatch.
//!
//! ## Module Structure
//!
//! - `core`: the `Registry` handle, registration helpers and dispatch
//! - `expectation`: a pattern bound to a response source plus its history
//! - `source`: response supply strategies (fixed, sequence, infinite)
//! - `miss`: diagnostics for requests an expectation declined
//! - `names`: default display names

mod core;
mod expectation;
mod miss;
mod names;
mod source;


pub use self::core::{ExpectationId, Registry};
pub use expectation::Expectation;
pub use miss::{misses_to_json, Miss, MissReason};
pub use names::NameGenerator;
pub use source::ResponseSource;
