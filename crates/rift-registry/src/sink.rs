//! Failure reporting boundary between the registry and the host test framework.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::error;

/// Where the registry reports requests nothing matched and responses nothing used.
pub trait ReportSink: Send + Sync {
    /// Mark the run as failed without a message.
    fn fail(&self);

    /// Record a formatted message and mark the run as failed.
    fn errorf(&self, args: fmt::Arguments<'_>);
}

/// Collects every message in memory so tests can assert on what was reported.
#[derive(Debug, Default)]
pub struct RecordingSink {
    failed: AtomicBool,
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl ReportSink for RecordingSink {
    fn fail(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }

    fn errorf(&self, args: fmt::Arguments<'_>) {
        self.messages.lock().push(args.to_string());
        self.fail();
    }
}

/// Logs every message at error level and latches a failed flag.
#[derive(Debug, Default)]
pub struct TracingSink {
    failed: AtomicBool,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

impl ReportSink for TracingSink {
    fn fail(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }

    fn errorf(&self, args: fmt::Arguments<'_>) {
        error!("{}", args);
        self.fail();
    }
}
