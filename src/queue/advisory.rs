//! Structured advisory events for backends unsuitable for production.
//!
//! An advisory is a WARN-level `tracing` event on a dedicated target, so
//! tooling can filter or capture it without treating it as an error.

use crate::metrics::QUEUE_ADVISORIES_TOTAL;

/// `tracing` target carrying every advisory event.
pub const ADVISORY_TARGET: &str = "inproc_queue::advisory";

/// A non-fatal notice about the limits of a backend.
#[derive(Debug, Clone, Copy)]
pub struct BackendAdvisory {
    pub backend: &'static str,
    pub reasons: &'static [&'static str],
}

impl BackendAdvisory {
    /// Emit the advisory once.
    pub fn emit(&self) {
        QUEUE_ADVISORIES_TOTAL.inc();
        tracing::warn!(
            target: ADVISORY_TARGET,
            backend = self.backend,
            reasons = ?self.reasons,
            "Queue backend is for development/testing only"
        );
    }
}
