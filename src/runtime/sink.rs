//! Unhandled-failure sink.
//!
//! A failed `launch` job has no awaiter to receive its error, so the runtime
//! reports it here, once per ancestor level whose cancellation it newly
//! triggers. The sink is injected at construction; nothing is process-global.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Error;
use crate::tracing_compat::error;
use crate::types::JobId;

/// One unhandled failure.
#[derive(Debug, Clone)]
pub struct UnhandledReport {
    /// The job that surfaced the failure.
    pub job: JobId,
    /// Its debug name.
    pub name: String,
    /// The failure.
    pub error: Error,
}

/// Receives unhandled failures.
pub trait UnhandledSink: Send + Sync {
    /// Called after the state lock is released, in escalation order.
    fn report(&self, report: &UnhandledReport);
}

impl<F> UnhandledSink for F
where
    F: Fn(&UnhandledReport) + Send + Sync,
{
    fn report(&self, report: &UnhandledReport) {
        self(report);
    }
}

/// Default sink: logs every report at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl UnhandledSink for LogSink {
    fn report(&self, report: &UnhandledReport) {
        error!(
            job = %report.job,
            name = %report.name,
            error = %report.error,
            "unhandled failure in coroutine"
        );
        let _ = report;
    }
}

/// Sink that keeps every report, for tests and tooling.
#[derive(Debug, Default, Clone)]
pub struct CapturingSink {
    reports: Arc<Mutex<Vec<UnhandledReport>>>,
}

impl CapturingSink {
    /// Creates an empty capturing sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the reports received so far.
    #[must_use]
    pub fn reports(&self) -> Vec<UnhandledReport> {
        self.reports.lock().clone()
    }

    /// Removes and returns the reports received so far.
    pub fn take(&self) -> Vec<UnhandledReport> {
        std::mem::take(&mut *self.reports.lock())
    }

    /// Number of reports received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    /// Returns true if nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl UnhandledSink for CapturingSink {
    fn report(&self, report: &UnhandledReport) {
        self.reports.lock().push(report.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn report() -> UnhandledReport {
        UnhandledReport {
            job: JobId::new_for_test(2, 0),
            name: "coroutine#2".into(),
            error: Error::new(ErrorKind::User),
        }
    }

    #[test]
    fn capturing_sink_collects_and_takes() {
        let sink = CapturingSink::new();
        let shared = sink.clone();
        shared.report(&report());
        shared.report(&report());
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.is_empty());
    }

    #[test]
    fn closures_are_sinks() {
        let count = AtomicUsize::new(0);
        let sink = |_: &UnhandledReport| {
            count.fetch_add(1, Ordering::SeqCst);
        };
        sink.report(&report());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
