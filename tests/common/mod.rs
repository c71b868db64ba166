#![allow(dead_code)]
#![allow(unused_imports)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

use std::io;
use std::sync::{Arc, Once};

use cojob::{CapturingSink, Error, Runtime, UnhandledReport};
use parking_lot::Mutex;
use proptest::prelude::ProptestConfig;
use proptest::test_runner::RngSeed;
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();

/// Default seed for property tests when running under CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x5EED_5EED;

const PROPTEST_SEED_ENV: &str = "COJOB_PROPTEST_SEED";

/// Build a ProptestConfig with deterministic seed support for CI.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    let mut config = ProptestConfig::with_cases(cases);
    if matches!(config.rng_seed, RngSeed::Random) {
        if let Some(seed) = read_proptest_seed() {
            config.rng_seed = RngSeed::Fixed(seed);
        }
    }
    config
}

fn read_proptest_seed() -> Option<u64> {
    if let Ok(value) = std::env::var(PROPTEST_SEED_ENV) {
        return value.parse::<u64>().ok();
    }
    // If CI is set and no explicit seed is provided, use a fixed seed.
    if std::env::var("CI").is_ok() {
        return Some(DEFAULT_PROPTEST_SEED);
    }
    None
}

/// Initialize test logging with trace-level output.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Runtime whose unhandled failures are captured instead of logged.
#[must_use]
pub fn capturing_runtime() -> (Runtime, CapturingSink) {
    init_test_logging();
    let sink = CapturingSink::new();
    let rt = Runtime::builder()
        .sink(sink.clone())
        .build()
        .expect("failed to build test runtime");
    (rt, sink)
}

/// A fresh `io::Error` wrapped as a user failure.
#[must_use]
pub fn io_failure() -> Error {
    Error::user(io::Error::new(io::ErrorKind::Other, "io failure"))
}

/// An `InvalidInput` error standing in for a caller-supplied cancel cause.
#[must_use]
pub fn invalid_argument() -> Error {
    Error::user(io::Error::new(io::ErrorKind::InvalidInput, "invalid argument"))
}

/// True if the error, or the failure behind its cancellation, is `io_failure()`.
#[must_use]
pub fn is_io_failure(error: &Error) -> bool {
    error
        .root_cause()
        .downcast_ref::<io::Error>()
        .is_some_and(|e| e.kind() == io::ErrorKind::Other)
}

/// Asserts that every captured report matches `predicate`, and how many there were.
pub fn assert_reports(sink: &CapturingSink, count: usize, predicate: impl Fn(&UnhandledReport) -> bool) {
    let reports = sink.take();
    tracing::debug!(reports = reports.len(), expected = count, "checking unhandled reports");
    assert_eq!(reports.len(), count, "unhandled reports: {reports:?}");
    for report in &reports {
        assert!(predicate(report), "unexpected unhandled report: {report:?}");
    }
}

#[derive(Debug, Default)]
struct SequencerInner {
    counter: u32,
    finished: bool,
    violations: Vec<String>,
}

/// Ordering checker for coroutine scenarios.
///
/// Steps are numbered from 1. A mismatch is recorded rather than panicking,
/// since a panic inside a job body would be turned into a job failure;
/// [`assert_finished`](Self::assert_finished) surfaces it at the end.
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    inner: Arc<Mutex<SequencerInner>>,
}

impl Sequencer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records step `n`, which must directly follow the previous step.
    pub fn expect(&self, n: u32) {
        let mut inner = self.inner.lock();
        let wanted = inner.counter + 1;
        tracing::debug!(step = n, "sequencer step");
        if n != wanted {
            inner
                .violations
                .push(format!("expected step {n}, but step {wanted} was next"));
        }
        inner.counter = n;
    }

    /// Records the last step.
    pub fn finish(&self, n: u32) {
        self.expect(n);
        let mut inner = self.inner.lock();
        if inner.finished {
            inner.violations.push(format!("finished twice (at step {n})"));
        }
        inner.finished = true;
    }

    /// Marks a point that must never execute.
    pub fn unreached(&self) {
        let step = self.inner.lock().counter;
        self.inner
            .lock()
            .violations
            .push(format!("reached unreachable code after step {step}"));
    }

    /// Last recorded step.
    #[must_use]
    pub fn step(&self) -> u32 {
        self.inner.lock().counter
    }

    /// Asserts that no ordering violation happened and `finish(last)` ran.
    pub fn assert_finished(&self, last: u32) {
        let inner = self.inner.lock();
        assert!(inner.violations.is_empty(), "ordering violations: {:?}", inner.violations);
        assert!(inner.finished, "finish() was never called (last step {})", inner.counter);
        assert_eq!(inner.counter, last, "last step");
    }
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}
