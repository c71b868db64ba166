//! Error types and error handling strategy for cojob.
//!
//! A job body reports failure by returning `Err(Error)`. The same type also
//! carries cooperative cancellation, so one `?` at a suspension point is enough
//! to unwind a cancelled body:
//!
//! - **Cancellation**: raised at a suspension point when the ambient job is
//!   finishing. Carries a [`JobCancelled`] naming the cancelled job and the
//!   reason (with the original failure as its cause, if any).
//! - **Failure**: anything else escaping a body. Recorded as the job's cause,
//!   escalated to the parent for `launch` jobs, delivered to awaiters for
//!   `deferred` jobs.
//! - **Runtime**: the driver itself could not make progress (stall, step
//!   limit) or detected an internal bug.
//!
//! `Error` is cheap to clone: job records keep their terminal failure and hand
//! copies to every joiner and awaiter.

use core::fmt;
use std::sync::Arc;

use crate::types::{CancelReason, JobId};

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Cancellation ===
    /// The ambient job was cancelled; raised at a suspension point.
    Cancelled,

    // === Failure ===
    /// User-provided error escaping a job body.
    User,
    /// A job body panicked while being polled.
    Panicked,

    // === Runtime ===
    /// The dispatcher ran dry while the root job was still outstanding.
    Stalled,
    /// The configured step limit was exhausted.
    StepLimitExceeded,
    /// Internal runtime error (bug).
    Internal,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Cancelled => ErrorCategory::Cancellation,
            Self::User | Self::Panicked => ErrorCategory::Failure,
            Self::Stalled | Self::StepLimitExceeded | Self::Internal => ErrorCategory::Runtime,
        }
    }
}

/// High-level error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Cooperative cancellation; never reported as unhandled.
    Cancellation,
    /// A job body failed.
    Failure,
    /// The runtime driver failed.
    Runtime,
}

/// Cancellation observed at a suspension point.
///
/// `job` is the job whose cancellation is being raised: the ambient job of the
/// suspending coroutine, or the awaited deferred when `await` observes a
/// cancelled target.
#[derive(Debug, Clone)]
pub struct JobCancelled {
    /// The cancelled job.
    pub job: JobId,
    /// Why it was cancelled.
    pub reason: CancelReason,
}

impl JobCancelled {
    /// Creates a new cancellation marker.
    #[must_use]
    pub const fn new(job: JobId, reason: CancelReason) -> Self {
        Self { job, reason }
    }

    /// Returns the original failure behind this cancellation, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&Error> {
        self.reason.cause.as_ref()
    }
}

impl fmt::Display for JobCancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {} was cancelled: {}", self.job, self.reason)
    }
}

/// The main error type for cojob operations.
#[derive(Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    cancellation: Option<Arc<JobCancelled>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
            cancellation: None,
        }
    }

    /// Wraps an arbitrary error as a user failure.
    #[must_use]
    pub fn user(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        let message = source.to_string();
        Self::new(ErrorKind::User)
            .with_message(message)
            .with_source(source)
    }

    /// Creates the cancellation error raised for `cancelled.job`.
    #[must_use]
    pub fn job_cancelled(cancelled: JobCancelled) -> Self {
        Self {
            kind: ErrorKind::Cancelled,
            message: Some(cancelled.to_string()),
            source: None,
            cancellation: Some(Arc::new(cancelled)),
        }
    }

    /// Creates a panic failure from a caught panic payload message.
    #[must_use]
    pub fn panicked(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Panicked).with_message(message)
    }

    /// Creates an internal error (runtime bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns true if this error represents cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Returns true if this error is a body failure (not a cancellation).
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self.kind.category(), ErrorCategory::Failure)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the cancellation details for `Cancelled` errors.
    #[must_use]
    pub fn cancellation(&self) -> Option<&JobCancelled> {
        self.cancellation.as_deref()
    }

    /// Returns the job whose cancellation this error reports.
    #[must_use]
    pub fn cancelled_job(&self) -> Option<JobId> {
        self.cancellation.as_ref().map(|c| c.job)
    }

    /// Walks cancellation wrappers down to the failure that started them.
    ///
    /// Returns `self` for failures and for cancellations without a cause.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        let mut current = self;
        while let Some(cause) = current.cancellation.as_ref().and_then(|c| c.cause()) {
            current = cause;
        }
        current
    }

    /// Returns the wrapped source error if it is of type `E`.
    #[must_use]
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        let source: &(dyn std::error::Error + 'static) = self.source.as_deref()?;
        source.downcast_ref::<E>()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Error");
        s.field("kind", &self.kind);
        if let Some(msg) = &self.message {
            s.field("message", msg);
        }
        if let Some(source) = &self.source {
            s.field("source", source);
        }
        if let Some(cancellation) = &self.cancellation {
            s.field("job", &cancellation.job);
            s.field("reason", &cancellation.reason.kind);
        }
        s.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Some(cause) = self.cancellation.as_ref().and_then(|c| c.cause()) {
            return Some(cause);
        }
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<JobCancelled> for Error {
    fn from(c: JobCancelled) -> Self {
        Self::job_cancelled(c)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::user(e)
    }
}

/// A specialized Result type for cojob operations.
#[allow(clippy::result_large_err)]
pub type Result<T> = core::result::Result<T, Error>;
