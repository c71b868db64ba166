//! Cancellation reason and kind types.
//!
//! Cancellation is a protocol, not a silent drop: every job that leaves the
//! `Active` state through cancellation records why, who started it, and the
//! failure (if any) it derives from.

use crate::error::Error;
use crate::types::JobId;
use core::fmt;

/// The kind of cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CancelKind {
    /// Explicit `cancel()` from user code, with or without a cause.
    User,
    /// The parent job was cancelled or failed and cascaded down.
    ParentCancelled,
    /// A child `launch` job failed and escalated to this job.
    ChildFailed,
    /// The job's own body failed; only seen when a failed job is observed
    /// through a cancellation wrapper.
    Failed,
}

impl CancelKind {
    /// Returns true if this kind carries a failure that escalates further up
    /// the tree when the receiving job is itself a `launch` job.
    #[must_use]
    pub const fn escalates(self) -> bool {
        matches!(self, Self::ChildFailed)
    }
}

impl fmt::Display for CancelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::ParentCancelled => write!(f, "parent cancelled"),
            Self::ChildFailed => write!(f, "child failed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The reason for a cancellation.
#[derive(Debug, Clone)]
pub struct CancelReason {
    /// The kind of cancellation.
    pub kind: CancelKind,
    /// The job that initiated this cancellation, if known.
    pub origin: Option<JobId>,
    /// The failure this cancellation derives from.
    pub cause: Option<Error>,
}

impl CancelReason {
    /// Creates a reason with the given kind and no origin or cause.
    #[must_use]
    pub const fn new(kind: CancelKind) -> Self {
        Self {
            kind,
            origin: None,
            cause: None,
        }
    }

    /// Plain user cancellation (`cancel()` without a cause).
    #[must_use]
    pub const fn user() -> Self {
        Self::new(CancelKind::User)
    }

    /// User cancellation with an explicit cause (`cancel(cause)`).
    #[must_use]
    pub fn user_with(cause: Error) -> Self {
        Self {
            kind: CancelKind::User,
            origin: None,
            cause: Some(cause),
        }
    }

    /// Cascade from a parent, carrying the parent's root cause.
    #[must_use]
    pub fn parent_cancelled(parent: JobId, cause: Option<Error>) -> Self {
        Self {
            kind: CancelKind::ParentCancelled,
            origin: Some(parent),
            cause,
        }
    }

    /// Escalation from a failed child.
    #[must_use]
    pub fn child_failed(child: JobId, failure: Error) -> Self {
        Self {
            kind: CancelKind::ChildFailed,
            origin: Some(child),
            cause: Some(failure),
        }
    }

    /// A job's own failure viewed as a cancellation.
    #[must_use]
    pub fn failed(job: JobId, failure: Error) -> Self {
        Self {
            kind: CancelKind::Failed,
            origin: Some(job),
            cause: Some(failure),
        }
    }

    /// Records the initiating job.
    #[must_use]
    pub const fn with_origin(mut self, origin: JobId) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Returns the kind of this cancellation reason.
    #[must_use]
    pub const fn kind(&self) -> CancelKind {
        self.kind
    }

    /// Returns the innermost failure this cancellation derives from, looking
    /// through nested cancellation wrappers.
    #[must_use]
    pub fn root_cause(&self) -> Option<&Error> {
        self.cause.as_ref().map(Error::root_cause)
    }
}

impl Default for CancelReason {
    fn default() -> Self {
        Self::user()
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(origin) = self.origin {
            write!(f, " ({origin})")?;
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}
