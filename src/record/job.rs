//! Job record for the runtime.
//!
//! A job is the lifecycle node of one coroutine (or of a body-less standalone
//! handle). This module holds the per-job state machine; the cascades that
//! span several records (cancel propagation, escalation, completion) live in
//! [`RuntimeState`](crate::runtime::state::RuntimeState).

use core::fmt;
use core::panic::Location;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{Error, JobCancelled};
use crate::runtime::continuation::Continuation;
use crate::tracing_compat::trace;
use crate::types::{CancelReason, JobId, StartMode};

/// The lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// Body is running or suspended and nothing has asked the job to stop.
    Active,
    /// Body returned, or a reason was recorded; waiting for the body to
    /// unwind and for every child to complete.
    Finishing,
    /// Terminal.
    Completed,
}

/// Why a job left `Active` abnormally. Set once; only a body failure may
/// replace an earlier cancellation.
#[derive(Debug, Clone)]
pub enum FinishReason {
    /// Cooperative cancellation.
    Cancelled(CancelReason),
    /// The body failed with an error that is not a cancellation.
    Failed(Error),
}

impl FinishReason {
    /// Returns true for a body failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The innermost failure behind this reason, if any.
    #[must_use]
    pub fn root_cause(&self) -> Option<&Error> {
        match self {
            Self::Cancelled(reason) => reason.root_cause(),
            Self::Failed(e) => Some(e.root_cause()),
        }
    }

    /// Expresses this reason as the cancellation raised for `job`.
    #[must_use]
    pub fn as_cancel_reason(&self, job: JobId) -> CancelReason {
        match self {
            Self::Cancelled(reason) => reason.clone(),
            Self::Failed(e) => CancelReason::failed(job, e.clone()),
        }
    }
}

/// Which operation created the job; decides how failures surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// The coroutine driven by `Runtime::block_on`; its outcome goes to the caller.
    Root,
    /// Fire-and-forget coroutine; failures escalate to the parent.
    Launch,
    /// Result-bearing coroutine; failures go to awaiters.
    Deferred,
    /// Body-less cancellable handle.
    Standalone,
}

/// Where a suspended coroutine is waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SuspendPoint {
    /// `yield_now`.
    Yield,
    /// `join` on another job.
    Join,
    /// `await` on a deferred.
    Await,
    /// Some other future returned `Pending`.
    Foreign,
}

impl fmt::Display for SuspendPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yield => write!(f, "yield"),
            Self::Join => write!(f, "join"),
            Self::Await => write!(f, "await"),
            Self::Foreign => write!(f, "foreign"),
        }
    }
}

/// A suspension marker: what the coroutine waits on and the source location
/// of the suspending call.
#[derive(Debug, Clone, Copy)]
pub struct SuspendSite {
    /// The suspending operation.
    pub point: SuspendPoint,
    /// The caller of the suspending operation.
    pub location: &'static Location<'static>,
}

/// Run state of a live coroutine, as reported to introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum RunState {
    /// Created but never resumed.
    Created,
    /// Currently being polled.
    Running,
    /// Parked or queued at a suspension point.
    Suspended {
        /// The suspending operation.
        point: SuspendPoint,
        /// `file:line:column` of the suspending call.
        location: String,
    },
}

/// What the executor should do with a continuation it is about to resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollAction {
    /// Poll the body.
    Poll,
    /// Drop the body without running it (cancelled before first resumption).
    Skip,
    /// Nothing to run: the body already finished.
    Done,
}

/// Formats a source location the way snapshots report it.
#[must_use]
pub fn format_location(location: &Location<'_>) -> String {
    format!(
        "{}:{}:{}",
        location.file(),
        location.line(),
        location.column()
    )
}

/// Internal record for a job.
#[derive(Debug)]
pub struct JobRecord {
    /// Unique identifier for this job.
    pub id: JobId,
    /// How the job was created.
    pub kind: JobKind,
    /// How the body begins executing.
    pub start: StartMode,
    /// Debug name (`coroutine#3`).
    pub name: String,
    /// Creation order within the runtime.
    pub seq: u64,
    /// Where the job was created.
    pub created_at: &'static Location<'static>,
    /// Parent job, used for propagation only.
    pub parent: Option<JobId>,
    /// Still listed in the parent's children.
    pub attached: bool,
    /// Children in creation order.
    pub children: SmallVec<[JobId; 4]>,
    /// Jobs suspended in `join`/`await` on this job.
    pub waiters: SmallVec<[JobId; 4]>,
    state: JobState,
    reason: Option<FinishReason>,
    body_done: bool,
    started: bool,
    polling: bool,
    notified: bool,
    suspended_at: Option<SuspendSite>,
    pending_site: Option<SuspendSite>,
    parked: Option<Continuation>,
    handles: usize,
    pending_escalation: Option<Error>,
}

impl JobRecord {
    /// Creates a new job record in the `Active` state.
    #[must_use]
    pub fn new(
        id: JobId,
        kind: JobKind,
        start: StartMode,
        name: String,
        seq: u64,
        parent: Option<JobId>,
        created_at: &'static Location<'static>,
    ) -> Self {
        let has_body = kind != JobKind::Standalone;
        Self {
            id,
            kind,
            start,
            name,
            seq,
            created_at,
            parent,
            attached: parent.is_some(),
            children: SmallVec::new(),
            waiters: SmallVec::new(),
            state: JobState::Active,
            reason: None,
            body_done: !has_body,
            started: !has_body,
            polling: false,
            notified: false,
            suspended_at: None,
            pending_site: None,
            parked: None,
            handles: 0,
            pending_escalation: None,
        }
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> JobState {
        self.state
    }

    /// Returns the finish reason, if one was recorded.
    #[must_use]
    pub const fn reason(&self) -> Option<&FinishReason> {
        self.reason.as_ref()
    }

    /// `state == Active`.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == JobState::Active
    }

    /// `state == Completed`.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == JobState::Completed
    }

    /// A reason is recorded. Never reverts once true.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.reason.is_some()
    }

    /// Returns true once the body has returned (always true for standalone jobs).
    #[must_use]
    pub const fn body_done(&self) -> bool {
        self.body_done
    }

    /// Requests cancellation.
    ///
    /// Returns false if a reason is already recorded or the job is completed;
    /// the existing reason is left untouched.
    pub fn request_cancel(&mut self, reason: CancelReason) -> bool {
        if self.state == JobState::Completed || self.reason.is_some() {
            return false;
        }
        if self.kind == JobKind::Launch && reason.kind.escalates() {
            self.pending_escalation = reason.cause.clone();
        }
        self.reason = Some(FinishReason::Cancelled(reason));
        self.state = JobState::Finishing;
        true
    }

    /// Finishes a standalone job normally. Returns false for jobs with a body
    /// or jobs that already left `Active`.
    pub fn complete_standalone(&mut self) -> bool {
        if self.kind != JobKind::Standalone || self.state != JobState::Active {
            return false;
        }
        self.state = JobState::Finishing;
        true
    }

    /// Records the body's exit.
    ///
    /// Returns true if this exit newly recorded a reason, in which case the
    /// caller must cascade the cancellation to the children.
    pub fn finish_body(&mut self, result: Result<(), Error>) -> bool {
        self.body_done = true;
        self.polling = false;
        self.notified = false;
        match (self.state, result) {
            (JobState::Active, Ok(())) => {
                self.state = JobState::Finishing;
                false
            }
            (JobState::Active, Err(e)) if e.is_cancelled() => {
                let reason = e
                    .cancellation()
                    .map(|c| c.reason.clone())
                    .unwrap_or_default();
                self.reason = Some(FinishReason::Cancelled(reason));
                self.state = JobState::Finishing;
                true
            }
            (JobState::Active, Err(e)) => {
                if self.kind == JobKind::Launch {
                    self.pending_escalation = Some(e.clone());
                }
                self.reason = Some(FinishReason::Failed(e));
                self.state = JobState::Finishing;
                true
            }
            (JobState::Finishing, Err(e)) if !e.is_cancelled() => {
                if matches!(self.reason, Some(FinishReason::Cancelled(_))) {
                    trace!(job = %self.id, error = %e, "failure during cancellation subsumes reason");
                    self.reason = Some(FinishReason::Failed(e));
                }
                false
            }
            _ => false,
        }
    }

    /// Takes the failure this job must escalate, once its body has exited.
    pub fn take_escalation(&mut self) -> Option<Error> {
        if self.body_done {
            self.pending_escalation.take()
        } else {
            None
        }
    }

    /// Moves `Finishing` to `Completed` when the body is done and no child is
    /// outstanding. Returns true on the transition.
    pub fn try_complete(&mut self) -> bool {
        if self.state != JobState::Finishing || !self.body_done || !self.children.is_empty() {
            return false;
        }
        self.state = JobState::Completed;
        self.suspended_at = None;
        true
    }

    /// Prepares the first or next resumption of the body.
    pub fn begin_poll(&mut self) -> PollAction {
        if self.body_done {
            return PollAction::Done;
        }
        if !self.started {
            self.started = true;
            if self.reason.is_some() && self.start.cancellable_before_start() {
                return PollAction::Skip;
            }
        }
        self.polling = true;
        self.notified = false;
        PollAction::Poll
    }

    /// Records the suspension marker of the operation about to return `Pending`.
    pub fn mark_suspending(&mut self, site: SuspendSite) {
        self.pending_site = Some(site);
    }

    /// Ends a poll that returned `Pending`.
    ///
    /// Returns true if the job was woken during the poll and must be
    /// dispatched again right away instead of parking.
    pub fn end_poll_pending(&mut self) -> bool {
        self.polling = false;
        self.suspended_at = Some(self.pending_site.take().unwrap_or(SuspendSite {
            point: SuspendPoint::Foreign,
            location: self.created_at,
        }));
        core::mem::take(&mut self.notified)
    }

    /// Parks the suspended continuation until the next wake.
    pub fn park(&mut self, continuation: Continuation) {
        debug_assert!(self.parked.is_none(), "job parked twice");
        self.parked = Some(continuation);
    }

    /// Handles a wake: returns the parked continuation to dispatch, or
    /// remembers the wake if the body is being polled right now.
    pub fn wake(&mut self) -> Option<Continuation> {
        if let Some(continuation) = self.parked.take() {
            return Some(continuation);
        }
        if self.polling {
            self.notified = true;
        }
        None
    }

    /// Removes the parked continuation (runtime teardown).
    pub fn take_parked(&mut self) -> Option<Continuation> {
        self.parked.take()
    }

    /// Adds a job waiting for this one to complete.
    pub fn add_waiter(&mut self, waiter: JobId) {
        if !self.waiters.contains(&waiter) {
            self.waiters.push(waiter);
        }
    }

    /// Removes a waiter registration.
    pub fn remove_waiter(&mut self, waiter: JobId) {
        self.waiters.retain(|w| *w != waiter);
    }

    /// Removes a child from this job's children.
    pub fn remove_child(&mut self, child: JobId) {
        self.children.retain(|c| *c != child);
    }

    /// Registers one more external handle.
    pub fn retain(&mut self) {
        self.handles += 1;
    }

    /// Drops one external handle.
    pub fn release(&mut self) {
        self.handles = self.handles.saturating_sub(1);
    }

    /// Completed, detached from its parent, and unreferenced.
    #[must_use]
    pub fn is_releasable(&self) -> bool {
        self.state == JobState::Completed && !self.attached && self.handles == 0
    }

    /// The error a suspension point of this job raises, if the job is
    /// finishing with a reason.
    #[must_use]
    pub fn cancellation_error(&self) -> Option<Error> {
        let reason = self.reason.as_ref()?;
        Some(Error::job_cancelled(JobCancelled::new(
            self.id,
            reason.as_cancel_reason(self.id),
        )))
    }

    /// The outcome `await` delivers once the job is completed: `Ok` for
    /// normal completion, the raw failure, or a cancellation naming this job.
    pub fn outcome(&self) -> Result<(), Error> {
        match &self.reason {
            None => Ok(()),
            Some(FinishReason::Failed(e)) => Err(e.clone()),
            Some(FinishReason::Cancelled(reason)) => Err(Error::job_cancelled(
                JobCancelled::new(self.id, reason.clone()),
            )),
        }
    }

    /// Run state for introspection; `None` when this is not a live coroutine.
    #[must_use]
    pub fn run_state(&self) -> Option<RunState> {
        if self.kind == JobKind::Standalone || self.body_done {
            return None;
        }
        if !self.started {
            return Some(RunState::Created);
        }
        if self.polling {
            return Some(RunState::Running);
        }
        let site = self.suspended_at.unwrap_or(SuspendSite {
            point: SuspendPoint::Foreign,
            location: self.created_at,
        });
        Some(RunState::Suspended {
            point: site.point,
            location: format_location(site.location),
        })
    }
}
