//! Handles to jobs and deferred results.
//!
//! [`JobHandle`] is returned by every job-creating operation and allows the
//! holder to inspect, cancel, and join the job. [`Deferred<T>`] adds the
//! result slot of an `async`-style job.
//!
//! # Ownership
//!
//! A handle does not own the job's execution: the job is owned by the tree.
//! Dropping every handle lets the runtime release the record once the job
//! completes; the job itself keeps running either way.
//!
//! # Example
//!
//! ```ignore
//! let job = cx.launch(|cx| async move {
//!     cx.yield_now().await?;
//!     Ok(())
//! });
//! assert!(job.is_active());
//! job.cancel();
//! assert!(job.is_cancelled() && !job.is_completed());
//! job.join(&cx).await?;
//! assert!(job.is_completed());
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::cx::suspend::{Await, Join};
use crate::cx::Cx;
use crate::error::Error;
use crate::record::JobState;
use crate::runtime::shared::Shared;
use crate::runtime::snapshot::TreeSnapshot;
use crate::types::{CancelReason, JobId};

/// A counted reference to a job.
pub struct JobHandle {
    id: JobId,
    shared: Arc<Shared>,
}

impl JobHandle {
    /// Wraps an id whose reference count was already incremented.
    pub(crate) fn adopt(id: JobId, shared: Arc<Shared>) -> Self {
        Self { id, shared }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Returns the job id.
    #[must_use]
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Returns the job's debug name.
    #[must_use]
    pub fn name(&self) -> String {
        self.shared
            .state
            .lock()
            .job(self.id)
            .map(|r| r.name.clone())
            .unwrap_or_default()
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.shared
            .state
            .lock()
            .job(self.id)
            .map_or(JobState::Completed, |r| r.state())
    }

    /// True while nothing has asked the job to stop and its body is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == JobState::Active
    }

    /// True once the body has unwound and every child has completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state() == JobState::Completed
    }

    /// True once a cancellation or failure reason was recorded.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared
            .state
            .lock()
            .job(self.id)
            .is_some_and(|r| r.is_cancelled())
    }

    /// Returns the parent job, while attached.
    #[must_use]
    pub fn parent(&self) -> Option<JobId> {
        self.shared
            .state
            .lock()
            .job(self.id)
            .and_then(|r| r.parent.filter(|_| r.attached))
    }

    /// Returns the outstanding children in creation order.
    #[must_use]
    pub fn children(&self) -> Vec<JobId> {
        self.shared
            .state
            .lock()
            .job(self.id)
            .map(|r| r.children.to_vec())
            .unwrap_or_default()
    }

    /// Requests cancellation without a cause.
    ///
    /// The state flips synchronously: right after this returns `true`,
    /// `is_active()` is false and `is_cancelled()` is true. Returns false if
    /// the job already had a reason or was completed.
    pub fn cancel(&self) -> bool {
        self.cancel_with_reason(CancelReason::user())
    }

    /// Requests cancellation with an explicit cause.
    pub fn cancel_with(&self, cause: Error) -> bool {
        self.cancel_with_reason(CancelReason::user_with(cause))
    }

    fn cancel_with_reason(&self, reason: CancelReason) -> bool {
        self.shared
            .with_state(|state, fx| state.cancel(self.id, reason, fx))
    }

    /// Completes a standalone job normally; it reaches `Completed` once its
    /// children have. Returns false for jobs with a body.
    pub fn complete(&self) -> bool {
        self.shared
            .with_state(|state, fx| state.complete_standalone(self.id, fx))
    }

    /// Suspends `cx`'s coroutine until this job completes.
    #[track_caller]
    pub fn join<'a>(&'a self, cx: &'a Cx) -> Join<'a> {
        cx.join(self)
    }

    /// Snapshot of the live coroutines in this job's subtree.
    #[must_use]
    pub fn snapshot(&self) -> TreeSnapshot {
        let state = self.shared.state.lock();
        TreeSnapshot::collect(&state, [self.id])
    }
}

impl Clone for JobHandle {
    fn clone(&self) -> Self {
        self.shared.state.lock().retain(self.id);
        Self::adopt(self.id, Arc::clone(&self.shared))
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        self.shared.with_state(|state, fx| state.release(self.id, fx));
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle").field("id", &self.id).finish()
    }
}

impl PartialEq for JobHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for JobHandle {}

/// A result-bearing job.
///
/// The value slot is written at most once, when the body returns `Ok`, and
/// read by any number of awaiters.
pub struct Deferred<T> {
    handle: JobHandle,
    slot: Arc<OnceLock<T>>,
}

impl<T> Deferred<T> {
    pub(crate) fn new(handle: JobHandle, slot: Arc<OnceLock<T>>) -> Self {
        Self { handle, slot }
    }

    /// The underlying job.
    #[must_use]
    pub fn job(&self) -> &JobHandle {
        &self.handle
    }

    /// Returns the value if the body already returned it.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.slot.get()
    }

    pub(crate) fn slot(&self) -> &OnceLock<T> {
        &self.slot
    }
}

impl<T: Clone + Send + Sync + 'static> Deferred<T> {
    /// Suspends `cx`'s coroutine until the deferred completes, then returns
    /// its value or re-raises its failure.
    #[track_caller]
    pub fn await_result<'a>(&'a self, cx: &'a Cx) -> Await<'a, T> {
        cx.await_deferred(self)
    }
}

impl<T> std::ops::Deref for Deferred<T> {
    type Target = JobHandle;

    fn deref(&self) -> &JobHandle {
        &self.handle
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("id", &self.handle.id)
            .field("ready", &self.slot.get().is_some())
            .finish()
    }
}
