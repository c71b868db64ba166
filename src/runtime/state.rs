//! Global runtime state.
//!
//! The runtime state holds the job tree: an arena of [`JobRecord`]s linked by
//! id. Parents list their children; children name their parent by plain id,
//! so no record keeps another alive.
//!
//! Every cross-record rule lives here:
//! - cancellation cascades from a job to all its descendants
//! - a failed `launch` job escalates its failure to its parent and reports it
//! - a job completes once its body is done and its last child completed,
//!   which in turn may complete its parent

use std::mem;

use crate::error::Error;
use crate::record::{
    FinishReason, JobKind, JobRecord, JobState, PollAction, SuspendSite,
};
use crate::runtime::continuation::Continuation;
use crate::runtime::shared::{Effects, NewJob};
use crate::runtime::sink::UnhandledReport;
use crate::tracing_compat::{debug, trace, warn};
use crate::types::{CancelReason, JobId};
use crate::util::Arena;

/// One unit of pending propagation work.
#[derive(Debug)]
enum Step {
    /// Request cancellation and queue the subtree.
    Cancel(JobId, CancelReason),
    /// Report a pending escalation, then complete.
    Settle(JobId),
    Complete(JobId),
}

/// The job table and naming counters of one runtime.
#[derive(Debug)]
pub struct RuntimeState {
    jobs: Arena<JobRecord>,
    next_seq: u64,
    next_coroutine: u64,
    name_prefix: String,
}

impl RuntimeState {
    /// Creates an empty state naming coroutines `<name_prefix>#<n>`.
    #[must_use]
    pub fn new(name_prefix: String) -> Self {
        Self {
            jobs: Arena::new(),
            next_seq: 0,
            next_coroutine: 0,
            name_prefix,
        }
    }

    /// Returns a job record by id.
    #[must_use]
    pub fn job(&self, id: JobId) -> Option<&JobRecord> {
        self.jobs.get(id.arena_index())
    }

    fn job_mut(&mut self, id: JobId) -> Option<&mut JobRecord> {
        self.jobs.get_mut(id.arena_index())
    }

    /// Iterates over all live records.
    pub fn jobs_iter(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs.iter().map(|(_, record)| record)
    }

    /// Number of live job records.
    #[must_use]
    pub fn live_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Creates a job record, attaches it to its parent, and registers
    /// `handles` external references.
    ///
    /// A job created under a parent that is already finishing with a reason
    /// is cancelled immediately; under a completed parent it is left detached
    /// and cancelled.
    pub(crate) fn create_job(&mut self, new_job: NewJob, handles: usize, fx: &mut Effects) -> JobId {
        self.next_seq += 1;
        let seq = self.next_seq;
        let name = if new_job.kind == JobKind::Standalone {
            format!("{}#{}", new_job.name.as_deref().unwrap_or("job"), seq)
        } else {
            self.next_coroutine += 1;
            let prefix = new_job.name.as_deref().unwrap_or(&self.name_prefix);
            format!("{prefix}#{}", self.next_coroutine)
        };

        let parent = new_job.parent.filter(|p| self.job(*p).is_some());
        let index = self.jobs.insert_with(|index| {
            JobRecord::new(
                JobId::from_arena(index),
                new_job.kind,
                new_job.start,
                name,
                seq,
                parent,
                new_job.location,
            )
        });
        let id = JobId::from_arena(index);
        if let Some(record) = self.job_mut(id) {
            for _ in 0..handles {
                record.retain();
            }
        }

        trace!(
            job = %id,
            kind = ?new_job.kind,
            start = %new_job.start,
            parent = ?parent,
            "job created"
        );

        let Some(parent) = parent else {
            return id;
        };
        let inherited = self.job(parent).map(|p| (p.state(), p.reason().cloned()));
        match inherited {
            Some((JobState::Completed, reason)) => {
                if let Some(record) = self.job_mut(id) {
                    record.attached = false;
                }
                let cause = reason.as_ref().and_then(FinishReason::root_cause).cloned();
                self.cancel(id, CancelReason::parent_cancelled(parent, cause), fx);
            }
            Some((_, reason)) => {
                if let Some(p) = self.job_mut(parent) {
                    p.children.push(id);
                }
                if let Some(reason) = reason {
                    let cause = reason.root_cause().cloned();
                    self.cancel(id, CancelReason::parent_cancelled(parent, cause), fx);
                }
            }
            None => {}
        }
        id
    }

    /// Requests cancellation of `job` and cascades it to every descendant.
    ///
    /// Returns false (and changes nothing) if the job already has a reason or
    /// is completed.
    pub(crate) fn cancel(&mut self, job: JobId, reason: CancelReason, fx: &mut Effects) -> bool {
        if !self.request_cancel(job, reason, fx) {
            return false;
        }
        let mut stack = vec![Step::Settle(job)];
        self.push_children(job, &mut stack);
        self.propagate(stack, fx);
        true
    }

    /// Finishes a standalone job normally.
    pub(crate) fn complete_standalone(&mut self, job: JobId, fx: &mut Effects) -> bool {
        let Some(record) = self.job_mut(job) else {
            return false;
        };
        if !record.complete_standalone() {
            return false;
        }
        debug!(job = %job, "standalone job completing");
        self.maybe_complete(job, fx);
        true
    }

    /// Records the exit of a job body.
    pub(crate) fn finish_body(&mut self, job: JobId, result: Result<(), Error>, fx: &mut Effects) {
        let Some(record) = self.job_mut(job) else {
            return;
        };
        let failed = result.as_ref().err().map(ToString::to_string);
        let newly_finishing = record.finish_body(result);
        trace!(job = %job, error = ?failed, "job body finished");

        let mut stack = vec![Step::Settle(job)];
        if newly_finishing {
            self.push_children(job, &mut stack);
        }
        self.propagate(stack, fx);
    }

    /// Completes a body that was cancelled before its first resumption.
    pub(crate) fn skip_body(&mut self, job: JobId, fx: &mut Effects) {
        let raised = self.job(job).and_then(JobRecord::cancellation_error);
        let result = raised.map_or(Ok(()), Err);
        self.finish_body(job, result, fx);
    }

    fn request_cancel(&mut self, job: JobId, reason: CancelReason, fx: &mut Effects) -> bool {
        let Some(record) = self.job_mut(job) else {
            return false;
        };
        let kind = reason.kind;
        let origin = reason.origin;
        if !record.request_cancel(reason) {
            trace!(job = %job, kind = %kind, "cancel ignored, reason already set");
            return false;
        }
        debug!(job = %job, kind = %kind, origin = ?origin, "cancel requested");
        self.wake(job, fx);
        true
    }

    /// Drains the propagation worklist.
    ///
    /// A cancelled job's whole subtree is cancelled before the job settles,
    /// and an escalated parent is cancelled before the failing child tries to
    /// complete. The walk is iterative so tree depth is bounded by memory, not
    /// by the thread stack.
    fn propagate(&mut self, mut stack: Vec<Step>, fx: &mut Effects) {
        while let Some(step) = stack.pop() {
            match step {
                Step::Cancel(job, reason) => {
                    if self.request_cancel(job, reason, fx) {
                        stack.push(Step::Settle(job));
                        self.push_children(job, &mut stack);
                    }
                }
                Step::Settle(job) => {
                    stack.push(Step::Complete(job));
                    if let Some((parent, reason)) = self.escalate(job, fx) {
                        stack.push(Step::Cancel(parent, reason));
                    }
                }
                Step::Complete(job) => self.maybe_complete(job, fx),
            }
        }
    }

    /// Queues a parent-cancelled request for each child, first child on top.
    fn push_children(&self, job: JobId, stack: &mut Vec<Step>) {
        let Some(record) = self.job(job) else {
            return;
        };
        if record.children.is_empty() {
            return;
        }
        let cause = record.reason().and_then(FinishReason::root_cause).cloned();
        debug!(job = %job, children = record.children.len(), "cascading cancellation to children");
        stack.extend(
            record
                .children
                .iter()
                .rev()
                .map(|child| Step::Cancel(*child, CancelReason::parent_cancelled(job, cause.clone()))),
        );
    }

    /// Reports a pending escalation and returns the parent to cancel.
    fn escalate(&mut self, job: JobId, fx: &mut Effects) -> Option<(JobId, CancelReason)> {
        let record = self.job_mut(job)?;
        let failure = record.take_escalation()?;
        let parent = record.parent.filter(|_| record.attached);
        warn!(
            job = %job,
            name = %record.name,
            parent = ?parent,
            error = %failure,
            "unhandled failure escalates to parent"
        );
        fx.reports.push(UnhandledReport {
            job,
            name: record.name.clone(),
            error: failure.clone(),
        });
        parent.map(|parent| (parent, CancelReason::child_failed(job, failure)))
    }

    fn maybe_complete(&mut self, mut job: JobId, fx: &mut Effects) {
        loop {
            let Some(record) = self.job_mut(job) else {
                return;
            };
            if !record.try_complete() {
                return;
            }
            debug!(
                job = %job,
                name = %record.name,
                cancelled = record.is_cancelled(),
                "job completed"
            );
            let waiters = mem::take(&mut record.waiters);
            let parent = if record.attached {
                record.attached = false;
                record.parent
            } else {
                None
            };

            for waiter in waiters {
                self.wake(waiter, fx);
            }
            self.maybe_release(job, fx);

            let Some(parent) = parent else {
                return;
            };
            if let Some(p) = self.job_mut(parent) {
                p.remove_child(job);
            }
            job = parent;
        }
    }

    fn maybe_release(&mut self, job: JobId, fx: &mut Effects) {
        if self.job(job).is_some_and(JobRecord::is_releasable) {
            if let Some(record) = self.jobs.remove(job.arena_index()) {
                trace!(job = %job, "job record released");
                fx.released.push(record);
            }
        }
    }

    /// Resumes a job: dispatches its parked continuation, or flags the wake if
    /// its body is being polled.
    pub(crate) fn wake(&mut self, job: JobId, fx: &mut Effects) {
        if let Some(continuation) = self.job_mut(job).and_then(JobRecord::wake) {
            trace!(job = %job, "job woken");
            fx.dispatch.push(continuation);
        }
    }

    /// Prepares a continuation for polling.
    pub(crate) fn begin_poll(&mut self, job: JobId) -> PollAction {
        self.job_mut(job).map_or(PollAction::Done, JobRecord::begin_poll)
    }

    /// Stores a continuation whose poll returned `Pending`.
    pub(crate) fn suspend(&mut self, job: JobId, continuation: Continuation, fx: &mut Effects) {
        match self.job_mut(job) {
            Some(record) => {
                if record.end_poll_pending() {
                    fx.dispatch.push(continuation);
                } else {
                    record.park(continuation);
                }
            }
            None => fx.discarded.push(continuation),
        }
    }

    /// Records the marker of the suspension operation about to return `Pending`.
    pub(crate) fn mark_suspending(&mut self, job: JobId, site: SuspendSite) {
        if let Some(record) = self.job_mut(job) {
            record.mark_suspending(site);
        }
    }

    /// The cancellation checkpoint: `Err` if `job` is finishing with a reason.
    pub(crate) fn checkpoint(&self, job: JobId) -> Result<(), Error> {
        self.job(job)
            .and_then(JobRecord::cancellation_error)
            .map_or(Ok(()), Err)
    }

    /// Returns true if `target` is completed; otherwise registers `waiter` to
    /// be woken when it completes.
    pub(crate) fn wait_for(&mut self, target: JobId, waiter: JobId) -> bool {
        match self.job_mut(target) {
            Some(record) if !record.is_completed() => {
                record.add_waiter(waiter);
                false
            }
            _ => true,
        }
    }

    /// Drops a waiter registration.
    pub(crate) fn cancel_wait(&mut self, target: JobId, waiter: JobId) {
        if let Some(record) = self.job_mut(target) {
            record.remove_waiter(waiter);
        }
    }

    /// Terminal outcome of a completed job.
    pub(crate) fn outcome(&self, job: JobId) -> Result<(), Error> {
        self.job(job).map_or_else(
            || Err(Error::internal(format!("job {job} is no longer tracked"))),
            JobRecord::outcome,
        )
    }

    /// Registers another external handle.
    pub(crate) fn retain(&mut self, job: JobId) {
        if let Some(record) = self.job_mut(job) {
            record.retain();
        }
    }

    /// Drops an external handle, releasing the record if nothing else needs it.
    pub(crate) fn release(&mut self, job: JobId, fx: &mut Effects) {
        if let Some(record) = self.job_mut(job) {
            record.release();
        }
        self.maybe_release(job, fx);
    }

    /// Removes every parked continuation (runtime teardown).
    pub(crate) fn drain_parked(&mut self) -> Vec<Continuation> {
        let ids: Vec<JobId> = self.jobs_iter().map(|r| r.id).collect();
        ids.into_iter()
            .filter_map(|id| self.job_mut(id).and_then(JobRecord::take_parked))
            .collect()
    }
}
