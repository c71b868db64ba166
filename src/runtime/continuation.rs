//! Continuations: the unit the dispatcher resumes.
//!
//! A [`Continuation`] owns the suspended body of exactly one job. At any
//! moment it lives in exactly one place: a dispatcher queue, the job record's
//! parked slot, or the stack of the executor currently polling it. It moves
//! between those places and is never shared.

use crate::error::Error;
use crate::record::PollAction;
use crate::runtime::shared::Shared;
use crate::runtime::stored_task::StoredTask;
use crate::runtime::waker::JobWaker;
use crate::tracing_compat::trace;
use crate::types::JobId;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::task::{Context, Poll};

/// One resumable point of one job's body.
pub struct Continuation {
    job: JobId,
    task: StoredTask,
    shared: Arc<Shared>,
}

impl Continuation {
    pub(crate) fn new(job: JobId, task: StoredTask, shared: Arc<Shared>) -> Self {
        Self { job, task, shared }
    }

    /// The job this continuation belongs to.
    #[must_use]
    pub fn job(&self) -> JobId {
        self.job
    }

    /// Runs the body up to its next suspension point (or to its end).
    ///
    /// A body cancelled before its first resumption is dropped without being
    /// polled, unless it was started atomically.
    pub fn resume(self) {
        let Self {
            job,
            mut task,
            shared,
        } = self;

        match shared.with_state(|state, _| state.begin_poll(job)) {
            PollAction::Poll => {}
            PollAction::Skip => {
                trace!(job = %job, "cancelled before first resumption, body skipped");
                drop(task);
                shared.with_state(|state, fx| state.skip_body(job, fx));
                return;
            }
            PollAction::Done => {
                drop(task);
                return;
            }
        }

        let waker = JobWaker::waker(&shared, job);
        let mut cx = Context::from_waker(&waker);
        let polled = if shared.config.catch_panics {
            catch_unwind(AssertUnwindSafe(|| task.poll(&mut cx)))
                .unwrap_or_else(|payload| Poll::Ready(Err(Error::panicked(panic_message(&*payload)))))
        } else {
            task.poll(&mut cx)
        };

        match polled {
            Poll::Ready(result) => {
                drop(task);
                shared.with_state(|state, fx| state.finish_body(job, result, fx));
            }
            Poll::Pending => {
                let continuation = Self::new(job, task, Arc::clone(&shared));
                shared.with_state(|state, fx| state.suspend(job, continuation, fx));
            }
        }
    }
}

impl std::fmt::Debug for Continuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Continuation")
            .field("job", &self.job)
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "job body panicked".to_string()
    }
}
