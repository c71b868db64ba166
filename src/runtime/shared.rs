//! State shared between the runtime, job handles, contexts, and wakers.
//!
//! All job-tree mutations happen under the single `state` mutex. Anything
//! that might call back into the runtime (dispatching a continuation,
//! reporting to the sink, dropping a body or a job record) is collected into
//! [`Effects`] and performed only after the lock is released.

use core::panic::Location;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cx::Cx;
use crate::record::{JobKind, JobRecord};
use crate::runtime::config::RuntimeConfig;
use crate::runtime::continuation::Continuation;
use crate::runtime::dispatcher::Dispatcher;
use crate::runtime::job_handle::JobHandle;
use crate::runtime::sink::{UnhandledReport, UnhandledSink};
use crate::runtime::state::RuntimeState;
use crate::runtime::stored_task::StoredTask;
use crate::types::{JobId, StartMode};

/// Side effects produced under the state lock.
#[derive(Default)]
pub(crate) struct Effects {
    /// Continuations to hand to the dispatcher.
    pub(crate) dispatch: Vec<Continuation>,
    /// Unhandled failures to report.
    pub(crate) reports: Vec<UnhandledReport>,
    /// Records removed from the arena.
    pub(crate) released: Vec<JobRecord>,
    /// Continuations to drop.
    pub(crate) discarded: Vec<Continuation>,
}

/// Parameters of a job about to be created.
#[derive(Debug, Clone)]
pub(crate) struct NewJob {
    pub(crate) kind: JobKind,
    pub(crate) start: StartMode,
    pub(crate) parent: Option<JobId>,
    pub(crate) name: Option<String>,
    pub(crate) location: &'static Location<'static>,
}

pub(crate) struct Shared {
    pub(crate) state: Mutex<RuntimeState>,
    pub(crate) dispatcher: Arc<dyn Dispatcher>,
    pub(crate) sink: Arc<dyn UnhandledSink>,
    pub(crate) config: RuntimeConfig,
}

impl Shared {
    pub(crate) fn new(
        config: RuntimeConfig,
        dispatcher: Arc<dyn Dispatcher>,
        sink: Arc<dyn UnhandledSink>,
    ) -> Self {
        Self {
            state: Mutex::new(RuntimeState::new(config.name_prefix.clone())),
            dispatcher,
            sink,
            config,
        }
    }

    /// Runs `f` under the state lock, then applies the effects it produced.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut RuntimeState, &mut Effects) -> R) -> R {
        let mut fx = Effects::default();
        let result = {
            let mut state = self.state.lock();
            f(&mut state, &mut fx)
        };
        self.apply(fx);
        result
    }

    fn apply(&self, fx: Effects) {
        let Effects {
            dispatch,
            reports,
            released,
            discarded,
        } = fx;
        for continuation in dispatch {
            self.dispatcher.dispatch(continuation);
        }
        for report in &reports {
            self.sink.report(report);
        }
        drop(released);
        drop(discarded);
    }

    /// Creates a body-less job and returns its only handle.
    pub(crate) fn create_standalone(self: &Arc<Self>, new_job: NewJob) -> JobHandle {
        let id = self.with_state(|state, fx| state.create_job(new_job, 1, fx));
        JobHandle::adopt(id, Arc::clone(self))
    }

    /// Creates a job with a body and starts it according to its start mode.
    ///
    /// `make_task` receives the body's context and builds the erased body.
    pub(crate) fn spawn(
        self: &Arc<Self>,
        new_job: NewJob,
        make_task: impl FnOnce(Cx) -> StoredTask,
    ) -> JobHandle {
        let start = new_job.start;
        // One handle for the caller, one for the body's context.
        let id = self.with_state(|state, fx| state.create_job(new_job, 2, fx));
        let handle = JobHandle::adopt(id, Arc::clone(self));
        let cx = Cx::new(JobHandle::adopt(id, Arc::clone(self)));
        let continuation = Continuation::new(id, make_task(cx), Arc::clone(self));
        if start.is_inline() {
            continuation.resume();
        } else {
            self.dispatcher.dispatch(continuation);
        }
        handle
    }
}
