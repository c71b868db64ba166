//! Waker implementation routing wakes into the job table.
//!
//! A wake resumes a job by handing its parked continuation back to the
//! dispatcher. Wakes that arrive while the job is being polled are remembered
//! and honored when the poll returns `Pending`; duplicate wakes collapse
//! because only one continuation exists per job.
//!
//! Note: This implementation uses safe Rust only (no unsafe).

use crate::runtime::shared::Shared;
use crate::types::JobId;
use std::sync::{Arc, Weak};
use std::task::{Wake, Waker};

/// A waker for a specific job.
///
/// Holds the runtime weakly: a waker stashed by a foreign future never keeps
/// a dropped runtime alive.
pub(crate) struct JobWaker {
    shared: Weak<Shared>,
    job: JobId,
}

impl JobWaker {
    /// Creates a waker for `job`.
    pub(crate) fn waker(shared: &Arc<Shared>, job: JobId) -> Waker {
        Waker::from(Arc::new(Self {
            shared: Arc::downgrade(shared),
            job,
        }))
    }

    fn wake_job(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.with_state(|state, fx| state.wake(self.job, fx));
        }
    }
}

impl Wake for JobWaker {
    fn wake(self: Arc<Self>) {
        self.wake_job();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.wake_job();
    }
}
