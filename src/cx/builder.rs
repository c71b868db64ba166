//! Job builder for configuring a child before it is created.
//!
//! # Example
//!
//! ```ignore
//! let group = cx.job_builder().standalone();
//! let worker = cx
//!     .job_builder()
//!     .parent(&group)
//!     .start(StartMode::Undispatched)
//!     .name("worker")
//!     .launch(|cx| async move { cx.yield_now().await });
//! ```

use core::panic::Location;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use crate::cx::Cx;
use crate::error::Error;
use crate::record::JobKind;
use crate::runtime::job_handle::{Deferred, JobHandle};
use crate::runtime::shared::NewJob;
use crate::runtime::stored_task::StoredTask;
use crate::types::StartMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parent {
    Ambient,
    Explicit(crate::types::JobId),
    Detached,
}

/// Configures and creates a job.
///
/// Defaults: [`StartMode::Default`], parented to the context's ambient job,
/// named with the runtime's prefix.
#[derive(Debug)]
#[must_use = "a job builder does nothing until launch, deferred, or standalone is called"]
pub struct JobBuilder<'a> {
    cx: &'a Cx,
    start: StartMode,
    parent: Parent,
    name: Option<String>,
}

impl<'a> JobBuilder<'a> {
    pub(crate) fn new(cx: &'a Cx) -> Self {
        Self {
            cx,
            start: StartMode::Default,
            parent: Parent::Ambient,
            name: None,
        }
    }

    /// Sets the start mode. Ignored by [`standalone`](Self::standalone).
    pub fn start(mut self, start: StartMode) -> Self {
        self.start = start;
        self
    }

    /// Parents the job to `parent` instead of the ambient job.
    pub fn parent(mut self, parent: &JobHandle) -> Self {
        self.parent = Parent::Explicit(parent.id());
        self
    }

    /// Creates the job without a parent.
    ///
    /// Nothing cancels it except its own handle, and its failure is still
    /// reported but cancels nobody.
    pub fn detached(mut self) -> Self {
        self.parent = Parent::Detached;
        self
    }

    /// Replaces the name prefix: the job is named `<name>#<n>`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn new_job(&self, kind: JobKind, location: &'static Location<'static>) -> NewJob {
        let parent = match self.parent {
            Parent::Ambient => Some(self.cx.id()),
            Parent::Explicit(id) => Some(id),
            Parent::Detached => None,
        };
        NewJob {
            kind,
            start: self.start,
            parent,
            name: self.name.clone(),
            location,
        }
    }

    /// Creates a fire-and-forget coroutine running `body`.
    ///
    /// A failure of `body` is reported as unhandled and cancels the parent.
    #[track_caller]
    pub fn launch<F, Fut>(self, body: F) -> JobHandle
    where
        F: FnOnce(Cx) -> Fut,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let new_job = self.new_job(JobKind::Launch, Location::caller());
        self.cx.shared().spawn(new_job, |cx| {
            let id = cx.id();
            StoredTask::new_with_id(body(cx), id)
        })
    }

    /// Creates a coroutine whose value is retrieved with
    /// [`Cx::await_deferred`].
    #[track_caller]
    pub fn deferred<F, Fut, T>(self, body: F) -> Deferred<T>
    where
        F: FnOnce(Cx) -> Fut,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let new_job = self.new_job(JobKind::Deferred, Location::caller());
        let slot = Arc::new(OnceLock::new());
        let out = Arc::clone(&slot);
        let handle = self.cx.shared().spawn(new_job, move |cx| {
            let id = cx.id();
            let fut = body(cx);
            StoredTask::new_with_id(
                async move {
                    let value = fut.await?;
                    let _ = out.set(value);
                    Ok(())
                },
                id,
            )
        });
        Deferred::new(handle, slot)
    }

    /// Creates a body-less job.
    #[track_caller]
    pub fn standalone(self) -> JobHandle {
        let new_job = self.new_job(JobKind::Standalone, Location::caller());
        self.cx.shared().create_standalone(new_job)
    }
}
