//! The coroutine context type.
//!
//! `Cx` is handed to every job body. It is the only way a body reaches the
//! runtime:
//! - Querying identity (job ID, debug name)
//! - Checking cancellation status
//! - Suspending (yield, join, await)
//! - Creating child jobs
//!
//! # Ambient job
//!
//! Each `Cx` is bound to the job whose body received it. That job is the
//! implicit parent of every job created through the context, and the job whose
//! cancellation every suspension operation checks.
//!
//! # Cancellation checkpoint
//!
//! Every suspension operation first inspects the ambient job. If it has a
//! cancellation or failure reason, the operation fails with
//! [`ErrorKind::Cancelled`](crate::ErrorKind::Cancelled) instead of
//! suspending, unless the operation is executing inside a
//! [`non_cancellable`](Cx::non_cancellable) scope. The check runs again when
//! the coroutine resumes.
//!
//! # Thread Safety
//!
//! `Cx` is `Send + Sync`; a clone may be moved into a child body, but it keeps
//! referring to the job it was created for.

use core::panic::Location;
use std::future::Future;
use std::sync::Arc;

use super::builder::JobBuilder;
use super::suspend::{Await, Join, YieldNow};
use crate::error::Error;
use crate::record::SuspendSite;
use crate::runtime::job_handle::{Deferred, JobHandle};
use crate::runtime::shared::Shared;
use crate::runtime::snapshot::TreeSnapshot;
use crate::types::{JobId, StartMode};

/// The context of a running job body.
#[derive(Debug, Clone)]
pub struct Cx {
    handle: JobHandle,
    shielded: bool,
}

impl Cx {
    pub(crate) fn new(handle: JobHandle) -> Self {
        Self {
            handle,
            shielded: false,
        }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        self.handle.shared()
    }

    /// Returns the ambient job's id.
    #[must_use]
    pub fn id(&self) -> JobId {
        self.handle.id()
    }

    /// Returns a handle to the ambient job.
    #[must_use]
    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    /// Returns the ambient job's debug name.
    #[must_use]
    pub fn name(&self) -> String {
        self.handle.name()
    }

    /// Returns true if the ambient job has a cancellation or failure reason.
    ///
    /// This is a pure query and ignores shielding.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// Returns true inside a [`non_cancellable`](Self::non_cancellable) scope.
    #[must_use]
    pub fn is_shielded(&self) -> bool {
        self.shielded
    }

    /// Checks for cancellation without suspending.
    ///
    /// Bodies that run long stretches without suspending should call this
    /// periodically; cancellation is otherwise only observed at suspension
    /// points.
    ///
    /// # Errors
    ///
    /// Returns an `Err` with kind `ErrorKind::Cancelled` if the ambient job
    /// has a reason and the context is not shielded. The error names the
    /// ambient job and carries its reason.
    ///
    /// # Example
    ///
    /// ```ignore
    /// async fn crunch(cx: &Cx, items: &[Item]) -> Result<(), Error> {
    ///     for item in items {
    ///         cx.checkpoint()?;
    ///         process(item);
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub fn checkpoint(&self) -> Result<(), Error> {
        if self.shielded {
            return Ok(());
        }
        self.shared().state.lock().checkpoint(self.id())
    }

    /// Returns a shielded copy of this context.
    ///
    /// Suspension operations through the copy never fail because of the
    /// ambient job's cancellation. The job itself is still cancelled; the
    /// state stays visible through [`is_cancel_requested`](Self::is_cancel_requested).
    #[must_use]
    pub fn shielded(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            shielded: true,
        }
    }

    /// Runs `f` with a shielded context.
    ///
    /// Used for cleanup that must suspend even though the job is being
    /// cancelled, typically from a failure path.
    ///
    /// # Example
    ///
    /// ```ignore
    /// if let Err(e) = work(&cx).await {
    ///     cx.non_cancellable(|cx| async move {
    ///         cx.join(&helper).await
    ///     })
    ///     .await?;
    ///     return Err(e);
    /// }
    /// ```
    pub async fn non_cancellable<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = T>,
    {
        f(self.shielded()).await
    }

    /// Reschedules the current coroutine behind all other ready work.
    ///
    /// With nothing else ready it resumes immediately.
    ///
    /// # Errors
    ///
    /// Fails with a cancellation if the ambient job is cancelled, either
    /// before yielding or when resumed.
    #[track_caller]
    pub fn yield_now(&self) -> YieldNow<'_> {
        YieldNow::new(self, Location::caller())
    }

    /// Suspends until `job` is `Completed`.
    ///
    /// Joining never fails because of the joined job's outcome: a failed or
    /// cancelled child joins normally.
    ///
    /// # Errors
    ///
    /// Fails only if the ambient job is cancelled.
    #[track_caller]
    pub fn join<'a>(&'a self, job: &'a JobHandle) -> Join<'a> {
        Join::new(self, job, Location::caller())
    }

    /// Cancels `job`, then joins it.
    ///
    /// # Errors
    ///
    /// Same as [`join`](Self::join).
    #[track_caller]
    pub fn cancel_and_join<'a>(&'a self, job: &'a JobHandle) -> Join<'a> {
        let location = Location::caller();
        job.cancel();
        Join::new(self, job, location)
    }

    /// Suspends until `deferred` completes and returns its value.
    ///
    /// # Errors
    ///
    /// Re-raises the deferred's failure unchanged; raises a cancellation
    /// naming the deferred if it was cancelled; fails with a cancellation
    /// naming the ambient job if the waiter itself is cancelled.
    #[track_caller]
    pub fn await_deferred<'a, T>(&'a self, deferred: &'a Deferred<T>) -> Await<'a, T>
    where
        T: Clone + Send + Sync + 'static,
    {
        Await::new(self, deferred, Location::caller())
    }

    /// Starts configuring a child job of the ambient job.
    #[must_use]
    pub fn job_builder(&self) -> JobBuilder<'_> {
        JobBuilder::new(self)
    }

    /// Launches a fire-and-forget child coroutine with the default start
    /// mode.
    ///
    /// Its failure cancels the ambient job.
    #[track_caller]
    pub fn launch<F, Fut>(&self, body: F) -> JobHandle
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.job_builder().launch(body)
    }

    /// Launches a child coroutine with an explicit start mode.
    #[track_caller]
    pub fn launch_with<F, Fut>(&self, start: StartMode, body: F) -> JobHandle
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.job_builder().start(start).launch(body)
    }

    /// Starts a child coroutine that produces a value.
    ///
    /// Its failure is kept for whoever awaits it and does not cancel the
    /// ambient job.
    #[track_caller]
    pub fn deferred<F, Fut, T>(&self, body: F) -> Deferred<T>
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        self.job_builder().deferred(body)
    }

    /// Starts a value-producing child coroutine with an explicit start mode.
    #[track_caller]
    pub fn deferred_with<F, Fut, T>(&self, start: StartMode, body: F) -> Deferred<T>
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        self.job_builder().start(start).deferred(body)
    }

    /// Creates a body-less job with no parent.
    ///
    /// Useful as an explicit parent for a group of coroutines. Complete it
    /// with [`JobHandle::complete`] or stop it with [`JobHandle::cancel`].
    /// Use [`JobBuilder::standalone`] for a body-less child of the ambient job.
    #[track_caller]
    pub fn standalone_job(&self) -> JobHandle {
        self.job_builder().detached().standalone()
    }

    /// Snapshot of every live coroutine in the runtime.
    #[must_use]
    pub fn snapshot(&self) -> TreeSnapshot {
        let state = self.shared().state.lock();
        TreeSnapshot::collect_all(&state)
    }

    pub(crate) fn mark_suspending(&self, site: SuspendSite) {
        let id = self.id();
        self.shared().state.lock().mark_suspending(id, site);
    }
}
