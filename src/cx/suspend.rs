//! Suspension operations.
//!
//! Each operation is a hand-written future: `Pending` means the coroutine is
//! suspended, `Ready` means it resumed. Every one of them runs the
//! cancellation checkpoint first, both when it is first polled and when it
//! resumes, unless the context is shielded.

use core::panic::Location;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::cx::Cx;
use crate::error::Error;
use crate::record::{SuspendPoint, SuspendSite};
use crate::runtime::job_handle::{Deferred, JobHandle};
use crate::types::JobId;

/// Future returned by [`Cx::yield_now`].
///
/// Reschedules the coroutine behind all other ready work.
#[must_use = "futures do nothing unless awaited"]
#[derive(Debug)]
pub struct YieldNow<'a> {
    cx: &'a Cx,
    location: &'static Location<'static>,
    yielded: bool,
}

impl<'a> YieldNow<'a> {
    pub(crate) fn new(cx: &'a Cx, location: &'static Location<'static>) -> Self {
        Self {
            cx,
            location,
            yielded: false,
        }
    }
}

impl Future for YieldNow<'_> {
    type Output = Result<(), Error>;

    fn poll(mut self: Pin<&mut Self>, task_cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.cx.checkpoint()?;
        if self.yielded {
            return Poll::Ready(Ok(()));
        }
        self.yielded = true;
        self.cx.mark_suspending(SuspendSite {
            point: SuspendPoint::Yield,
            location: self.location,
        });
        task_cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// Waiter registration shared by [`Join`] and [`Await`].
#[derive(Debug)]
struct Wait<'a> {
    cx: &'a Cx,
    target: JobId,
    point: SuspendPoint,
    location: &'static Location<'static>,
    registered: bool,
}

impl Wait<'_> {
    /// `Ready(Ok)` once the target completed; `Ready(Err)` if the waiting
    /// coroutine's own job is cancelled.
    fn poll_wait(&mut self) -> Poll<Result<(), Error>> {
        let me = self.cx.id();
        let target = self.target;
        if me == target {
            return Poll::Ready(Err(Error::internal(format!(
                "job {me} cannot wait for itself"
            ))));
        }
        let shielded = self.cx.is_shielded();
        let site = SuspendSite {
            point: self.point,
            location: self.location,
        };
        let polled = self.cx.shared().with_state(|state, _| {
            if !shielded {
                if let Err(e) = state.checkpoint(me) {
                    state.cancel_wait(target, me);
                    return Err(e);
                }
            }
            if state.wait_for(target, me) {
                return Ok(true);
            }
            state.mark_suspending(me, site);
            Ok(false)
        });
        match polled {
            Ok(false) => {
                self.registered = true;
                Poll::Pending
            }
            Ok(true) => {
                self.registered = false;
                Poll::Ready(Ok(()))
            }
            Err(e) => {
                self.registered = false;
                Poll::Ready(Err(e))
            }
        }
    }
}

impl Drop for Wait<'_> {
    fn drop(&mut self) {
        if self.registered {
            let (target, me) = (self.target, self.cx.id());
            self.cx
                .shared()
                .with_state(|state, _| state.cancel_wait(target, me));
        }
    }
}

/// Future returned by [`Cx::join`].
///
/// Completes when the target job is `Completed`. Never fails because of the
/// target's own outcome; fails only if the joining coroutine is cancelled.
#[must_use = "futures do nothing unless awaited"]
#[derive(Debug)]
pub struct Join<'a> {
    wait: Wait<'a>,
}

impl<'a> Join<'a> {
    pub(crate) fn new(
        cx: &'a Cx,
        target: &'a JobHandle,
        location: &'static Location<'static>,
    ) -> Self {
        Self {
            wait: Wait {
                cx,
                target: target.id(),
                point: SuspendPoint::Join,
                location,
                registered: false,
            },
        }
    }
}

impl Future for Join<'_> {
    type Output = Result<(), Error>;

    fn poll(mut self: Pin<&mut Self>, _task_cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.wait.poll_wait()
    }
}

/// Future returned by [`Cx::await_deferred`].
///
/// Yields the deferred's value, re-raises its failure as is, or raises a
/// cancellation naming the deferred if it was cancelled.
#[must_use = "futures do nothing unless awaited"]
pub struct Await<'a, T> {
    wait: Wait<'a>,
    deferred: &'a Deferred<T>,
}

impl<'a, T> Await<'a, T> {
    pub(crate) fn new(
        cx: &'a Cx,
        deferred: &'a Deferred<T>,
        location: &'static Location<'static>,
    ) -> Self {
        Self {
            wait: Wait {
                cx,
                target: deferred.id(),
                point: SuspendPoint::Await,
                location,
                registered: false,
            },
            deferred,
        }
    }
}

impl<T: Clone> Future for Await<'_, T> {
    type Output = Result<T, Error>;

    fn poll(mut self: Pin<&mut Self>, _task_cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.wait.poll_wait() {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Ready(Ok(())) => {}
        }
        let target = self.wait.target;
        let outcome = self.wait.cx.shared().state.lock().outcome(target);
        Poll::Ready(outcome.and_then(|()| {
            self.deferred.slot().get().cloned().ok_or_else(|| {
                Error::internal(format!("deferred {target} completed without a value"))
            })
        }))
    }
}

impl<T> std::fmt::Debug for Await<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Await")
            .field("target", &self.wait.target)
            .field("registered", &self.wait.registered)
            .finish()
    }
}
