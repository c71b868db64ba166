//! Stored body type for runtime future storage.
//!
//! `StoredTask` wraps the type-erased future of one job body. The result type
//! is erased to `Result<(), Error>`: result-bearing bodies write their value
//! into a shared slot before returning.

use crate::error::Error;
use crate::tracing_compat::trace;
use crate::types::JobId;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A type-erased job body stored in the runtime.
pub struct StoredTask {
    /// The pinned, boxed future to poll.
    future: Pin<Box<dyn Future<Output = Result<(), Error>> + Send>>,
    /// The job ID (for tracing).
    job: Option<JobId>,
    /// Poll counter (for tracing).
    poll_count: u64,
}

impl StoredTask {
    /// Creates a new stored task from a body future.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        Self {
            future: Box::pin(future),
            job: None,
            poll_count: 0,
        }
    }

    /// Creates a new stored task tagged with its job for tracing.
    pub fn new_with_id<F>(future: F, job: JobId) -> Self
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        Self {
            future: Box::pin(future),
            job: Some(job),
            poll_count: 0,
        }
    }

    /// Polls the stored body.
    pub fn poll(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Error>> {
        self.poll_count += 1;
        let poll_number = self.poll_count;

        if let Some(job) = self.job {
            trace!(job = %job, poll_number = poll_number, "job poll started");
            let _ = (job, poll_number);
        }

        let result = self.future.as_mut().poll(cx);

        if let Some(job) = self.job {
            let poll_result = match &result {
                Poll::Ready(Ok(())) => "Returned",
                Poll::Ready(Err(_)) => "Raised",
                Poll::Pending => "Pending",
            };
            trace!(
                job = %job,
                poll_number = poll_number,
                poll_result = poll_result,
                "job poll completed"
            );
            let _ = (job, poll_number, poll_result);
        }

        result
    }

    /// Returns the number of times this body has been polled.
    #[must_use]
    pub fn poll_count(&self) -> u64 {
        self.poll_count
    }
}

impl std::fmt::Debug for StoredTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTask")
            .field("job", &self.job)
            .field("poll_count", &self.poll_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::init_test_logging;
    use std::sync::Arc;
    use std::task::{Wake, Waker};

    struct NoopWaker;

    impl Wake for NoopWaker {
        fn wake(self: Arc<Self>) {}
    }

    fn noop_waker() -> Waker {
        Waker::from(Arc::new(NoopWaker))
    }

    struct PendingOnce {
        polled: bool,
    }

    impl Future for PendingOnce {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
            if self.polled {
                Poll::Ready(())
            } else {
                self.polled = true;
                Poll::Pending
            }
        }
    }

    #[test]
    fn counts_polls_until_ready() {
        init_test_logging();
        let mut task = StoredTask::new_with_id(
            async {
                PendingOnce { polled: false }.await;
                Ok(())
            },
            JobId::new_for_test(1, 0),
        );
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        assert!(task.poll(&mut cx).is_pending());
        assert!(matches!(task.poll(&mut cx), Poll::Ready(Ok(()))));
        assert_eq!(task.poll_count(), 2);
    }

    #[test]
    fn error_is_returned_as_ready() {
        init_test_logging();
        let mut task = StoredTask::new(async { Err(Error::new(ErrorKind::User)) });
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        match task.poll(&mut cx) {
            Poll::Ready(Err(e)) => assert_eq!(e.kind(), ErrorKind::User),
            other => panic!("unexpected poll result {other:?}"),
        }
    }
}
