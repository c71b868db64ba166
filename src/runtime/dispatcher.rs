//! Dispatcher boundary.
//!
//! The core never decides which thread runs a continuation; it only hands
//! ready continuations to a [`Dispatcher`] and asks it for the next one to
//! resume. [`FifoDispatcher`] is the default: a thread-safe unbounded FIFO,
//! which gives deterministic single-thread round-robin when driven by
//! [`Runtime::block_on`](super::Runtime::block_on).

use crate::runtime::continuation::Continuation;
use crossbeam_queue::SegQueue;

/// Decides when suspended continuations resume.
pub trait Dispatcher: Send + Sync {
    /// Accepts a continuation that is ready to resume.
    fn dispatch(&self, continuation: Continuation);

    /// Returns the next continuation to resume, if any is ready.
    fn next(&self) -> Option<Continuation>;

    /// Number of continuations waiting to resume.
    fn len(&self) -> usize;

    /// Returns true if nothing is waiting.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A FIFO ready queue.
#[derive(Debug, Default)]
pub struct FifoDispatcher {
    inner: SegQueue<Continuation>,
}

impl FifoDispatcher {
    /// Creates a new empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }
}

impl Dispatcher for FifoDispatcher {
    fn dispatch(&self, continuation: Continuation) {
        self.inner.push(continuation);
    }

    fn next(&self) -> Option<Continuation> {
        self.inner.pop()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}
