//! Cojob: a structured-concurrency job runtime.
//!
//! # Overview
//!
//! Every coroutine is backed by a [`Job`](runtime::JobHandle) that lives in a
//! parent/child tree. A parent does not complete before all its children
//! have. Cancellation flows down the tree; the failure of a fire-and-forget
//! child flows up. Coroutines run cooperatively: they are resumed only by the
//! runtime's dispatcher and suspend only at explicit suspension points.
//!
//! # Core Guarantees
//!
//! - **No orphans**: a job reaches `Completed` only after every child has
//! - **Synchronous cancel**: `cancel()` flips the job and its whole subtree
//!   before it returns
//! - **Cancel at suspension points**: a cancelled coroutine keeps running
//!   until its next suspension, which then fails with a cancellation error
//! - **One report per unhandled failure level**: a failing `launch` child is
//!   reported to the sink and cancels its parent exactly once
//! - **Deferred failures stay local**: they are re-raised to the awaiter and
//!   never cancel the parent
//!
//! # Module Structure
//!
//! - [`types`]: Identifiers, cancellation reasons, start modes
//! - [`record`]: The per-job state machine
//! - [`runtime`]: Job tree, dispatcher, handles, builder, snapshots
//! - [`cx`]: Coroutine context and suspension operations
//! - [`error`]: Error types
//! - [`util`]: Internal utilities (arenas)
//!
//! # Example
//!
//! ```ignore
//! use cojob::{Runtime, StartMode};
//!
//! let rt = Runtime::new();
//! let answer = rt.block_on(|cx| async move {
//!     let worker = cx.launch_with(StartMode::Undispatched, |cx| async move {
//!         cx.yield_now().await
//!     });
//!     let value = cx.deferred(|_| async { Ok(42) });
//!     cx.join(&worker).await?;
//!     value.await_result(&cx).await
//! })?;
//! assert_eq!(answer, 42);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod cx;
pub mod error;
pub mod record;
pub mod runtime;
pub mod tracing_compat;
pub mod types;
pub mod util;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports for convenient access to core types
pub use cx::{Cx, JobBuilder};
pub use error::{Error, ErrorCategory, ErrorKind, JobCancelled, Result};
pub use record::{JobState, RunState, SuspendPoint};
pub use runtime::{
    BuildError, CapturingSink, CoroutineSnapshot, Deferred, Dispatcher, FifoDispatcher,
    JobHandle, LogSink, Runtime, RuntimeBuilder, RuntimeConfig, TreeSnapshot, UnhandledReport,
    UnhandledSink,
};
pub use types::{CancelKind, CancelReason, JobId, StartMode};
