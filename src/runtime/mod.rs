//! Runtime state and scheduling.
//!
//! This module contains the core runtime machinery:
//!
//! - [`config`]: Runtime configuration types
//! - [`env_config`]: `COJOB_*` environment overrides
//! - [`builder`]: Runtime builder and the `block_on` entry point
//! - [`state`]: The job table and every transition of the job tree
//! - [`dispatcher`]: The boundary deciding when continuations resume
//! - [`continuation`]: One resumable point of one job body
//! - [`stored_task`]: Type-erased body storage
//! - [`waker`]: Wakers that route back to the job record
//! - [`job_handle`]: `JobHandle` and `Deferred<T>`
//! - [`sink`]: Unhandled-failure reporting
//! - [`snapshot`]: Introspection of the live coroutine tree
//!
//! # Quick Start
//!
//! ```ignore
//! use cojob::runtime::Runtime;
//!
//! let runtime = Runtime::builder().max_steps(1_000_000).build()?;
//! runtime.block_on(|cx| async move {
//!     let child = cx.launch(|cx| async move { cx.yield_now().await });
//!     cx.join(&child).await
//! })?;
//! ```
//!
//! ## Config From the Environment
//!
//! ```ignore
//! let runtime = Runtime::builder().with_env_overrides()?.build()?;
//! ```
//!
//! # Error Handling
//!
//! Building fails with [`BuildError`] for unparseable environment values and
//! invalid programmatic settings. Everything else surfaces as
//! [`Error`](crate::Error) from `block_on` or from suspension operations.

pub mod builder;
pub mod config;
pub mod continuation;
pub mod dispatcher;
pub mod env_config;
pub mod job_handle;
pub(crate) mod shared;
pub mod sink;
pub mod snapshot;
pub mod state;
pub mod stored_task;
pub(crate) mod waker;

pub use builder::{Runtime, RuntimeBuilder};
pub use config::{BuildError, RuntimeConfig};
pub use continuation::Continuation;
pub use dispatcher::{Dispatcher, FifoDispatcher};
pub use job_handle::{Deferred, JobHandle};
pub use sink::{CapturingSink, LogSink, UnhandledReport, UnhandledSink};
pub use snapshot::{CoroutineSnapshot, TreeSnapshot};
pub use state::RuntimeState;
pub use stored_task::StoredTask;
