//! Coroutine context and the operations a job body performs through it.
//!
//! - [`Cx`]: identity, cancellation checks, suspension, child creation
//! - [`JobBuilder`]: start mode, explicit parent, name
//! - [`suspend`]: the futures behind `yield_now`, `join`, and `await_deferred`

pub mod builder;
#[allow(clippy::module_inception)]
pub mod cx;
pub mod suspend;

pub use builder::JobBuilder;
pub use cx::Cx;
pub use suspend::{Await, Join, YieldNow};
