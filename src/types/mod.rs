//! Core types: identifiers, cancellation reasons, start modes.

pub mod cancel;
pub mod id;
pub mod start;

pub use cancel::{CancelKind, CancelReason};
pub use id::JobId;
pub use start::StartMode;
