//! Start modes for new coroutines.

use core::fmt;
use serde::{Deserialize, Serialize};

/// How a newly created coroutine begins executing.
///
/// The mode only affects the first resumption; suspension semantics after
/// that are identical for all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StartMode {
    /// Enqueued on the dispatcher; the caller continues immediately.
    ///
    /// A `cancel()` before the first resumption prevents the body from
    /// running at all.
    #[default]
    Default,
    /// Runs synchronously on the caller's control flow up to its first
    /// suspension. Skipped if the job is already cancelled when created.
    Undispatched,
    /// Runs synchronously like [`StartMode::Undispatched`], and always
    /// reaches its first suspension point even if already cancelled.
    Atomic,
}

impl StartMode {
    /// Returns true if the body starts on the caller's control flow.
    #[must_use]
    pub const fn is_inline(self) -> bool {
        matches!(self, Self::Undispatched | Self::Atomic)
    }

    /// Returns true if a cancellation that lands before the first
    /// resumption stops the body from running.
    #[must_use]
    pub const fn cancellable_before_start(self) -> bool {
        !matches!(self, Self::Atomic)
    }
}

impl fmt::Display for StartMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Undispatched => write!(f, "undispatched"),
            Self::Atomic => write!(f, "atomic"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_mode_table() {
        assert!(!StartMode::Default.is_inline());
        assert!(StartMode::Default.cancellable_before_start());

        assert!(StartMode::Undispatched.is_inline());
        assert!(StartMode::Undispatched.cancellable_before_start());

        assert!(StartMode::Atomic.is_inline());
        assert!(!StartMode::Atomic.cancellable_before_start());
    }

    #[test]
    fn default_is_dispatched() {
        assert_eq!(StartMode::default(), StartMode::Default);
    }
}
