//! Runtime configuration types.
//!
//! These types hold the concrete values that drive runtime behavior. In most
//! cases you should use [`RuntimeBuilder`](super::builder::RuntimeBuilder) to
//! construct a runtime rather than creating a [`RuntimeConfig`] directly.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `max_steps` | `None` (unlimited) |
//! | `name_prefix` | `"coroutine"` |
//! | `catch_panics` | `true` |

/// Default debug-name prefix for coroutines.
pub const DEFAULT_NAME_PREFIX: &str = "coroutine";

/// Errors raised while building a runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// An environment variable was set to a value that does not parse.
    #[error("invalid value for {var}: expected {expected}, got {value:?}")]
    InvalidEnv {
        /// The variable name.
        var: &'static str,
        /// What the variable should contain.
        expected: &'static str,
        /// The raw value found.
        value: String,
    },
    /// A programmatic setting failed validation.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// The field that failed validation.
        field: &'static str,
        /// Why the value is invalid.
        reason: String,
    },
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Maximum continuations resumed by one `block_on` call (`None` = unlimited).
    pub max_steps: Option<u64>,
    /// Prefix for coroutine debug names (`<prefix>#<n>`).
    pub name_prefix: String,
    /// Convert panics escaping a body poll into `Panicked` failures.
    pub catch_panics: bool,
}

impl RuntimeConfig {
    /// Normalize configuration values to safe defaults.
    pub fn normalize(&mut self) {
        if self.name_prefix.is_empty() {
            self.name_prefix = DEFAULT_NAME_PREFIX.to_string();
        }
        if self.max_steps == Some(0) {
            self.max_steps = None;
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_steps: None,
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            catch_panics: true,
        }
    }
}
