//! Environment variable support for [`RuntimeBuilder`](super::builder::RuntimeBuilder).
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set via builder methods (`max_steps(10_000)`)
//! 2. **Environment variables**: values from `COJOB_*` env vars
//! 3. **Defaults**: built-in defaults from [`RuntimeConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `COJOB_MAX_STEPS` | `u64` (`0` = unlimited) | `max_steps` |
//! | `COJOB_NAME_PREFIX` | `String` | `name_prefix` |
//! | `COJOB_CATCH_PANICS` | `bool` | `catch_panics` |

use crate::runtime::config::{BuildError, RuntimeConfig};

/// Environment variable name for the per-`block_on` step limit.
pub const ENV_MAX_STEPS: &str = "COJOB_MAX_STEPS";
/// Environment variable name for the coroutine name prefix.
pub const ENV_NAME_PREFIX: &str = "COJOB_NAME_PREFIX";
/// Environment variable name for panic containment.
pub const ENV_CATCH_PANICS: &str = "COJOB_CATCH_PANICS";

/// Apply environment variable overrides to a [`RuntimeConfig`].
///
/// Only variables that are set in the environment are applied.
/// Returns an error if a variable is set but contains an unparseable value.
pub fn apply_env_overrides(config: &mut RuntimeConfig) -> Result<(), BuildError> {
    if let Some(val) = read_env(ENV_MAX_STEPS) {
        let steps = parse_u64(ENV_MAX_STEPS, &val)?;
        config.max_steps = (steps != 0).then_some(steps);
    }
    if let Some(val) = read_env(ENV_NAME_PREFIX) {
        config.name_prefix = val;
    }
    if let Some(val) = read_env(ENV_CATCH_PANICS) {
        config.catch_panics = parse_bool(ENV_CATCH_PANICS, &val)?;
    }
    Ok(())
}

/// Read an environment variable, returning `None` if unset.
fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_u64(var: &'static str, val: &str) -> Result<u64, BuildError> {
    val.trim().parse::<u64>().map_err(|_| BuildError::InvalidEnv {
        var,
        expected: "unsigned integer",
        value: val.to_string(),
    })
}

fn parse_bool(var: &'static str, val: &str) -> Result<bool, BuildError> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(BuildError::InvalidEnv {
            var,
            expected: "bool (true/false/1/0/yes/no)",
            value: val.to_string(),
        }),
    }
}
