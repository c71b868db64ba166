//! Runtime builder and the runtime entry point.

use core::panic::Location;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cx::Cx;
use crate::error::{Error, ErrorKind};
use crate::record::JobKind;
use crate::runtime::config::{BuildError, RuntimeConfig};
use crate::runtime::dispatcher::{Dispatcher, FifoDispatcher};
use crate::runtime::env_config::apply_env_overrides;
use crate::runtime::shared::{NewJob, Shared};
use crate::runtime::sink::{LogSink, UnhandledSink};
use crate::runtime::snapshot::TreeSnapshot;
use crate::runtime::stored_task::StoredTask;
use crate::tracing_compat::{debug, warn};
use crate::types::StartMode;

/// Builder for constructing a runtime with custom configuration.
///
/// Settings resolve as programmatic values, then environment variables (only
/// after [`with_env_overrides`](Self::with_env_overrides)), then defaults.
#[derive(Clone, Default)]
pub struct RuntimeBuilder {
    env: Option<RuntimeConfig>,
    max_steps: Option<u64>,
    name_prefix: Option<String>,
    catch_panics: Option<bool>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    sink: Option<Arc<dyn UnhandledSink>>,
}

impl RuntimeBuilder {
    /// Create a new builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the continuations resumed by one `block_on` call (0 = unlimited).
    #[must_use]
    pub fn max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    /// Set the coroutine debug-name prefix.
    #[must_use]
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    /// Enable or disable converting body panics into failures.
    #[must_use]
    pub fn catch_panics(mut self, enable: bool) -> Self {
        self.catch_panics = Some(enable);
        self
    }

    /// Replace the default FIFO dispatcher.
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: impl Dispatcher + 'static) -> Self {
        self.dispatcher = Some(Arc::new(dispatcher));
        self
    }

    /// Replace the default logging sink for unhandled failures.
    #[must_use]
    pub fn sink(mut self, sink: impl UnhandledSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Read `COJOB_*` environment variables.
    ///
    /// Programmatic settings still win over the environment, whichever order
    /// they were applied in.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidEnv`] if a variable is set to a value that
    /// does not parse.
    pub fn with_env_overrides(mut self) -> Result<Self, BuildError> {
        let mut config = RuntimeConfig::default();
        apply_env_overrides(&mut config)?;
        self.env = Some(config);
        Ok(self)
    }

    /// Build a runtime from this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidValue`] if the name prefix contains `#`.
    pub fn build(self) -> Result<Runtime, BuildError> {
        let mut config = self.env.unwrap_or_default();
        if let Some(steps) = self.max_steps {
            config.max_steps = Some(steps);
        }
        if let Some(prefix) = self.name_prefix {
            config.name_prefix = prefix;
        }
        if let Some(enable) = self.catch_panics {
            config.catch_panics = enable;
        }
        if config.name_prefix.contains('#') {
            return Err(BuildError::InvalidValue {
                field: "name_prefix",
                reason: format!("{:?} must not contain '#'", config.name_prefix),
            });
        }
        config.normalize();
        let dispatcher = self
            .dispatcher
            .unwrap_or_else(|| Arc::new(FifoDispatcher::new()));
        let sink = self.sink.unwrap_or_else(|| Arc::new(LogSink));
        debug!(
            max_steps = ?config.max_steps,
            name_prefix = %config.name_prefix,
            catch_panics = config.catch_panics,
            "runtime built"
        );
        Ok(Runtime {
            shared: Arc::new(Shared::new(config, dispatcher, sink)),
        })
    }
}

impl fmt::Debug for RuntimeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeBuilder")
            .field("env", &self.env)
            .field("max_steps", &self.max_steps)
            .field("name_prefix", &self.name_prefix)
            .field("catch_panics", &self.catch_panics)
            .field("custom_dispatcher", &self.dispatcher.is_some())
            .field("custom_sink", &self.sink.is_some())
            .finish()
    }
}

/// A coroutine runtime.
///
/// Owns the job tree, the dispatcher, and the unhandled-failure sink. Jobs are
/// resumed only while [`block_on`](Self::block_on) or
/// [`run_until_idle`](Self::run_until_idle) drives the dispatcher.
pub struct Runtime {
    shared: Arc<Shared>,
}

impl Runtime {
    /// Runtime with the default configuration, FIFO dispatcher, and logging
    /// sink. Does not read the environment.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Start building a runtime.
    #[must_use]
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Construct a runtime from the given configuration.
    #[must_use]
    pub fn with_config(mut config: RuntimeConfig) -> Self {
        config.normalize();
        Self {
            shared: Arc::new(Shared::new(
                config,
                Arc::new(FifoDispatcher::new()),
                Arc::new(LogSink),
            )),
        }
    }

    /// Returns the runtime configuration.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    /// Runs `body` as the root coroutine and drives the dispatcher until the
    /// root job completes.
    ///
    /// The root is a job like any other: it waits for its children, and a
    /// failing child cancels it. It never reports to the sink; its outcome is
    /// returned instead.
    ///
    /// # Errors
    ///
    /// - the root body's own failure, unchanged
    /// - `Cancelled` naming the root job if it was cancelled
    /// - `Stalled` if nothing is ready to run while the root is incomplete
    /// - `StepLimitExceeded` if the configured step limit is reached
    ///
    /// # Example
    ///
    /// ```ignore
    /// let rt = Runtime::new();
    /// let total = rt.block_on(|cx| async move {
    ///     let a = cx.deferred(|_| async { Ok(1) });
    ///     let b = cx.deferred(|_| async { Ok(2) });
    ///     Ok(a.await_result(&cx).await? + b.await_result(&cx).await?)
    /// })?;
    /// assert_eq!(total, 3);
    /// ```
    #[track_caller]
    pub fn block_on<F, Fut, T>(&self, body: F) -> Result<T, Error>
    where
        F: FnOnce(Cx) -> Fut,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
        T: Send + 'static,
    {
        let slot: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
        let out = Arc::clone(&slot);
        let new_job = NewJob {
            kind: JobKind::Root,
            start: StartMode::Default,
            parent: None,
            name: None,
            location: Location::caller(),
        };
        let root = self.shared.spawn(new_job, move |cx| {
            let id = cx.id();
            let fut = body(cx);
            StoredTask::new_with_id(
                async move {
                    let value = fut.await?;
                    *out.lock() = Some(value);
                    Ok(())
                },
                id,
            )
        });
        debug!(root = %root.id(), "block_on started");

        let mut steps: u64 = 0;
        while !root.is_completed() {
            if let Some(max) = self.shared.config.max_steps {
                if steps >= max {
                    warn!(root = %root.id(), steps, "step limit exceeded");
                    return Err(Error::new(ErrorKind::StepLimitExceeded)
                        .with_message(format!("{} did not complete within {max} steps", root.name())));
                }
            }
            let Some(continuation) = self.shared.dispatcher.next() else {
                warn!(root = %root.id(), steps, "dispatcher ran dry");
                return Err(Error::new(ErrorKind::Stalled)
                    .with_message(format!("nothing is ready to run but {} is incomplete", root.name())));
            };
            steps += 1;
            continuation.resume();
        }

        debug!(root = %root.id(), steps, "block_on finished");
        let outcome = self.shared.state.lock().outcome(root.id());
        outcome?;
        let value = slot.lock().take();
        value.ok_or_else(|| Error::internal("root completed without a value"))
    }

    /// Resumes continuations until the dispatcher is empty; returns how many
    /// were resumed. Ignores the step limit.
    pub fn run_until_idle(&self) -> u64 {
        let mut steps = 0;
        while let Some(continuation) = self.shared.dispatcher.next() {
            continuation.resume();
            steps += 1;
        }
        steps
    }

    /// Snapshot of every live coroutine.
    #[must_use]
    pub fn snapshot(&self) -> TreeSnapshot {
        let state = self.shared.state.lock();
        TreeSnapshot::collect_all(&state)
    }

    /// Number of job records still held by the runtime.
    #[must_use]
    pub fn live_jobs(&self) -> usize {
        self.shared.state.lock().live_jobs()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.shared.config)
            .field("queued", &self.shared.dispatcher.len())
            .finish_non_exhaustive()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // Bodies may hold handles that lock the state when dropped.
        loop {
            let mut dropped = 0usize;
            while let Some(continuation) = self.shared.dispatcher.next() {
                drop(continuation);
                dropped += 1;
            }
            let parked = self.shared.state.lock().drain_parked();
            dropped += parked.len();
            drop(parked);
            if dropped == 0 {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::sink::CapturingSink;
    use crate::test_utils::{env_lock, init_test_logging};

    #[test]
    fn block_on_returns_root_value() {
        init_test_logging();
        let rt = Runtime::new();
        let value = rt.block_on(|cx| async move {
            cx.yield_now().await?;
            Ok(cx.name())
        });
        assert_eq!(value.expect("root"), "coroutine#1");
    }

    #[test]
    fn root_failure_is_returned_not_reported() {
        init_test_logging();
        let sink = CapturingSink::new();
        let rt = Runtime::builder().sink(sink.clone()).build().expect("build");
        let err = rt
            .block_on(|_| async move { Err::<(), _>(Error::new(ErrorKind::User).with_message("root")) })
            .expect_err("root fails");
        assert_eq!(err.kind(), ErrorKind::User);
        assert!(sink.is_empty());
    }

    #[test]
    fn stalled_root_is_an_error() {
        init_test_logging();
        let rt = Runtime::new();
        let err = rt
            .block_on(|cx| async move {
                let group = cx.standalone_job();
                cx.join(&group).await
            })
            .expect_err("nothing completes the standalone job");
        assert_eq!(err.kind(), ErrorKind::Stalled);
    }

    #[test]
    fn step_limit_stops_a_spinning_root() {
        init_test_logging();
        let rt = Runtime::builder().max_steps(10).build().expect("build");
        let err = rt
            .block_on(|cx| async move {
                loop {
                    cx.yield_now().await?;
                }
            })
            .map(|()| ())
            .expect_err("never completes");
        assert_eq!(err.kind(), ErrorKind::StepLimitExceeded);
    }

    #[test]
    fn prefix_with_hash_is_rejected() {
        let err = Runtime::builder().name_prefix("a#b").build().expect_err("invalid");
        assert!(matches!(err, BuildError::InvalidValue { field: "name_prefix", .. }));
    }

    #[test]
    fn programmatic_settings_beat_env() {
        let _guard = env_lock();
        std::env::set_var(crate::runtime::env_config::ENV_NAME_PREFIX, "fromenv");
        std::env::set_var(crate::runtime::env_config::ENV_MAX_STEPS, "7");
        let rt = Runtime::builder()
            .name_prefix("explicit")
            .with_env_overrides()
            .expect("env")
            .build()
            .expect("build");
        std::env::remove_var(crate::runtime::env_config::ENV_NAME_PREFIX);
        std::env::remove_var(crate::runtime::env_config::ENV_MAX_STEPS);
        assert_eq!(rt.config().name_prefix, "explicit");
        assert_eq!(rt.config().max_steps, Some(7));
    }

    #[test]
    fn detached_jobs_run_after_block_on() {
        init_test_logging();
        let rt = Runtime::new();
        let job = rt
            .block_on(|cx| async move {
                Ok(cx
                    .job_builder()
                    .detached()
                    .launch(|cx| async move { cx.yield_now().await }))
            })
            .expect("root");
        assert!(!job.is_completed());
        assert!(rt.run_until_idle() > 0);
        assert!(job.is_completed());
    }
}
