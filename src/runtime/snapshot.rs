//! Introspection snapshots of the coroutine tree.
//!
//! Snapshots are read-only copies of the job table taken under the state
//! lock, for debuggers and test assertions. The runtime never consumes them.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::record::{format_location, JobState, RunState};
use crate::runtime::state::RuntimeState;
use crate::types::JobId;

/// One live coroutine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoroutineSnapshot {
    /// Job identity.
    pub job: JobId,
    /// Debug name (`coroutine#2`).
    pub name: String,
    /// Parent job, if attached.
    pub parent: Option<JobId>,
    /// Nesting depth below the snapshot root.
    pub depth: usize,
    /// Lifecycle state of the job.
    pub state: JobState,
    /// Where the body is.
    pub run: RunState,
    /// `file:line:column` where the coroutine was created.
    pub created_at: String,
}

/// Depth-first listing of live coroutines, parents before children, siblings
/// in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    /// The coroutines.
    pub coroutines: Vec<CoroutineSnapshot>,
}

impl TreeSnapshot {
    /// Number of live coroutines captured.
    #[must_use]
    pub fn len(&self) -> usize {
        self.coroutines.len()
    }

    /// Returns true if no coroutine was live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coroutines.is_empty()
    }

    /// Finds a coroutine by debug name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&CoroutineSnapshot> {
        self.coroutines.iter().find(|c| c.name == name)
    }

    /// Finds a coroutine by job id.
    #[must_use]
    pub fn get(&self, job: JobId) -> Option<&CoroutineSnapshot> {
        self.coroutines.iter().find(|c| c.job == job)
    }

    /// Serializes the snapshot as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Serializes the snapshot as indented JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Captures the subtrees rooted at `roots`.
    pub(crate) fn collect(state: &RuntimeState, roots: impl IntoIterator<Item = JobId>) -> Self {
        let mut coroutines = Vec::new();
        let mut stack: Vec<(JobId, usize)> = roots.into_iter().map(|r| (r, 0)).collect();
        stack.reverse();
        while let Some((id, depth)) = stack.pop() {
            let Some(record) = state.job(id) else {
                continue;
            };
            let mut child_depth = depth;
            if let Some(run) = record.run_state() {
                coroutines.push(CoroutineSnapshot {
                    job: id,
                    name: record.name.clone(),
                    parent: record.parent.filter(|_| record.attached),
                    depth,
                    state: record.state(),
                    run,
                    created_at: format_location(record.created_at),
                });
                child_depth += 1;
            }
            stack.extend(record.children.iter().rev().map(|c| (*c, child_depth)));
        }
        Self { coroutines }
    }

    /// Captures every live coroutine in the runtime.
    pub(crate) fn collect_all(state: &RuntimeState) -> Self {
        let mut roots: Vec<(u64, JobId)> = state
            .jobs_iter()
            .filter(|r| !r.attached)
            .map(|r| (r.seq, r.id))
            .collect();
        roots.sort_unstable();
        Self::collect(state, roots.into_iter().map(|(_, id)| id))
    }
}

impl fmt::Display for TreeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.coroutines {
            let indent = "  ".repeat(c.depth);
            match &c.run {
                RunState::Created => writeln!(f, "{indent}{} Created", c.name)?,
                RunState::Running => writeln!(f, "{indent}{} Running", c.name)?,
                RunState::Suspended { point, location } => {
                    writeln!(f, "{indent}{} Suspended at {point} ({location})", c.name)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::JobKind;
    use crate::runtime::shared::{Effects, NewJob};
    use crate::test_utils::init_test_logging;
    use crate::types::StartMode;
    use core::panic::Location;

    fn new_job(kind: JobKind, parent: Option<JobId>) -> NewJob {
        NewJob {
            kind,
            start: StartMode::Default,
            parent,
            name: None,
            location: Location::caller(),
        }
    }

    #[test]
    fn standalone_jobs_are_walked_but_not_listed() {
        init_test_logging();
        let mut state = RuntimeState::new("coroutine".into());
        let mut fx = Effects::default();
        let root = state.create_job(new_job(JobKind::Root, None), 1, &mut fx);
        let group = state.create_job(new_job(JobKind::Standalone, Some(root)), 1, &mut fx);
        let child = state.create_job(new_job(JobKind::Launch, Some(group)), 1, &mut fx);

        let snapshot = TreeSnapshot::collect_all(&state);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.get(group).is_none());
        let entry = snapshot.find("coroutine#2").expect("child listed");
        assert_eq!(entry.job, child);
        assert_eq!(entry.depth, 1);
        assert_eq!(entry.run, RunState::Created);
        assert_eq!(snapshot.to_string(), "coroutine#1 Created\n  coroutine#2 Created\n");
    }

    #[test]
    fn empty_snapshot_renders_nothing() {
        let snapshot = TreeSnapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.to_string(), "");
        assert_eq!(snapshot.to_json().unwrap(), r#"{"coroutines":[]}"#);
    }
}
