//! Identifier types for runtime entities.
//!
//! A [`JobId`] wraps the arena index of a job record with type safety. The
//! generation half of the index keeps ids unique for the lifetime of the
//! record they name: once a completed job is released, its id never resolves
//! to a different job.

use crate::util::ArenaIndex;
use core::fmt;
use serde::{Deserialize, Serialize};

/// A unique identifier for a job in the runtime.
///
/// Jobs form a tree; a job id is stable for as long as the job record lives.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "JobIdRepr", from = "JobIdRepr")]
pub struct JobId(pub(crate) ArenaIndex);

impl JobId {
    /// Creates a job id from an arena index (internal use).
    #[must_use]
    pub(crate) const fn from_arena(index: ArenaIndex) -> Self {
        Self(index)
    }

    /// Returns the underlying arena index (internal use).
    #[must_use]
    #[cfg(not(feature = "test-internals"))]
    pub(crate) const fn arena_index(self) -> ArenaIndex {
        self.0
    }

    /// Returns the underlying arena index.
    #[must_use]
    #[cfg(feature = "test-internals")]
    pub const fn arena_index(self) -> ArenaIndex {
        self.0
    }

    /// Creates a job id for testing/benchmarking purposes.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(index: u32, generation: u32) -> Self {
        Self(ArenaIndex::new(index, generation))
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({}:{})", self.0.index(), self.0.generation())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "J{}", self.0.index())
    }
}

#[derive(Serialize, Deserialize)]
struct JobIdRepr {
    index: u32,
    generation: u32,
}

impl From<JobId> for JobIdRepr {
    fn from(id: JobId) -> Self {
        Self {
            index: id.0.index(),
            generation: id.0.generation(),
        }
    }
}

impl From<JobIdRepr> for JobId {
    fn from(repr: JobIdRepr) -> Self {
        Self(ArenaIndex::new(repr.index, repr.generation))
    }
}
