//! Internal records for runtime entities.

pub mod job;

pub use job::{
    format_location, FinishReason, JobKind, JobRecord, JobState, PollAction, RunState, SuspendPoint,
    SuspendSite,
};
