// src/dag/scheduler_step.rs

//! Step-by-step result type for the build plan.

use crate::engine::ImageId;

/// Structured result of a single completion step.
///
/// Useful for tests that drive the plan by hand and assert on what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Images that became `Ready` and were enqueued by this step.
    pub newly_ready: Vec<ImageId>,
    /// Images newly marked `Skipped` because the completed image failed.
    pub newly_skipped: Vec<ImageId>,
    /// Whether the ready queue is now empty with no build in flight.
    pub run_just_finished: bool,
}
