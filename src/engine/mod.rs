// src/engine/mod.rs

//! Build orchestration engine.
//!
//! The pure scheduling state machine lives in [`crate::dag::BuildPlan`]; this
//! module is the async shell around it:
//! - [`jobs`] turns the rendered layout and image definitions into the
//!   per-tag build units of each image.
//! - [`runtime`] runs the bounded worker pool.
//! - [`report`] collects the outcome of a run.

/// Canonical image id type used throughout the engine (the image name).
pub type ImageId = String;

/// Outcome of building and pushing every tag of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutcome {
    Built,
    Failed,
}

pub mod jobs;
pub mod report;
pub mod runtime;

pub use jobs::{BuildJobs, TagJob, plan_jobs};
pub use report::{BuildReport, FailedImage};
pub use runtime::{BuildScheduler, SchedulerOptions};
