// src/dag/mod.rs

//! Image dependency graph and build scheduling state.
//!
//! - [`graph`] holds the dependency graph with topological ordering.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   images are ready to build, and what happens when a build completes.
//! - [`node`] provides the per-image state types.
//! - [`scheduler_step`] defines the result type for completion steps.
//! - [`state_manager`] applies the state transitions along graph edges.

pub mod graph;
pub mod node;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;

pub use graph::DependencyGraph;
pub use node::{BuildState, ImageNode};
pub use scheduler::BuildPlan;
pub use scheduler_step::SchedulerStep;
