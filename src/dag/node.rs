// src/dag/node.rs

//! Per-image node state tracked by the build plan.

use crate::engine::ImageId;

/// Build state of a single image within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// Waiting on at least one dependency.
    Pending,
    /// All dependencies built and pushed; queued for a worker.
    Ready,
    /// A worker is rewriting, building and pushing this image.
    Building,
    /// Built and pushed to the staging registry.
    Built,
    /// The build or the push failed.
    Failed,
    /// Never built because an ancestor failed or the run was cancelled.
    Skipped,
}

impl BuildState {
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildState::Built | BuildState::Failed | BuildState::Skipped)
    }
}

/// Scheduler bookkeeping for one image.
#[derive(Debug, Clone)]
pub struct ImageNode {
    pub id: ImageId,
    pub state: BuildState,
    /// Dependencies that have not reached `Built` yet.
    pub pending_deps: usize,
    /// For skipped images: the failed image that caused the skip.
    pub skipped_because_of: Option<ImageId>,
}

impl ImageNode {
    pub fn new(id: ImageId, pending_deps: usize) -> Self {
        Self {
            id,
            state: BuildState::Pending,
            pending_deps,
            skipped_because_of: None,
        }
    }
}
