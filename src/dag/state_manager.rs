// src/dag/state_manager.rs

//! Per-run state transitions for images in the build plan.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::dag::node::{BuildState, ImageNode};
use crate::dag::DependencyGraph;
use crate::engine::ImageId;

/// Applies state transitions to the node map, following graph edges.
pub struct StateManager<'a> {
    graph: &'a DependencyGraph,
    nodes: &'a mut HashMap<ImageId, ImageNode>,
}

impl<'a> StateManager<'a> {
    pub fn new(graph: &'a DependencyGraph, nodes: &'a mut HashMap<ImageId, ImageNode>) -> Self {
        Self { graph, nodes }
    }

    /// Decrement the pending count of every direct dependent of `built`.
    ///
    /// Dependents whose count reaches zero are marked `Ready` and returned in
    /// edge-insertion order. The caller enqueues them.
    pub fn release_dependents(&mut self, built: &str) -> Vec<ImageId> {
        let mut ready = Vec::new();

        for dependent in self.graph.dependents(built) {
            let Some(node) = self.nodes.get_mut(dependent) else {
                warn!(image = %dependent, "dependent missing from node map");
                continue;
            };
            if node.state != BuildState::Pending {
                continue;
            }

            node.pending_deps = node.pending_deps.saturating_sub(1);
            if node.pending_deps == 0 {
                debug!(image = %node.id, dependency = %built, "last dependency built; marking Ready");
                node.state = BuildState::Ready;
                ready.push(node.id.clone());
            }
        }

        ready
    }

    /// Mark every transitive dependent of `failed` as `Skipped`.
    ///
    /// Images already in a terminal state keep it. Returns the images newly
    /// skipped by this call, excluding `failed` itself.
    pub fn mark_dependents_skipped(&mut self, failed: &str) -> Vec<ImageId> {
        let mut stack: Vec<ImageId> = self.graph.dependents(failed).to_vec();
        let mut visited: HashSet<ImageId> = HashSet::new();
        let mut skipped = Vec::new();

        while let Some(id) = stack.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };

            match node.state {
                BuildState::Pending | BuildState::Ready => {
                    node.state = BuildState::Skipped;
                    node.skipped_because_of = Some(failed.to_string());
                    debug!(image = %id, failed = %failed, "skipping image due to upstream failure");
                    skipped.push(id.clone());
                }
                // A running build of a dependent is impossible while the
                // dependency was still building; terminal nodes stay as-is.
                BuildState::Building
                | BuildState::Built
                | BuildState::Failed
                | BuildState::Skipped => {}
            }

            stack.extend(self.graph.dependents(&id).iter().cloned());
        }

        skipped
    }

    /// Skip everything that has not started yet.
    pub fn skip_unstarted(&mut self) -> Vec<ImageId> {
        let mut skipped = Vec::new();
        for node in self.nodes.values_mut() {
            if matches!(node.state, BuildState::Pending | BuildState::Ready) {
                node.state = BuildState::Skipped;
                skipped.push(node.id.clone());
            }
        }
        skipped.sort();
        skipped
    }
}
