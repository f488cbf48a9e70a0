// src/dag/scheduler.rs

use std::collections::{HashMap, VecDeque};

use tracing::{debug, info, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::node::{BuildState, ImageNode};
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::StateManager;
use crate::engine::{ImageId, ImageOutcome};
use crate::errors::Result;

/// Build plan: the immutable dependency graph plus mutable per-run state.
///
/// This is the synchronous core of the scheduler. It has no Tokio types and
/// performs no IO; the async worker pool in `engine::runtime` owns one behind
/// a mutex and drives it. It is responsible for:
/// - counting the dependencies each image still waits on
/// - handing out ready images in a deterministic order
/// - releasing dependents once an image is built and pushed
/// - skipping every transitive dependent of a failed image
#[derive(Debug)]
pub struct BuildPlan {
    graph: DependencyGraph,
    nodes: HashMap<ImageId, ImageNode>,
    /// Topological order, kept for reporting.
    order: Vec<ImageId>,
    ready: VecDeque<ImageId>,
    /// Images handed out by `next_ready` and not yet completed.
    active: usize,
}

impl BuildPlan {
    /// Construct a plan, rejecting cyclic graphs before anything is built.
    ///
    /// Images without dependencies start out `Ready`, enqueued in
    /// topological order.
    pub fn new(graph: DependencyGraph) -> Result<Self> {
        let order = graph.topological_sort()?;

        let mut nodes = HashMap::with_capacity(order.len());
        let mut ready = VecDeque::new();

        for id in &order {
            let mut node = ImageNode::new(id.clone(), graph.dependencies(id).len());
            if node.pending_deps == 0 {
                node.state = BuildState::Ready;
                ready.push_back(id.clone());
            }
            nodes.insert(id.clone(), node);
        }

        debug!(images = order.len(), ready = ready.len(), "build plan created");

        Ok(Self {
            graph,
            nodes,
            order,
            ready,
            active: 0,
        })
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Images in topological order.
    pub fn order(&self) -> &[ImageId] {
        &self.order
    }

    pub fn state_of(&self, id: &str) -> Option<BuildState> {
        self.nodes.get(id).map(|n| n.state)
    }

    /// For a skipped image, the failed image that blocked it.
    pub fn skipped_because_of(&self, id: &str) -> Option<&str> {
        self.nodes.get(id)?.skipped_because_of.as_deref()
    }

    /// Number of images currently handed out to workers.
    pub fn active(&self) -> usize {
        self.active
    }

    /// True when nothing is queued and nothing is building.
    pub fn is_finished(&self) -> bool {
        self.ready.is_empty() && self.active == 0
    }

    /// Pop the next ready image and mark it `Building`.
    pub fn next_ready(&mut self) -> Option<ImageId> {
        while let Some(id) = self.ready.pop_front() {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            if node.state != BuildState::Ready {
                // Skipped while waiting in the queue.
                continue;
            }
            node.state = BuildState::Building;
            self.active += 1;
            info!(image = %id, active = self.active, "image dependencies satisfied; building");
            return Some(id);
        }
        None
    }

    /// Record the outcome of a finished image.
    ///
    /// Must only be called after the image's artifacts have been pushed, as
    /// dependents released here may start building immediately.
    pub fn step_completion(&mut self, id: &str, outcome: ImageOutcome) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        match self.nodes.get_mut(id) {
            Some(node) if node.state == BuildState::Building => {
                self.active -= 1;
                match outcome {
                    ImageOutcome::Built => {
                        node.state = BuildState::Built;
                        debug!(image = %id, "image built and pushed");
                        let mut manager = StateManager::new(&self.graph, &mut self.nodes);
                        step.newly_ready = manager.release_dependents(id);
                        self.ready.extend(step.newly_ready.iter().cloned());
                    }
                    ImageOutcome::Failed => {
                        node.state = BuildState::Failed;
                        let mut manager = StateManager::new(&self.graph, &mut self.nodes);
                        step.newly_skipped = manager.mark_dependents_skipped(id);
                        warn!(
                            image = %id,
                            skipped = ?step.newly_skipped,
                            "image failed; skipping its dependents"
                        );
                    }
                }
            }
            Some(node) => {
                warn!(image = %id, state = ?node.state, "completion for image that is not building; ignoring");
            }
            None => {
                warn!(image = %id, "completion for unknown image; ignoring");
            }
        }

        step.run_just_finished = self.is_finished();
        step
    }

    /// Skip every image that has not started building.
    ///
    /// Used on cancellation: builds already in flight keep running and are
    /// completed normally, but no further image is handed out.
    pub fn cancel_remaining(&mut self) -> Vec<ImageId> {
        self.ready.clear();
        let mut manager = StateManager::new(&self.graph, &mut self.nodes);
        manager.skip_unstarted()
    }

    /// True once every image reached `Built`, `Failed` or `Skipped`.
    pub fn all_terminal(&self) -> bool {
        self.nodes.values().all(|n| n.state.is_terminal())
    }

    /// Snapshot of `(image, state)` pairs in topological order.
    pub fn states(&self) -> Vec<(ImageId, BuildState)> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id).map(|n| (id.clone(), n.state)))
            .collect()
    }
}
