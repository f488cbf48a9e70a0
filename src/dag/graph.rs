// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::engine::ImageId;
use crate::errors::{HiveError, Result};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Direct dependencies: images that must be built before this one.
    deps: Vec<ImageId>,
    /// Direct dependents: images that depend on this one.
    dependents: Vec<ImageId>,
}

/// In-memory dependency graph of images keyed by image id.
///
/// Forward edges (dependent -> dependency) and the reverse index
/// (dependency -> dependents) are only ever touched by
/// [`DependencyGraph::add_dependency`], so they cannot drift apart.
/// Node order is the order of first registration; it is used to break ties
/// in [`DependencyGraph::topological_sort`].
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    order: Vec<ImageId>,
    nodes: HashMap<ImageId, DagNode>,
    edge_count: usize,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image. Registering the same id twice is a no-op.
    pub fn add_image(&mut self, id: &str) {
        if self.nodes.contains_key(id) {
            return;
        }
        self.order.push(id.to_string());
        self.nodes.insert(id.to_string(), DagNode::default());
    }

    /// Record that `dependent` must be built after `dependency`.
    ///
    /// Both ids are registered if they are not known yet. Repeating an edge
    /// has no effect. A self-edge is accepted and makes the graph cyclic.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) {
        self.add_image(dependent);
        self.add_image(dependency);

        let Some(node) = self.nodes.get_mut(dependent) else {
            return;
        };
        if node.deps.iter().any(|d| d == dependency) {
            return;
        }
        node.deps.push(dependency.to_string());

        if let Some(dep_node) = self.nodes.get_mut(dependency) {
            dep_node.dependents.push(dependent.to_string());
        }
        self.edge_count += 1;
    }

    /// All image ids in registration order.
    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Immediate dependencies of an image.
    pub fn dependencies(&self, id: &str) -> &[ImageId] {
        self.nodes
            .get(id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of an image (one hop only).
    ///
    /// Unknown and leaf images have no dependents.
    pub fn dependents(&self, id: &str) -> &[ImageId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// True iff at least one edge exists.
    pub fn has_dependencies(&self) -> bool {
        self.edge_count > 0
    }

    /// Order images so that every dependency precedes its dependents.
    ///
    /// Kahn's algorithm; when several images are ready at the same time the
    /// one registered first wins, so the order is reproducible. If a cycle
    /// prevents some images from ever becoming ready, the error names all of
    /// them in registration order.
    pub fn topological_sort(&self) -> Result<Vec<ImageId>> {
        let position: HashMap<&str, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut in_degree: Vec<usize> = self
            .order
            .iter()
            .map(|id| self.dependencies(id).len())
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut sorted = Vec::with_capacity(self.order.len());

        while let Some(Reverse(idx)) = ready.pop() {
            let id = &self.order[idx];
            sorted.push(id.clone());

            for dependent in self.dependents(id) {
                let Some(&dep_idx) = position.get(dependent.as_str()) else {
                    continue;
                };
                in_degree[dep_idx] -= 1;
                if in_degree[dep_idx] == 0 {
                    ready.push(Reverse(dep_idx));
                }
            }
        }

        if sorted.len() != self.order.len() {
            let unresolved = self
                .order
                .iter()
                .zip(in_degree.iter())
                .filter(|(_, degree)| **degree > 0)
                .map(|(id, _)| id.clone())
                .collect();
            return Err(HiveError::DependencyCycle(unresolved));
        }

        Ok(sorted)
    }
}
