//! Dependency graph over workstream ids.
//!
//! Tracks prerequisite relationships between workstreams belonging to a
//! single feature. A node becomes ready once every prerequisite it lists
//! has completed. Failing a node does not propagate completion to its
//! dependents, it strands them by design, so a broken workstream can
//! never silently let its downstream subtree run against a result that
//! never happened.
//!
//! # Example
//!
//! ```
//! use workstream_orchestrator::graph::Graph;
//!
//! let mut graph = Graph::new();
//! graph.register("a".into(), vec![]).unwrap();
//! graph.register("b".into(), vec!["a".into()]).unwrap();
//!
//! assert_eq!(graph.ready(), vec!["a".to_string()]);
//! graph.mark_complete(&"a".to_string()).unwrap();
//! assert_eq!(graph.ready(), vec!["b".to_string()]);
//! ```

use std::collections::HashMap;

use thiserror::Error;

pub type NodeId = String;

/// Errors raised while registering or mutating the dependency graph.
///
/// These are programmer errors: a caller referencing an id that was
/// never registered is a bug in the caller, not a transient condition,
/// so none of these are retried internally.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("unknown prerequisite: {0}")]
    UnknownPrerequisite(NodeId),

    #[error("unknown node: {0}")]
    UnknownNode(NodeId),
}

#[derive(Debug, Clone)]
struct Node {
    prerequisites: Vec<NodeId>,
    indegree: usize,
    completed: bool,
    failed: bool,
}

/// A dependency graph over a fixed set of registered node ids.
///
/// Registration order is preserved internally so that [`Graph::ready`]
/// returns a deterministic order, letting callers pick "arbitrary but
/// reproducible" work from the ready set.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    order: Vec<NodeId>,
    nodes: HashMap<NodeId, Node>,
    dependents: HashMap<NodeId, Vec<NodeId>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node and its prerequisites.
    ///
    /// All prerequisites must already be registered, the graph is built
    /// bottom-up. Re-registering an id is rejected the same way an
    /// unknown prerequisite is: callers construct the whole graph once,
    /// in dependency order, before dispatching.
    pub fn register(
        &mut self,
        id: NodeId,
        prerequisites: Vec<NodeId>,
    ) -> Result<(), GraphError> {
        for prereq in &prerequisites {
            if !self.nodes.contains_key(prereq) {
                return Err(GraphError::UnknownPrerequisite(prereq.clone()));
            }
        }

        let indegree = prerequisites
            .iter()
            .filter(|p| !self.nodes.get(*p).map(|n| n.completed).unwrap_or(false))
            .count();

        for prereq in &prerequisites {
            self.dependents
                .entry(prereq.clone())
                .or_default()
                .push(id.clone());
        }

        self.order.push(id.clone());
        self.nodes.insert(
            id,
            Node {
                prerequisites,
                indegree,
                completed: false,
                failed: false,
            },
        );
        Ok(())
    }

    /// Ids with indegree zero that have not completed or failed, in
    /// registration order.
    pub fn ready(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .filter(|id| {
                let node = &self.nodes[*id];
                node.indegree == 0 && !node.completed && !node.failed
            })
            .cloned()
            .collect()
    }

    /// Mark a node complete. Idempotent: completing an already-complete
    /// node is a no-op rather than an error, since the dispatcher may
    /// observe a completion signal for a node whose checkpoint already
    /// recorded it as done after a resume.
    pub fn mark_complete(&mut self, id: &NodeId) -> Result<(), GraphError> {
        let already_complete = {
            let node = self
                .nodes
                .get(id)
                .ok_or_else(|| GraphError::UnknownNode(id.clone()))?;
            node.completed
        };
        if already_complete {
            return Ok(());
        }
        self.nodes.get_mut(id).unwrap().completed = true;

        if let Some(dependents) = self.dependents.get(id) {
            for dep in dependents.clone() {
                if let Some(dep_node) = self.nodes.get_mut(&dep) {
                    dep_node.indegree = dep_node.indegree.saturating_sub(1);
                }
            }
        }
        Ok(())
    }

    /// Mark a node failed. Deliberately does **not** decrement any
    /// dependent's indegree: a failed node's entire downstream subtree
    /// is stranded and will never appear in [`Graph::ready`].
    pub fn mark_failed(&mut self, id: &NodeId) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownNode(id.clone()))?;
        node.failed = true;
        Ok(())
    }

    pub fn is_completed(&self, id: &NodeId) -> bool {
        self.nodes.get(id).map(|n| n.completed).unwrap_or(false)
    }

    pub fn is_failed(&self, id: &NodeId) -> bool {
        self.nodes.get(id).map(|n| n.failed).unwrap_or(false)
    }

    /// True once every registered node has either completed or failed.
    pub fn all_settled(&self) -> bool {
        self.nodes.values().all(|n| n.completed || n.failed)
    }

    pub fn indegree(&self, id: &NodeId) -> Option<usize> {
        self.nodes.get(id).map(|n| n.indegree)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.order.iter()
    }

    pub fn prerequisites_of(&self, id: &NodeId) -> Option<&[NodeId]> {
        self.nodes.get(id).map(|n| n.prerequisites.as_slice())
    }
}
