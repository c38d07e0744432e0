//! Dependency graph construction and deterministic topological ordering.
//!
//! The ordering contract is strict: among simultaneously-ready nodes the
//! lexicographically smaller name always comes first, so rendered
//! artifacts are byte-stable across runs. The sort is Kahn's algorithm
//! over a string min-heap.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use thiserror::Error;

use devx_manifest::Profile;

/// Errors raised while building or ordering the graph.
///
/// All of these are structural manifest errors and abort before any
/// external process runs.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A name is declared as both a service and a dep.
    #[error("name '{name}' is used by both a service and a dep")]
    NameCollision {
        /// The colliding name.
        name: String,
    },

    /// An edge references a node that does not exist.
    #[error("unknown dependency '{dependency}' for '{node}'")]
    UnknownDependency {
        /// Node declaring the edge.
        node: String,
        /// The missing target.
        dependency: String,
    },

    /// The graph contains at least one cycle.
    #[error("dependency cycle detected involving: {}", members.join(", "))]
    Cycle {
        /// Sorted names of every node caught in a cycle.
        members: Vec<String>,
    },
}

/// Whether a node came from the service or the dep table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A user-defined service.
    Service,
    /// A managed dependency.
    Dep,
}

/// A graph node with its outgoing dependency edges.
#[derive(Debug, Clone)]
pub struct Node {
    /// Node name.
    pub name: String,
    /// Node origin.
    pub kind: NodeKind,
    /// Names this node depends on.
    pub depends_on: Vec<String>,
}

/// Per-profile dependency graph. Derived and ephemeral: rebuilt on every
/// render, never persisted.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: BTreeMap<String, Node>,
}

impl Graph {
    /// Builds the graph for a profile: services carry their `dependsOn`
    /// edges, deps are always leaves.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NameCollision`] when a name appears in both
    /// tables.
    pub fn build(profile: &Profile) -> Result<Self, GraphError> {
        let mut nodes = BTreeMap::new();

        for (name, svc) in &profile.services {
            let _ = nodes.insert(
                name.clone(),
                Node {
                    name: name.clone(),
                    kind: NodeKind::Service,
                    depends_on: svc.depends_on.clone(),
                },
            );
        }

        for name in profile.deps.keys() {
            if nodes.contains_key(name) {
                return Err(GraphError::NameCollision { name: name.clone() });
            }
            let _ = nodes.insert(
                name.clone(),
                Node {
                    name: name.clone(),
                    kind: NodeKind::Dep,
                    depends_on: Vec::new(),
                },
            );
        }

        Ok(Self { nodes })
    }

    /// Number of nodes in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up a node by name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Returns a topological ordering of all nodes, dependencies first.
    ///
    /// Kahn's algorithm over a min-heap of ready names: whenever several
    /// nodes are simultaneously ready, the lexicographically smallest is
    /// emitted first. The result is therefore a pure function of the
    /// graph.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownDependency`] for an edge naming an
    /// absent node (checked before cycle detection), or
    /// [`GraphError::Cycle`] listing the residual nodes when the emitted
    /// order is shorter than the node count.
    pub fn topo_sort(&self) -> Result<Vec<String>, GraphError> {
        let mut indegree: BTreeMap<&str, usize> =
            self.nodes.keys().map(|n| (n.as_str(), 0)).collect();
        let mut adjacent: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for node in self.nodes.values() {
            for dep in &node.depends_on {
                if !self.nodes.contains_key(dep) {
                    return Err(GraphError::UnknownDependency {
                        node: node.name.clone(),
                        dependency: dep.clone(),
                    });
                }
                adjacent
                    .entry(dep.as_str())
                    .or_default()
                    .push(node.name.as_str());
                if let Some(count) = indegree.get_mut(node.name.as_str()) {
                    *count += 1;
                }
            }
        }

        let mut ready: BinaryHeap<Reverse<&str>> = indegree
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| Reverse(*name))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(current)) = ready.pop() {
            order.push(current.to_owned());
            for &next in adjacent.get(current).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(count) = indegree.get_mut(next) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(Reverse(next));
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            // Every node left with a positive in-degree sits on (or
            // behind) a cycle; BTreeMap iteration keeps them sorted.
            let members = indegree
                .iter()
                .filter(|(_, count)| **count > 0)
                .map(|(name, _)| (*name).to_owned())
                .collect();
            return Err(GraphError::Cycle { members });
        }

        Ok(order)
    }
}
