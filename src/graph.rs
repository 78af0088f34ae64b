//! Resolution graph
//!
//! The in-memory multigraph of pinned items the resolver works on. Nodes are
//! keyed by item id (at most one node per id); edges are the dependency maps
//! the nodes declare. Nodes are only replaced through `add`/`remove`, never
//! edited in place.

use crate::lockfile::{LockedMod, Lockfile};
use crate::semver::Version;
use std::collections::BTreeMap;

/// A pinned item: one concrete version plus its declared dependencies
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Item id
    pub id: String,

    /// Pinned version
    pub version: Version,

    /// Declared dependencies (item id to constraint expression, verbatim)
    pub dependencies: BTreeMap<String, String>,

    /// True when a manifest entry pinned this item. Manifest nodes are
    /// sticky: the resolver never replaces or removes them.
    pub is_in_manifest: bool,
}

impl Node {
    /// Create a node with no dependencies, not in the manifest
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
            dependencies: BTreeMap::new(),
            is_in_manifest: false,
        }
    }

    /// Attach a dependency constraint
    pub fn with_dependency(mut self, id: impl Into<String>, constraint: impl Into<String>) -> Self {
        self.dependencies.insert(id.into(), constraint.into());
        self
    }

    /// Mark the node as manifest-pinned
    pub fn in_manifest(mut self) -> Self {
        self.is_in_manifest = true;
        self
    }
}

/// The resolution graph: an id-keyed collection of nodes.
///
/// Keyed storage makes lookup and removal O(log n) and iteration
/// deterministic; the unique-id invariant makes removal by id equivalent to
/// removal by identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionGraph {
    nodes: BTreeMap<String, Node>,
}

impl ResolutionGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate a graph from a lockfile. No node is marked as a manifest
    /// entry; callers re-derive manifest flags afterwards.
    pub fn from_lockfile(lockfile: &Lockfile) -> Self {
        let mut graph = Self::new();
        for (id, locked) in lockfile.iter() {
            graph.nodes.insert(
                id.clone(),
                Node {
                    id: id.clone(),
                    version: locked.version.clone(),
                    dependencies: locked.dependencies.clone(),
                    is_in_manifest: false,
                },
            );
        }
        graph
    }

    /// Serialize the current nodes to a lockfile
    pub fn to_lockfile(&self) -> Lockfile {
        let mut lockfile = Lockfile::new();
        for node in self.nodes.values() {
            lockfile.insert(
                node.id.clone(),
                LockedMod {
                    version: node.version.clone(),
                    dependencies: node.dependencies.clone(),
                },
            );
        }
        lockfile
    }

    /// Add a node. Adding an id already present is a no-op, which lets the
    /// resolver re-insert safely while backtracking.
    pub fn add(&mut self, node: Node) {
        if self.nodes.contains_key(&node.id) {
            tracing::debug!(id = %node.id, version = %node.version, "node already present, keeping existing");
            return;
        }
        self.nodes.insert(node.id.clone(), node);
    }

    /// Remove a node by id; silent when absent. Returns the removed node so
    /// the resolver can restore it when every candidate fails.
    pub fn remove(&mut self, id: &str) -> Option<Node> {
        self.nodes.remove(id)
    }

    /// Get a node by id
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Check whether an id is present
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Iterate over nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All node ids in order
    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.nodes.keys()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check whether the graph is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes whose dependency map names `id`
    pub fn dependants_of(&self, id: &str) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|n| n.dependencies.contains_key(id))
            .collect()
    }

    /// Nodes no other node depends on
    pub fn roots(&self) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|n| self.dependants_of(&n.id).is_empty())
            .collect()
    }

    /// A node is dangling when nothing depends on it and it is not a
    /// manifest entry
    pub fn is_dangling(&self, id: &str) -> bool {
        match self.nodes.get(id) {
            Some(node) => !node.is_in_manifest && self.dependants_of(id).is_empty(),
            None => false,
        }
    }

    /// Remove dangling nodes until none remain. Iterates to a fixed point so
    /// nodes orphaned by earlier removals are collected too.
    pub fn cleanup(&mut self) {
        loop {
            let dangling: Vec<String> = self
                .nodes
                .keys()
                .filter(|id| self.is_dangling(id))
                .cloned()
                .collect();

            if dangling.is_empty() {
                break;
            }

            for id in dangling {
                tracing::debug!(%id, "removing dangling node");
                self.nodes.remove(&id);
            }
        }
    }

    /// Re-derive manifest flags: exactly the nodes whose id appears in
    /// `manifest_ids` are marked as manifest entries.
    pub fn mark_manifest<'a>(&mut self, manifest_ids: impl IntoIterator<Item = &'a str>) {
        let ids: std::collections::BTreeSet<&str> = manifest_ids.into_iter().collect();
        for node in self.nodes.values_mut() {
            node.is_in_manifest = ids.contains(node.id.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, version: &str) -> Node {
        Node::new(id, Version::parse(version).unwrap())
    }

    #[test]
    fn test_add_is_idempotent_by_id() {
        let mut graph = ResolutionGraph::new();
        graph.add(node("A", "1.0.0"));
        graph.add(node("A", "2.0.0"));

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get("A").unwrap().version, Version::new(1, 0, 0));
    }

    #[test]
    fn test_remove_silent_when_absent() {
        let mut graph = ResolutionGraph::new();
        assert!(graph.remove("missing").is_none());

        graph.add(node("A", "1.0.0"));
        assert!(graph.remove("A").is_some());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_dependants_and_roots() {
        let mut graph = ResolutionGraph::new();
        graph.add(node("game", "109000.0.0"));
        graph.add(node("loader", "2.0.0").with_dependency("game", ">=109000.0.0"));
        graph.add(node("mod", "1.0.0").with_dependency("loader", "^2.0.0"));

        let dependants: Vec<&str> = graph
            .dependants_of("loader")
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(dependants, vec!["mod"]);

        let roots: Vec<&str> = graph.roots().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(roots, vec!["mod"]);
    }

    #[test]
    fn test_cleanup_removes_orphan_chains() {
        let mut graph = ResolutionGraph::new();
        graph.add(node("game", "109000.0.0").in_manifest());
        graph.add(node("loader", "2.0.0").with_dependency("game", ">=109000.0.0"));
        graph.add(node("orphan", "1.0.0").with_dependency("loader", "^2.0.0"));

        // "orphan" is dangling; once it goes, "loader" becomes dangling too.
        graph.cleanup();

        assert_eq!(graph.len(), 1);
        assert!(graph.contains("game"));
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let mut graph = ResolutionGraph::new();
        graph.add(node("game", "109000.0.0").in_manifest());
        graph.add(node("mod", "1.0.0").in_manifest());
        graph.add(node("orphan", "1.0.0"));

        graph.cleanup();
        let after_first = graph.clone();
        graph.cleanup();

        assert_eq!(graph, after_first);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_lockfile_roundtrip_identity() {
        let mut graph = ResolutionGraph::new();
        graph.add(node("game", "109000.0.0"));
        graph.add(node("loader", "2.0.0").with_dependency("game", ">=109000.0.0"));

        let lockfile = graph.to_lockfile();
        let reloaded = ResolutionGraph::from_lockfile(&lockfile);

        // Manifest flags are not serialized; everything else round-trips.
        assert_eq!(reloaded, graph);
        assert_eq!(reloaded.to_lockfile(), lockfile);
    }

    #[test]
    fn test_mark_manifest() {
        let mut graph = ResolutionGraph::new();
        graph.add(node("A", "1.0.0"));
        graph.add(node("B", "1.0.0").in_manifest());

        graph.mark_manifest(["A"]);

        assert!(graph.get("A").unwrap().is_in_manifest);
        assert!(!graph.get("B").unwrap().is_in_manifest);
    }
}
