//! Data model for the dependency graph.
//!
//! Nodes represent analyzed source files, identified by a deterministic
//! path-derived id; edges represent directed import relationships. The
//! [`DependencyGraph`] owns the full node/edge collections plus the most
//! recent cycle-detection results and aggregate metrics.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::graph::cycles::CircularDependency;

/// Derive a stable node id from a file path.
///
/// Every non-alphanumeric byte is replaced with `_`, so the mapping is
/// total and deterministic: re-scanning the same path always yields the
/// same node identity, which lets incremental re-analysis compare runs.
pub fn node_id_for_path(path: &str) -> String {
    path.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Granularity of a graph node.
///
/// This subsystem only ever produces `File`; the remaining variants exist
/// for forward compatibility with coarser-grained graphs and for the
/// resolution-strategy dispatch, which keys on `Interface`/`Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// One source file
    File,
    /// A language-level module
    Module,
    /// A package or workspace member
    Package,
    /// A deployed service
    Service,
    /// An interface declaration
    Interface,
    /// A type alias or type declaration
    Type,
}

impl NodeType {
    /// Stable lowercase label, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Module => "module",
            Self::Package => "package",
            Self::Service => "service",
            Self::Interface => "interface",
            Self::Type => "type",
        }
    }
}

/// Heuristic metadata attached to each node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// File size in bytes
    pub size: u64,
    /// Count of branching-keyword occurrences across the file
    pub complexity: u32,
    /// Last modification timestamp
    pub last_modified: DateTime<Utc>,
    /// Heuristic importance score in `[0, 1]`
    pub importance: f64,
    /// Heuristic stability score in `[0, 1]`, higher = older/untouched
    pub stability: f64,
}

impl NodeMetadata {
    /// Default-low metadata used when a file cannot be read or analyzed.
    pub fn degraded() -> Self {
        Self {
            size: 0,
            complexity: 0,
            last_modified: Utc::now(),
            importance: 0.1,
            stability: 0.5,
        }
    }
}

/// One analyzed source file in the dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyNode {
    /// Stable path-derived identifier
    pub id: String,
    /// File path as discovered
    pub path: String,
    /// Base filename
    pub name: String,
    /// Node granularity (always `file` for scanned sources)
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Node ids this node imports, in parse order, duplicates kept
    pub dependencies: Vec<String>,
    /// Node ids importing this node; derived and back-filled once all
    /// edges are known, never used to drive traversal on its own
    pub dependents: Vec<String>,
    /// Heuristic metadata
    pub metadata: NodeMetadata,
}

impl DependencyNode {
    /// Create a file node for the given path.
    pub fn file(path: impl Into<String>, metadata: NodeMetadata) -> Self {
        let path = path.into();
        let name = path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(path.as_str())
            .to_string();
        Self {
            id: node_id_for_path(&path),
            path,
            name,
            node_type: NodeType::File,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            metadata,
        }
    }
}

/// A directed import relationship between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Source node id
    pub source: String,
    /// Target node id
    pub target: String,
    /// Relationship kind, currently always `"import"`
    #[serde(rename = "type")]
    pub edge_type: String,
    /// Edge weight, currently always `1.0` (reserved for future weighting)
    pub weight: f64,
}

impl GraphEdge {
    /// Create an import edge with the default weight.
    pub fn import(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            edge_type: "import".to_string(),
            weight: 1.0,
        }
    }

    /// Map key for this edge, `"<source>-><target>"`.
    pub fn key(&self) -> String {
        edge_key(&self.source, &self.target)
    }
}

/// Compute the map key for a directed edge.
pub fn edge_key(source: &str, target: &str) -> String {
    format!("{source}->{target}")
}

/// Aggregate metrics over the graph and its most recent cycle detection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphMetrics {
    /// Total node count
    pub node_count: usize,
    /// Total edge count
    pub edge_count: usize,
    /// Cycles found in the most recent detection run
    pub cycle_count: usize,
    /// Mean cycle length, `0.0` when no cycles exist
    pub average_cycle_length: f64,
    /// Longest detected cycle, `0` when no cycles exist
    pub max_cycle_length: usize,
    /// Cycles classified as critical
    pub critical_cycles: usize,
}

/// The full dependency graph for one analysis run.
///
/// Rebuilt from scratch on each run; `cycles` and `metrics` are
/// invalidated and recomputed together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    /// All nodes, keyed by id, in discovery order
    pub nodes: IndexMap<String, DependencyNode>,
    /// All edges, keyed by `"<source>-><target>"`, in creation order
    pub edges: IndexMap<String, GraphEdge>,
    /// Most recent cycle-detection results
    pub cycles: Vec<CircularDependency>,
    /// Aggregate node/edge/cycle metrics
    pub metrics: GraphMetrics,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, replacing any previous node with the same id.
    pub fn insert_node(&mut self, node: DependencyNode) {
        self.nodes.insert(node.id.clone(), node);
        self.metrics.node_count = self.nodes.len();
    }

    /// Insert an edge and back-fill the target's `dependents` list.
    ///
    /// Duplicate edges (same key) are ignored. Edges to unknown targets are
    /// recorded only if the target node exists; the builder is responsible
    /// for never calling this with dangling ids.
    pub fn insert_edge(&mut self, edge: GraphEdge) -> bool {
        let key = edge.key();
        if self.edges.contains_key(&key) {
            return false;
        }

        let source = edge.source.clone();
        let target = edge.target.clone();
        self.edges.insert(key, edge);
        self.metrics.edge_count = self.edges.len();

        if let Some(node) = self.nodes.get_mut(&target) {
            node.dependents.push(source);
        }
        true
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&DependencyNode> {
        self.nodes.get(id)
    }

    /// Whether a directed edge exists between two node ids.
    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.edges.contains_key(&edge_key(source, target))
    }

    /// Replace the cycle set and recompute the cycle-derived metrics.
    pub fn set_cycles(&mut self, cycles: Vec<CircularDependency>) {
        self.metrics.cycle_count = cycles.len();
        self.metrics.max_cycle_length = cycles.iter().map(|c| c.cycle.len()).max().unwrap_or(0);
        self.metrics.average_cycle_length = if cycles.is_empty() {
            0.0
        } else {
            cycles.iter().map(|c| c.cycle.len()).sum::<usize>() as f64 / cycles.len() as f64
        };
        self.metrics.critical_cycles = cycles
            .iter()
            .filter(|c| c.severity == crate::graph::cycles::Severity::Critical)
            .count();
        self.cycles = cycles;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_is_deterministic() {
        let a = node_id_for_path("src/components/auth/LoginForm.tsx");
        let b = node_id_for_path("src/components/auth/LoginForm.tsx");
        assert_eq!(a, b);
        assert_eq!(a, "src_components_auth_LoginForm_tsx");
    }

    #[test]
    fn node_id_does_not_collide_for_alphanumeric_segments() {
        let a = node_id_for_path("src/auth/login.ts");
        let b = node_id_for_path("src/auth/logout.ts");
        assert_ne!(a, b);
    }

    #[test]
    fn edge_insertion_backfills_dependents() {
        let mut graph = DependencyGraph::new();
        graph.insert_node(DependencyNode::file("a.ts", NodeMetadata::degraded()));
        graph.insert_node(DependencyNode::file("b.ts", NodeMetadata::degraded()));

        assert!(graph.insert_edge(GraphEdge::import("a_ts", "b_ts")));
        // Duplicate edge key is ignored and does not double the back-reference.
        assert!(!graph.insert_edge(GraphEdge::import("a_ts", "b_ts")));

        let b = graph.node("b_ts").unwrap();
        assert_eq!(b.dependents, vec!["a_ts".to_string()]);
        assert!(graph.has_edge("a_ts", "b_ts"));
        assert!(!graph.has_edge("b_ts", "a_ts"));
        assert_eq!(graph.metrics.edge_count, 1);
    }

    #[test]
    fn file_node_extracts_basename() {
        let node = DependencyNode::file("src/utils/helpers.ts", NodeMetadata::degraded());
        assert_eq!(node.name, "helpers.ts");
        assert_eq!(node.node_type, NodeType::File);
    }
}
