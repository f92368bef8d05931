//! Top-level analysis engine.
//!
//! [`GordianEngine`] wires the pipeline together: scan and build the
//! dependency graph, detect cycles, and assemble the report. The engine
//! retains the graph of its most recent run, so the per-file projections
//! (`cycles_for_file`, `is_file_in_cycle`, `visualization`) and the store
//! export read from that snapshot without re-analyzing. Each run replaces
//! the snapshot wholesale; nothing is mutated in place between runs.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::config::GordianConfig;
use crate::core::errors::Result;
use crate::graph::builder::GraphBuilder;
use crate::graph::cycles::{CircularDependency, CycleDetector};
use crate::graph::node::{node_id_for_path, DependencyGraph, NodeType};
use crate::io::reports::{AnalysisReport, ReportGenerator};
use crate::store::GraphStore;

/// One node in the visualization export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualNode {
    /// Node id
    pub id: String,
    /// Short display name
    pub name: String,
    /// Source file path
    pub path: String,
    /// Node classification
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Whether this node sits on at least one cycle
    pub in_cycle: bool,
}

/// One edge in the visualization export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualEdge {
    /// Source node id
    pub source: String,
    /// Target node id
    pub target: String,
    /// Whether this edge closes or continues a cycle
    pub in_cycle: bool,
}

/// Nodes and edges with cycle-membership flags, shaped for rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphVisualization {
    /// All nodes
    pub nodes: Vec<VisualNode>,
    /// All edges
    pub edges: Vec<VisualEdge>,
}

/// Orchestrates scanning, graph construction, cycle detection and
/// reporting for one project root at a time.
#[derive(Debug)]
pub struct GordianEngine {
    config: GordianConfig,
    graph: DependencyGraph,
}

impl GordianEngine {
    /// Create an engine after validating the configuration.
    pub fn new(config: GordianConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            graph: DependencyGraph::new(),
        })
    }

    /// Run the full pipeline over `root` and return the report. The built
    /// graph replaces any previous run's snapshot.
    pub async fn analyze_directory(&mut self, root: impl AsRef<Path>) -> Result<AnalysisReport> {
        let root = root.as_ref();
        info!(root = %root.display(), "starting dependency analysis");

        let builder = GraphBuilder::new(&self.config.analysis)?;
        let mut graph = builder.build(root)?;

        let cycles = CycleDetector::new().detect(&graph);
        info!(cycles = cycles.len(), "cycle detection complete");
        graph.set_cycles(cycles);

        let report =
            ReportGenerator::new(self.config.report.clone()).generate(&root.display().to_string(), &graph);
        self.graph = graph;
        Ok(report)
    }

    /// The graph snapshot from the most recent run.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Cycles that pass through the given file.
    pub fn cycles_for_file(&self, path: &str) -> Vec<&CircularDependency> {
        let id = node_id_for_path(path);
        self.graph
            .cycles
            .iter()
            .filter(|c| c.cycle.contains(&id))
            .collect()
    }

    /// Whether the given file sits on any detected cycle.
    pub fn is_file_in_cycle(&self, path: &str) -> bool {
        !self.cycles_for_file(path).is_empty()
    }

    /// Export the current graph with cycle-membership flags for rendering.
    pub fn visualization(&self) -> GraphVisualization {
        let mut cyclic_nodes: HashSet<&str> = HashSet::new();
        let mut cyclic_edges: HashSet<(&str, &str)> = HashSet::new();
        for cycle in &self.graph.cycles {
            for (index, id) in cycle.cycle.iter().enumerate() {
                cyclic_nodes.insert(id);
                let next = &cycle.cycle[(index + 1) % cycle.cycle.len()];
                cyclic_edges.insert((id, next));
            }
        }

        GraphVisualization {
            nodes: self
                .graph
                .nodes
                .values()
                .map(|node| VisualNode {
                    id: node.id.clone(),
                    name: node.name.clone(),
                    path: node.path.clone(),
                    node_type: node.node_type,
                    in_cycle: cyclic_nodes.contains(node.id.as_str()),
                })
                .collect(),
            edges: self
                .graph
                .edges
                .values()
                .map(|edge| VisualEdge {
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    in_cycle: cyclic_edges
                        .contains(&(edge.source.as_str(), edge.target.as_str())),
                })
                .collect(),
        }
    }

    /// Push the current graph through a store backend: connect, write every
    /// node then every edge, disconnect.
    pub async fn export_to_store(&self, store: &mut dyn GraphStore) -> Result<()> {
        store.connect().await?;
        for node in self.graph.nodes.values() {
            store.add_node(node.clone()).await?;
        }
        for edge in self.graph.edges.values() {
            store.add_edge(edge.clone()).await?;
        }
        store.disconnect().await?;
        info!(
            backend = store.backend_name(),
            nodes = self.graph.nodes.len(),
            edges = self.graph.edges.len(),
            "graph exported to store"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::cycles::normalized_cycle_id;
    use crate::graph::node::{DependencyNode, GraphEdge, NodeMetadata};
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[tokio::test]
    async fn analyze_directory_reports_a_two_file_cycle() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.ts", "import { b } from './b';\nexport const a = 1;\n");
        write_file(&dir, "b.ts", "import { a } from './a';\nexport const b = 2;\n");

        let mut engine = GordianEngine::new(GordianConfig::default()).unwrap();
        let report = engine.analyze_directory(dir.path()).await.unwrap();

        assert_eq!(report.total_cycles, 1);
        assert_eq!(report.files_scanned, 2);
        assert!(report.health_score < 100.0);
        assert!(engine.is_file_in_cycle(&dir.path().join("a.ts").display().to_string()));
    }

    #[tokio::test]
    async fn projections_are_empty_before_any_run() {
        let engine = GordianEngine::new(GordianConfig::default()).unwrap();
        assert!(!engine.is_file_in_cycle("src/a.ts"));
        assert!(engine.visualization().nodes.is_empty());
    }

    #[test]
    fn visualization_flags_cycle_membership() {
        let mut engine = GordianEngine::new(GordianConfig::default()).unwrap();
        let mut graph = DependencyGraph::new();
        for path in ["a.ts", "b.ts", "c.ts"] {
            graph.insert_node(DependencyNode::file(path, NodeMetadata::degraded()));
        }
        let a = node_id_for_path("a.ts");
        let b = node_id_for_path("b.ts");
        let c = node_id_for_path("c.ts");
        for (source, target) in [(&a, &b), (&b, &a), (&b, &c)] {
            graph
                .nodes
                .get_mut(source.as_str())
                .unwrap()
                .dependencies
                .push(target.clone());
            graph.insert_edge(GraphEdge::import(source.clone(), target.clone()));
        }

        let cycle = vec![a.clone(), b.clone()];
        let detected = CycleDetector::new().detect(&graph);
        assert_eq!(detected.len(), 1);
        assert_eq!(detected[0].id, normalized_cycle_id(&cycle));
        graph.set_cycles(detected);
        engine.graph = graph;

        let viz = engine.visualization();
        let flagged: Vec<_> = viz.nodes.iter().filter(|n| n.in_cycle).collect();
        assert_eq!(flagged.len(), 2);
        let plain_edge = viz
            .edges
            .iter()
            .find(|e| e.source == b && e.target == c)
            .unwrap();
        assert!(!plain_edge.in_cycle);
        let cyclic_edge = viz.edges.iter().find(|e| e.source == a).unwrap();
        assert!(cyclic_edge.in_cycle);
    }
}
