//! In-memory graph store backend.
//!
//! Holds nodes, edges, and per-node adjacency sets. Shortest-path search
//! is breadth-first, accumulating `1 - edge.weight` per hop; all-paths is
//! a bounded depth-first enumeration; community detection is an undirected
//! flood-fill over connected components.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use indexmap::{IndexMap, IndexSet};

use crate::core::errors::{GordianError, Result};
use crate::graph::node::{edge_key, DependencyNode, GraphEdge};
use crate::store::interface::{
    Community, GraphPath, GraphQuery, GraphStore, QueryResult, StoreMetrics,
};

/// Volatile adjacency-structure backend.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    nodes: IndexMap<String, DependencyNode>,
    edges: IndexMap<String, GraphEdge>,
    outgoing: HashMap<String, IndexSet<String>>,
    incoming: HashMap<String, IndexSet<String>>,
}

impl MemoryGraphStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current node collection, in insertion order.
    pub fn nodes(&self) -> Vec<DependencyNode> {
        self.nodes.values().cloned().collect()
    }

    /// Snapshot the current edge collection, in insertion order.
    pub fn edges(&self) -> Vec<GraphEdge> {
        self.edges.values().cloned().collect()
    }

    pub(crate) fn insert_node(&mut self, node: DependencyNode) {
        self.outgoing.entry(node.id.clone()).or_default();
        self.incoming.entry(node.id.clone()).or_default();
        self.nodes.insert(node.id.clone(), node);
    }

    pub(crate) fn insert_edge(&mut self, edge: GraphEdge) -> Result<()> {
        if !self.nodes.contains_key(&edge.source) || !self.nodes.contains_key(&edge.target) {
            return Err(GordianError::graph(format!(
                "edge endpoints must exist: {}",
                edge.key()
            )));
        }
        self.outgoing
            .entry(edge.source.clone())
            .or_default()
            .insert(edge.target.clone());
        self.incoming
            .entry(edge.target.clone())
            .or_default()
            .insert(edge.source.clone());
        self.edges.insert(edge.key(), edge);
        Ok(())
    }

    fn delete_edge(&mut self, key: &str) {
        if let Some(edge) = self.edges.shift_remove(key) {
            if let Some(targets) = self.outgoing.get_mut(&edge.source) {
                targets.shift_remove(&edge.target);
            }
            if let Some(sources) = self.incoming.get_mut(&edge.target) {
                sources.shift_remove(&edge.source);
            }
        }
    }

    /// Undirected neighborhood of a node, in adjacency insertion order.
    fn undirected_neighbors(&self, id: &str) -> IndexSet<String> {
        let mut neighbors = IndexSet::new();
        if let Some(targets) = self.outgoing.get(id) {
            neighbors.extend(targets.iter().cloned());
        }
        if let Some(sources) = self.incoming.get(id) {
            neighbors.extend(sources.iter().cloned());
        }
        neighbors
    }

    /// Node ids reachable from `start` within `depth` outgoing hops,
    /// including `start` itself.
    fn neighborhood(&self, start: &str, depth: usize) -> IndexSet<String> {
        let mut reached = IndexSet::new();
        if !self.nodes.contains_key(start) {
            return reached;
        }
        reached.insert(start.to_string());

        let mut frontier = vec![start.to_string()];
        for _ in 0..depth {
            let mut next = Vec::new();
            for id in frontier {
                if let Some(targets) = self.outgoing.get(&id) {
                    for target in targets {
                        if reached.insert(target.clone()) {
                            next.push(target.clone());
                        }
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        reached
    }

    fn edge_cost(&self, source: &str, target: &str) -> f64 {
        self.edges
            .get(&edge_key(source, target))
            .map(|edge| 1.0 - edge.weight)
            .unwrap_or(1.0)
    }

    fn components(&self) -> Vec<Vec<String>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut components = Vec::new();

        for id in self.nodes.keys() {
            if seen.contains(id) {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![id.clone()];
            seen.insert(id.clone());
            while let Some(current) = stack.pop() {
                component.push(current.clone());
                for neighbor in self.undirected_neighbors(&current) {
                    if seen.insert(neighbor.clone()) {
                        stack.push(neighbor);
                    }
                }
            }
            components.push(component);
        }
        components
    }

    fn all_paths_dfs(
        &self,
        current: &str,
        target: &str,
        max_depth: usize,
        path: &mut Vec<String>,
        on_path: &mut HashSet<String>,
        out: &mut Vec<GraphPath>,
    ) {
        // `path` holds the predecessors of `current`; a hit on the next hop
        // would complete a path of `path.len() + 1` edges.
        if path.len() + 1 > max_depth {
            return;
        }
        let Some(targets) = self.outgoing.get(current) else {
            return;
        };
        for next in targets {
            if next == target {
                let mut nodes = path.clone();
                nodes.push(current.to_string());
                nodes.push(target.to_string());
                // `path` holds the predecessors of `current`; rebuild edges
                // over the completed node sequence.
                let mut edges = Vec::new();
                let mut total_weight = 0.0;
                for pair in nodes.windows(2) {
                    edges.push(edge_key(&pair[0], &pair[1]));
                    total_weight += self.edge_cost(&pair[0], &pair[1]);
                }
                out.push(GraphPath {
                    nodes,
                    edges,
                    total_weight,
                });
            } else if !on_path.contains(next) {
                path.push(current.to_string());
                on_path.insert(next.clone());
                self.all_paths_dfs(next, target, max_depth, path, on_path, out);
                on_path.remove(next);
                path.pop();
            }
        }
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    fn backend_name(&self) -> &'static str {
        "in-memory"
    }

    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn add_node(&mut self, node: DependencyNode) -> Result<()> {
        self.insert_node(node);
        Ok(())
    }

    async fn remove_node(&mut self, id: &str) -> Result<()> {
        if self.nodes.shift_remove(id).is_none() {
            return Ok(());
        }
        let incident: Vec<String> = self
            .edges
            .values()
            .filter(|edge| edge.source == id || edge.target == id)
            .map(GraphEdge::key)
            .collect();
        for key in incident {
            self.delete_edge(&key);
        }
        self.outgoing.remove(id);
        self.incoming.remove(id);
        Ok(())
    }

    async fn add_edge(&mut self, edge: GraphEdge) -> Result<()> {
        self.insert_edge(edge)
    }

    async fn remove_edge(&mut self, key: &str) -> Result<()> {
        self.delete_edge(key);
        Ok(())
    }

    async fn query(&self, query: &GraphQuery) -> Result<QueryResult> {
        let candidates: Vec<&DependencyNode> = match (&query.start, query.depth) {
            (Some(start), Some(depth)) => {
                let neighborhood = self.neighborhood(start, depth);
                neighborhood
                    .iter()
                    .filter_map(|id| self.nodes.get(id))
                    .collect()
            }
            (Some(start), None) => self
                .neighborhood(start, usize::MAX)
                .iter()
                .filter_map(|id| self.nodes.get(id))
                .collect::<Vec<_>>(),
            _ => self.nodes.values().collect(),
        };

        let mut nodes = Vec::new();
        for node in candidates {
            if let Some(node_type) = query.node_type {
                if node.node_type != node_type {
                    continue;
                }
            }
            if !query.properties.is_empty() {
                let value = serde_json::to_value(node)?;
                let all_match = query
                    .properties
                    .iter()
                    .all(|(key, expected)| property_matches(&value, key, expected));
                if !all_match {
                    continue;
                }
            }
            nodes.push(node.clone());
            if let Some(limit) = query.limit {
                if nodes.len() >= limit {
                    break;
                }
            }
        }

        let selected: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let edges = self
            .edges
            .values()
            .filter(|edge| {
                selected.contains(edge.source.as_str()) && selected.contains(edge.target.as_str())
            })
            .filter(|edge| {
                query
                    .edge_type
                    .as_ref()
                    .map_or(true, |t| &edge.edge_type == t)
            })
            .cloned()
            .collect();

        Ok(QueryResult { nodes, edges })
    }

    async fn find_shortest_path(&self, source: &str, target: &str) -> Result<Option<GraphPath>> {
        if !self.nodes.contains_key(source) || !self.nodes.contains_key(target) {
            return Ok(None);
        }
        if source == target {
            return Ok(Some(GraphPath {
                nodes: vec![source.to_string()],
                edges: Vec::new(),
                total_weight: 0.0,
            }));
        }

        let mut predecessor: HashMap<String, String> = HashMap::new();
        let mut queue = VecDeque::new();
        queue.push_back(source.to_string());
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(source.to_string());

        while let Some(current) = queue.pop_front() {
            let Some(targets) = self.outgoing.get(&current) else {
                continue;
            };
            for next in targets {
                if !seen.insert(next.clone()) {
                    continue;
                }
                predecessor.insert(next.clone(), current.clone());
                if next == target {
                    let mut nodes = vec![target.to_string()];
                    let mut cursor = target.to_string();
                    while let Some(previous) = predecessor.get(&cursor) {
                        nodes.push(previous.clone());
                        cursor = previous.clone();
                    }
                    nodes.reverse();

                    let mut edges = Vec::new();
                    let mut total_weight = 0.0;
                    for pair in nodes.windows(2) {
                        edges.push(edge_key(&pair[0], &pair[1]));
                        total_weight += self.edge_cost(&pair[0], &pair[1]);
                    }
                    return Ok(Some(GraphPath {
                        nodes,
                        edges,
                        total_weight,
                    }));
                }
                queue.push_back(next.clone());
            }
        }

        Ok(None)
    }

    async fn find_all_paths(
        &self,
        source: &str,
        target: &str,
        max_depth: usize,
    ) -> Result<Vec<GraphPath>> {
        if !self.nodes.contains_key(source) || !self.nodes.contains_key(target) {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        let mut path = Vec::new();
        let mut on_path = HashSet::new();
        on_path.insert(source.to_string());
        self.all_paths_dfs(source, target, max_depth, &mut path, &mut on_path, &mut out);
        Ok(out)
    }

    async fn detect_communities(&self) -> Result<Vec<Community>> {
        let communities = self
            .components()
            .into_iter()
            .enumerate()
            .map(|(index, members)| Community {
                id: format!("community-{index}"),
                size: members.len(),
                members,
            })
            .collect();
        Ok(communities)
    }

    async fn summary_metrics(&self) -> Result<StoreMetrics> {
        let node_count = self.nodes.len();
        let edge_count = self.edges.len();
        let average_degree = if node_count == 0 {
            0.0
        } else {
            edge_count as f64 / node_count as f64
        };
        let density = if node_count < 2 {
            0.0
        } else {
            edge_count as f64 / (node_count as f64 * (node_count as f64 - 1.0))
        };
        Ok(StoreMetrics {
            node_count,
            edge_count,
            average_degree,
            density,
            community_count: self.components().len(),
        })
    }
}

/// Match one property filter against a node's serialized representation.
/// Dotted `metadata.x` keys address the metadata object; bare keys check
/// the top level first, then metadata.
fn property_matches(node: &serde_json::Value, key: &str, expected: &serde_json::Value) -> bool {
    let actual = if let Some(rest) = key.strip_prefix("metadata.") {
        node.get("metadata").and_then(|m| m.get(rest))
    } else {
        node.get(key)
            .or_else(|| node.get("metadata").and_then(|m| m.get(key)))
    };
    actual == Some(expected)
}

#[cfg(test)]
mod tests {
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::graph::node::NodeMetadata;

    fn node(id: &str) -> DependencyNode {
        let mut node = DependencyNode::file(id, NodeMetadata::degraded());
        node.id = id.to_string();
        node
    }

    async fn store_with(edges: &[(&str, &str)]) -> MemoryGraphStore {
        let mut store = MemoryGraphStore::new();
        for &(a, b) in edges {
            for id in [a, b] {
                if !store.nodes.contains_key(id) {
                    store.add_node(node(id)).await.unwrap();
                }
            }
        }
        for &(a, b) in edges {
            store.add_edge(GraphEdge::import(a, b)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn shortest_path_returns_none_when_disconnected() {
        let mut store = store_with(&[("a", "b")]).await;
        store.add_node(node("z")).await.unwrap();

        let path = store.find_shortest_path("a", "z").await.unwrap();
        assert!(path.is_none());

        let path = store.find_shortest_path("a", "missing").await.unwrap();
        assert!(path.is_none());
    }

    #[tokio::test]
    async fn shortest_path_prefers_fewest_hops() {
        let store = store_with(&[("a", "b"), ("b", "c"), ("c", "d"), ("a", "d")]).await;

        let path = store.find_shortest_path("a", "d").await.unwrap().unwrap();
        assert_eq!(path.nodes, vec!["a", "d"]);
        assert_eq!(path.edges, vec!["a->d"]);
        // Default weight 1.0 makes each hop free under the 1 - weight cost.
        assert_abs_diff_eq!(path.total_weight, 0.0, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn all_paths_finds_the_single_path() {
        let store = store_with(&[("a", "b"), ("b", "c")]).await;

        let paths = store.find_all_paths("a", "c", 5).await.unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].nodes, vec!["a", "b", "c"]);
        assert_eq!(paths[0].edges, vec!["a->b", "b->c"]);
    }

    #[tokio::test]
    async fn all_paths_respects_depth_bound() {
        let store = store_with(&[("a", "b"), ("b", "c"), ("c", "d")]).await;

        let paths = store.find_all_paths("a", "d", 2).await.unwrap();
        assert!(paths.is_empty());

        let paths = store.find_all_paths("a", "d", 3).await.unwrap();
        assert_eq!(paths.len(), 1);
    }

    #[tokio::test]
    async fn all_paths_enumerates_branches() {
        let store = store_with(&[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]).await;

        let mut paths = store.find_all_paths("a", "d", 4).await.unwrap();
        paths.sort_by(|x, y| x.nodes.cmp(&y.nodes));
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].nodes, vec!["a", "b", "d"]);
        assert_eq!(paths[1].nodes, vec!["a", "c", "d"]);
    }

    #[tokio::test]
    async fn communities_are_connected_components() {
        let mut store = store_with(&[("a", "b"), ("c", "d")]).await;
        store.add_node(node("lonely")).await.unwrap();

        let communities = store.detect_communities().await.unwrap();
        assert_eq!(communities.len(), 3);
        let sizes: Vec<usize> = communities.iter().map(|c| c.size).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn removing_a_node_drops_incident_edges() {
        let mut store = store_with(&[("a", "b"), ("b", "c")]).await;
        store.remove_node("b").await.unwrap();

        assert_eq!(store.nodes().len(), 2);
        assert!(store.edges().is_empty());
        let path = store.find_shortest_path("a", "c").await.unwrap();
        assert!(path.is_none());
    }

    #[tokio::test]
    async fn edges_require_existing_endpoints() {
        let mut store = store_with(&[]).await;
        assert_ok!(store.add_node(node("a")).await);

        assert_err!(store.add_edge(GraphEdge::import("a", "ghost")).await);
        assert_err!(store.add_edge(GraphEdge::import("ghost", "a")).await);
    }

    #[tokio::test]
    async fn query_filters_by_property_and_limit() {
        let mut store = store_with(&[("a", "b"), ("b", "c")]).await;
        if let Some(n) = store.nodes.get_mut("b") {
            n.metadata.importance = 0.9;
        }

        let mut query = GraphQuery::default();
        query
            .properties
            .insert("metadata.importance".to_string(), serde_json::json!(0.9));
        let result = store.query(&query).await.unwrap();
        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[0].id, "b");

        let query = GraphQuery {
            limit: Some(2),
            ..Default::default()
        };
        let result = store.query(&query).await.unwrap();
        assert_eq!(result.nodes.len(), 2);
    }

    #[tokio::test]
    async fn query_neighborhood_is_depth_bounded() {
        let store = store_with(&[("a", "b"), ("b", "c"), ("c", "d")]).await;

        let query = GraphQuery {
            start: Some("a".to_string()),
            depth: Some(1),
            ..Default::default()
        };
        let result = store.query(&query).await.unwrap();
        let ids: Vec<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(result.edges.len(), 1);
    }

    #[tokio::test]
    async fn metrics_reflect_graph_shape() {
        let store = store_with(&[("a", "b"), ("b", "c")]).await;
        let metrics = store.summary_metrics().await.unwrap();

        assert_eq!(metrics.node_count, 3);
        assert_eq!(metrics.edge_count, 2);
        assert_relative_eq!(metrics.average_degree, 2.0 / 3.0);
        assert_relative_eq!(metrics.density, 2.0 / 6.0);
        assert_eq!(metrics.community_count, 1);
    }
}
