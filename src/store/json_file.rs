//! JSON-file-persisted graph store backend.
//!
//! Same semantics as the in-memory backend, but `connect` deserializes the
//! graph from a JSON document and `disconnect` serializes it back, so
//! state survives process restarts across explicit connect/disconnect
//! boundaries only. A missing or unreadable file means an empty graph,
//! not an error; readers tolerate unknown additional fields.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::errors::{GordianError, Result};
use crate::graph::node::{DependencyNode, GraphEdge};
use crate::store::interface::{
    Community, GraphPath, GraphQuery, GraphStore, QueryResult, StoreMetrics,
};
use crate::store::memory::MemoryGraphStore;

/// Version string written into persisted documents.
pub const FORMAT_VERSION: &str = "1";

/// The persisted graph document.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedGraph {
    /// Format version string
    #[serde(default)]
    pub version: String,
    /// When the document was written
    #[serde(default = "Utc::now")]
    pub exported_at: DateTime<Utc>,
    /// All nodes
    #[serde(default)]
    pub nodes: Vec<DependencyNode>,
    /// All edges
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

/// File-persisted backend wrapping the in-memory semantics.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryGraphStore,
}

impl JsonFileStore {
    /// Create a store persisting to `path`. No I/O happens until
    /// [`GraphStore::connect`].
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            inner: MemoryGraphStore::new(),
        }
    }

    fn load(&mut self) -> Result<()> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    "no readable graph document, starting empty: {err}"
                );
                return Ok(());
            }
        };

        let document: PersistedGraph = match serde_json::from_str(&content) {
            Ok(document) => document,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    "graph document is not valid JSON, starting empty: {err}"
                );
                return Ok(());
            }
        };

        let mut inner = MemoryGraphStore::new();
        for node in document.nodes {
            inner.insert_node(node);
        }
        for edge in document.edges {
            if let Err(err) = inner.insert_edge(edge) {
                // An edge whose endpoint was hand-edited away is a
                // structural anomaly, not a fatal document error.
                warn!("skipping dangling persisted edge: {err}");
            }
        }
        self.inner = inner;

        info!(path = %self.path.display(), "loaded persisted graph");
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let document = PersistedGraph {
            version: FORMAT_VERSION.to_string(),
            exported_at: Utc::now(),
            nodes: self.inner.nodes(),
            edges: self.inner.edges(),
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    GordianError::io(
                        format!("failed to create store directory {}", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let json = serde_json::to_string_pretty(&document)?;
        std::fs::write(&self.path, json).map_err(|e| {
            GordianError::io(
                format!("failed to write graph document {}", self.path.display()),
                e,
            )
        })?;

        info!(path = %self.path.display(), "persisted graph document");
        Ok(())
    }
}

#[async_trait]
impl GraphStore for JsonFileStore {
    fn backend_name(&self) -> &'static str {
        "json-file"
    }

    async fn connect(&mut self) -> Result<()> {
        self.load()
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.save()
    }

    async fn add_node(&mut self, node: DependencyNode) -> Result<()> {
        self.inner.add_node(node).await
    }

    async fn remove_node(&mut self, id: &str) -> Result<()> {
        self.inner.remove_node(id).await
    }

    async fn add_edge(&mut self, edge: GraphEdge) -> Result<()> {
        self.inner.add_edge(edge).await
    }

    async fn remove_edge(&mut self, key: &str) -> Result<()> {
        self.inner.remove_edge(key).await
    }

    async fn query(&self, query: &GraphQuery) -> Result<QueryResult> {
        self.inner.query(query).await
    }

    async fn find_shortest_path(&self, source: &str, target: &str) -> Result<Option<GraphPath>> {
        self.inner.find_shortest_path(source, target).await
    }

    async fn find_all_paths(
        &self,
        source: &str,
        target: &str,
        max_depth: usize,
    ) -> Result<Vec<GraphPath>> {
        self.inner.find_all_paths(source, target, max_depth).await
    }

    async fn detect_communities(&self) -> Result<Vec<Community>> {
        self.inner.detect_communities().await
    }

    async fn summary_metrics(&self) -> Result<StoreMetrics> {
        self.inner.summary_metrics().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::NodeMetadata;
    use tempfile::TempDir;

    fn node(id: &str) -> DependencyNode {
        let mut node = DependencyNode::file(id, NodeMetadata::degraded());
        node.id = id.to_string();
        node
    }

    #[tokio::test]
    async fn missing_file_connects_empty() {
        let temp = TempDir::new().unwrap();
        let mut store = JsonFileStore::new(temp.path().join("absent.json"));

        store.connect().await.unwrap();
        let metrics = store.summary_metrics().await.unwrap();
        assert_eq!(metrics.node_count, 0);
    }

    #[tokio::test]
    async fn corrupt_file_connects_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("graph.json");
        std::fs::write(&path, "{not json").unwrap();

        let mut store = JsonFileStore::new(path);
        store.connect().await.unwrap();
        let metrics = store.summary_metrics().await.unwrap();
        assert_eq!(metrics.node_count, 0);
    }

    #[tokio::test]
    async fn round_trip_preserves_node_ids_and_edge_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("graph.json");

        let mut store = JsonFileStore::new(path.clone());
        store.connect().await.unwrap();
        store.add_node(node("a")).await.unwrap();
        store.add_node(node("b")).await.unwrap();
        store.add_edge(GraphEdge::import("a", "b")).await.unwrap();
        store.disconnect().await.unwrap();

        let mut fresh = JsonFileStore::new(path);
        fresh.connect().await.unwrap();

        let node_ids: std::collections::HashSet<String> =
            fresh.inner.nodes().into_iter().map(|n| n.id).collect();
        let edge_keys: std::collections::HashSet<String> =
            fresh.inner.edges().into_iter().map(|e| e.key()).collect();
        assert_eq!(node_ids, ["a", "b"].iter().map(|s| s.to_string()).collect());
        assert_eq!(edge_keys, ["a->b"].iter().map(|s| s.to_string()).collect());
    }

    #[tokio::test]
    async fn unknown_fields_in_document_are_tolerated() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("graph.json");
        std::fs::write(
            &path,
            r#"{
                "version": "1",
                "exported_at": "2025-01-01T00:00:00Z",
                "future_field": {"anything": true},
                "nodes": [],
                "edges": []
            }"#,
        )
        .unwrap();

        let mut store = JsonFileStore::new(path);
        store.connect().await.unwrap();
        let metrics = store.summary_metrics().await.unwrap();
        assert_eq!(metrics.node_count, 0);
    }

    #[test]
    fn persisted_document_carries_version_and_timestamp() {
        let document = PersistedGraph {
            version: FORMAT_VERSION.to_string(),
            exported_at: Utc::now(),
            nodes: vec![node("a")],
            edges: Vec::new(),
        };
        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["version"], "1");
        assert!(json["exported_at"].is_string());
        assert_eq!(json["nodes"][0]["id"], "a");
    }
}
