//! The graph store abstraction.
//!
//! One interface over interchangeable backends so analysis logic stays
//! backend-agnostic: node/edge CRUD, filtered queries, path search,
//! naive community detection, and summary metrics. A factory selects the
//! concrete backend from a configuration tag.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::{GordianError, Result};
use crate::graph::node::{DependencyNode, GraphEdge, NodeType};
use crate::store::json_file::JsonFileStore;
use crate::store::memory::MemoryGraphStore;
use crate::store::neo4j::Neo4jStore;

/// Filtered graph query.
///
/// Filters compose: node type, edge type, and property equality all apply;
/// `start` + `depth` restrict results to the traversal neighborhood of one
/// node; `limit` truncates the result set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphQuery {
    /// Only nodes of this type
    pub node_type: Option<NodeType>,
    /// Only edges of this type
    pub edge_type: Option<String>,
    /// Property-equality filters, matched against the node's serialized
    /// fields (top level or `metadata.*`)
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
    /// Traversal start node id
    pub start: Option<String>,
    /// Maximum traversal depth from `start` (edges followed outward)
    pub depth: Option<usize>,
    /// Maximum number of nodes returned
    pub limit: Option<usize>,
}

/// Result of a [`GraphQuery`]: matching nodes plus the edges between them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Matching nodes
    pub nodes: Vec<DependencyNode>,
    /// Edges whose endpoints are both in `nodes`
    pub edges: Vec<GraphEdge>,
}

/// One path through the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphPath {
    /// Node ids along the path, source first
    pub nodes: Vec<String>,
    /// Edge keys along the path
    pub edges: Vec<String>,
    /// Accumulated cost, `1 - edge.weight` per hop, so higher-weight edges
    /// are cheaper
    pub total_weight: f64,
}

/// A connected component of the graph.
///
/// Not modularity-based community detection: each undirected connected
/// component is one community.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    /// Stable community identifier within one detection run
    pub id: String,
    /// Node ids in this component
    pub members: Vec<String>,
    /// Component size
    pub size: usize,
}

/// Summary metrics over the stored graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreMetrics {
    /// Total nodes
    pub node_count: usize,
    /// Total edges
    pub edge_count: usize,
    /// Mean out-degree
    pub average_degree: f64,
    /// Edge count over the maximum possible directed edge count
    pub density: f64,
    /// Number of connected components
    pub community_count: usize,
}

/// Uniform interface over graph storage backends.
///
/// `connect` failures propagate as errors and are fatal for that backend
/// choice; the abstraction performs no automatic fallback.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Backend identifier used in logs and errors.
    fn backend_name(&self) -> &'static str;

    /// Open the backend (load persisted state, check connectivity).
    async fn connect(&mut self) -> Result<()>;

    /// Close the backend (persist state where applicable).
    async fn disconnect(&mut self) -> Result<()>;

    /// Insert or replace a node.
    async fn add_node(&mut self, node: DependencyNode) -> Result<()>;

    /// Remove a node and its incident edges. Unknown ids are a no-op.
    async fn remove_node(&mut self, id: &str) -> Result<()>;

    /// Insert an edge. Both endpoints must already exist.
    async fn add_edge(&mut self, edge: GraphEdge) -> Result<()>;

    /// Remove an edge by key. Unknown keys are a no-op.
    async fn remove_edge(&mut self, key: &str) -> Result<()>;

    /// Run a filtered query.
    async fn query(&self, query: &GraphQuery) -> Result<QueryResult>;

    /// Breadth-first shortest path. Returns `Ok(None)` when the endpoints
    /// are disconnected or unknown; never an error.
    async fn find_shortest_path(&self, source: &str, target: &str) -> Result<Option<GraphPath>>;

    /// Enumerate every simple path up to `max_depth` edges.
    async fn find_all_paths(
        &self,
        source: &str,
        target: &str,
        max_depth: usize,
    ) -> Result<Vec<GraphPath>>;

    /// Connected-components pass over the undirected graph.
    async fn detect_communities(&self) -> Result<Vec<Community>>;

    /// Summary metrics for the stored graph.
    async fn summary_metrics(&self) -> Result<StoreMetrics>;
}

/// Backend selection tag plus backend-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum StoreBackend {
    /// Volatile in-memory adjacency structure
    InMemory,
    /// In-memory semantics persisted to a JSON file across
    /// connect/disconnect boundaries
    JsonFile {
        /// Path of the persisted graph document
        path: PathBuf,
    },
    /// External graph database reached over its HTTP Cypher endpoint
    Neo4j {
        /// Base URI, e.g. `http://localhost:7474`
        uri: String,
        /// Basic-auth username
        username: String,
        /// Basic-auth password
        password: String,
        /// Database name, defaults to `neo4j`
        #[serde(default)]
        database: Option<String>,
    },
}

impl Default for StoreBackend {
    fn default() -> Self {
        Self::InMemory
    }
}

/// Graph store configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Selected backend and its settings
    #[serde(flatten)]
    pub backend: StoreBackend,
}

impl StoreConfig {
    /// Validate backend-specific settings.
    pub fn validate(&self) -> Result<()> {
        match &self.backend {
            StoreBackend::InMemory => Ok(()),
            StoreBackend::JsonFile { path } => {
                if path.as_os_str().is_empty() {
                    Err(GordianError::config_field(
                        "json-file backend requires a path",
                        "store.path",
                    ))
                } else {
                    Ok(())
                }
            }
            StoreBackend::Neo4j { uri, .. } => {
                if uri.is_empty() {
                    Err(GordianError::config_field(
                        "neo4j backend requires a uri",
                        "store.uri",
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Construct the concrete backend selected by `config`.
///
/// Calling code is written once against [`GraphStore`]; only this factory
/// knows the concrete types.
pub fn create_store(config: &StoreConfig) -> Result<Box<dyn GraphStore>> {
    config.validate()?;
    let store: Box<dyn GraphStore> = match &config.backend {
        StoreBackend::InMemory => Box::new(MemoryGraphStore::new()),
        StoreBackend::JsonFile { path } => Box::new(JsonFileStore::new(path.clone())),
        StoreBackend::Neo4j {
            uri,
            username,
            password,
            database,
        } => Box::new(Neo4jStore::new(
            uri.clone(),
            username.clone(),
            password.clone(),
            database.clone(),
        )),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_selects_backend_from_tag() {
        let config: StoreConfig = serde_yaml::from_str("backend: in-memory").unwrap();
        let store = create_store(&config).unwrap();
        assert_eq!(store.backend_name(), "in-memory");

        let config: StoreConfig =
            serde_yaml::from_str("backend: json-file\npath: /tmp/graph.json").unwrap();
        let store = create_store(&config).unwrap();
        assert_eq!(store.backend_name(), "json-file");

        let config: StoreConfig = serde_yaml::from_str(
            "backend: neo4j\nuri: http://localhost:7474\nusername: neo4j\npassword: secret",
        )
        .unwrap();
        let store = create_store(&config).unwrap();
        assert_eq!(store.backend_name(), "neo4j");
    }

    #[test]
    fn unknown_backend_tag_is_a_deserialization_error() {
        let parsed: std::result::Result<StoreConfig, _> = serde_yaml::from_str("backend: redis");
        assert!(parsed.is_err());
    }

    #[test]
    fn json_file_backend_requires_a_path() {
        let config = StoreConfig {
            backend: StoreBackend::JsonFile {
                path: PathBuf::new(),
            },
        };
        assert!(config.validate().is_err());
    }
}
