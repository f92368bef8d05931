//! Neo4j graph store backend.
//!
//! A thin adapter expressing the store operations as Cypher statements
//! sent to Neo4j's HTTP transactional-commit endpoint. Connectivity
//! failures propagate as errors from [`GraphStore::connect`]; callers
//! treat them as fatal for this backend choice, and the abstraction
//! performs no fallback to another backend.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::core::errors::{GordianError, Result};
use crate::graph::node::{DependencyNode, GraphEdge, NodeMetadata, NodeType};
use crate::store::interface::{
    Community, GraphPath, GraphQuery, GraphStore, QueryResult, StoreMetrics,
};

const NODE_LABEL: &str = "CodeNode";
const EDGE_LABEL: &str = "DEPENDS_ON";

/// One Cypher statement plus its parameters.
#[derive(Debug, Clone)]
pub struct CypherStatement {
    /// Statement text
    pub statement: String,
    /// Named parameters
    pub parameters: Value,
}

impl CypherStatement {
    fn new(statement: impl Into<String>, parameters: Value) -> Self {
        Self {
            statement: statement.into(),
            parameters,
        }
    }
}

/// External graph database backend.
#[derive(Debug)]
pub struct Neo4jStore {
    uri: String,
    username: String,
    password: String,
    database: String,
    client: reqwest::Client,
}

impl Neo4jStore {
    /// Create an adapter for the given endpoint. No network traffic
    /// happens until [`GraphStore::connect`].
    pub fn new(
        uri: String,
        username: String,
        password: String,
        database: Option<String>,
    ) -> Self {
        Self {
            uri,
            username,
            password,
            database: database.unwrap_or_else(|| "neo4j".to_string()),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/db/{}/tx/commit",
            self.uri.trim_end_matches('/'),
            self.database
        )
    }

    /// Run a batch of statements in one transaction and return the raw
    /// response document.
    async fn run(&self, statements: Vec<CypherStatement>) -> Result<Value> {
        let body = json!({
            "statements": statements
                .iter()
                .map(|s| json!({ "statement": s.statement, "parameters": s.parameters }))
                .collect::<Vec<_>>(),
        });

        debug!(endpoint = %self.endpoint(), count = statements.len(), "sending cypher batch");

        let response = self
            .client
            .post(self.endpoint())
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| GordianError::store_with_source("neo4j", "request failed", e))?;

        if !response.status().is_success() {
            return Err(GordianError::store(
                "neo4j",
                format!("endpoint returned HTTP {}", response.status()),
            ));
        }

        let document: Value = response
            .json()
            .await
            .map_err(|e| GordianError::store_with_source("neo4j", "invalid response body", e))?;

        if let Some(errors) = document.get("errors").and_then(Value::as_array) {
            if let Some(first) = errors.first() {
                return Err(GordianError::store(
                    "neo4j",
                    format!(
                        "{}: {}",
                        first.get("code").and_then(Value::as_str).unwrap_or("error"),
                        first.get("message").and_then(Value::as_str).unwrap_or(""),
                    ),
                ));
            }
        }

        Ok(document)
    }

    /// Extract the rows of one result in the response document.
    fn rows(document: &Value, result_index: usize) -> Vec<Vec<Value>> {
        document
            .get("results")
            .and_then(Value::as_array)
            .and_then(|results| results.get(result_index))
            .and_then(|result| result.get("data"))
            .and_then(Value::as_array)
            .map(|data| {
                data.iter()
                    .filter_map(|entry| entry.get("row").and_then(Value::as_array).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fetch the full undirected adjacency (for the community pass).
    async fn fetch_adjacency(&self) -> Result<(Vec<String>, Vec<(String, String)>)> {
        let document = self
            .run(vec![
                CypherStatement::new(format!("MATCH (n:{NODE_LABEL}) RETURN n.id"), json!({})),
                CypherStatement::new(
                    format!("MATCH (a:{NODE_LABEL})-[:{EDGE_LABEL}]->(b:{NODE_LABEL}) RETURN a.id, b.id"),
                    json!({}),
                ),
            ])
            .await?;

        let ids = Self::rows(&document, 0)
            .into_iter()
            .filter_map(|row| row.first().and_then(Value::as_str).map(String::from))
            .collect();
        let pairs = Self::rows(&document, 1)
            .into_iter()
            .filter_map(|row| {
                let a = row.first().and_then(Value::as_str)?;
                let b = row.get(1).and_then(Value::as_str)?;
                Some((a.to_string(), b.to_string()))
            })
            .collect();
        Ok((ids, pairs))
    }
}

/// Flatten a node into primitive Neo4j properties.
pub fn node_to_props(node: &DependencyNode) -> Value {
    json!({
        "id": node.id,
        "path": node.path,
        "name": node.name,
        "type": node.node_type.as_str(),
        "dependencies": node.dependencies,
        "dependents": node.dependents,
        "size": node.metadata.size,
        "complexity": node.metadata.complexity,
        "last_modified": node.metadata.last_modified.to_rfc3339(),
        "importance": node.metadata.importance,
        "stability": node.metadata.stability,
    })
}

/// Rebuild a node from flattened properties, tolerating missing fields.
pub fn node_from_props(props: &Value) -> Result<DependencyNode> {
    let text = |key: &str| {
        props
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let list = |key: &str| -> Vec<String> {
        props
            .get(key)
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    };

    let id = text("id");
    if id.is_empty() {
        return Err(GordianError::store("neo4j", "node row is missing an id"));
    }

    let node_type: NodeType =
        serde_json::from_value(props.get("type").cloned().unwrap_or(json!("file")))
            .unwrap_or(NodeType::File);
    let last_modified = props
        .get("last_modified")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Ok(DependencyNode {
        id,
        path: text("path"),
        name: text("name"),
        node_type,
        dependencies: list("dependencies"),
        dependents: list("dependents"),
        metadata: NodeMetadata {
            size: props.get("size").and_then(Value::as_u64).unwrap_or(0),
            complexity: props.get("complexity").and_then(Value::as_u64).unwrap_or(0) as u32,
            last_modified,
            importance: props.get("importance").and_then(Value::as_f64).unwrap_or(0.0),
            stability: props.get("stability").and_then(Value::as_f64).unwrap_or(0.0),
        },
    })
}

/// Build the node-query statement for a filtered [`GraphQuery`].
pub fn build_query_statement(query: &GraphQuery) -> CypherStatement {
    let mut parameters = serde_json::Map::new();
    let mut conditions = Vec::new();

    let pattern = match (&query.start, query.depth) {
        (Some(start), depth) => {
            parameters.insert("start".to_string(), json!(start));
            let bound = depth.map(|d| d.to_string()).unwrap_or_default();
            format!(
                "MATCH (s:{NODE_LABEL} {{id: $start}})-[:{EDGE_LABEL}*0..{bound}]->(n:{NODE_LABEL})"
            )
        }
        (None, _) => format!("MATCH (n:{NODE_LABEL})"),
    };

    if let Some(node_type) = query.node_type {
        parameters.insert("node_type".to_string(), json!(node_type.as_str()));
        conditions.push("n.type = $node_type".to_string());
    }
    for (index, (key, value)) in query.properties.iter().enumerate() {
        let param = format!("prop_{index}");
        let field = key.strip_prefix("metadata.").unwrap_or(key);
        conditions.push(format!("n.{field} = ${param}"));
        parameters.insert(param, value.clone());
    }

    let mut statement = pattern;
    if !conditions.is_empty() {
        statement.push_str(" WHERE ");
        statement.push_str(&conditions.join(" AND "));
    }
    statement.push_str(" RETURN DISTINCT properties(n)");
    if let Some(limit) = query.limit {
        statement.push_str(&format!(" LIMIT {limit}"));
    }

    CypherStatement::new(statement, Value::Object(parameters))
}

#[async_trait]
impl GraphStore for Neo4jStore {
    fn backend_name(&self) -> &'static str {
        "neo4j"
    }

    async fn connect(&mut self) -> Result<()> {
        self.run(vec![CypherStatement::new("RETURN 1", json!({}))])
            .await?;
        info!(endpoint = %self.endpoint(), "connected to neo4j");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        // The transactional endpoint is stateless per request.
        Ok(())
    }

    async fn add_node(&mut self, node: DependencyNode) -> Result<()> {
        self.run(vec![CypherStatement::new(
            format!("MERGE (n:{NODE_LABEL} {{id: $id}}) SET n = $props"),
            json!({ "id": node.id, "props": node_to_props(&node) }),
        )])
        .await?;
        Ok(())
    }

    async fn remove_node(&mut self, id: &str) -> Result<()> {
        self.run(vec![CypherStatement::new(
            format!("MATCH (n:{NODE_LABEL} {{id: $id}}) DETACH DELETE n"),
            json!({ "id": id }),
        )])
        .await?;
        Ok(())
    }

    async fn add_edge(&mut self, edge: GraphEdge) -> Result<()> {
        self.run(vec![CypherStatement::new(
            format!(
                "MATCH (a:{NODE_LABEL} {{id: $source}}), (b:{NODE_LABEL} {{id: $target}}) \
                 MERGE (a)-[r:{EDGE_LABEL} {{key: $key}}]->(b) \
                 SET r.type = $type, r.weight = $weight"
            ),
            json!({
                "source": edge.source,
                "target": edge.target,
                "key": edge.key(),
                "type": edge.edge_type,
                "weight": edge.weight,
            }),
        )])
        .await?;
        Ok(())
    }

    async fn remove_edge(&mut self, key: &str) -> Result<()> {
        self.run(vec![CypherStatement::new(
            format!("MATCH ()-[r:{EDGE_LABEL} {{key: $key}}]->() DELETE r"),
            json!({ "key": key }),
        )])
        .await?;
        Ok(())
    }

    async fn query(&self, query: &GraphQuery) -> Result<QueryResult> {
        let document = self.run(vec![build_query_statement(query)]).await?;

        let mut nodes = Vec::new();
        for row in Self::rows(&document, 0) {
            if let Some(props) = row.first() {
                nodes.push(node_from_props(props)?);
            }
        }

        let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let edges_document = self
            .run(vec![CypherStatement::new(
                format!(
                    "MATCH (a:{NODE_LABEL})-[r:{EDGE_LABEL}]->(b:{NODE_LABEL}) \
                     WHERE a.id IN $ids AND b.id IN $ids \
                     RETURN a.id, b.id, r.type, r.weight"
                ),
                json!({ "ids": ids }),
            )])
            .await?;

        let mut edges = Vec::new();
        for row in Self::rows(&edges_document, 0) {
            let (Some(source), Some(target)) = (
                row.first().and_then(Value::as_str),
                row.get(1).and_then(Value::as_str),
            ) else {
                continue;
            };
            let edge_type = row
                .get(2)
                .and_then(Value::as_str)
                .unwrap_or("import")
                .to_string();
            if let Some(wanted) = &query.edge_type {
                if &edge_type != wanted {
                    continue;
                }
            }
            edges.push(GraphEdge {
                source: source.to_string(),
                target: target.to_string(),
                edge_type,
                weight: row.get(3).and_then(Value::as_f64).unwrap_or(1.0),
            });
        }

        Ok(QueryResult { nodes, edges })
    }

    async fn find_shortest_path(&self, source: &str, target: &str) -> Result<Option<GraphPath>> {
        let document = self
            .run(vec![CypherStatement::new(
                format!(
                    "MATCH (a:{NODE_LABEL} {{id: $source}}), (b:{NODE_LABEL} {{id: $target}}) \
                     MATCH p = shortestPath((a)-[:{EDGE_LABEL}*1..]->(b)) \
                     RETURN [n IN nodes(p) | n.id], \
                            [r IN relationships(p) | r.key], \
                            reduce(w = 0.0, r IN relationships(p) | w + (1.0 - r.weight))"
                ),
                json!({ "source": source, "target": target }),
            )])
            .await?;

        // A missing endpoint makes the MATCH produce no rows, which is the
        // "no path" outcome, not an error.
        let rows = Self::rows(&document, 0);
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        Ok(Some(parse_path_row(row)))
    }

    async fn find_all_paths(
        &self,
        source: &str,
        target: &str,
        max_depth: usize,
    ) -> Result<Vec<GraphPath>> {
        let document = self
            .run(vec![CypherStatement::new(
                format!(
                    "MATCH p = (a:{NODE_LABEL} {{id: $source}})-[:{EDGE_LABEL}*1..{max_depth}]->\
                     (b:{NODE_LABEL} {{id: $target}}) \
                     WHERE ALL(n IN nodes(p) WHERE single(m IN nodes(p) WHERE m = n)) \
                     RETURN [n IN nodes(p) | n.id], \
                            [r IN relationships(p) | r.key], \
                            reduce(w = 0.0, r IN relationships(p) | w + (1.0 - r.weight))"
                ),
                json!({ "source": source, "target": target }),
            )])
            .await?;

        Ok(Self::rows(&document, 0)
            .iter()
            .map(|row| parse_path_row(row))
            .collect())
    }

    async fn detect_communities(&self) -> Result<Vec<Community>> {
        let (ids, pairs) = self.fetch_adjacency().await?;

        let mut neighbors: HashMap<&str, Vec<&str>> = HashMap::new();
        for (a, b) in &pairs {
            neighbors.entry(a.as_str()).or_default().push(b.as_str());
            neighbors.entry(b.as_str()).or_default().push(a.as_str());
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut communities = Vec::new();
        for id in &ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            let mut members = Vec::new();
            let mut stack = vec![id.as_str()];
            while let Some(current) = stack.pop() {
                members.push(current.to_string());
                for &next in neighbors.get(current).into_iter().flatten() {
                    if seen.insert(next) {
                        stack.push(next);
                    }
                }
            }
            communities.push(Community {
                id: format!("community-{}", communities.len()),
                size: members.len(),
                members,
            });
        }
        Ok(communities)
    }

    async fn summary_metrics(&self) -> Result<StoreMetrics> {
        let document = self
            .run(vec![
                CypherStatement::new(format!("MATCH (n:{NODE_LABEL}) RETURN count(n)"), json!({})),
                CypherStatement::new(
                    format!("MATCH ()-[r:{EDGE_LABEL}]->() RETURN count(r)"),
                    json!({}),
                ),
            ])
            .await?;

        let count_at = |index: usize| {
            Self::rows(&document, index)
                .first()
                .and_then(|row| row.first())
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize
        };
        let node_count = count_at(0);
        let edge_count = count_at(1);

        Ok(StoreMetrics {
            node_count,
            edge_count,
            average_degree: if node_count == 0 {
                0.0
            } else {
                edge_count as f64 / node_count as f64
            },
            density: if node_count < 2 {
                0.0
            } else {
                edge_count as f64 / (node_count as f64 * (node_count as f64 - 1.0))
            },
            community_count: self.detect_communities().await?.len(),
        })
    }
}

fn parse_path_row(row: &[Value]) -> GraphPath {
    let strings = |value: Option<&Value>| -> Vec<String> {
        value
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    };
    GraphPath {
        nodes: strings(row.first()),
        edges: strings(row.get(1)),
        total_weight: row.get(2).and_then(Value::as_f64).unwrap_or(0.0),
    }
}
