//! Circular-dependency detection and classification.
//!
//! The detector performs a depth-first traversal over the dependency graph
//! carrying the current path plus a constant-time "on current path" set.
//! Reaching a node already on the recursion stack marks a back-edge; the
//! sub-path from that node's first occurrence to the current position is
//! materialized as one [`CircularDependency`] with severity, impact scores,
//! and a templated resolution strategy.
//!
//! A node is globally visited the first time any traversal reaches it and
//! is never re-entered, preserving the first-cycle-per-node detection
//! behavior of the original analyzer (see DESIGN.md). Detected cycles are
//! deduplicated by their normalized id.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::node::{DependencyGraph, NodeType};

/// Coarse four-level classification of how concerning a cycle is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Short cycle through unimportant files
    Low,
    /// Typical two-node cycle
    Medium,
    /// Longer cycle or important files involved
    High,
    /// Long cycle or cycle through critical files
    Critical,
}

impl Severity {
    /// Stable lowercase label, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Classify from cycle length and mean involved-node importance.
    pub fn classify(length: usize, avg_importance: f64) -> Self {
        if length >= 5 || avg_importance > 0.8 {
            Self::Critical
        } else if length >= 3 || avg_importance > 0.6 {
            Self::High
        } else if length >= 2 || avg_importance > 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Independent 0-1 impact scores for one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactScores {
    /// Impact on incremental build times
    pub build_time: f64,
    /// Impact on runtime behavior (initialization order, lazy loading)
    pub runtime: f64,
    /// Impact on the ability to reason about modules independently
    pub maintainability: f64,
    /// Impact on isolating modules under test
    pub testability: f64,
}

impl ImpactScores {
    /// Each dimension saturates at 1.0: `min(1, length * coefficient * importance)`.
    /// Maintainability carries the highest coefficient because cycles most
    /// directly impede independent reasoning about modules.
    pub fn from_cycle(length: usize, avg_importance: f64) -> Self {
        let scaled = |coefficient: f64| (length as f64 * coefficient * avg_importance).min(1.0);
        Self {
            build_time: scaled(0.2),
            runtime: scaled(0.15),
            maintainability: scaled(0.3),
            testability: scaled(0.25),
        }
    }
}

/// Named refactoring approach recommended for breaking a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    /// Introduce a shared interface both sides depend on
    ExtractInterface,
    /// Invert one edge by injecting the dependency at construction time
    DependencyInjection,
    /// Replace a direct call edge with emitted events
    EventDriven,
    /// Put a facade in front of one side of the cycle
    Facade,
    /// Restructure the modules into layers with one dependency direction
    Restructure,
}

impl ResolutionStrategy {
    /// Stable kebab-case label, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractInterface => "extract-interface",
            Self::DependencyInjection => "dependency-injection",
            Self::EventDriven => "event-driven",
            Self::Facade => "facade",
            Self::Restructure => "restructure",
        }
    }

    /// Hand-authored remediation steps for this strategy.
    pub fn steps(&self) -> Vec<String> {
        let steps: &[&str] = match self {
            Self::ExtractInterface => &[
                "Identify the symbols each side of the cycle actually uses from the other",
                "Move those symbols into a new shared interface/types module",
                "Point both original modules at the shared module",
                "Delete the direct imports between the two original modules",
            ],
            Self::DependencyInjection => &[
                "Pick the edge of the cycle that is easiest to invert",
                "Define the callee's surface as a parameter (constructor argument or function input)",
                "Pass the implementation in from the composition root",
                "Remove the now-unused direct import",
            ],
            Self::EventDriven => &[
                "Identify the call that closes the cycle",
                "Replace the direct call with an emitted event",
                "Subscribe the former callee to the event at startup",
                "Remove the import that carried the direct call",
            ],
            Self::Facade => &[
                "Create a facade module exposing the subset of the API the cycle needs",
                "Route one side of the cycle through the facade",
                "Keep the facade free of imports back into the cycle",
            ],
            Self::Restructure => &[
                "Map which responsibilities belong to which layer",
                "Extract shared lower-level code into its own module",
                "Re-point the cycle members at the extracted module",
                "Consider event-driven decoupling or a facade layer for the remaining edges",
            ],
        };
        steps.iter().map(|s| s.to_string()).collect()
    }

    /// Illustrative code-shape snippets for this strategy.
    pub fn examples(&self) -> Vec<String> {
        let examples: &[&str] = match self {
            Self::ExtractInterface => &[
                "// shared/types.ts\nexport interface UserLike { id: string }",
                "// a.ts and b.ts both: import { UserLike } from './shared/types';",
            ],
            Self::DependencyInjection => &[
                "export function makeService(notifier: Notifier) { /* ... */ }",
            ],
            Self::EventDriven => &["bus.emit('user-created', user); // instead of importing the handler"],
            Self::Facade => &["// facade.ts\nexport { loadUser } from './internal/user';"],
            Self::Restructure => &[
                "// before: a <-> b;  after: a -> shared <- b",
            ],
        };
        examples.iter().map(|s| s.to_string()).collect()
    }
}

/// Effort or risk tier attached to a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Hours of work, local change
    Low,
    /// A day or two, touches a handful of modules
    Medium,
    /// Multi-day restructuring
    High,
}

/// Chosen strategy plus effort/risk tiers and templated remediation content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    /// Selected refactoring approach
    pub strategy: ResolutionStrategy,
    /// Estimated effort tier
    pub effort: Tier,
    /// Estimated risk tier
    pub risk: Tier,
    /// Ordered remediation steps
    pub steps: Vec<String>,
    /// Illustrative code-shape snippets
    pub examples: Vec<String>,
}

impl Resolution {
    fn new(strategy: ResolutionStrategy, effort: Tier, risk: Tier) -> Self {
        Self {
            strategy,
            effort,
            risk,
            steps: strategy.steps(),
            examples: strategy.examples(),
        }
    }

    /// Deterministic dispatch on cycle shape.
    ///
    /// Length-2 cycles get the minimal fix; cycles through interface/type
    /// nodes are broken by extracting the shared declarations; long cycles
    /// need restructuring; everything else inverts one edge via injection.
    pub fn select(length: usize, node_types: &BTreeSet<NodeType>) -> Self {
        if length == 2 {
            Self::new(ResolutionStrategy::ExtractInterface, Tier::Low, Tier::Low)
        } else if node_types.contains(&NodeType::Interface) || node_types.contains(&NodeType::Type)
        {
            Self::new(
                ResolutionStrategy::ExtractInterface,
                Tier::Medium,
                Tier::Medium,
            )
        } else if length > 3 {
            Self::new(ResolutionStrategy::Restructure, Tier::High, Tier::High)
        } else {
            Self::new(
                ResolutionStrategy::DependencyInjection,
                Tier::Medium,
                Tier::Medium,
            )
        }
    }
}

/// Denormalized cycle facts for reporting convenience.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleMetadata {
    /// Cycle length (number of distinct nodes on the cycle)
    pub length: usize,
    /// Distinct node types involved
    pub node_types: Vec<NodeType>,
    /// File paths of the cycle members, in cycle order
    pub file_paths: Vec<String>,
}

/// One detected circular dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircularDependency {
    /// Normalized id: the cycle's node-id sequence rotated so the
    /// lexicographically smallest id is first, joined with `->`. Stable
    /// across runs, so the same structural cycle can be diffed run to run.
    pub id: String,
    /// Ordered node ids forming the cycle; the last element closes back to
    /// the first
    pub cycle: Vec<String>,
    /// Severity classification
    pub severity: Severity,
    /// Four-dimension impact scores
    pub impact: ImpactScores,
    /// Recommended resolution
    pub resolution: Resolution,
    /// Denormalized reporting metadata
    pub metadata: CycleMetadata,
}

/// Normalize a cycle id: rotate so the lexicographically smallest node id
/// comes first, then join with `->`.
pub fn normalized_cycle_id(cycle: &[String]) -> String {
    if cycle.is_empty() {
        return String::new();
    }
    let pivot = cycle
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut rotated = Vec::with_capacity(cycle.len());
    rotated.extend_from_slice(&cycle[pivot..]);
    rotated.extend_from_slice(&cycle[..pivot]);
    rotated.join("->")
}

/// Depth-first cycle detector over a [`DependencyGraph`].
#[derive(Debug, Default)]
pub struct CycleDetector;

impl CycleDetector {
    /// Create a new detector.
    pub fn new() -> Self {
        Self
    }

    /// Find cycles reachable from every unvisited node, in graph iteration
    /// order. Never fails: dangling dependency ids are treated as "no
    /// further edges" and skipped.
    pub fn detect(&self, graph: &DependencyGraph) -> Vec<CircularDependency> {
        let mut visited = HashSet::new();
        let mut seen_ids = HashSet::new();
        let mut cycles = Vec::new();

        let start_nodes: Vec<String> = graph.nodes.keys().cloned().collect();
        for start in start_nodes {
            if visited.contains(&start) {
                continue;
            }
            let mut on_path = HashSet::new();
            let mut path = Vec::new();
            self.dfs(
                graph,
                &start,
                &mut visited,
                &mut on_path,
                &mut path,
                &mut seen_ids,
                &mut cycles,
            );
        }

        debug!(cycle_count = cycles.len(), "cycle detection completed");
        cycles
    }

    #[allow(clippy::too_many_arguments)]
    fn dfs(
        &self,
        graph: &DependencyGraph,
        node_id: &str,
        visited: &mut HashSet<String>,
        on_path: &mut HashSet<String>,
        path: &mut Vec<String>,
        seen_ids: &mut HashSet<String>,
        cycles: &mut Vec<CircularDependency>,
    ) {
        // Dangling ids (fallback resolutions to files that were never
        // discovered) have no node entry and therefore no further edges.
        let Some(node) = graph.nodes.get(node_id) else {
            return;
        };

        visited.insert(node_id.to_string());
        on_path.insert(node_id.to_string());
        path.push(node_id.to_string());

        for dep in &node.dependencies {
            if on_path.contains(dep) {
                // Back-edge: the sub-path from the first occurrence of the
                // target to the current node is one cycle. Do not descend
                // through the back-edge.
                if let Some(pos) = path.iter().position(|p| p == dep) {
                    let cycle: Vec<String> = path[pos..].to_vec();
                    let record = materialize_cycle(graph, cycle);
                    if seen_ids.insert(record.id.clone()) {
                        cycles.push(record);
                    }
                }
            } else if !visited.contains(dep) {
                self.dfs(graph, dep, visited, on_path, path, seen_ids, cycles);
            }
        }

        path.pop();
        on_path.remove(node_id);
    }
}

/// Build the full [`CircularDependency`] record for a raw cycle path.
fn materialize_cycle(graph: &DependencyGraph, cycle: Vec<String>) -> CircularDependency {
    let members: Vec<_> = cycle.iter().filter_map(|id| graph.nodes.get(id)).collect();

    let avg_importance = if members.is_empty() {
        0.0
    } else {
        members.iter().map(|n| n.metadata.importance).sum::<f64>() / members.len() as f64
    };

    let length = cycle.len();
    let node_types: BTreeSet<NodeType> = members.iter().map(|n| n.node_type).collect();
    let file_paths: Vec<String> = members.iter().map(|n| n.path.clone()).collect();

    CircularDependency {
        id: normalized_cycle_id(&cycle),
        severity: Severity::classify(length, avg_importance),
        impact: ImpactScores::from_cycle(length, avg_importance),
        resolution: Resolution::select(length, &node_types),
        metadata: CycleMetadata {
            length,
            node_types: node_types.into_iter().collect(),
            file_paths,
        },
        cycle,
    }
}
