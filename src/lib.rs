//! # Gordian: Circular-Dependency Analysis Engine
//!
//! Gordian builds a directed import graph from a source tree, detects
//! circular dependencies, scores their severity and impact, and produces a
//! structured architecture-health report. This library provides:
//!
//! - **Graph Construction**: file discovery, import extraction, and
//!   dependency-graph building with per-file metadata heuristics
//! - **Cycle Detection**: depth-first back-edge detection with severity
//!   classification and templated resolution strategies
//! - **Graph Stores**: one query/persistence interface with in-memory,
//!   JSON-file, and Neo4j backends
//! - **Reporting**: health score, severity histogram, and a tiered
//!   resolution plan suitable for CLIs and dashboards
//!
//! ## Architecture
//!
//! ```text
//! Scanner → Extractor → Graph Builder → Cycle Detector → Report
//!                            │
//!                            └──→ Graph Store (memory | json-file | neo4j)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gordian::{GordianConfig, GordianEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut engine = GordianEngine::new(GordianConfig::default())?;
//!     let report = engine.analyze_directory("./src").await?;
//!
//!     println!(
//!         "health {} with {} cycles",
//!         report.health_score, report.total_cycles
//!     );
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]

// Core configuration and error types
pub mod core {
    //! Configuration and error handling shared across the crate.

    pub mod config;
    pub mod errors;
}

// Dependency graph construction and cycle analysis
pub mod graph {
    //! Dependency graph model, builder, and cycle detection.

    pub mod builder;
    pub mod cycles;
    pub mod node;

    pub use builder::GraphBuilder;
    pub use cycles::{CircularDependency, CycleDetector, ResolutionStrategy, Severity, Tier};
    pub use node::{
        node_id_for_path, DependencyGraph, DependencyNode, GraphEdge, GraphMetrics, NodeType,
    };
}

// Pluggable graph persistence and query backends
pub mod store {
    //! Graph store abstraction and its backends.

    pub mod json_file;
    pub mod memory;
    pub mod neo4j;

    mod interface;
    pub use interface::{
        create_store, Community, GraphPath, GraphQuery, GraphStore, QueryResult, StoreBackend,
        StoreConfig, StoreMetrics,
    };
    pub use json_file::JsonFileStore;
    pub use memory::MemoryGraphStore;
    pub use neo4j::Neo4jStore;
}

// Report generation
pub mod io {
    //! Structured report generation.

    pub mod reports;
}

// High-level analysis engine
pub mod engine;

// Re-export primary types for convenience
pub use crate::core::config::GordianConfig;
pub use crate::core::errors::{GordianError, Result};
pub use crate::engine::GordianEngine;
pub use crate::io::reports::AnalysisReport;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
