//! Dependency graph construction from a source tree.
//!
//! The builder walks a root directory, filters to configured source
//! extensions while skipping excluded directories, extracts import
//! statements line by line, resolves relative specifiers against the set
//! of discovered files, and produces a complete [`DependencyGraph`].
//!
//! Failures degrade locally: an unreadable subtree is skipped with a
//! warning, and an unreadable file becomes a node with no outgoing edges
//! and default-low metadata. The build itself only fails on invalid input
//! (nonexistent root).

use std::collections::HashMap;
use std::path::{Component, Path};

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::config::AnalysisConfig;
use crate::core::errors::{GordianError, Result};
use crate::graph::node::{
    node_id_for_path, DependencyGraph, DependencyNode, GraphEdge, NodeMetadata,
};

/// Static import-from: `import { x } from './y'`, `import x from "./y"`.
static STATIC_IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"import\s+[^'"]*?from\s+['"]([^'"]+)['"]"#).unwrap());

/// Dynamic import: `import('./y')`.
static DYNAMIC_IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"import\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());

/// CommonJS require: `require('./y')`.
static REQUIRE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());

/// Branching keywords counted for the complexity heuristic.
static BRANCH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:if|for|while|switch|case|try|catch)\b").unwrap());

/// Exported symbols counted for the importance heuristic.
static EXPORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bexport\b").unwrap());

/// Candidate suffixes tried, in order, when resolving a relative import.
const RESOLVE_SUFFIXES: [&str; 8] = [
    "", ".ts", ".tsx", ".js", ".jsx", "/index.ts", "/index.tsx", "/index.js",
];

/// Builds a [`DependencyGraph`] from a root directory.
#[derive(Debug)]
pub struct GraphBuilder {
    config: AnalysisConfig,
    exclude_globs: Option<GlobSet>,
}

impl GraphBuilder {
    /// Create a builder, compiling the configured exclude globs.
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let exclude_globs = compile_globset(&config.exclude_patterns)?;
        Ok(Self {
            config: config.clone(),
            exclude_globs,
        })
    }

    /// Build the full graph for `root`: discover files, analyze each, then
    /// link edges and back-fill dependents in a second pass.
    pub fn build(&self, root: &Path) -> Result<DependencyGraph> {
        if !root.exists() {
            return Err(GordianError::validation(format!(
                "analysis root does not exist: {}",
                root.display()
            )));
        }

        let files = self.discover(root);
        info!(count = files.len(), root = %root.display(), "discovered source files");

        // First pass: every discovered path gets an id before any import is
        // resolved, so resolution can check membership in this scan.
        let known: HashMap<String, String> = files
            .iter()
            .map(|path| (path.clone(), node_id_for_path(path)))
            .collect();

        let mut graph = DependencyGraph::new();
        for path in &files {
            let node = self.analyze_file(path, &known);
            graph.insert_node(node);
        }

        // Second pass: edges only for dependencies that resolved to a node
        // discovered in this scan. Dangling fallback ids stay in the
        // dependency list but produce no edge.
        let mut links = Vec::new();
        for node in graph.nodes.values() {
            for dep in &node.dependencies {
                if graph.nodes.contains_key(dep) {
                    links.push((node.id.clone(), dep.clone()));
                }
            }
        }
        for (source, target) in links {
            graph.insert_edge(GraphEdge::import(source, target));
        }

        info!(
            nodes = graph.metrics.node_count,
            edges = graph.metrics.edge_count,
            "dependency graph built"
        );
        Ok(graph)
    }

    /// Walk the root, returning normalized path strings for every source
    /// file. Traversal errors are logged and the affected subtree skipped.
    fn discover(&self, root: &Path) -> Vec<String> {
        let mut files = Vec::new();

        let mut walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                if entry.file_type().is_dir() {
                    if let Some(name) = entry.file_name().to_str() {
                        if entry.depth() > 0 && self.config.is_excluded_dir(name) {
                            return false;
                        }
                    }
                }
                true
            });

        loop {
            match walker.next() {
                None => break,
                Some(Err(err)) => {
                    warn!("skipping unreadable path during scan: {err}");
                }
                Some(Ok(entry)) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let path = entry.path();
                    let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
                        continue;
                    };
                    if !self.config.is_source_extension(extension) {
                        continue;
                    }
                    if let Some(globs) = &self.exclude_globs {
                        if globs.is_match(path) {
                            debug!(path = %path.display(), "excluded by glob pattern");
                            continue;
                        }
                    }
                    if let Ok(metadata) = entry.metadata() {
                        if metadata.len() > self.config.max_file_size_bytes {
                            debug!(path = %path.display(), "skipping oversized file");
                            continue;
                        }
                    }
                    files.push(normalize_path(path));
                }
            }
        }

        files.sort();
        files
    }

    /// Analyze one file into a node: metadata heuristics plus resolved
    /// dependency ids. Read failures degrade to a default-metadata node.
    fn analyze_file(&self, path_str: &str, known: &HashMap<String, String>) -> DependencyNode {
        let path = Path::new(path_str);

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %path.display(), "failed to read file, using degraded node: {err}");
                return DependencyNode::file(path_str, NodeMetadata::degraded());
            }
        };

        let (size, last_modified) = match std::fs::metadata(path) {
            Ok(meta) => (
                meta.len(),
                meta.modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now()),
            ),
            Err(_) => (content.len() as u64, Utc::now()),
        };

        let metadata = NodeMetadata {
            size,
            complexity: complexity_of(&content),
            last_modified,
            importance: importance_of(path_str, &content),
            stability: stability_of(last_modified),
        };

        let mut node = DependencyNode::file(path_str, metadata);
        for specifier in extract_imports(&content) {
            if let Some(id) = resolve_import(path, &specifier, known) {
                node.dependencies.push(id);
            }
        }
        node
    }
}

/// Extract import specifiers line by line using the three supported
/// syntaxes: static import-from, dynamic `import(...)`, `require(...)`.
pub fn extract_imports(content: &str) -> Vec<String> {
    let mut specifiers = Vec::new();
    for line in content.lines() {
        for re in [&*STATIC_IMPORT_RE, &*DYNAMIC_IMPORT_RE, &*REQUIRE_RE] {
            for captures in re.captures_iter(line) {
                if let Some(m) = captures.get(1) {
                    specifiers.push(m.as_str().to_string());
                }
            }
        }
    }
    specifiers
}

/// Resolve an import specifier to a node id.
///
/// Relative specifiers are joined to the importer's directory and tried
/// with candidate suffixes against the discovered-file set; if none match,
/// the raw joined path becomes a fallback id that may correspond to no
/// real node. Non-relative specifiers are external and yield `None`.
pub fn resolve_import(
    importer: &Path,
    specifier: &str,
    known: &HashMap<String, String>,
) -> Option<String> {
    if !specifier.starts_with('.') {
        return None;
    }

    let base = importer.parent().unwrap_or_else(|| Path::new(""));
    let joined = normalize_path(&base.join(specifier));

    for suffix in RESOLVE_SUFFIXES {
        let candidate = format!("{joined}{suffix}");
        if let Some(id) = known.get(&candidate) {
            return Some(id.clone());
        }
    }

    Some(node_id_for_path(&joined))
}

/// Lexically normalize a path: drop `.` segments, fold `..` into the
/// parent, and join with `/`. Purely textual, so it works for paths that
/// do not exist on disk (fallback import targets).
pub fn normalize_path(path: &Path) -> String {
    let mut absolute = false;
    let mut parts: Vec<String> = Vec::new();

    for component in path.components() {
        match component {
            Component::RootDir => absolute = true,
            Component::CurDir => {}
            Component::ParentDir => {
                if !parts.is_empty() && parts.last().map(String::as_str) != Some("..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..".to_string());
                }
            }
            Component::Normal(segment) => parts.push(segment.to_string_lossy().into_owned()),
            Component::Prefix(prefix) => {
                parts.push(prefix.as_os_str().to_string_lossy().into_owned())
            }
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Count branching-keyword occurrences across the file.
fn complexity_of(content: &str) -> u32 {
    BRANCH_RE.find_iter(content).count() as u32
}

/// Importance heuristic: base 0.1, plus entry-point, service/API, and UI
/// hints from the path, plus up to 0.3 scaled by exported-symbol count,
/// capped at 1.0.
fn importance_of(path: &str, content: &str) -> f64 {
    let mut score: f64 = 0.1;

    let stem = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let lower_path = path.to_ascii_lowercase();

    if stem == "index" || stem == "main" {
        score += 0.3;
    }
    if lower_path.contains("service") || lower_path.contains("api") {
        score += 0.2;
    }
    if lower_path.contains("component") {
        score += 0.1;
    }

    let exports = EXPORT_RE.find_iter(content).count();
    score += (exports as f64 * 0.03).min(0.3);

    score.min(1.0)
}

/// Stability heuristic: younger files score lower.
fn stability_of(last_modified: DateTime<Utc>) -> f64 {
    let age_days = Utc::now()
        .signed_duration_since(last_modified)
        .num_days()
        .max(0);
    match age_days {
        0..=6 => 0.2,
        7..=29 => 0.5,
        30..=89 => 0.8,
        _ => 1.0,
    }
}

fn compile_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            GordianError::config_field(
                format!("invalid exclude pattern '{pattern}': {e}"),
                "analysis.exclude_patterns",
            )
        })?;
        builder.add(glob);
    }
    let set = builder
        .build()
        .map_err(|e| GordianError::config(format!("failed to compile exclude patterns: {e}")))?;
    Ok(Some(set))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn builder() -> GraphBuilder {
        GraphBuilder::new(&AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn extracts_all_three_import_syntaxes() {
        let content = r#"
import { login } from './auth';
import type { User } from "./types";
const lazy = import('./lazy');
const legacy = require('./legacy');
import external from 'react';
"#;
        let specifiers = extract_imports(content);
        assert_eq!(
            specifiers,
            vec!["./auth", "./types", "./lazy", "./legacy", "react"]
        );
    }

    #[test]
    fn external_imports_resolve_to_none() {
        let known = HashMap::new();
        assert!(resolve_import(Path::new("src/a.ts"), "react", &known).is_none());
        assert!(resolve_import(Path::new("src/a.ts"), "@scope/pkg", &known).is_none());
    }

    #[test]
    fn relative_import_tries_candidate_suffixes() {
        let mut known = HashMap::new();
        known.insert("src/auth.ts".to_string(), "src_auth_ts".to_string());
        known.insert("src/utils/index.ts".to_string(), "src_utils_index_ts".to_string());

        let importer = Path::new("src/a.ts");
        assert_eq!(
            resolve_import(importer, "./auth", &known),
            Some("src_auth_ts".to_string())
        );
        assert_eq!(
            resolve_import(importer, "./utils", &known),
            Some("src_utils_index_ts".to_string())
        );
    }

    #[test]
    fn unresolved_relative_import_falls_back_to_raw_path_id() {
        let known = HashMap::new();
        let id = resolve_import(Path::new("src/a.ts"), "./missing", &known);
        assert_eq!(id, Some("src_missing".to_string()));
    }

    #[test]
    fn parent_segments_are_folded() {
        assert_eq!(
            normalize_path(Path::new("src/auth/../utils/./helpers.ts")),
            "src/utils/helpers.ts"
        );
        assert_eq!(normalize_path(Path::new("/tmp/x/../y.ts")), "/tmp/y.ts");
    }

    #[test]
    fn builds_graph_with_resolved_edges() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("a.ts"),
            "import { b } from './b';\nexport const a = 1;\n",
        )
        .unwrap();
        fs::write(temp.path().join("b.ts"), "export const b = 2;\n").unwrap();

        let graph = builder().build(temp.path()).unwrap();
        assert_eq!(graph.metrics.node_count, 2);
        assert_eq!(graph.metrics.edge_count, 1);

        let a_id = graph
            .nodes
            .values()
            .find(|n| n.name == "a.ts")
            .unwrap()
            .id
            .clone();
        let b = graph.nodes.values().find(|n| n.name == "b.ts").unwrap();
        assert_eq!(b.dependents, vec![a_id]);
    }

    #[test]
    fn excluded_directories_are_skipped() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("node_modules")).unwrap();
        fs::write(temp.path().join("node_modules/dep.js"), "module.exports = 1;").unwrap();
        fs::write(temp.path().join("app.ts"), "export const x = 1;").unwrap();

        let graph = builder().build(temp.path()).unwrap();
        assert_eq!(graph.metrics.node_count, 1);
        assert!(graph.nodes.values().all(|n| n.name == "app.ts"));
    }

    #[test]
    fn duplicate_imports_are_kept_in_order() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("a.ts"),
            "import { x } from './b';\nimport { y } from './b';\n",
        )
        .unwrap();
        fs::write(temp.path().join("b.ts"), "export const x = 1;\nexport const y = 2;").unwrap();

        let graph = builder().build(temp.path()).unwrap();
        let a = graph.nodes.values().find(|n| n.name == "a.ts").unwrap();
        assert_eq!(a.dependencies.len(), 2);
        assert_eq!(a.dependencies[0], a.dependencies[1]);
        // The duplicate dependency still yields a single edge.
        assert_eq!(graph.metrics.edge_count, 1);
    }

    #[test]
    fn dangling_import_creates_no_edge() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.ts"), "import { gone } from './gone';\n").unwrap();

        let graph = builder().build(temp.path()).unwrap();
        let a = graph.nodes.values().find(|n| n.name == "a.ts").unwrap();
        assert_eq!(a.dependencies.len(), 1);
        assert_eq!(graph.metrics.edge_count, 0);
    }

    #[test]
    fn nonexistent_root_is_a_validation_error() {
        let err = builder().build(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, GordianError::Validation { .. }));
    }

    #[test]
    fn importance_heuristic_rewards_entry_points_and_exports() {
        let plain = importance_of("src/helpers.ts", "const x = 1;");
        let entry = importance_of("src/index.ts", "const x = 1;");
        let exported = importance_of("src/helpers.ts", "export const a = 1;\nexport const b = 2;");
        let service = importance_of("src/api/userService.ts", "const x = 1;");

        assert!(entry > plain);
        assert!(exported > plain);
        assert!(service > plain);
        assert!(importance_of("src/index.ts", &"export const v = 1;\n".repeat(50)) <= 1.0);
    }

    #[test]
    fn complexity_counts_branching_keywords() {
        let content = "if (a) { for (;;) { } } try { } catch (e) { switch (x) { case 1: break; } }";
        assert_eq!(complexity_of(content), 6);
    }
}
