//! Configuration types and management for gordian.
//!
//! Provides serde-backed configuration structures for the analysis
//! pipeline, the graph store backends, and report generation, along with
//! validation and YAML file loading.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::{GordianError, Result};
use crate::store::StoreConfig;

/// Main configuration for the gordian analysis engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GordianConfig {
    /// Source scanning and graph construction settings
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Graph store backend selection
    #[serde(default)]
    pub store: StoreConfig,

    /// Report generation settings
    #[serde(default)]
    pub report: ReportConfig,
}

impl Default for GordianConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            store: StoreConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl GordianConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| GordianError::io(format!("failed to read config {}", path.display()), e))?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration, returning field-scoped errors.
    pub fn validate(&self) -> Result<()> {
        if self.analysis.source_extensions.is_empty() {
            return Err(GordianError::config_field(
                "at least one source extension is required",
                "analysis.source_extensions",
            ));
        }
        if self.analysis.max_file_size_bytes == 0 {
            return Err(GordianError::config_field(
                "max file size must be non-zero",
                "analysis.max_file_size_bytes",
            ));
        }
        if self.report.top_cycles == 0 {
            return Err(GordianError::config_field(
                "top cycle count must be non-zero",
                "report.top_cycles",
            ));
        }
        self.store.validate()?;
        Ok(())
    }
}

/// Source scanning and graph construction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// File extensions treated as source code (without the leading dot)
    #[serde(default = "AnalysisConfig::default_source_extensions")]
    pub source_extensions: Vec<String>,

    /// Directory names skipped during traversal at any depth
    #[serde(default = "AnalysisConfig::default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    /// Additional glob patterns excluded from the scan
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Files larger than this are skipped (generated bundles, vendored blobs)
    #[serde(default = "AnalysisConfig::default_max_file_size")]
    pub max_file_size_bytes: u64,
}

impl AnalysisConfig {
    fn default_source_extensions() -> Vec<String> {
        ["ts", "tsx", "js", "jsx", "mjs", "cjs"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn default_exclude_dirs() -> Vec<String> {
        [
            "node_modules",
            ".git",
            "dist",
            "build",
            "coverage",
            "target",
            ".next",
            "out",
            "__pycache__",
            "vendor",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn default_max_file_size() -> u64 {
        2 * 1024 * 1024
    }

    /// Whether a file extension belongs to the configured source set.
    pub fn is_source_extension(&self, extension: &str) -> bool {
        self.source_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }

    /// Whether a directory name is excluded from traversal.
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|dir| dir == name)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            source_extensions: Self::default_source_extensions(),
            exclude_dirs: Self::default_exclude_dirs(),
            exclude_patterns: Vec::new(),
            max_file_size_bytes: Self::default_max_file_size(),
        }
    }
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Number of cycles included in the report, ordered by severity
    #[serde(default = "ReportConfig::default_top_cycles")]
    pub top_cycles: usize,
}

impl ReportConfig {
    fn default_top_cycles() -> usize {
        10
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_cycles: Self::default_top_cycles(),
        }
    }
}
