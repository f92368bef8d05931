//! Analysis report assembly.
//!
//! Aggregates the detected cycles into a single [`AnalysisReport`]:
//! a 0-100 health score, a severity histogram, the top cycles, a
//! three-tier resolution plan, free-text recommendations, and the
//! project-wide impact percentages.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::config::ReportConfig;
use crate::graph::cycles::{CircularDependency, Severity};
use crate::graph::node::{DependencyGraph, GraphMetrics};

/// Health penalty charged per cycle at each severity.
fn severity_penalty(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 25.0,
        Severity::High => 15.0,
        Severity::Medium => 8.0,
        Severity::Low => 3.0,
    }
}

/// One entry in the tiered resolution plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItem {
    /// Normalized cycle id
    pub cycle_id: String,
    /// Severity of the underlying cycle
    pub severity: Severity,
    /// Recommended strategy label
    pub strategy: String,
    /// File paths involved in the cycle
    pub files: Vec<String>,
}

impl PlanItem {
    fn from_cycle(cycle: &CircularDependency) -> Self {
        Self {
            cycle_id: cycle.id.clone(),
            severity: cycle.severity,
            strategy: cycle.resolution.strategy.as_str().to_string(),
            files: cycle.metadata.file_paths.clone(),
        }
    }
}

/// Remediation work bucketed by urgency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionPlan {
    /// Critical cycles, fix before the next release
    pub immediate: Vec<PlanItem>,
    /// High-severity cycles, fix within the current iteration
    pub short_term: Vec<PlanItem>,
    /// Medium and low cycles, schedule as refactoring work
    pub long_term: Vec<PlanItem>,
}

/// Project-wide impact, each dimension averaged over all cycles and
/// expressed as a 0-100 percentage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImpactSummary {
    /// Build-time impact percentage
    pub build_time: f64,
    /// Runtime impact percentage
    pub runtime: f64,
    /// Maintainability impact percentage
    pub maintainability: f64,
    /// Testability impact percentage
    pub testability: f64,
}

/// The structured output of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// When the report was generated
    pub generated_at: DateTime<Utc>,
    /// Analyzed root directory
    pub root: String,
    /// 0-100 dependency health score
    pub health_score: f64,
    /// Total detected cycles
    pub total_cycles: usize,
    /// Cycles classified critical
    pub critical_cycles: usize,
    /// Cycle count per severity
    pub severity_breakdown: BTreeMap<Severity, usize>,
    /// The worst cycles, ordered by severity then length
    pub top_cycles: Vec<CircularDependency>,
    /// Remediation work bucketed by urgency
    pub resolution_plan: ResolutionPlan,
    /// Free-text guidance derived from the severity mix
    pub recommendations: Vec<String>,
    /// Project-wide impact percentages
    pub impact: ImpactSummary,
    /// Number of source files scanned
    pub files_scanned: usize,
    /// Graph-level metrics from the builder
    pub metrics: GraphMetrics,
}

/// Builds an [`AnalysisReport`] from a finished graph.
#[derive(Debug)]
pub struct ReportGenerator {
    config: ReportConfig,
}

impl ReportGenerator {
    /// Create a generator with the given report settings.
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    /// Assemble the report for one analysis run.
    pub fn generate(&self, root: &str, graph: &DependencyGraph) -> AnalysisReport {
        let cycles = &graph.cycles;

        let mut severity_breakdown: BTreeMap<Severity, usize> = BTreeMap::new();
        for cycle in cycles {
            *severity_breakdown.entry(cycle.severity).or_insert(0) += 1;
        }
        let count = |severity: Severity| severity_breakdown.get(&severity).copied().unwrap_or(0);
        let critical = count(Severity::Critical);
        let high = count(Severity::High);

        let health_score = (100.0
            - cycles
                .iter()
                .map(|c| severity_penalty(c.severity))
                .sum::<f64>())
        .max(0.0);

        let mut ordered: Vec<&CircularDependency> = cycles.iter().collect();
        // Worst first: severity descending, then longer cycles first.
        ordered.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(b.metadata.length.cmp(&a.metadata.length))
        });

        let top_cycles = ordered
            .iter()
            .take(self.config.top_cycles)
            .map(|c| (*c).clone())
            .collect();

        let mut plan = ResolutionPlan::default();
        for cycle in &ordered {
            let item = PlanItem::from_cycle(cycle);
            match cycle.severity {
                Severity::Critical => plan.immediate.push(item),
                Severity::High => plan.short_term.push(item),
                Severity::Medium | Severity::Low => plan.long_term.push(item),
            }
        }

        AnalysisReport {
            generated_at: Utc::now(),
            root: root.to_string(),
            health_score,
            total_cycles: cycles.len(),
            critical_cycles: critical,
            severity_breakdown,
            top_cycles,
            recommendations: recommendations(cycles.len(), critical, high, health_score),
            resolution_plan: plan,
            impact: impact_summary(cycles),
            files_scanned: graph.nodes.len(),
            metrics: graph.metrics.clone(),
        }
    }
}

fn impact_summary(cycles: &[CircularDependency]) -> ImpactSummary {
    if cycles.is_empty() {
        return ImpactSummary::default();
    }
    let n = cycles.len() as f64;
    let average = |pick: fn(&CircularDependency) -> f64| {
        cycles.iter().map(pick).sum::<f64>() / n * 100.0
    };
    ImpactSummary {
        build_time: average(|c| c.impact.build_time),
        runtime: average(|c| c.impact.runtime),
        maintainability: average(|c| c.impact.maintainability),
        testability: average(|c| c.impact.testability),
    }
}

fn recommendations(total: usize, critical: usize, high: usize, health: f64) -> Vec<String> {
    let mut out = Vec::new();
    if total == 0 {
        out.push("No circular dependencies detected. Keep import boundaries as they are.".into());
        return out;
    }
    if critical > 0 {
        out.push(format!(
            "{critical} critical cycle(s) found. Break these before shipping further changes to the affected modules."
        ));
    }
    if high > 0 {
        out.push(format!(
            "{high} high-severity cycle(s) involve important modules. Schedule them into the current iteration."
        ));
    }
    if health < 50.0 {
        out.push(
            "Overall dependency health is poor. Consider enforcing layer boundaries in code review or via lint tooling."
                .into(),
        );
    }
    out.push(
        "Prefer the per-cycle resolution steps in this report over ad-hoc refactoring; length-2 cycles are usually a one-interface fix."
            .into(),
    );
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use approx::assert_relative_eq;

    use super::*;
    use crate::graph::cycles::{
        normalized_cycle_id, CycleMetadata, ImpactScores, Resolution,
    };
    use crate::graph::node::{DependencyNode, NodeMetadata, NodeType};

    fn cycle(ids: &[&str], severity: Severity) -> CircularDependency {
        let cycle: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        CircularDependency {
            id: normalized_cycle_id(&cycle),
            severity,
            impact: ImpactScores::from_cycle(cycle.len(), 0.5),
            resolution: Resolution::select(cycle.len(), &BTreeSet::from([NodeType::File])),
            metadata: CycleMetadata {
                length: cycle.len(),
                node_types: vec![NodeType::File],
                file_paths: cycle.clone(),
            },
            cycle,
        }
    }

    fn graph_with(cycles: Vec<CircularDependency>) -> DependencyGraph {
        let mut graph = DependencyGraph::default();
        for cycle in &cycles {
            for id in &cycle.cycle {
                graph.insert_node(DependencyNode::file(id.clone(), NodeMetadata::degraded()));
            }
        }
        graph.set_cycles(cycles);
        graph
    }

    #[test]
    fn clean_graph_scores_perfect_health() {
        let report =
            ReportGenerator::new(ReportConfig::default()).generate("proj", &graph_with(vec![]));
        assert_eq!(report.health_score, 100.0);
        assert_eq!(report.total_cycles, 0);
        assert!(report.top_cycles.is_empty());
        assert_eq!(report.recommendations.len(), 1);
    }

    #[test]
    fn health_score_floors_at_zero() {
        let cycles = (0..6)
            .map(|i| {
                let a = format!("a{i}");
                let b = format!("b{i}");
                cycle(&[a.as_str(), b.as_str()], Severity::Critical)
            })
            .collect();
        let report = ReportGenerator::new(ReportConfig::default()).generate("proj", &graph_with(cycles));
        assert_eq!(report.health_score, 0.0);
        assert_eq!(report.critical_cycles, 6);
    }

    #[test]
    fn plan_buckets_by_severity() {
        let cycles = vec![
            cycle(&["a", "b"], Severity::Critical),
            cycle(&["c", "d"], Severity::High),
            cycle(&["e", "f"], Severity::Medium),
            cycle(&["g", "h"], Severity::Low),
        ];
        let report = ReportGenerator::new(ReportConfig::default()).generate("proj", &graph_with(cycles));
        assert_eq!(report.resolution_plan.immediate.len(), 1);
        assert_eq!(report.resolution_plan.short_term.len(), 1);
        assert_eq!(report.resolution_plan.long_term.len(), 2);
        assert_eq!(report.resolution_plan.immediate[0].severity, Severity::Critical);
    }

    #[test]
    fn top_cycles_are_worst_first_and_limited() {
        let cycles = vec![
            cycle(&["a", "b"], Severity::Low),
            cycle(&["c", "d", "e"], Severity::Critical),
            cycle(&["f", "g"], Severity::High),
        ];
        let config = ReportConfig { top_cycles: 2 };
        let report = ReportGenerator::new(config).generate("proj", &graph_with(cycles));
        assert_eq!(report.top_cycles.len(), 2);
        assert_eq!(report.top_cycles[0].severity, Severity::Critical);
        assert_eq!(report.top_cycles[1].severity, Severity::High);
    }

    #[test]
    fn impact_is_averaged_as_percentages() {
        let cycles = vec![cycle(&["a", "b"], Severity::Low)];
        let report = ReportGenerator::new(ReportConfig::default()).generate("proj", &graph_with(cycles));
        // length 2 at importance 0.5: maintainability = 2 * 0.3 * 0.5 = 0.3
        assert_relative_eq!(report.impact.maintainability, 30.0, epsilon = 1e-9);
        assert_relative_eq!(report.impact.runtime, 15.0, epsilon = 1e-9);
    }
}
