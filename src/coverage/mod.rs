//! Coverage module
//!
//! Provides:
//! - Clover XML decoding
//! - Metric extraction (statements, lines, methods, branches)
//! - Level classification against thresholds

mod clover;
mod level;

pub use clover::*;
pub use level::*;

use serde::Serialize;
use std::path::Path;

use crate::error::Result;

/// Total/covered counts of one coverage dimension
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CoverageStat {
    pub total: u64,
    pub covered: u64,
    /// Percentage rounded to 2 decimals
    pub rate: f64,
}

impl CoverageStat {
    pub fn new(covered: u64, total: u64) -> Self {
        Self {
            total,
            covered,
            rate: calculate_rate(covered, total),
        }
    }
}

/// Aggregate project coverage
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metric {
    pub statements: CoverageStat,
    pub lines: CoverageStat,
    pub methods: CoverageStat,
    pub branches: CoverageStat,
}

impl Metric {
    /// Attach the level derived from `lines.rate`
    pub fn classify(self, thresholds: &Thresholds) -> ClassifiedMetric {
        let level = calculate_level(&self, thresholds);
        ClassifiedMetric {
            metric: self,
            level,
        }
    }
}

/// A metric together with its severity level
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassifiedMetric {
    #[serde(flatten)]
    pub metric: Metric,
    pub level: Level,
}

/// `covered / total * 100` rounded to 2 decimals, 0 when there is nothing to cover
pub fn calculate_rate(covered: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let percentage = (covered as f64 / total as f64) * 100.0;
    (percentage * 100.0).round() / 100.0
}

/// Extract the four tracked dimensions from a decoded report
///
/// Clover's project node carries no line counters: executable statements
/// stand in for lines, and elements (statements + conditionals + methods)
/// for statements.
pub fn read_metric(report: &CoverageReport) -> Metric {
    let m = &report.project.metrics;

    Metric {
        statements: CoverageStat::new(m.covered_elements, m.elements),
        lines: CoverageStat::new(m.covered_statements, m.statements),
        methods: CoverageStat::new(m.covered_methods, m.methods),
        branches: CoverageStat::new(m.covered_conditionals, m.conditionals),
    }
}

/// Load, extract and classify a Clover report in one step
pub async fn analyze(path: impl AsRef<Path>, thresholds: &Thresholds) -> Result<ClassifiedMetric> {
    let report = read_file(path).await?;
    Ok(read_metric(&report).classify(thresholds))
}
