//! covreport - Clover coverage for CI
//!
//! A library for turning a Clover XML coverage report into:
//! - Aggregate statement/line/method/branch rates
//! - A red/yellow/green level from two thresholds
//! - A commit status, a shields.io badge URL and a markdown summary
//! - GitHub statuses and pull request comments

pub mod config;
pub mod coverage;
pub mod error;
pub mod notifications;
pub mod report;

pub use coverage::{
    analyze, calculate_level, calculate_rate, parse_clover_str, read_file, read_metric,
    ClassifiedMetric, CoverageReport, CoverageStat, Level, Metric, Thresholds,
};
pub use error::CoverageError;
pub use report::{
    generate_badge_url, generate_emoji, generate_status, generate_table, StatusPayload,
    StatusState,
};
