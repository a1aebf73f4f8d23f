//! Presenters for a classified coverage metric
//!
//! Status text and the table print rates with shortest float formatting
//! (`50`, `70.59`); the badge prints the floored integer. Keep them apart.

use serde::{Deserialize, Serialize};

use crate::coverage::{ClassifiedMetric, Level};

const BADGE_BASE_URL: &str = "https://img.shields.io/static/v1";

/// Commit status state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Success,
    Failure,
}

/// Body of a commit status check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub state: StatusState,
    pub description: String,
    pub target_url: String,
    pub context: String,
}

/// Build the commit status for a classified metric
pub fn generate_status(
    target_url: &str,
    status_context: &str,
    metric: &ClassifiedMetric,
) -> StatusPayload {
    let rate = metric.metric.lines.rate;

    let (state, description) = match metric.level {
        Level::Red => (
            StatusState::Failure,
            format!("Error: Too low coverage - {}%", rate),
        ),
        Level::Yellow => (
            StatusState::Success,
            format!("Warning: low coverage - {}%", rate),
        ),
        Level::Green => (
            StatusState::Success,
            format!("Success: Coverage - {}%", rate),
        ),
    };

    StatusPayload {
        state,
        description,
        target_url: target_url.to_string(),
        context: status_context.to_string(),
    }
}

/// shields.io static badge for the line coverage
pub fn generate_badge_url(metric: &ClassifiedMetric) -> String {
    format!(
        "{}?label=coverage&message={}%&color={}",
        BADGE_BASE_URL,
        metric.metric.lines.rate.floor(),
        metric.level
    )
}

/// Celebration suffix, only for exactly 100% line coverage
pub fn generate_emoji(metric: &ClassifiedMetric) -> &'static str {
    if metric.metric.lines.rate == 100.0 {
        " 🎉"
    } else {
        ""
    }
}

/// Markdown summary
///
/// The "Statements:" row shows the `lines` dimension, which holds Clover's
/// statement counters.
pub fn generate_table(metric: &ClassifiedMetric) -> String {
    let lines = &metric.metric.lines;
    let methods = &metric.metric.methods;

    format!(
        "
## Coverage Report

|  Totals | ![Coverage]({}) |
| :-- | --: |
| Statements: | {}% ( {} / {} ) |
| Methods: | {}% ( {} / {} ) |
",
        generate_badge_url(metric),
        lines.rate,
        lines.covered,
        lines.total,
        methods.rate,
        methods.covered,
        methods.total
    )
}
