//! Coverage level classification

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ClassifiedMetric, Metric};

/// Severity of the line coverage, ordered `Red < Yellow < Green`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Red,
    Yellow,
    Green,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Red => "red",
            Level::Yellow => "yellow",
            Level::Green => "green",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive lower bounds of the yellow and green levels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub alert: f64,
    pub warning: f64,
}

/// Classify `metric.lines.rate`
///
/// Comparisons are applied literally, so inverted thresholds
/// (`alert > warning`) are not corrected.
pub fn calculate_level(metric: &Metric, thresholds: &Thresholds) -> Level {
    let rate = metric.lines.rate;

    if rate < thresholds.alert {
        Level::Red
    } else if rate < thresholds.warning {
        Level::Yellow
    } else {
        Level::Green
    }
}

impl ClassifiedMetric {
    pub fn print_summary(&self, thresholds: &Thresholds, emoji: &str) {
        let marker = match self.level {
            Level::Red => "✗".red(),
            Level::Yellow => "!".yellow(),
            Level::Green => "✓".green(),
        };
        let rate = format!("{}%", self.metric.lines.rate);
        let rate = match self.level {
            Level::Red => rate.red().bold(),
            Level::Yellow => rate.yellow().bold(),
            Level::Green => rate.green().bold(),
        };

        println!(
            "  {} Line coverage: {}{} (alert: {}%, warning: {}%)",
            marker, rate, emoji, thresholds.alert, thresholds.warning
        );

        for (label, stat) in [
            ("Statements", &self.metric.statements),
            ("Methods", &self.metric.methods),
            ("Branches", &self.metric.branches),
        ] {
            println!(
                "    {} {}% ({}/{})",
                format!("{}:", label).dimmed(),
                stat.rate,
                stat.covered,
                stat.total
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::CoverageStat;

    fn metric_with_rate(rate: f64) -> Metric {
        Metric {
            lines: CoverageStat {
                total: 100,
                covered: rate as u64,
                rate,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_calculate_level() {
        let cases = [
            (49.0, 50.0, 90.0, Level::Red),
            (89.0, 50.0, 90.0, Level::Yellow),
            (90.0, 50.0, 90.0, Level::Green),
        ];

        for (rate, alert, warning, expected) in cases {
            let thresholds = Thresholds { alert, warning };
            assert_eq!(calculate_level(&metric_with_rate(rate), &thresholds), expected);
        }
    }

    #[test]
    fn test_boundaries_belong_to_higher_level() {
        let thresholds = Thresholds {
            alert: 50.0,
            warning: 90.0,
        };

        assert_eq!(calculate_level(&metric_with_rate(50.0), &thresholds), Level::Yellow);
        assert_eq!(calculate_level(&metric_with_rate(49.99), &thresholds), Level::Red);
        assert_eq!(calculate_level(&metric_with_rate(89.99), &thresholds), Level::Yellow);
        assert_eq!(calculate_level(&metric_with_rate(100.0), &thresholds), Level::Green);
    }

    #[test]
    fn test_only_lines_rate_matters() {
        let thresholds = Thresholds {
            alert: 50.0,
            warning: 90.0,
        };
        let mut metric = metric_with_rate(70.0);
        metric.statements = CoverageStat::new(0, 10);
        metric.methods = CoverageStat::new(10, 10);
        metric.branches = CoverageStat::new(0, 0);

        assert_eq!(calculate_level(&metric, &thresholds), Level::Yellow);
    }

    #[test]
    fn test_monotonic() {
        let thresholds = Thresholds {
            alert: 33.3,
            warning: 66.6,
        };

        let mut previous = Level::Red;
        for step in 0..=10_000 {
            let level = calculate_level(&metric_with_rate(step as f64 / 100.0), &thresholds);
            assert!(level >= previous);
            previous = level;
        }
        assert_eq!(previous, Level::Green);
    }

    #[test]
    fn test_inverted_thresholds_apply_literally() {
        let thresholds = Thresholds {
            alert: 90.0,
            warning: 50.0,
        };

        assert_eq!(calculate_level(&metric_with_rate(70.0), &thresholds), Level::Red);
        assert_eq!(calculate_level(&metric_with_rate(95.0), &thresholds), Level::Green);
    }

    #[test]
    fn test_classify_attaches_level() {
        let thresholds = Thresholds {
            alert: 50.0,
            warning: 90.0,
        };
        let classified = metric_with_rate(20.0).classify(&thresholds);

        assert_eq!(classified.level, Level::Red);
        assert_eq!(classified.level.to_string(), "red");
        assert_eq!(classified.metric.lines.rate, 20.0);
    }
}
