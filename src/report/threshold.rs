//! Threshold evaluation for CI gates

use crate::core::config::ThresholdConfig;
use crate::report::CoverageReport;
use serde::Serialize;

/// Outcome of checking a report against configured thresholds
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdResult {
    pub passed: bool,
    pub failures: Vec<String>,
}

/// Check a report against the configured thresholds
///
/// Absent rules are skipped; every failing rule contributes a message, so a
/// run that misses both limits reports both.
pub fn evaluate(report: &CoverageReport, thresholds: &ThresholdConfig) -> ThresholdResult {
    let mut failures = Vec::new();

    if let Some(coverage) = thresholds.coverage {
        if report.summary.coverage_percent < coverage {
            failures.push(format!(
                "Coverage {:.1}% is below threshold {}%",
                report.summary.coverage_percent, coverage
            ));
        }
    }

    if let Some(max_unused) = thresholds.max_unused {
        if report.summary.unused_functions > max_unused {
            failures.push(format!(
                "{} unused functions exceeds maximum {}",
                report.summary.unused_functions, max_unused
            ));
        }
    }

    ThresholdResult {
        passed: failures.is_empty(),
        failures,
    }
}
