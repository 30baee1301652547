//! JSON output formatting

use crate::report::CoverageReport;

/// Format a coverage report as JSON
pub fn format(report: &CoverageReport) -> String {
    serde_json::to_string_pretty(report)
        .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize report: {}"}}"#, e))
}
