//! Output formatting

pub mod human;
pub mod json;

use crate::core::config::ReportFormat;
use crate::report::CoverageReport;

/// Format a coverage report for output
pub fn render(report: &CoverageReport, format: ReportFormat, show_all: bool) -> String {
    match format {
        ReportFormat::Human => human::format(report, show_all),
        ReportFormat::Json => json::format(report),
    }
}
