//! Human-readable output formatting

use crate::report::CoverageReport;

/// Unused functions listed before truncating, unless show_all is set
const MAX_UNUSED_LISTED: usize = 20;

/// Hottest functions listed in the execution section
const MAX_EXECUTED_LISTED: usize = 10;

/// Format a coverage report for human consumption
pub fn format(report: &CoverageReport, show_all: bool) -> String {
    let mut output = String::new();
    let summary = &report.summary;

    if summary.total_functions == 0 {
        output.push_str("No functions in the inventory. Run `sigrun run` first.\n");
        return output;
    }

    output.push_str(&format!(
        "Function coverage: {:.2}% ({} of {} executed, {} total calls)\n",
        summary.coverage_percent,
        summary.executed_functions,
        summary.total_functions,
        summary.total_executions
    ));

    if report.source_maps_used {
        output.push_str("Positions remapped to original sources via source maps\n");
    }

    if !report.unused_functions.is_empty() {
        output.push_str(&format!(
            "\nUnused functions ({}):\n",
            summary.unused_functions
        ));

        let listed = if show_all {
            report.unused_functions.len()
        } else {
            MAX_UNUSED_LISTED
        };
        for function in report.unused_functions.iter().take(listed) {
            output.push_str(&format!(
                "  {} {}:{}:{} [{}]\n",
                function.name, function.file, function.line, function.column, function.kind
            ));
        }
        if report.unused_functions.len() > listed {
            output.push_str(&format!(
                "  ... and {} more (use --all to list every function)\n",
                report.unused_functions.len() - listed
            ));
        }
    }

    if !report.executed_functions.is_empty() {
        let mut hottest: Vec<_> = report.executed_functions.iter().collect();
        hottest.sort_by(|a, b| b.execution_count.cmp(&a.execution_count));

        output.push_str("\nMost executed:\n");
        let listed = if show_all {
            hottest.len()
        } else {
            MAX_EXECUTED_LISTED
        };
        for executed in hottest.iter().take(listed) {
            output.push_str(&format!(
                "  {:>6}x {} {}:{}\n",
                executed.execution_count,
                executed.function.name,
                executed.function.file,
                executed.function.line
            ));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{FunctionKind, FunctionRecord};
    use crate::report::{CoverageSummary, ExecutedFunction};
    use chrono::Utc;

    fn record(name: &str, line: usize) -> FunctionRecord {
        FunctionRecord {
            id: format!("{}:src/a.js:{}:0", name, line),
            name: name.to_string(),
            file: "src/a.js".to_string(),
            line,
            column: 0,
            kind: FunctionKind::Arrow,
        }
    }

    fn report(unused: Vec<FunctionRecord>, executed: Vec<ExecutedFunction>) -> CoverageReport {
        let total = unused.len() + executed.len();
        CoverageReport {
            summary: CoverageSummary {
                total_functions: total,
                executed_functions: executed.len(),
                unused_functions: unused.len(),
                coverage_percent: if total > 0 {
                    (executed.len() as f64 / total as f64 * 10000.0).round() / 100.0
                } else {
                    0.0
                },
                total_executions: executed.iter().map(|e| e.execution_count).sum(),
            },
            unused_functions: unused,
            executed_functions: executed,
            source_maps_used: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_empty_inventory_message() {
        let output = format(&report(Vec::new(), Vec::new()), false);
        assert!(output.contains("No functions in the inventory"));
    }

    #[test]
    fn test_summary_line() {
        let executed = vec![ExecutedFunction {
            function: record("used", 1),
            execution_count: 3,
        }];
        let output = format(&report(vec![record("dead", 9)], executed), false);

        assert!(output.contains("Function coverage: 50.00% (1 of 2 executed, 3 total calls)"));
        assert!(output.contains("Unused functions (1):"));
        assert!(output.contains("  dead src/a.js:9:0 [arrow]"));
        assert!(output.contains("Most executed:"));
        assert!(output.contains("x used src/a.js:1"));
    }

    #[test]
    fn test_unused_list_truncates() {
        let unused: Vec<_> = (0..25).map(|i| record(&format!("f{}", i), i + 1)).collect();
        let output = format(&report(unused, Vec::new()), false);

        assert!(output.contains("... and 5 more"));
        assert!(!output.contains("f24 "));
    }

    #[test]
    fn test_show_all_lists_everything() {
        let unused: Vec<_> = (0..25).map(|i| record(&format!("f{}", i), i + 1)).collect();
        let output = format(&report(unused, Vec::new()), true);

        assert!(!output.contains("... and"));
        assert!(output.contains("f24 "));
    }

    #[test]
    fn test_most_executed_sorted_descending() {
        let executed = vec![
            ExecutedFunction {
                function: record("cold", 1),
                execution_count: 2,
            },
            ExecutedFunction {
                function: record("hot", 5),
                execution_count: 90,
            },
        ];
        let output = format(&report(Vec::new(), executed), false);

        let hot = output.find("hot").unwrap();
        let cold = output.find("cold").unwrap();
        assert!(hot < cold);
    }

    #[test]
    fn test_source_map_note() {
        let mut with_maps = report(vec![record("dead", 9)], Vec::new());
        with_maps.source_maps_used = true;
        let output = format(&with_maps, false);
        assert!(output.contains("remapped to original sources"));
    }
}
