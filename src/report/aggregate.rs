//! Coverage aggregation
//!
//! Joins the static inventory with an execution record into a coverage
//! report: which functions ran, how often, and which never did.

use crate::instrument::FunctionRecord;
use crate::runtime::ExecutionRecord;
use crate::sourcemap::SourceMapper;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Headline numbers for one coverage report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageSummary {
    pub total_functions: usize,
    pub executed_functions: usize,
    pub unused_functions: usize,
    pub coverage_percent: f64,
    pub total_executions: u64,
}

/// An inventory function together with its execution count
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutedFunction {
    #[serde(flatten)]
    pub function: FunctionRecord,
    pub execution_count: u64,
}

/// The full coverage report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub summary: CoverageSummary,
    pub unused_functions: Vec<FunctionRecord>,
    pub executed_functions: Vec<ExecutedFunction>,
    pub source_maps_used: bool,
    pub timestamp: DateTime<Utc>,
}

/// Join inventory and execution data into a coverage report
///
/// Functions are partitioned by id. With a mapper, each function's position
/// is re-localized to the original source; ids are never rewritten, so the
/// join is unaffected. The executed-functions summary count comes from the
/// execution record, which can disagree with the partition when the
/// inventory is stale; both are reported as recorded.
pub fn aggregate(
    inventory: &crate::instrument::StaticInventory,
    execution: &ExecutionRecord,
    mut mapper: Option<&mut SourceMapper>,
) -> CoverageReport {
    let executed_ids: HashSet<&str> = execution.executions.keys().map(String::as_str).collect();

    let mut unused_functions = Vec::new();
    let mut executed_functions = Vec::new();
    for function in &inventory.functions {
        let mut function = function.clone();
        if let Some(mapper) = mapper.as_deref_mut() {
            relocalize(&mut function, mapper);
        }

        if executed_ids.contains(function.id.as_str()) {
            let execution_count = execution.executions.get(&function.id).copied().unwrap_or(0);
            executed_functions.push(ExecutedFunction {
                function,
                execution_count,
            });
        } else {
            unused_functions.push(function);
        }
    }

    let coverage_percent = if inventory.total_functions > 0 {
        let ratio = execution.total_functions as f64 / inventory.total_functions as f64;
        (ratio * 100.0 * 100.0).round() / 100.0
    } else {
        0.0
    };

    CoverageReport {
        summary: CoverageSummary {
            total_functions: inventory.total_functions,
            executed_functions: execution.total_functions,
            unused_functions: unused_functions.len(),
            coverage_percent,
            total_executions: execution.total_executions,
        },
        unused_functions,
        executed_functions,
        source_maps_used: mapper.map_or(false, |m| m.any_remapped()),
        timestamp: Utc::now(),
    }
}

fn relocalize(function: &mut FunctionRecord, mapper: &mut SourceMapper) {
    if let Some(position) = mapper.remap(&function.file, function.line, function.column) {
        function.file = position.source;
        function.line = position.line;
        function.column = position.column;
    }
}
