//! Coverage reporting: aggregation and threshold checks

pub mod aggregate;
pub mod threshold;

pub use aggregate::{aggregate, CoverageReport, CoverageSummary, ExecutedFunction};
pub use threshold::{evaluate, ThresholdResult};
