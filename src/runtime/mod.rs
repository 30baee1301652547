//! Execution tracking: the in-process tracker and the JavaScript agents

pub mod agent;
pub mod tracker;

pub use agent::{agent_source, agent_specifier, install_agent};
pub use tracker::{install, track, ExecutionRecord, Tracker};

/// Name of the tracking call injected into instrumented sources
pub const TRACK_FUNCTION: &str = "__sigrun_track";
