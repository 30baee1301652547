//! Sigrun - Runtime function coverage for JavaScript & TypeScript
//!
//! Finds the functions that never run: instruments sources with tracking
//! calls, runs your command, and joins what was found against what executed.
//! No framework hooks, no VM flags, just `sigrun run -- npm test`.

pub mod cli;
pub mod core;
pub mod instrument;
pub mod output;
pub mod parse;
pub mod project;
pub mod report;
pub mod runtime;
pub mod sourcemap;

pub use crate::core::config::Config;
pub use crate::core::error::{Error, Result};
