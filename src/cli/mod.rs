//! CLI command definitions and handlers

pub mod clean;
pub mod report;
pub mod run;

use crate::core::config::{Config, ReportFormat};
use crate::core::error::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

const LONG_ABOUT: &str = r#"
███████╗██╗ ██████╗ ██████╗ ██╗   ██╗███╗   ██╗
██╔════╝██║██╔════╝ ██╔══██╗██║   ██║████╗  ██║
███████╗██║██║  ███╗██████╔╝██║   ██║██╔██╗ ██║
╚════██║██║██║   ██║██╔══██╗██║   ██║██║╚██╗██║
███████║██║╚██████╔╝██║  ██║╚██████╔╝██║ ╚████║
╚══════╝╚═╝ ╚═════╝ ╚═╝  ╚═╝ ╚═════╝ ╚═╝  ╚═══╝

Runtime function coverage for JavaScript & TypeScript.

QUICK START:
    1. sigrun run -- npm test     Instrument, run your command, collect data
    2. sigrun report              See which functions actually executed
    3. sigrun clean               Remove collected data and stray backups

HOW IT WORKS:
    sigrun rewrites your source files with tracking calls, backs up the
    originals, runs your command, then restores the originals. The run
    leaves two files under .sigrun/: the static inventory (every function
    found) and the execution record (every function that ran).

REPORTS:
    sigrun report                 Human summary with the unused-function list
    sigrun report --format json   Full report as JSON for scripting
    sigrun report --output        Also write sigrun-report.json
    sigrun report --all           List every function, no truncation

THRESHOLDS (CI gates, set in sigrun.toml):
    [thresholds]
    coverage = 80                 Fail below 80% function coverage
    max_unused = 10               Fail above 10 unused functions

EXAMPLES:
    sigrun run -- node app.js         Instrument and run a script
    sigrun run -- npm test            Instrument and run a test suite
    sigrun run --no-clean -- npm run e2e   Accumulate over multiple runs
    sigrun report --no-remap          Skip source-map position remapping
"#;

/// Runtime function coverage for JavaScript & TypeScript
#[derive(Parser, Debug)]
#[command(name = "sigrun")]
#[command(author, version)]
#[command(about = "Runtime function coverage for JavaScript & TypeScript")]
#[command(long_about = LONG_ABOUT)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Instrument sources, run a command, and collect execution data
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// Report coverage from the last collected run
    Report(ReportArgs),

    /// Remove collected data and restore any stray backups
    Clean(CleanArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:
    sigrun run -- npm test            Instrument and run the test suite
    sigrun run -v -- node app.js      Print each instrumented file
    sigrun run --no-clean -- npm test Keep data from previous runs")]
pub struct RunArgs {
    /// Command to execute against the instrumented sources (after --)
    #[arg(required = true, last = true)]
    pub command: Vec<String>,

    /// Project path (default: current directory)
    #[arg(short, long)]
    pub project: Option<PathBuf>,

    /// Config file (default: sigrun.toml at the project root)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Keep inventory and execution data from previous runs
    #[arg(long)]
    pub no_clean: bool,

    /// Print each file as it is instrumented
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments for the report command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:
    sigrun report                     Human-readable summary
    sigrun report --format json       Full report as JSON
    sigrun report --output out.json   Write the JSON report to a file
    sigrun report --all               List every function")]
pub struct ReportArgs {
    /// Project path (default: current directory)
    #[arg(short, long)]
    pub project: Option<PathBuf>,

    /// Config file (default: sigrun.toml at the project root)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Report format (default from config)
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Write the JSON report to a file (bare flag uses the configured name)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<Option<PathBuf>>,

    /// Report positions as instrumented, without source-map remapping
    #[arg(long)]
    pub no_remap: bool,

    /// List every function instead of truncating long lists
    #[arg(long)]
    pub all: bool,
}

/// Arguments for the clean command
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Project path (default: current directory)
    #[arg(short, long)]
    pub project: Option<PathBuf>,
}

/// Report format as a CLI flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Human,
    Json,
}

impl From<FormatArg> for ReportFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Human => ReportFormat::Human,
            FormatArg::Json => ReportFormat::Json,
        }
    }
}

/// Load configuration for a command, honoring an explicit --config path
pub(crate) fn load_config(project_root: &Path, explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => Config::load_from(path),
        None => Config::load(project_root),
    }
}
