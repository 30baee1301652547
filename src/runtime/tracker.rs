//! In-process execution tracking
//!
//! Rust programs that embed instrumented logic link against this tracker:
//! [`install`] names the output file once, injected [`track`] calls count
//! executions, and the record is written exactly once when the process ends,
//! whether it exits normally, is interrupted, or panics.

use crate::core::error::{Error, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The persisted record of one instrumented run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub timestamp: DateTime<Utc>,
    pub executions: BTreeMap<String, u64>,
    /// Distinct functions that executed at least once
    pub total_functions: usize,
    /// Sum of all per-function counts
    pub total_executions: u64,
}

impl ExecutionRecord {
    /// Load a record written by a previous run
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ExecutionNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Counts executions and flushes them to disk at most once
#[derive(Debug)]
pub struct Tracker {
    executions: BTreeMap<String, u64>,
    output: PathBuf,
    flushed: bool,
}

impl Tracker {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            executions: BTreeMap::new(),
            output: output.into(),
            flushed: false,
        }
    }

    /// Count one execution of a function
    pub fn record(&mut self, id: &str) {
        *self.executions.entry(id.to_string()).or_insert(0) += 1;
    }

    /// Current counts without flushing
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.executions.clone()
    }

    /// Drop all counts and allow a fresh flush
    pub fn clear(&mut self) {
        self.executions.clear();
        self.flushed = false;
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Write the execution record
    ///
    /// Only the first call writes; the exit path can be entered more than
    /// once (signal handler plus exit hook) and later calls are no-ops. The
    /// flushed flag is set before the write so a failed write is not
    /// retried from another hook.
    pub fn flush(&mut self) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;

        let record = ExecutionRecord {
            timestamp: Utc::now(),
            executions: self.executions.clone(),
            total_functions: self.executions.len(),
            total_executions: self.executions.values().sum(),
        };

        if let Some(parent) = self.output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.output, serde_json::to_string_pretty(&record)?)?;
        Ok(())
    }
}

static TRACKER: OnceCell<Mutex<Tracker>> = OnceCell::new();

/// Install the process-wide tracker
///
/// The first call wins and registers the exit hooks; later calls return
/// false and change nothing. Until this is called, [`track`] is a no-op.
pub fn install(output: impl Into<PathBuf>) -> bool {
    if TRACKER.set(Mutex::new(Tracker::new(output))).is_err() {
        return false;
    }
    install_exit_hooks();
    true
}

/// Count one execution of a function
///
/// This is the call the instrumentation engine injects; it must stay cheap
/// and must never panic.
pub fn track(id: &str) {
    if let Some(tracker) = TRACKER.get() {
        tracker.lock().record(id);
    }
}

fn flush_installed() {
    if let Some(tracker) = TRACKER.get() {
        flush_tracker(tracker);
    }
}

/// Flush from an exit hook without waiting on the lock
///
/// A signal can arrive while `record` holds the lock; waiting here would
/// deadlock the exit path, so a contended lock skips the write and the
/// process still terminates.
fn flush_tracker(tracker: &Mutex<Tracker>) {
    let Some(mut tracker) = tracker.try_lock() else {
        return;
    };
    if let Err(e) = tracker.flush() {
        eprintln!("sigrun: failed to write execution record: {}", e);
    }
}

#[cfg(unix)]
extern "C" fn flush_at_exit() {
    flush_installed();
}

#[cfg(unix)]
extern "C" fn exit_on_signal(_signal: libc::c_int) {
    // Route through the normal exit path so the atexit flush runs
    std::process::exit(0);
}

/// Register the flush on normal exit, SIGINT/SIGTERM, and panic
fn install_exit_hooks() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        previous(info);
        flush_installed();
        std::process::exit(1);
    }));

    #[cfg(unix)]
    unsafe {
        libc::atexit(flush_at_exit);
        let handler = exit_on_signal as *const () as libc::sighandler_t;
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }
}
