//! Project location and module-system classification

pub mod modules;

pub use modules::{ModuleType, ModuleTypeResolver};

use crate::core::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Resolve the project root from an optional explicit path
///
/// Defaults to the current directory; the path must be an existing directory.
pub fn resolve_root(explicit: Option<&Path>) -> Result<PathBuf> {
    let start = match explicit {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir()?,
    };

    let root = start.canonicalize().map_err(|_| Error::ProjectNotFound {
        path: start.clone(),
    })?;

    if !root.is_dir() {
        return Err(Error::ProjectNotFound { path: root });
    }

    Ok(root)
}
