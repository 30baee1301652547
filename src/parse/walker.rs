//! Discovery of instrumentable source files

use crate::core::config::DiscoveryConfig;
use crate::core::error::Result;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Walks project files respecting .gitignore
pub struct FileWalker {
    root: PathBuf,
    config: DiscoveryConfig,
}

impl FileWalker {
    pub fn new(root: &Path, config: DiscoveryConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
        }
    }

    /// Find all instrumentable files, as paths relative to the project root
    ///
    /// Scans the configured include directories; when they yield nothing the
    /// project root itself is scanned instead.
    pub fn walk(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for dir in &self.config.include {
            let dir_path = self.root.join(dir);
            if dir_path.is_dir() {
                self.walk_dir(&dir_path, &mut files)?;
            }
        }

        if files.is_empty() {
            self.walk_dir(&self.root, &mut files)?;
        }

        files.sort();
        files.dedup();
        Ok(files)
    }

    fn walk_dir(&self, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        let walker = WalkBuilder::new(dir)
            .hidden(true)           // Skip hidden files
            .git_ignore(true)       // Respect .gitignore
            .git_global(true)       // Respect global gitignore
            .git_exclude(true)      // Respect .git/info/exclude
            .require_git(false)     // Work even without .git
            .build();

        for entry in walker.flatten() {
            let path = entry.path();

            if path.is_dir() {
                continue;
            }

            if !self.has_instrumentable_extension(path) {
                continue;
            }

            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            if self.is_excluded(relative) {
                continue;
            }

            files.push(relative.to_path_buf());
        }

        Ok(())
    }

    /// Check the file name against the configured extension list
    fn has_instrumentable_extension(&self, path: &Path) -> bool {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        self.config.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }

    /// Check a root-relative path against the configured exclude patterns
    ///
    /// Patterns containing glob metacharacters match the file name (or the
    /// whole relative path when the pattern has a separator); plain patterns
    /// match any path component or substring.
    fn is_excluded(&self, relative: &Path) -> bool {
        let normalized = relative.to_string_lossy().replace('\\', "/");
        let file_name = relative.file_name().and_then(|n| n.to_str()).unwrap_or("");

        self.config.exclude.iter().any(|pattern| {
            if pattern.contains('*') || pattern.contains('?') {
                let target = if pattern.contains('/') {
                    normalized.as_str()
                } else {
                    file_name
                };
                return glob::Pattern::new(pattern)
                    .map(|p| p.matches(target))
                    .unwrap_or(false);
            }

            if normalized.contains(pattern.as_str()) {
                return true;
            }

            normalized.split('/').any(|part| part == pattern)
        })
    }
}
