use crate::cli::CleanArgs;
use crate::core::config::{BACKUP_SUFFIX, DATA_DIR};
use crate::core::error::Result;
use crate::project;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::info;

/// Run the clean command
///
/// Removes everything a run leaves behind: the data directory and any
/// backup files an interrupted run failed to restore.
pub fn run(args: CleanArgs) -> Result<()> {
    let root = project::resolve_root(args.project.as_deref())?;
    let config = super::load_config(&root, None)?;

    let mut removed = 0usize;
    for path in [
        config.inventory_path(&root),
        config.execution_path(&root),
    ] {
        if path.exists() {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }

    let data_dir = root.join(DATA_DIR);
    if data_dir.is_dir() {
        std::fs::remove_dir_all(&data_dir)?;
        removed += 1;
    }

    let restored = restore_backups(&root)?;
    info!(removed, restored, "clean finished");

    if removed == 0 && restored == 0 {
        println!("Nothing to clean");
    } else {
        if removed > 0 {
            println!("Removed collected data");
        }
        if restored > 0 {
            println!("Restored {} file(s) from leftover backups", restored);
        }
    }

    Ok(())
}

/// Restore any `*.sigrun-backup` file onto its original path
///
/// Walks everything under the root, ignore rules disabled, so backups are
/// found even when users gitignore them. Paths are collected before any
/// rename so the walker never observes its own changes.
fn restore_backups(root: &Path) -> Result<usize> {
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .build();

    let mut backups: Vec<PathBuf> = Vec::new();
    for entry in walker.flatten() {
        let path = entry.path();
        if path.is_file() && path.to_string_lossy().ends_with(BACKUP_SUFFIX) {
            backups.push(path.to_path_buf());
        }
    }

    let mut restored = 0;
    for backup in backups {
        let original = original_path(&backup);
        std::fs::rename(&backup, &original)?;
        restored += 1;
    }
    Ok(restored)
}

fn original_path(backup: &Path) -> PathBuf {
    let name = backup.to_string_lossy();
    PathBuf::from(name.trim_end_matches(BACKUP_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_restore_backups_recovers_interrupted_run() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("src")).unwrap();
        std::fs::write(temp.path().join("src/app.js"), "instrumented").unwrap();
        std::fs::write(temp.path().join("src/app.js.sigrun-backup"), "original").unwrap();
        std::fs::write(temp.path().join("src/other.js"), "untouched").unwrap();

        let restored = restore_backups(temp.path()).unwrap();

        assert_eq!(restored, 1);
        assert_eq!(
            std::fs::read_to_string(temp.path().join("src/app.js")).unwrap(),
            "original"
        );
        assert!(!temp.path().join("src/app.js.sigrun-backup").exists());
        assert_eq!(
            std::fs::read_to_string(temp.path().join("src/other.js")).unwrap(),
            "untouched"
        );
    }

    #[test]
    fn test_restore_backups_ignores_gitignore() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".gitignore"), "*.sigrun-backup\n").unwrap();
        std::fs::write(temp.path().join("app.js"), "instrumented").unwrap();
        std::fs::write(temp.path().join("app.js.sigrun-backup"), "original").unwrap();

        let restored = restore_backups(temp.path()).unwrap();
        assert_eq!(restored, 1);
    }

    #[test]
    fn test_restore_backups_empty_project() {
        let temp = TempDir::new().unwrap();
        assert_eq!(restore_backups(temp.path()).unwrap(), 0);
    }

    #[test]
    fn test_original_path_strips_suffix() {
        assert_eq!(
            original_path(Path::new("/p/src/app.js.sigrun-backup")),
            PathBuf::from("/p/src/app.js")
        );
    }
}
