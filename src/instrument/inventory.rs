//! Static function inventory persistence
//!
//! The inventory accumulates every function discovered during an
//! instrumentation pass, merged across files and keyed by function id.

use crate::core::error::{Error, Result};
use crate::instrument::identify::FunctionKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A function discovered by the instrumentation engine
///
/// `line` is 1-based and `column` 0-based; the id is
/// `name:file:line:column` and doubles as the tracking-call argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub id: String,
    pub name: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub kind: FunctionKind,
}

/// The merged inventory of all instrumented functions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticInventory {
    pub timestamp: DateTime<Utc>,
    pub functions: Vec<FunctionRecord>,
    pub total_functions: usize,
}

impl StaticInventory {
    fn empty() -> Self {
        Self {
            timestamp: Utc::now(),
            functions: Vec::new(),
            total_functions: 0,
        }
    }
}

/// Read/merge/write access to the inventory file
pub struct InventoryStore {
    path: PathBuf,
}

impl InventoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the inventory, failing when no pass has written one yet
    pub fn load(&self) -> Result<StaticInventory> {
        if !self.path.exists() {
            return Err(Error::InventoryNotFound {
                path: self.path.clone(),
            });
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Fold one file's records into the inventory on disk
    ///
    /// Existing ids win; a record arriving with an id the inventory already
    /// holds is dropped. An unreadable existing file is replaced rather than
    /// propagated as an error. Does nothing when `records` is empty.
    pub fn merge(&self, records: &[FunctionRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut inventory = if self.path.exists() {
            std::fs::read_to_string(&self.path)
                .ok()
                .and_then(|content| serde_json::from_str(&content).ok())
                .unwrap_or_else(StaticInventory::empty)
        } else {
            StaticInventory::empty()
        };

        let existing: HashSet<String> =
            inventory.functions.iter().map(|f| f.id.clone()).collect();
        for record in records {
            if existing.contains(&record.id) {
                debug!(id = %record.id, "dropping colliding inventory record");
                continue;
            }
            inventory.functions.push(record.clone());
        }

        inventory.timestamp = Utc::now();
        inventory.total_functions = inventory.functions.len();
        self.write(&inventory)
    }

    /// Delete the inventory file if present
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn write(&self, inventory: &StaticInventory) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(inventory)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: &str) -> FunctionRecord {
        let name = id.split(':').next().unwrap().to_string();
        FunctionRecord {
            id: id.to_string(),
            name,
            file: "src/app.js".to_string(),
            line: 1,
            column: 0,
            kind: FunctionKind::Function,
        }
    }

    #[test]
    fn test_merge_creates_inventory() {
        let dir = tempdir().unwrap();
        let store = InventoryStore::new(dir.path().join(".sigrun/inventory.json"));

        store
            .merge(&[record("a:src/app.js:1:0"), record("b:src/app.js:4:0")])
            .unwrap();

        let inventory = store.load().unwrap();
        assert_eq!(inventory.total_functions, 2);
        assert_eq!(inventory.functions.len(), 2);
    }

    #[test]
    fn test_merge_dedupes_by_id() {
        let dir = tempdir().unwrap();
        let store = InventoryStore::new(dir.path().join("inventory.json"));

        store.merge(&[record("a:src/app.js:1:0")]).unwrap();
        store
            .merge(&[record("a:src/app.js:1:0"), record("b:src/app.js:4:0")])
            .unwrap();

        let inventory = store.load().unwrap();
        assert_eq!(inventory.total_functions, 2);
    }

    #[test]
    fn test_merge_empty_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = InventoryStore::new(dir.path().join("inventory.json"));

        store.merge(&[]).unwrap();
        assert!(!store.exists());
    }

    #[test]
    fn test_merge_replaces_corrupt_inventory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = InventoryStore::new(&path);
        store.merge(&[record("a:src/app.js:1:0")]).unwrap();

        let inventory = store.load().unwrap();
        assert_eq!(inventory.total_functions, 1);
    }

    #[test]
    fn test_load_missing_inventory() {
        let dir = tempdir().unwrap();
        let store = InventoryStore::new(dir.path().join("inventory.json"));
        assert!(matches!(
            store.load(),
            Err(Error::InventoryNotFound { .. })
        ));
    }

    #[test]
    fn test_serialized_field_names() {
        let dir = tempdir().unwrap();
        let store = InventoryStore::new(dir.path().join("inventory.json"));
        store.merge(&[record("a:src/app.js:1:0")]).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value["totalFunctions"].is_number());
        assert_eq!(value["functions"][0]["kind"], "function");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempdir().unwrap();
        let store = InventoryStore::new(dir.path().join("inventory.json"));
        store.merge(&[record("a:src/app.js:1:0")]).unwrap();
        assert!(store.exists());

        store.clear().unwrap();
        assert!(!store.exists());
        // Clearing twice is fine
        store.clear().unwrap();
    }
}
