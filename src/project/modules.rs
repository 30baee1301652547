//! Module-system classification following Node.js resolution rules

use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// How the JavaScript runtime loads a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleType {
    EsModule,
    CommonJs,
}

impl ModuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleType::EsModule => "esm",
            ModuleType::CommonJs => "commonjs",
        }
    }
}

impl std::fmt::Display for ModuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The `type` field is all that matters here
#[derive(Debug, Deserialize)]
struct PackageManifest {
    #[serde(rename = "type")]
    module_type: Option<String>,
}

/// Classifies files as ES modules or CommonJS
///
/// Caches `package.json` lookups per directory for the resolver's lifetime;
/// callers expecting live manifest edits must call [`clear`](Self::clear).
pub struct ModuleTypeResolver {
    cache: RwLock<HashMap<PathBuf, ModuleType>>,
}

impl ModuleTypeResolver {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Classify a file by extension, then by the nearest `package.json`
    ///
    /// `.mjs`/`.mts` are always ES modules and `.cjs`/`.cts` always CommonJS;
    /// everything else walks up for a manifest `"type"` field and defaults to
    /// CommonJS when none is found.
    pub fn classify(&self, path: &Path) -> ModuleType {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext {
            "mjs" | "mts" => return ModuleType::EsModule,
            "cjs" | "cts" => return ModuleType::CommonJs,
            _ => {}
        }

        self.find_package_type(path)
    }

    /// Reset the manifest cache
    pub fn clear(&self) {
        self.cache.write().clear();
    }

    /// Walk up from the file's directory to the nearest readable manifest
    fn find_package_type(&self, path: &Path) -> ModuleType {
        let mut current = match path.parent() {
            Some(dir) => dir.to_path_buf(),
            None => return ModuleType::CommonJs,
        };

        loop {
            if let Some(cached) = self.cache.read().get(&current) {
                return *cached;
            }

            if let Some(module_type) = read_package_type(&current) {
                self.cache.write().insert(current, module_type);
                return module_type;
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }

        ModuleType::CommonJs
    }
}

impl Default for ModuleTypeResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a directory's `package.json` module type
///
/// Missing, unreadable, and malformed manifests all return `None` so the
/// walk continues to the next ancestor.
fn read_package_type(dir: &Path) -> Option<ModuleType> {
    let manifest_path = dir.join("package.json");
    let content = std::fs::read_to_string(&manifest_path).ok()?;
    let manifest: PackageManifest = serde_json::from_str(&content).ok()?;

    match manifest.module_type.as_deref() {
        Some("module") => Some(ModuleType::EsModule),
        _ => Some(ModuleType::CommonJs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extension_overrides() {
        let resolver = ModuleTypeResolver::new();
        assert_eq!(
            resolver.classify(Path::new("/tmp/nowhere/a.mjs")),
            ModuleType::EsModule
        );
        assert_eq!(
            resolver.classify(Path::new("/tmp/nowhere/a.cjs")),
            ModuleType::CommonJs
        );
    }

    #[test]
    fn test_package_type_module() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("package.json"), r#"{"type": "module"}"#).unwrap();
        let file = temp.path().join("src").join("index.js");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "").unwrap();

        let resolver = ModuleTypeResolver::new();
        assert_eq!(resolver.classify(&file), ModuleType::EsModule);
    }

    #[test]
    fn test_package_without_type_defaults_to_commonjs() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("package.json"), r#"{"name": "pkg"}"#).unwrap();
        let file = temp.path().join("index.js");
        std::fs::write(&file, "").unwrap();

        let resolver = ModuleTypeResolver::new();
        assert_eq!(resolver.classify(&file), ModuleType::CommonJs);
    }

    #[test]
    fn test_malformed_manifest_continues_walk() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("package.json"), r#"{"type": "module"}"#).unwrap();
        let nested = temp.path().join("packages").join("app");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("package.json"), "{not json").unwrap();
        let file = nested.join("index.js");
        std::fs::write(&file, "").unwrap();

        let resolver = ModuleTypeResolver::new();
        assert_eq!(resolver.classify(&file), ModuleType::EsModule);
    }

    #[test]
    fn test_nearest_manifest_wins() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("package.json"), r#"{"type": "module"}"#).unwrap();
        let nested = temp.path().join("legacy");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("package.json"), r#"{"type": "commonjs"}"#).unwrap();
        let file = nested.join("index.js");
        std::fs::write(&file, "").unwrap();

        let resolver = ModuleTypeResolver::new();
        assert_eq!(resolver.classify(&file), ModuleType::CommonJs);
    }

    #[test]
    fn test_cache_and_clear() {
        let temp = TempDir::new().unwrap();
        let manifest = temp.path().join("package.json");
        std::fs::write(&manifest, r#"{"name": "pkg"}"#).unwrap();
        let file = temp.path().join("index.js");
        std::fs::write(&file, "").unwrap();

        let resolver = ModuleTypeResolver::new();
        assert_eq!(resolver.classify(&file), ModuleType::CommonJs);

        // Cached lookup does not see the manifest change
        std::fs::write(&manifest, r#"{"type": "module"}"#).unwrap();
        assert_eq!(resolver.classify(&file), ModuleType::CommonJs);

        resolver.clear();
        assert_eq!(resolver.classify(&file), ModuleType::EsModule);
    }
}
