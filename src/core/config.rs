//! Configuration management

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project configuration, loaded from `sigrun.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discovery: DiscoveryConfig,
    pub output: OutputConfig,
    pub thresholds: ThresholdConfig,
    pub report: ReportConfig,
    pub source_maps: SourceMapConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Directories scanned for instrumentable files
    pub include: Vec<String>,
    /// Path components or glob patterns to skip
    pub exclude: Vec<String>,
    /// File extensions eligible for instrumentation
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Static inventory path, relative to the project root
    pub inventory: PathBuf,
    /// Execution record path, relative to the project root
    pub execution: PathBuf,
    /// Default path for `report --output`
    pub report: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Minimum coverage percent (0-100)
    pub coverage: Option<f64>,
    /// Maximum allowed unused functions
    pub max_unused: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Report format: "human" or "json"
    pub format: ReportFormat,
    /// List every unused function instead of truncating
    pub show_all: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceMapConfig {
    /// Remap reported positions through source maps when available
    pub enabled: bool,
}

/// Report format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Human,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            output: OutputConfig::default(),
            thresholds: ThresholdConfig::default(),
            report: ReportConfig::default(),
            source_maps: SourceMapConfig::default(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            include: vec!["src".to_string(), "lib".to_string(), "app".to_string()],
            exclude: vec![
                "node_modules".to_string(),
                "dist".to_string(),
                "build".to_string(),
                "coverage".to_string(),
                ".git".to_string(),
                "test".to_string(),
                "tests".to_string(),
                "__tests__".to_string(),
                "*.test.js".to_string(),
                "*.test.ts".to_string(),
                "*.spec.js".to_string(),
                "*.spec.ts".to_string(),
            ],
            extensions: vec![
                ".js".to_string(),
                ".jsx".to_string(),
                ".ts".to_string(),
                ".tsx".to_string(),
                ".mjs".to_string(),
                ".cjs".to_string(),
            ],
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            inventory: PathBuf::from(INVENTORY_FILE),
            execution: PathBuf::from(EXECUTION_FILE),
            report: PathBuf::from("sigrun-report.json"),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: ReportFormat::Human,
            show_all: false,
        }
    }
}

impl Default for SourceMapConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration for a project, searching for `sigrun.toml` at its root
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(CONFIG_FILE);

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from an explicit file path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigError {
                message: format!("Config file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.merge_default_excludes();
        config.validate()?;
        Ok(config)
    }

    /// Validate threshold ranges
    pub fn validate(&self) -> Result<()> {
        if let Some(coverage) = self.thresholds.coverage {
            if !(0.0..=100.0).contains(&coverage) {
                return Err(Error::ConfigError {
                    message: "Coverage threshold must be between 0 and 100".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Inventory path resolved against the project root
    pub fn inventory_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.output.inventory)
    }

    /// Execution record path resolved against the project root
    pub fn execution_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.output.execution)
    }

    /// Custom excludes extend the defaults rather than replacing them
    fn merge_default_excludes(&mut self) {
        let defaults = DiscoveryConfig::default().exclude;
        let custom = std::mem::take(&mut self.discovery.exclude);
        let mut merged = defaults;
        for pattern in custom {
            if !merged.contains(&pattern) {
                merged.push(pattern);
            }
        }
        self.discovery.exclude = merged;
    }
}

/// Config file name searched at the project root
pub const CONFIG_FILE: &str = "sigrun.toml";

/// Working directory for instrumentation artifacts
pub const DATA_DIR: &str = ".sigrun";

pub const INVENTORY_FILE: &str = ".sigrun/inventory.json";
pub const EXECUTION_FILE: &str = ".sigrun/exec.json";

/// Suffix appended to pre-instrumentation file backups
pub const BACKUP_SUFFIX: &str = ".sigrun-backup";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.discovery.include, vec!["src", "lib", "app"]);
        assert!(config.discovery.exclude.contains(&"node_modules".to_string()));
        assert!(config.discovery.extensions.contains(&".tsx".to_string()));
        assert_eq!(config.report.format, ReportFormat::Human);
        assert!(config.source_maps.enabled);
        assert!(config.thresholds.coverage.is_none());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.discovery.include, vec!["src", "lib", "app"]);
    }

    #[test]
    fn test_partial_file_overrides_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "[thresholds]\ncoverage = 80\n\n[report]\nformat = \"json\"\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.thresholds.coverage, Some(80.0));
        assert_eq!(config.report.format, ReportFormat::Json);
        assert_eq!(config.discovery.include, vec!["src", "lib", "app"]);
    }

    #[test]
    fn test_custom_excludes_extend_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[discovery]\nexclude = [\"generated\"]\n").unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert!(config.discovery.exclude.contains(&"node_modules".to_string()));
        assert!(config.discovery.exclude.contains(&"generated".to_string()));
    }

    #[test]
    fn test_coverage_threshold_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[thresholds]\ncoverage = 150\n").unwrap();

        assert!(Config::load(dir.path()).is_err());
    }
}
