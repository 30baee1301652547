//! JavaScript tracking agents
//!
//! Instrumented files import a generated agent instead of linking against
//! this crate: a CommonJS module that counts executions and writes the
//! record when the Node process exits, plus an ES module wrapper around it
//! so both module systems share one counter per process.

use crate::core::error::Result;
use crate::project::ModuleType;
use crate::runtime::TRACK_FUNCTION;
use std::path::{Path, PathBuf};

/// Agent file consumed by `import` statements
pub const AGENT_ESM_FILE: &str = "runtime.mjs";

/// Agent file consumed by `require` calls
pub const AGENT_CJS_FILE: &str = "runtime.cjs";

/// Agent source for one module flavor, writing its record to `record_path`
pub fn agent_source(module_type: ModuleType, record_path: &Path) -> String {
    match module_type {
        ModuleType::EsModule => esm_source(),
        ModuleType::CommonJs => cjs_source(record_path),
    }
}

/// Write both agent flavors under the project data directory
///
/// The record path is embedded as an absolute path so instrumented code
/// spawned from any working directory writes to the same file. Returns the
/// directory the agents were written to.
pub fn install_agent(project_root: &Path, record_path: &Path) -> Result<PathBuf> {
    let record_path = if record_path.is_absolute() {
        record_path.to_path_buf()
    } else {
        project_root.join(record_path)
    };
    let dir = record_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| project_root.to_path_buf());

    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join(AGENT_CJS_FILE), cjs_source(&record_path))?;
    std::fs::write(dir.join(AGENT_ESM_FILE), esm_source())?;
    Ok(dir)
}

/// Relative import specifier from an instrumented file to its agent
///
/// `file` is the file's path relative to the project root; the specifier
/// climbs back up to the data directory with the flavor the file needs.
pub fn agent_specifier(file: &Path, module_type: ModuleType) -> String {
    let depth = file.parent().map_or(0, |p| p.components().count());
    let agent = match module_type {
        ModuleType::EsModule => AGENT_ESM_FILE,
        ModuleType::CommonJs => AGENT_CJS_FILE,
    };

    let mut specifier = String::new();
    if depth == 0 {
        specifier.push_str("./");
    } else {
        for _ in 0..depth {
            specifier.push_str("../");
        }
    }
    specifier.push_str(crate::core::config::DATA_DIR);
    specifier.push('/');
    specifier.push_str(agent);
    specifier
}

fn cjs_source(record_path: &Path) -> String {
    let path_literal = js_string(&record_path.to_string_lossy());
    format!(
        r#"// Generated by sigrun. Do not edit.
'use strict';

const fs = require('fs');

const RECORD_PATH = {path_literal};

const executions = Object.create(null);
let flushed = false;

function flush() {{
  if (flushed) return;
  flushed = true;
  let totalExecutions = 0;
  for (const id in executions) totalExecutions += executions[id];
  const record = {{
    timestamp: new Date().toISOString(),
    executions: executions,
    totalFunctions: Object.keys(executions).length,
    totalExecutions: totalExecutions,
  }};
  try {{
    fs.writeFileSync(RECORD_PATH, JSON.stringify(record, null, 2));
  }} catch (error) {{
    console.error('sigrun: failed to write execution record:', error);
  }}
}}

process.on('exit', flush);
process.on('SIGINT', () => process.exit(0));
process.on('SIGTERM', () => process.exit(0));
process.on('uncaughtException', (error) => {{
  console.error('Uncaught exception:', error);
  process.exit(1);
}});

function {track}(functionId) {{
  executions[functionId] = (executions[functionId] || 0) + 1;
}}

function getExecutions() {{
  return Object.assign({{}}, executions);
}}

function clear() {{
  for (const id in executions) delete executions[id];
  flushed = false;
}}

module.exports = {{ {track}, getExecutions, clear }};
"#,
        path_literal = path_literal,
        track = TRACK_FUNCTION,
    )
}

fn esm_source() -> String {
    format!(
        r#"// Generated by sigrun. Do not edit.
// Wraps the CommonJS agent so both module systems share one counter.
import {{ createRequire }} from 'module';
const require = createRequire(import.meta.url);

const runtime = require('./{cjs}');

export const {track} = runtime.{track};
export const getExecutions = runtime.getExecutions;
export const clear = runtime.clear;
"#,
        cjs = AGENT_CJS_FILE,
        track = TRACK_FUNCTION,
    )
}

/// Quote a value as a JavaScript string literal
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cjs_agent_embeds_record_path() {
        let source = cjs_source(Path::new("/tmp/project/.sigrun/exec.json"));
        assert!(source.contains(r#"const RECORD_PATH = "/tmp/project/.sigrun/exec.json";"#));
        assert!(source.contains("function __sigrun_track(functionId)"));
        assert!(source.contains("process.on('exit', flush)"));
        assert!(source.contains("module.exports = { __sigrun_track, getExecutions, clear };"));
    }

    #[test]
    fn test_cjs_agent_escapes_path() {
        let source = cjs_source(Path::new(r"C:\proj\.sigrun\exec.json"));
        assert!(source.contains(r#""C:\\proj\\.sigrun\\exec.json""#));
    }

    #[test]
    fn test_esm_agent_delegates_to_cjs() {
        let source = esm_source();
        assert!(source.contains("createRequire(import.meta.url)"));
        assert!(source.contains("require('./runtime.cjs')"));
        assert!(source.contains("export const __sigrun_track = runtime.__sigrun_track;"));
    }

    #[test]
    fn test_install_writes_both_flavors() {
        let temp = TempDir::new().unwrap();
        let record = temp.path().join(".sigrun").join("exec.json");
        let dir = install_agent(temp.path(), &record).unwrap();

        assert_eq!(dir, temp.path().join(".sigrun"));
        assert!(dir.join(AGENT_CJS_FILE).exists());
        assert!(dir.join(AGENT_ESM_FILE).exists());

        let cjs = std::fs::read_to_string(dir.join(AGENT_CJS_FILE)).unwrap();
        assert!(cjs.contains(&record.to_string_lossy().to_string()));
    }

    #[test]
    fn test_install_resolves_relative_record_path() {
        let temp = TempDir::new().unwrap();
        let dir = install_agent(temp.path(), Path::new(".sigrun/exec.json")).unwrap();

        let cjs = std::fs::read_to_string(dir.join(AGENT_CJS_FILE)).unwrap();
        assert!(cjs.contains(&temp.path().join(".sigrun/exec.json").to_string_lossy().to_string()));
    }

    #[test]
    fn test_specifier_climbs_to_data_dir() {
        assert_eq!(
            agent_specifier(Path::new("app.js"), ModuleType::EsModule),
            "./.sigrun/runtime.mjs"
        );
        assert_eq!(
            agent_specifier(Path::new("src/app.js"), ModuleType::EsModule),
            "../.sigrun/runtime.mjs"
        );
        assert_eq!(
            agent_specifier(Path::new("src/utils/helper.cjs"), ModuleType::CommonJs),
            "../../.sigrun/runtime.cjs"
        );
    }
}
