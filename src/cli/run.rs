use crate::cli::RunArgs;
use crate::core::config::BACKUP_SUFFIX;
use crate::core::error::Result;
use crate::instrument::{Instrumenter, InventoryStore};
use crate::parse::FileWalker;
use crate::project::{self, ModuleTypeResolver};
use crate::runtime;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A file rewritten by this run, with the backup that restores it
struct InstrumentedFile {
    path: PathBuf,
    backup: PathBuf,
}

/// Run the run command
///
/// Instruments the project, executes the command against the rewritten
/// sources, then restores the originals. The returned code is the child's
/// exit code, so `sigrun run -- npm test` fails exactly when the tests do.
pub fn run(args: RunArgs) -> Result<i32> {
    let root = project::resolve_root(args.project.as_deref())?;
    let config = super::load_config(&root, args.config.as_deref())?;
    info!(root = %root.display(), "instrumenting project");

    let inventory = InventoryStore::new(config.inventory_path(&root));
    let execution_path = config.execution_path(&root);

    // Stale records from a previous run would pollute the next report
    if !args.no_clean {
        inventory.clear()?;
        if execution_path.exists() {
            std::fs::remove_file(&execution_path)?;
        }
    }

    let start = Instant::now();
    let files = FileWalker::new(&root, config.discovery.clone()).walk()?;
    if files.is_empty() {
        println!("No JavaScript/TypeScript files found to instrument");
        println!("Looked in: {}", config.discovery.include.join(", "));
        return Ok(1);
    }
    println!("Found {} file(s) to instrument", files.len());

    runtime::install_agent(&root, &execution_path)?;

    let resolver = ModuleTypeResolver::new();
    let mut instrumented = Vec::new();
    let mut failed = 0usize;

    for relative in &files {
        match instrument_one(&root, relative, &resolver, &inventory) {
            Ok(Some(file)) => {
                if args.verbose {
                    println!("  + {}", relative.display());
                }
                instrumented.push(file);
            }
            Ok(None) => {
                debug!(file = %relative.display(), "unchanged");
            }
            Err(e) => {
                warn!(file = %relative.display(), error = %e, "instrumentation failed");
                eprintln!("  failed to instrument {}: {}", relative.display(), e);
                failed += 1;
            }
        }
    }

    println!(
        "Instrumented {} file(s) in {:.2}s",
        instrumented.len(),
        start.elapsed().as_secs_f64()
    );
    if failed > 0 {
        println!("  {} file(s) failed and were left untouched", failed);
    }

    println!("\nRunning: {}\n", args.command.join(" "));
    let exit_code = execute(&args.command, &root);

    println!("\nRestoring original files...");
    let restore_failures = restore_all(&instrumented);
    if restore_failures == 0 {
        println!("Restored {} file(s)", instrumented.len());
    } else {
        eprintln!(
            "Failed to restore {} file(s); run `sigrun clean` to retry",
            restore_failures
        );
    }

    if execution_path.exists() {
        println!("\nExecution data collected. Run `sigrun report` to see the analysis.");
    } else {
        println!("\nNo execution data collected.");
        println!("Make sure the command actually runs the instrumented code.");
    }

    Ok(exit_code)
}

/// Instrument one file in place, backing up the original first
///
/// Returns `None` when instrumentation leaves the file unchanged (already
/// instrumented, declaration file, nothing to track).
fn instrument_one(
    root: &Path,
    relative: &Path,
    resolver: &ModuleTypeResolver,
    inventory: &InventoryStore,
) -> Result<Option<InstrumentedFile>> {
    let path = root.join(relative);
    let module_type = resolver.classify(&path);
    let specifier = runtime::agent_specifier(relative, module_type);
    // Function ids always use forward slashes, whatever the host separator
    let label = relative.to_string_lossy().replace('\\', "/");

    let source = std::fs::read_to_string(&path)?;
    let mut instrumenter = Instrumenter::for_path(&path)?.with_specifier(&specifier);
    let out = instrumenter.instrument(&source, &label, module_type)?;

    if out.code == source {
        return Ok(None);
    }

    let backup = backup_path(&path);
    std::fs::copy(&path, &backup)?;
    if let Err(e) = std::fs::write(&path, &out.code) {
        // Put the original back rather than leave a half-written file
        let _ = std::fs::copy(&backup, &path);
        let _ = std::fs::remove_file(&backup);
        return Err(e.into());
    }

    // Inventory failures are reported but never abort the run
    if let Err(e) = inventory.merge(&out.functions) {
        eprintln!("  failed to record inventory for {}: {}", label, e);
    }

    Ok(Some(InstrumentedFile { path, backup }))
}

fn backup_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(BACKUP_SUFFIX);
    PathBuf::from(os)
}

/// Spawn the command with inherited stdio and wait for it
fn execute(command: &[String], root: &Path) -> i32 {
    let (program, arguments) = match command.split_first() {
        Some(split) => split,
        None => return 1,
    };

    match Command::new(program).args(arguments).current_dir(root).status() {
        Ok(status) => status.code().unwrap_or(1),
        Err(e) => {
            eprintln!("Failed to execute {}: {}", program, e);
            1
        }
    }
}

/// Copy every backup over its instrumented file and delete the backup
fn restore_all(files: &[InstrumentedFile]) -> usize {
    let mut failures = 0;
    for file in files {
        if let Err(e) = std::fs::copy(&file.backup, &file.path) {
            eprintln!("  failed to restore {}: {}", file.path.display(), e);
            failures += 1;
            continue;
        }
        if let Err(e) = std::fs::remove_file(&file.backup) {
            eprintln!(
                "  failed to remove backup {}: {}",
                file.backup.display(),
                e
            );
        }
    }
    failures
}
