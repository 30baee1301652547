use crate::cli::ReportArgs;
use crate::core::error::Result;
use crate::instrument::InventoryStore;
use crate::output;
use crate::project;
use crate::report;
use crate::runtime::ExecutionRecord;
use crate::sourcemap::SourceMapper;
use tracing::info;

/// Run the report command
pub fn run(args: ReportArgs) -> Result<i32> {
    let root = project::resolve_root(args.project.as_deref())?;
    let config = super::load_config(&root, args.config.as_deref())?;

    let inventory = InventoryStore::new(config.inventory_path(&root)).load()?;
    let execution = ExecutionRecord::load(&config.execution_path(&root))?;
    info!(
        functions = inventory.total_functions,
        executed = execution.total_functions,
        "aggregating coverage"
    );

    let remap = config.source_maps.enabled && !args.no_remap;
    let mut mapper = SourceMapper::new(&root);
    let mapper_ref = if remap { Some(&mut mapper) } else { None };

    let coverage = report::aggregate(&inventory, &execution, mapper_ref);

    let format = args.format.map_or(config.report.format, Into::into);
    let show_all = args.all || config.report.show_all;
    let rendered = output::render(&coverage, format, show_all);
    print!("{}", rendered);
    if !rendered.ends_with('\n') {
        println!();
    }

    if let Some(output) = &args.output {
        let path = output.clone().unwrap_or_else(|| config.output.report.clone());
        let path = if path.is_absolute() {
            path
        } else {
            root.join(path)
        };
        std::fs::write(&path, serde_json::to_string_pretty(&coverage)?)?;
        println!("Report written to {}", path.display());
    }

    let thresholds = report::evaluate(&coverage, &config.thresholds);
    if !thresholds.passed {
        println!("\nThreshold violations:");
        for failure in &thresholds.failures {
            println!("  - {}", failure);
        }
        return Ok(1);
    }
    if config.thresholds.coverage.is_some() || config.thresholds.max_unused.is_some() {
        println!("\nAll thresholds passed");
    }

    Ok(0)
}
