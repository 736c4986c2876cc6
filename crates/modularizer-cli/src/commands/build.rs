//! `modularizer build`: Resolve modules and write their reports.

use crate::output::{DirectorySink, JsonSink, StyledOutput};
use anyhow::Context;
use clap::ValueEnum;
use modularizer_engine::{
    build_modules, BuildOutcome, ClassList, ConfigFile, OptionalRules, UnitRegistry,
};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Module-info descriptors and list files (summary on stdout without --output)
    #[default]
    Text,
    /// One JSON document
    Json,
}

#[derive(Debug, Clone)]
pub struct BuildArgs {
    pub config: PathBuf,
    pub classes: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
    pub merge: bool,
}

/// Load the config and class lists, then run the engine
pub fn load_and_build(
    config_path: &Path,
    classes: &[PathBuf],
    merge: bool,
) -> anyhow::Result<(BuildOutcome, UnitRegistry)> {
    let config = ConfigFile::from_file(config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    let mut registry = UnitRegistry::new();
    let mut optional = OptionalRules::new();
    for path in classes {
        let list = ClassList::from_file(path, &mut registry)
            .with_context(|| format!("Failed to read class list {}", path.display()))?;
        info!(
            path = %path.display(),
            classes = list.classes,
            resources = list.resources,
            "class list loaded"
        );
        optional.extend(list.optional);
    }

    let outcome = build_modules(&config, &mut registry, optional, merge)
        .context("Module resolution failed")?;
    Ok((outcome, registry))
}

/// Returns the number of modules resolved
pub fn execute(args: &BuildArgs, out: &mut StyledOutput) -> anyhow::Result<usize> {
    let (outcome, registry) = load_and_build(&args.config, &args.classes, args.merge)?;

    match (&args.output, args.format) {
        (Some(dir), OutputFormat::Text) => {
            let mut sink = DirectorySink::new(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            outcome
                .emit(&registry, &mut sink)
                .with_context(|| format!("Failed to write reports to {}", dir.display()))?;
        }
        (Some(dir), OutputFormat::Json) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let path = dir.join("modules.json");
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut sink = JsonSink::new(BufWriter::new(file));
            outcome
                .emit(&registry, &mut sink)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        (None, OutputFormat::Json) => {
            let mut sink = JsonSink::new(io::stdout().lock());
            outcome.emit(&registry, &mut sink)?;
        }
        (None, OutputFormat::Text) => {
            for report in outcome.reports(&registry) {
                out.module_summary(&report);
            }
        }
    }

    let modules = outcome.order().len();
    if args.format == OutputFormat::Text {
        out.success("Resolved");
        out.plain(&format!(
            " {} modules ({} split packages)",
            modules,
            outcome.split_packages().len()
        ));
        if let Some(dir) = &args.output {
            out.plain(&format!(" into {}", dir.display()));
        }
        out.newline();
        out.flush();
    }
    Ok(modules)
}
