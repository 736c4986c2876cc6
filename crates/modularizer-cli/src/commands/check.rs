//! `modularizer check`: Validate a config, and optionally a full resolution,
//! without writing anything.

use crate::commands::build::load_and_build;
use crate::output::StyledOutput;
use anyhow::Context;
use modularizer_engine::ConfigFile;
use std::path::{Path, PathBuf};

/// Problems found by a check that did not abort it
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CheckSummary {
    pub modules: usize,
    pub split_packages: usize,
    pub unresolved: usize,
}

pub fn execute(
    config: &Path,
    classes: &[PathBuf],
    merge: bool,
    out: &mut StyledOutput,
) -> anyhow::Result<CheckSummary> {
    if classes.is_empty() {
        let parsed = ConfigFile::from_file(config)
            .with_context(|| format!("Failed to load config {}", config.display()))?;
        parsed
            .module_configs()
            .context("Invalid module declarations")?;
        out.success("Config OK");
        out.plain(&format!(": {} modules declared", parsed.modules.len()));
        out.newline();
        out.flush();
        return Ok(CheckSummary {
            modules: parsed.modules.len(),
            ..CheckSummary::default()
        });
    }

    let (outcome, _registry) = load_and_build(config, classes, merge)?;
    let summary = CheckSummary {
        modules: outcome.order().len(),
        split_packages: outcome.split_packages().len(),
        unresolved: outcome
            .infos()
            .map(|info| outcome.table().get(info.module()).unresolved().len())
            .sum(),
    };

    out.success("Resolution OK");
    out.plain(&format!(": {} modules", summary.modules));
    out.newline();
    for (package, owners) in outcome.split_packages().iter() {
        let names: Vec<&str> = owners.iter().map(|&m| outcome.table().name(m)).collect();
        out.warning("split package ");
        out.plain(&format!("{} in {}", package, names.join(", ")));
        out.newline();
    }
    if summary.unresolved > 0 {
        out.warning(&format!("{} unresolved references", summary.unresolved));
        out.newline();
    }
    out.flush();
    Ok(summary)
}
