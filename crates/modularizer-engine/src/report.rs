//! Build reports
//!
//! A [`ModuleReport`] is the serializable summary of one finalized module.
//! Reports are handed to a [`ReportSink`] in dependency order.

use crate::builder::BuildOutcome;
use crate::module::ModuleId;
use crate::package::PackageInfo;
use crate::registry::UnitRegistry;
use crate::view::ModuleView;
use serde::Serialize;
use std::io;

/// One `requires` clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequiresReport {
    pub module: String,
    /// View the requester is bound to
    pub view: String,
    pub modifiers: Vec<&'static str>,
}

/// A reference that no module claimed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedReport {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleReport {
    pub name: String,
    pub version: String,
    pub main_class: Option<String>,
    pub requires: Vec<RequiresReport>,
    pub permits: Vec<String>,
    pub views: Vec<ModuleView>,
    pub packages: Vec<PackageInfo>,
    pub classes: Vec<String>,
    pub resources: Vec<String>,
    pub unresolved: Vec<UnresolvedReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitPackageReport {
    pub package: String,
    pub modules: Vec<String>,
}

/// Receives the reports of a build
pub trait ReportSink {
    /// Called once with the ordered module names before any report
    fn begin(&mut self, _order: &[String]) -> io::Result<()> {
        Ok(())
    }

    fn module(&mut self, report: &ModuleReport) -> io::Result<()>;

    /// Called once after the last report
    fn finish(&mut self, _split_packages: &[SplitPackageReport]) -> io::Result<()> {
        Ok(())
    }
}

/// Collects reports in memory
impl ReportSink for Vec<ModuleReport> {
    fn module(&mut self, report: &ModuleReport) -> io::Result<()> {
        self.push(report.clone());
        Ok(())
    }
}

impl BuildOutcome {
    /// Report of one top-level module
    pub fn report(&self, registry: &UnitRegistry, id: ModuleId) -> Option<ModuleReport> {
        let info = self.info(id)?;
        let module = self.table().get(id);

        let requires = info
            .requires()
            .iter()
            .map(|dep| RequiresReport {
                module: dep.module_name().to_string(),
                view: dep.view().unwrap_or(dep.target()).to_string(),
                modifiers: dep.modifiers().keywords(),
            })
            .collect();

        let mut classes: Vec<String> = module
            .classes()
            .iter()
            .map(|&k| registry.klass(k).name().to_string())
            .collect();
        classes.sort();
        let mut resources: Vec<String> = module
            .resources()
            .iter()
            .map(|&r| registry.resource(r).name().to_string())
            .collect();
        resources.sort();
        let unresolved = module
            .unresolved()
            .iter()
            .map(|r| UnresolvedReport {
                from: registry.klass(r.referrer).name().to_string(),
                to: registry.klass(r.referree).name().to_string(),
            })
            .collect();

        Some(ModuleReport {
            name: info.name().to_string(),
            version: info.version().to_string(),
            main_class: info.main_class().map(str::to_string),
            requires,
            permits: info.permits().iter().cloned().collect(),
            views: info.views().iter().cloned().collect(),
            packages: module.packages().values().cloned().collect(),
            classes,
            resources,
            unresolved,
        })
    }

    /// Reports of every module, dependencies first
    pub fn reports(&self, registry: &UnitRegistry) -> Vec<ModuleReport> {
        self.order()
            .iter()
            .filter_map(|&id| self.report(registry, id))
            .collect()
    }

    pub fn split_package_reports(&self) -> Vec<SplitPackageReport> {
        self.split_packages()
            .iter()
            .map(|(package, owners)| SplitPackageReport {
                package: package.to_string(),
                modules: owners
                    .iter()
                    .map(|&m| self.table().name(m).to_string())
                    .collect(),
            })
            .collect()
    }

    /// Drive `sink` over the whole outcome
    pub fn emit(&self, registry: &UnitRegistry, sink: &mut dyn ReportSink) -> io::Result<()> {
        let order: Vec<String> = self
            .ordered_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        sink.begin(&order)?;
        for report in self.reports(registry) {
            sink.module(&report)?;
        }
        sink.finish(&self.split_package_reports())
    }
}
