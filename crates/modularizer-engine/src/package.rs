//! Per-module package summaries and split-package detection

use crate::module::ModuleId;
use crate::registry::{KlassId, ResourceId, UnitRegistry};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Statistics of one package inside one module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageInfo {
    pub name: String,
    pub class_count: usize,
    pub class_bytes: u64,
    pub public_class_count: usize,
    pub inner_class_count: usize,
    pub resource_count: usize,
    pub resource_bytes: u64,
    /// Exported by the module's default view
    pub exported: bool,
}

impl PackageInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether any unit (as opposed to only resources) lives here
    pub fn has_classes(&self) -> bool {
        self.class_count > 0
    }
}

/// Set of packages exported by default views. Empty means every package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportedPackages {
    packages: BTreeSet<String>,
}

impl ExportedPackages {
    pub fn new<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            packages: packages.into_iter().map(Into::into).collect(),
        }
    }

    /// Every package is exported
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_restricted(&self) -> bool {
        !self.packages.is_empty()
    }

    pub fn is_exported(&self, package: &str) -> bool {
        self.packages.is_empty() || self.packages.contains(package)
    }
}

/// Summarize the packages of a set of units and resources
pub fn collect_packages<'a>(
    registry: &UnitRegistry,
    classes: impl IntoIterator<Item = &'a KlassId>,
    resources: impl IntoIterator<Item = &'a ResourceId>,
    exported: &ExportedPackages,
) -> BTreeMap<String, PackageInfo> {
    let mut packages: BTreeMap<String, PackageInfo> = BTreeMap::new();
    for &id in classes {
        let k = registry.klass(id);
        let info = packages
            .entry(k.package().to_string())
            .or_insert_with(|| PackageInfo::new(k.package()));
        info.class_count += 1;
        info.class_bytes += k.size();
        if k.is_public() {
            info.public_class_count += 1;
        }
        if k.is_inner() {
            info.inner_class_count += 1;
        }
    }
    for &id in resources {
        let r = registry.resource(id);
        let package = r.package();
        let info = packages
            .entry(package.clone())
            .or_insert_with(|| PackageInfo::new(package));
        info.resource_count += 1;
        info.resource_bytes += r.size();
    }
    for info in packages.values_mut() {
        info.exported = info.has_classes() && exported.is_exported(&info.name);
    }
    packages
}

/// Packages whose units are spread over more than one top-level module
#[derive(Debug, Clone, Default)]
pub struct SplitPackages {
    owners: BTreeMap<String, BTreeSet<ModuleId>>,
}

impl SplitPackages {
    /// Detect split packages. Only packages holding units count; resource
    /// directories are routinely shared.
    pub fn detect<'a, I>(modules: I) -> Self
    where
        I: IntoIterator<Item = (ModuleId, &'a BTreeMap<String, PackageInfo>)>,
    {
        let mut all: BTreeMap<String, BTreeSet<ModuleId>> = BTreeMap::new();
        for (module, packages) in modules {
            for info in packages.values().filter(|p| p.has_classes()) {
                all.entry(info.name.clone()).or_default().insert(module);
            }
        }
        all.retain(|_, owners| owners.len() > 1);
        Self { owners: all }
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_split(&self, package: &str) -> bool {
        self.owners.contains_key(package)
    }

    /// Split package names with their owning modules
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<ModuleId>)> {
        self.owners.iter().map(|(p, m)| (p.as_str(), m))
    }

    /// Modules sharing at least one split package with `module`
    pub fn partners(&self, module: ModuleId) -> BTreeSet<ModuleId> {
        self.owners
            .values()
            .filter(|owners| owners.contains(&module))
            .flat_map(|owners| owners.iter().copied())
            .filter(|&m| m != module)
            .collect()
    }
}
