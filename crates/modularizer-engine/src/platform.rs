//! Platform variant of the resolution engine
//!
//! Layers the platform's aggregation policy over [`ModuleBuilder`]:
//! - the boot module is re-exported by the platform base module
//! - every internal `sun.X` module with exported content gets a public
//!   `jdk.X` aggregate that re-exports it
//! - the `jdk` and `jdk.jre` aggregates re-export the public surface
//! - dependences on re-exported modules are redirected to their exporter
//!   unless the requester is connected to the boot module

use crate::builder::{BuildOutcome, ExporterPolicy, ModuleBuilder};
use crate::config::{ConfigFile, ModuleConfig, PlatformSettings, RequireSpec};
use crate::dependence::Modifiers;
use crate::error::BuildError;
use crate::module::{ModuleId, ModuleTable};
use crate::registry::UnitRegistry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Resolution engine with the platform aggregation policy
pub struct PlatformModuleBuilder {
    builder: ModuleBuilder,
    settings: PlatformSettings,
}

impl PlatformModuleBuilder {
    pub fn new(mut builder: ModuleBuilder, settings: PlatformSettings) -> Self {
        builder.options_mut().base_module = Some(settings.base_module.clone());
        Self { builder, settings }
    }

    /// Platform builder for a config file with a `[platform]` table
    pub fn from_config(config: &ConfigFile) -> Result<Self, BuildError> {
        let settings = config
            .platform
            .clone()
            .ok_or_else(|| BuildError::Platform("missing [platform] table".to_string()))?;
        Ok(Self::new(ModuleBuilder::from_config(config)?, settings))
    }

    pub fn builder_mut(&mut self) -> &mut ModuleBuilder {
        &mut self.builder
    }

    pub fn settings(&self) -> &PlatformSettings {
        &self.settings
    }

    pub fn build(&self, registry: &mut UnitRegistry) -> Result<BuildOutcome, BuildError> {
        let builder = &self.builder;
        let settings = &self.settings;

        let mut table = builder.create_modules()?;
        let boot = Self::require(&table, &settings.boot_module, "boot")?;
        let base = Self::require(&table, &settings.base_module, "base")?;
        builder.assign_units(&mut table, registry)?;
        table.build_module_members(builder.options().merge_modules)?;

        let boot = table.group_of(boot);
        let base = table.group_of(base);
        if boot == base {
            return Err(BuildError::Platform(format!(
                "boot module \"{}\" cannot be merged into base module \"{}\"",
                settings.boot_module, settings.base_module
            )));
        }
        let jdk = self.ensure_aggregate(&mut table, &settings.jdk_module)?;
        let jre = self.ensure_aggregate(&mut table, &settings.jre_module)?;

        let mut exporters = self.internal_exporters(&mut table, registry)?;
        exporters.insert(boot, base);
        let boot_name = table.name(boot).to_string();
        table.add_extra_requires(base, reexport(boot_name));

        let privileged: BTreeSet<ModuleId> = table
            .top_level_ids()
            .into_iter()
            .filter(|&m| m == boot || m == base || Self::is_boot_connected(&table, m, boot))
            .collect();

        for m in table.top_level_ids() {
            if m == jdk || m == jre {
                continue;
            }
            let name = table.name(m).to_string();
            if !name.starts_with(&settings.public_prefix) && !name.starts_with(&settings.internal_prefix) {
                continue;
            }
            let exporter = exporters.get(&m).copied().unwrap_or(m);
            if exporter == jdk || exporter == jre {
                continue;
            }
            let exporter_name = table.name(exporter).to_string();
            table.add_extra_requires(jdk, reexport(exporter_name.clone()));
            if privileged.contains(&m) || name == settings.jre_tools_module {
                table.add_extra_requires(jre, reexport(exporter_name));
            }
        }

        info!(
            exporters = exporters.len(),
            privileged = privileged.len(),
            "platform aggregates prepared"
        );
        let policy = ExporterPolicy::AggregateRedirect {
            exporters,
            privileged,
            boot: Some(boot),
        };
        builder.resolve(table, registry, &policy, &[boot, base, jdk])
    }

    fn require(table: &ModuleTable, name: &str, role: &str) -> Result<ModuleId, BuildError> {
        table
            .find(name)
            .ok_or_else(|| BuildError::Platform(format!("{} module \"{}\" is not declared", role, name)))
    }

    /// Existing module of that name, or a new empty aggregate
    fn ensure_aggregate(&self, table: &mut ModuleTable, name: &str) -> Result<ModuleId, BuildError> {
        if let Some(id) = table.find(name) {
            return Ok(table.group_of(id));
        }
        debug!(module = name, "creating aggregate module");
        table.add_module(
            ModuleConfig::new(name, self.builder.options().version.clone()).with_allow_empty(true),
        )
    }

    /// Pair every top-level internal module with its public exporter,
    /// creating the exporter when the internal module has exported units.
    /// The internal module permits its exporter, which re-exports it.
    fn internal_exporters(
        &self,
        table: &mut ModuleTable,
        registry: &UnitRegistry,
    ) -> Result<BTreeMap<ModuleId, ModuleId>, BuildError> {
        let settings = &self.settings;
        let exported = &self.builder.options().exported_packages;
        let mut exporters = BTreeMap::new();

        for m in table.top_level_ids() {
            let name = table.name(m).to_string();
            let Some(rest) = name.strip_prefix(settings.internal_prefix.as_str()) else {
                continue;
            };
            let public_name = format!("{}{}", settings.public_prefix, rest);
            let has_exported_units = table
                .get(m)
                .classes()
                .iter()
                .any(|&k| exported.is_exported(registry.klass(k).package()));

            let exporter = match table.find(&public_name) {
                Some(existing) => table.group_of(existing),
                None if has_exported_units => self.ensure_aggregate(table, &public_name)?,
                None => continue,
            };
            if exporter == m {
                continue;
            }
            let exporter_name = table.name(exporter).to_string();
            table.add_extra_permit(m, exporter_name);
            table.add_extra_requires(exporter, reexport(name));
            exporters.insert(m, exporter);
        }
        Ok(exporters)
    }

    /// Whether any module of the group declares a requires on boot
    fn is_boot_connected(table: &ModuleTable, module: ModuleId, boot: ModuleId) -> bool {
        table.group_members(module).into_iter().any(|g| {
            table
                .get(g)
                .config()
                .requires()
                .iter()
                .filter_map(|spec| table.find(&spec.name))
                .any(|target| table.group_of(target) == boot)
        })
    }
}

fn reexport(name: String) -> RequireSpec {
    RequireSpec {
        name,
        modifiers: Modifiers::PUBLIC,
    }
}
