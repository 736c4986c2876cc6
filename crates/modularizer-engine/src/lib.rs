//! Modularizer Engine
//!
//! Partitions a flat set of compiled units and resources into named
//! modules and derives the module graph:
//! - Unit registry and class-list reader
//! - Module configs (TOML) and name patterns
//! - Reference closure, member aggregation, package summaries
//! - Dependences, views, permits and split-package handling
//! - Dependency-first module ordering
//! - Platform aggregation variant
//! - Report sinks

pub mod builder;
pub mod classlist;
pub mod config;
pub mod dependence;
pub mod error;
pub mod hooks;
pub mod info;
pub mod module;
pub mod order;
pub mod package;
pub mod pattern;
pub mod platform;
pub mod registry;
pub mod report;
pub mod service;
pub mod view;

pub use builder::{
    apply_split_package_locals, BuildOptions, BuildOutcome, ExporterPolicy, ModuleBuilder,
    RequiresMap,
};
pub use classlist::{ClassList, ClassListError};
pub use config::{
    internal_view_name, ConfigError, ConfigFile, ModuleConfig, ModuleDecl, PlatformSettings,
    RequireSpec, Settings, ViewConfig,
};
pub use dependence::{Dependence, Modifiers};
pub use error::BuildError;
pub use hooks::{
    DeclaredEdges, NeverOptional, NoSyntheticEdges, OptionalRules, OptionalityClassifier,
    SyntheticDependencySource, SyntheticEdge,
};
pub use info::ModuleInfo;
pub use module::{ClosureStats, Module, ModuleId, ModuleTable, Reference};
pub use order::DependencyGraph;
pub use package::{ExportedPackages, PackageInfo, SplitPackages};
pub use pattern::{Pattern, PatternError, PatternSet};
pub use platform::PlatformModuleBuilder;
pub use registry::{ClassRecord, Klass, KlassId, RegistryError, Resource, ResourceId, UnitRegistry};
pub use report::{ModuleReport, ReportSink, RequiresReport, SplitPackageReport, UnresolvedReport};
pub use service::{ServiceDescriptor, ServiceError};
pub use view::{ModuleView, ModuleViews, ViewKind};

/// Build the modules a config file describes over a populated registry
///
/// A `[platform]` table selects [`PlatformModuleBuilder`]. `optional`
/// is merged with the config's `[[optional]]` rules.
pub fn build_modules(
    config: &ConfigFile,
    registry: &mut UnitRegistry,
    optional: OptionalRules,
    merge_modules: bool,
) -> Result<BuildOutcome, BuildError> {
    let mut rules = OptionalRules::from_decls(&config.optional)?;
    rules.extend(optional);
    let mut builder = ModuleBuilder::from_config(config)?.with_classifier(rules);
    builder.options_mut().merge_modules = merge_modules;

    match &config.platform {
        Some(settings) => PlatformModuleBuilder::new(builder, settings.clone()).build(registry),
        None => builder.build(registry),
    }
}
