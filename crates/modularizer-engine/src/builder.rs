//! Resolution engine
//!
//! Runs the passes of a build in sequence:
//! 1. create modules from their configs
//! 2. seed every module's roots, then close over references
//! 3. aggregate members into top-level modules
//! 4. summarize packages and detect split packages
//! 5. build views and collect each module's dependences
//! 6. promote edges across split packages to LOCAL
//! 7. finalize module infos, fix up permits, order the graph

use crate::config::{ConfigFile, ModuleConfig, Settings, ViewConfig};
use crate::dependence::{Dependence, Modifiers};
use crate::error::BuildError;
use crate::hooks::{
    DeclaredEdges, NeverOptional, NoSyntheticEdges, OptionalRules, OptionalityClassifier,
    SyntheticDependencySource,
};
use crate::info::{fixup_permits, freeze_permits, ModuleInfo};
use crate::module::{ModuleId, ModuleTable};
use crate::order::DependencyGraph;
use crate::package::{collect_packages, ExportedPackages, SplitPackages};
use crate::registry::UnitRegistry;
use crate::view::{ModuleViews, ViewKind};
use rustc_hash::FxHashMap;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Dependences of every top-level module, keyed by requester then target
pub type RequiresMap = BTreeMap<ModuleId, BTreeMap<ModuleId, Dependence>>;

/// Knobs of a build
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Aggregate members into their parents
    pub merge_modules: bool,
    /// Version of modules synthesized by the engine
    pub version: String,
    /// Foundational module; its optional synthetic edges are dropped
    pub base_module: Option<String>,
    /// Catch-all module for unclaimed units
    pub unknown_module: Option<String>,
    pub exported_packages: ExportedPackages,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            merge_modules: true,
            version: "1.0".to_string(),
            base_module: Some("base".to_string()),
            unknown_module: None,
            exported_packages: ExportedPackages::all(),
        }
    }
}

impl BuildOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            merge_modules: true,
            version: settings.version.clone(),
            base_module: Some(settings.base_module.clone()),
            unknown_module: settings.unknown_module.clone(),
            exported_packages: ExportedPackages::new(settings.exported_packages.iter().cloned()),
        }
    }

    pub fn with_merge_modules(mut self, merge: bool) -> Self {
        self.merge_modules = merge;
        self
    }
}

/// Who satisfies a dependence in the requester's requires clause
#[derive(Debug, Clone, Default)]
pub enum ExporterPolicy {
    /// The target itself
    #[default]
    Default,
    /// A re-exporting aggregate stands in for the module it re-exports,
    /// except toward privileged requesters
    AggregateRedirect {
        exporters: BTreeMap<ModuleId, ModuleId>,
        privileged: BTreeSet<ModuleId>,
        boot: Option<ModuleId>,
    },
}

impl ExporterPolicy {
    /// The module a requester should depend on to reach `target`
    pub fn exporter(&self, target: ModuleId, requester: ModuleId) -> ModuleId {
        match self {
            ExporterPolicy::Default => target,
            ExporterPolicy::AggregateRedirect {
                exporters,
                privileged,
                ..
            } => {
                if privileged.contains(&requester) {
                    return target;
                }
                match exporters.get(&target) {
                    Some(&exporter) if exporter != requester => exporter,
                    _ => target,
                }
            }
        }
    }

    /// Whether optional dependences of `requester` are dropped
    pub fn drops_optional(&self, requester: ModuleId) -> bool {
        matches!(self, ExporterPolicy::AggregateRedirect { boot: Some(boot), .. } if *boot == requester)
    }
}

/// Result of a successful build
#[derive(Debug)]
pub struct BuildOutcome {
    table: ModuleTable,
    infos: BTreeMap<ModuleId, ModuleInfo>,
    order: Vec<ModuleId>,
    split_packages: SplitPackages,
}

impl BuildOutcome {
    pub fn table(&self) -> &ModuleTable {
        &self.table
    }

    pub fn module_info(&self, name: &str) -> Option<&ModuleInfo> {
        self.table.find(name).and_then(|id| self.infos.get(&id))
    }

    pub fn info(&self, id: ModuleId) -> Option<&ModuleInfo> {
        self.infos.get(&id)
    }

    /// Infos of all top-level modules, by id
    pub fn infos(&self) -> impl Iterator<Item = &ModuleInfo> {
        self.infos.values()
    }

    /// Dependencies-first module order
    pub fn order(&self) -> &[ModuleId] {
        &self.order
    }

    pub fn ordered_names(&self) -> Vec<&str> {
        self.order.iter().map(|&id| self.table.name(id)).collect()
    }

    pub fn split_packages(&self) -> &SplitPackages {
        &self.split_packages
    }
}

/// Builds the module graph from configs and a populated unit registry
pub struct ModuleBuilder {
    configs: Vec<ModuleConfig>,
    options: BuildOptions,
    classifier: Box<dyn OptionalityClassifier>,
    synthetic: Box<dyn SyntheticDependencySource>,
}

impl ModuleBuilder {
    pub fn new(configs: Vec<ModuleConfig>, options: BuildOptions) -> Self {
        Self {
            configs,
            options,
            classifier: Box::new(NeverOptional),
            synthetic: Box::new(NoSyntheticEdges),
        }
    }

    /// Builder for a loaded config file, wired with its optional rules and
    /// synthetic edges
    pub fn from_config(config: &ConfigFile) -> Result<Self, BuildError> {
        let builder = Self::new(
            config.module_configs()?,
            BuildOptions::from_settings(&config.settings),
        )
        .with_classifier(OptionalRules::from_decls(&config.optional)?)
        .with_synthetic_source(DeclaredEdges::new(&config.dependencies));
        Ok(builder)
    }

    pub fn with_classifier(mut self, classifier: impl OptionalityClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn with_synthetic_source(
        mut self,
        source: impl SyntheticDependencySource + 'static,
    ) -> Self {
        self.synthetic = Box::new(source);
        self
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut BuildOptions {
        &mut self.options
    }

    /// Run every pass
    pub fn build(&self, registry: &mut UnitRegistry) -> Result<BuildOutcome, BuildError> {
        let mut table = self.create_modules()?;
        self.assign_units(&mut table, registry)?;
        table.build_module_members(self.options.merge_modules)?;
        self.resolve(table, registry, &ExporterPolicy::Default, &[])
    }

    pub(crate) fn create_modules(&self) -> Result<ModuleTable, BuildError> {
        let mut table = ModuleTable::new();
        for config in &self.configs {
            table.add_module(config.clone())?;
        }
        if let Some(base) = &self.options.base_module {
            if let Some(id) = table.find(base) {
                table.set_base(id);
            }
        }
        if let Some(unknown) = &self.options.unknown_module {
            table.require(unknown, "settings.unknown-module")?;
        }
        Ok(table)
    }

    pub(crate) fn assign_units(
        &self,
        table: &mut ModuleTable,
        registry: &mut UnitRegistry,
    ) -> Result<(), BuildError> {
        let ids: Vec<ModuleId> = table.iter().map(|m| m.id()).collect();
        let mut seeds = Vec::with_capacity(ids.len());
        for &id in &ids {
            seeds.push(table.seed_roots(registry, id)?);
        }
        for (id, roots) in ids.into_iter().zip(seeds) {
            let stats = table.close_over_references(registry, id, roots)?;
            if stats.unresolved > 0 {
                warn!(
                    module = table.name(id),
                    count = stats.unresolved,
                    "unresolved references"
                );
            }
        }

        match &self.options.unknown_module {
            Some(unknown) => {
                let id = table.require(unknown, "settings.unknown-module")?;
                let count = table.assign_unknown(registry, id)?;
                if count > 0 {
                    info!(module = unknown.as_str(), count, "assigned unclaimed units");
                }
            }
            None => {
                let unclaimed = registry
                    .klasses()
                    .filter(|k| k.exists() && k.module().is_none())
                    .count();
                if unclaimed > 0 {
                    warn!(count = unclaimed, "units not claimed by any module");
                }
            }
        }
        Ok(())
    }

    /// Passes after aggregation
    pub(crate) fn resolve(
        &self,
        mut table: ModuleTable,
        registry: &UnitRegistry,
        policy: &ExporterPolicy,
        seeds: &[ModuleId],
    ) -> Result<BuildOutcome, BuildError> {
        let top = table.top_level_ids();
        info!(modules = table.len(), top_level = top.len(), "aggregation complete");

        for &id in &top {
            let module = table.get(id);
            let packages = collect_packages(
                registry,
                module.classes(),
                module.resources(),
                &self.options.exported_packages,
            );
            table.get_mut(id).packages = packages;
        }
        let split = SplitPackages::detect(top.iter().map(|&id| (id, table.get(id).packages())));
        for (package, owners) in split.iter() {
            let names: Vec<&str> = owners.iter().map(|&m| table.name(m)).collect();
            debug!(package, modules = ?names, "split package");
        }

        for source in self.synthetic.sources() {
            table.require(&source, "[[dependency]] from")?;
        }
        let view_owners = self.build_views(&mut table, &top)?;

        let mut requires = RequiresMap::new();
        for &id in &top {
            let deps = self.collect_requires(&table, registry, &view_owners, id)?;
            requires.insert(id, deps);
        }
        let promoted = apply_split_package_locals(&mut requires, &split);

        let mut infos = self.finalize(&table, requires, policy)?;
        fixup_permits(&mut infos)?;
        freeze_permits(&mut infos);

        let order = DependencyGraph::from_infos(&infos).topological_order(seeds)?;
        info!(
            modules = order.len(),
            split_packages = split.len(),
            promoted,
            "module graph resolved"
        );
        Ok(BuildOutcome {
            table,
            infos,
            order,
            split_packages: split,
        })
    }

    /// Build the views of every top-level module and index the non-default
    /// view names by owner
    fn build_views(
        &self,
        table: &mut ModuleTable,
        top: &[ModuleId],
    ) -> Result<FxHashMap<String, ModuleId>, BuildError> {
        let mut owners: FxHashMap<String, ModuleId> = FxHashMap::default();
        for &id in top {
            let members = table.group_members(id);
            let mut declared: Vec<ViewConfig> = Vec::new();
            for &m in &members {
                for view in table.get(m).config().views() {
                    let context = format!("permits of view \"{}\"", view.name);
                    let mut permits = Vec::with_capacity(view.permits.len());
                    for permit in &view.permits {
                        let target = table.require(permit, &context)?;
                        permits.push(table.name(table.group_of(target)).to_string());
                    }
                    declared.push(ViewConfig {
                        permits,
                        ..view.clone()
                    });
                }
            }
            let main_class = members
                .iter()
                .find_map(|&m| table.get(m).config().main_class());
            let module = table.get(id);
            let views = ModuleViews::build(
                module.name(),
                main_class,
                module.config().has_internal_view(),
                &declared,
                module.packages(),
            );
            for view in views.iter().filter(|v| v.kind != ViewKind::Default) {
                let clashes_module = table
                    .find(&view.name)
                    .is_some_and(|other| table.group_of(other) != id);
                if clashes_module || owners.insert(view.name.clone(), id).is_some() {
                    return Err(BuildError::DuplicateView {
                        module: module.name().to_string(),
                        view: view.name.clone(),
                    });
                }
            }
            table.get_mut(id).views = views;
        }
        Ok(owners)
    }

    /// Resolve a module or view name to its top-level module and the view
    /// requested, if any
    fn resolve_target(
        table: &ModuleTable,
        view_owners: &FxHashMap<String, ModuleId>,
        name: &str,
    ) -> Option<(ModuleId, Option<String>)> {
        if let Some(id) = table.find(name) {
            return Some((table.group_of(id), None));
        }
        view_owners
            .get(name)
            .map(|&owner| (owner, Some(name.to_string())))
    }

    fn named_dependence(
        table: &ModuleTable,
        target: ModuleId,
        view: Option<String>,
        modifiers: Modifiers,
    ) -> Dependence {
        let dep = Dependence::new(target, table.name(target), modifiers);
        match view {
            Some(view) => dep.with_target(view),
            None => dep,
        }
    }

    /// Dependences of one top-level module, in precedence order: declared
    /// requires, static references, main class, synthetic edges
    fn collect_requires(
        &self,
        table: &ModuleTable,
        registry: &UnitRegistry,
        view_owners: &FxHashMap<String, ModuleId>,
        id: ModuleId,
    ) -> Result<BTreeMap<ModuleId, Dependence>, BuildError> {
        let module = table.get(id);
        let name = module.name();
        let members = table.group_members(id);
        let mut deps = BTreeMap::new();

        for &m in &members {
            let member = table.get(m);
            let context = format!("requires of \"{}\"", member.name());
            for spec in member
                .config()
                .requires()
                .iter()
                .chain(member.extra_requires())
            {
                let (target, view) = Self::resolve_target(table, view_owners, &spec.name)
                    .ok_or_else(|| BuildError::UnknownModule {
                        name: spec.name.clone(),
                        context: context.clone(),
                    })?;
                if target == id {
                    debug!(module = name, target = spec.name.as_str(), "requires resolves to itself");
                    continue;
                }
                let dep = Self::named_dependence(table, target, view, spec.modifiers);
                add_dependence(&mut deps, name, dep)?;
            }
        }

        for &k in module.classes() {
            let from = registry.klass(k);
            for r in from.references() {
                let to = registry.klass(r);
                let Some(owner) = to.module() else {
                    continue;
                };
                let target = table.group_of(owner);
                if target == id {
                    continue;
                }
                let modifiers = if self.classifier.is_optional(from, to) {
                    Modifiers::OPTIONAL
                } else {
                    Modifiers::empty()
                };
                let target_module = table.get(target);
                let mut dep = Dependence::new(target, target_module.name(), modifiers)
                    .with_internal(!self.options.exported_packages.is_exported(to.package()));
                if let Some(view) = target_module
                    .views()
                    .view_for_package(to.package())
                    .filter(|v| v.kind == ViewKind::Named)
                {
                    dep = dep.with_target(view.name.clone());
                }
                add_dependence(&mut deps, name, dep)?;
            }
        }

        for &m in &members {
            let Some(main_class) = table.get(m).config().main_class() else {
                continue;
            };
            match registry
                .find_klass(main_class)
                .and_then(|k| registry.klass(k).module())
            {
                Some(owner) => {
                    let target = table.group_of(owner);
                    if target != id {
                        let dep = Dependence::new(target, table.name(target), Modifiers::empty());
                        add_dependence(&mut deps, name, dep)?;
                    }
                }
                None => warn!(module = name, main_class, "main class not found"),
            }
        }

        for &m in &members {
            let member = table.get(m);
            let context = format!("dependency from \"{}\"", member.name());
            for edge in self.synthetic.edges_for(member.name()) {
                if module.is_base() && edge.modifiers.contains(Modifiers::OPTIONAL) {
                    warn!(
                        module = name,
                        target = edge.to.as_str(),
                        "dropping optional synthetic dependency of base module"
                    );
                    continue;
                }
                let (target, view) = Self::resolve_target(table, view_owners, &edge.to)
                    .ok_or_else(|| BuildError::UnknownModule {
                        name: edge.to.clone(),
                        context: context.clone(),
                    })?;
                if target == id {
                    continue;
                }
                let dep = Self::named_dependence(table, target, view, edge.modifiers);
                add_dependence(&mut deps, name, dep)?;
            }
        }

        debug!(module = name, requires = deps.len(), "dependences collected");
        Ok(deps)
    }

    /// Apply the exporter policy, drop non-top-level targets, bind views
    /// and create one ModuleInfo per top-level module
    fn finalize(
        &self,
        table: &ModuleTable,
        requires: RequiresMap,
        policy: &ExporterPolicy,
    ) -> Result<BTreeMap<ModuleId, ModuleInfo>, BuildError> {
        let mut infos = BTreeMap::new();
        for (id, deps) in requires {
            let module = table.get(id);
            let name = module.name();

            let mut resolved: BTreeMap<ModuleId, Dependence> = BTreeMap::new();
            for (_, mut dep) in deps {
                if dep.is_optional() && policy.drops_optional(id) {
                    debug!(module = name, target = dep.module_name(), "dropping optional dependence");
                    continue;
                }
                if !dep.is_internal() && !dep.is_local() && !dep.targets_view() {
                    let exporter = policy.exporter(dep.module(), id);
                    if exporter != dep.module() {
                        dep.redirect(exporter, table.name(exporter));
                    }
                }
                if !table.is_top_level(dep.module()) {
                    debug!(module = name, target = dep.module_name(), "dropping dependence on non-top-level module");
                    continue;
                }
                add_dependence(&mut resolved, name, dep)?;
            }

            let mut bound = Vec::with_capacity(resolved.len());
            for (_, mut dep) in resolved {
                let target = table.get(dep.module());
                let view = target
                    .views()
                    .select(&dep, name, target.config().allow_local_default())?;
                dep.set_view(view.name.clone());
                bound.push(dep);
            }

            let main_class = module
                .views()
                .default_view()
                .and_then(|v| v.main_class.clone());
            let mut info = ModuleInfo::new(id, name, module.config().version(), bound)
                .with_views(module.views().clone())
                .with_main_class(main_class);

            for m in table.group_members(id) {
                let member = table.get(m);
                let context = format!("permits of \"{}\"", member.name());
                for permit in member.config().permits().iter().chain(member.extra_permits()) {
                    let target = table.require(permit, &context)?;
                    info.add_permit(table.name(table.group_of(target)))?;
                }
            }

            if infos.insert(id, info).is_some() {
                return Err(BuildError::ModuleInfoExists(name.to_string()));
            }
        }
        Ok(infos)
    }
}

/// Merge a candidate dependence into a requester's set
fn add_dependence(
    deps: &mut BTreeMap<ModuleId, Dependence>,
    requester: &str,
    dep: Dependence,
) -> Result<(), BuildError> {
    match deps.entry(dep.module()) {
        Entry::Occupied(mut existing) => {
            existing.get_mut().merge(requester, &dep)?;
        }
        Entry::Vacant(slot) => {
            slot.insert(dep);
        }
    }
    Ok(())
}

/// Mark every existing dependence between two modules sharing a split
/// package LOCAL. Returns the number of dependences changed; running it
/// again changes nothing.
pub fn apply_split_package_locals(requires: &mut RequiresMap, split: &SplitPackages) -> usize {
    let mut promoted = 0;
    for (&module, deps) in requires.iter_mut() {
        for partner in split.partners(module) {
            if let Some(dep) = deps.get_mut(&partner) {
                if dep.add_modifiers(Modifiers::LOCAL) {
                    promoted += 1;
                }
            }
        }
    }
    promoted
}
