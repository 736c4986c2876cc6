//! Module arena
//!
//! Modules are stored in a [`ModuleTable`] and addressed by [`ModuleId`].
//! Each module owns the units it claimed during root closure; aggregation
//! points a member's `group` at its top-level ancestor and unions the
//! member's content into it.

use crate::config::{ModuleConfig, RequireSpec};
use crate::error::BuildError;
use crate::package::PackageInfo;
use crate::registry::{KlassId, ResourceId, UnitRegistry};
use crate::view::ModuleViews;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, trace};

/// Stable index of a module in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ModuleId(u32);

impl ModuleId {
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A followed reference that could not be claimed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reference {
    pub referrer: KlassId,
    pub referree: KlassId,
}

/// Units claimed by one closure run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClosureStats {
    pub roots: usize,
    pub reached: usize,
    pub included: usize,
    pub resources: usize,
    pub unresolved: usize,
}

#[derive(Debug, Clone)]
pub struct Module {
    id: ModuleId,
    config: ModuleConfig,
    classes: BTreeSet<KlassId>,
    resources: BTreeSet<ResourceId>,
    unresolved: BTreeSet<Reference>,
    members: Vec<ModuleId>,
    parent: Option<ModuleId>,
    group: ModuleId,
    is_base: bool,
    extra_requires: Vec<RequireSpec>,
    extra_permits: Vec<String>,
    pub(crate) packages: BTreeMap<String, PackageInfo>,
    pub(crate) views: ModuleViews,
}

impl Module {
    fn new(id: ModuleId, config: ModuleConfig) -> Self {
        Self {
            id,
            config,
            classes: BTreeSet::new(),
            resources: BTreeSet::new(),
            unresolved: BTreeSet::new(),
            members: Vec::new(),
            parent: None,
            group: id,
            is_base: false,
            extra_requires: Vec::new(),
            extra_permits: Vec::new(),
            packages: BTreeMap::new(),
            views: ModuleViews::default(),
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.config.name()
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    /// Owned units (after aggregation: including every member's units)
    pub fn classes(&self) -> &BTreeSet<KlassId> {
        &self.classes
    }

    pub fn resources(&self) -> &BTreeSet<ResourceId> {
        &self.resources
    }

    pub fn unresolved(&self) -> &BTreeSet<Reference> {
        &self.unresolved
    }

    pub fn members(&self) -> &[ModuleId] {
        &self.members
    }

    pub fn parent(&self) -> Option<ModuleId> {
        self.parent
    }

    /// Top-level owner; the module itself until merged
    pub fn group(&self) -> ModuleId {
        self.group
    }

    pub fn is_base(&self) -> bool {
        self.is_base
    }

    /// Requires added by the engine on top of the configured ones
    pub fn extra_requires(&self) -> &[RequireSpec] {
        &self.extra_requires
    }

    pub fn extra_permits(&self) -> &[String] {
        &self.extra_permits
    }

    pub fn packages(&self) -> &BTreeMap<String, PackageInfo> {
        &self.packages
    }

    pub fn views(&self) -> &ModuleViews {
        &self.views
    }

    /// No units, no resources and no main class
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.resources.is_empty() && self.config.main_class().is_none()
    }

    pub fn has_requires(&self) -> bool {
        !self.config.requires().is_empty() || !self.extra_requires.is_empty()
    }
}

/// Arena of all modules of a run
#[derive(Debug, Default)]
pub struct ModuleTable {
    modules: Vec<Module>,
    by_name: FxHashMap<String, ModuleId>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module; names must be unique
    pub fn add_module(&mut self, config: ModuleConfig) -> Result<ModuleId, BuildError> {
        if self.by_name.contains_key(config.name()) {
            return Err(BuildError::DuplicateModule(config.name().to_string()));
        }
        let id = ModuleId::new(self.modules.len());
        self.by_name.insert(config.name().to_string(), id);
        self.modules.push(Module::new(id, config));
        Ok(id)
    }

    pub fn find(&self, name: &str) -> Option<ModuleId> {
        self.by_name.get(name).copied()
    }

    /// Look up a module referenced from `context`
    pub fn require(&self, name: &str, context: &str) -> Result<ModuleId, BuildError> {
        self.find(name).ok_or_else(|| BuildError::UnknownModule {
            name: name.to_string(),
            context: context.to_string(),
        })
    }

    pub fn get(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    pub(crate) fn get_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.index()]
    }

    pub fn name(&self, id: ModuleId) -> &str {
        self.get(id).name()
    }

    /// All modules in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn group_of(&self, id: ModuleId) -> ModuleId {
        self.get(id).group
    }

    pub fn set_base(&mut self, id: ModuleId) {
        self.get_mut(id).is_base = true;
    }

    pub fn add_extra_requires(&mut self, id: ModuleId, spec: RequireSpec) {
        let module = self.get_mut(id);
        if !module.extra_requires.contains(&spec) {
            module.extra_requires.push(spec);
        }
    }

    pub fn add_extra_permit(&mut self, id: ModuleId, permit: impl Into<String>) {
        let permit = permit.into();
        let module = self.get_mut(id);
        if !module.extra_permits.contains(&permit) {
            module.extra_permits.push(permit);
        }
    }

    /// Modules whose group is `top`, the top itself first
    pub fn group_members(&self, top: ModuleId) -> Vec<ModuleId> {
        let mut ids = vec![top];
        ids.extend(
            self.modules
                .iter()
                .filter(|m| m.group == top && m.id != top)
                .map(|m| m.id),
        );
        ids
    }

    /// A module stays visible to the dependency passes iff it is its own
    /// group and is the base module, holds content, declares requires, or
    /// may be empty
    pub fn is_top_level(&self, id: ModuleId) -> bool {
        let m = self.get(id);
        if m.group != id {
            return false;
        }
        m.is_base
            || !m.is_empty()
            || m.config.allow_empty()
            || self
                .group_members(id)
                .iter()
                .any(|&g| self.get(g).has_requires())
    }

    /// Top-level modules in declaration order
    pub fn top_level_ids(&self) -> Vec<ModuleId> {
        self.modules
            .iter()
            .map(|m| m.id)
            .filter(|&id| self.is_top_level(id))
            .collect()
    }

    fn claim_klass(
        &mut self,
        registry: &mut UnitRegistry,
        id: ModuleId,
        klass: KlassId,
    ) -> Result<(), BuildError> {
        if let Err(owner) = registry.klass_mut(klass).set_module(id) {
            return Err(BuildError::OwnershipViolation {
                item: registry.klass(klass).name().to_string(),
                owner: self.name(owner).to_string(),
                claimant: self.name(id).to_string(),
            });
        }
        self.get_mut(id).classes.insert(klass);
        Ok(())
    }

    fn claim_resource(
        &mut self,
        registry: &mut UnitRegistry,
        id: ModuleId,
        resource: ResourceId,
    ) -> Result<(), BuildError> {
        if let Err(owner) = registry.resource_mut(resource).set_module(id) {
            return Err(BuildError::OwnershipViolation {
                item: registry.resource(resource).name().to_string(),
                owner: self.name(owner).to_string(),
                claimant: self.name(id).to_string(),
            });
        }
        self.get_mut(id).resources.insert(resource);
        Ok(())
    }

    /// Seed a module from its root patterns, follow references to every
    /// unowned unit, then claim include-matched units and resources.
    pub fn process_roots_and_references(
        &mut self,
        registry: &mut UnitRegistry,
        id: ModuleId,
    ) -> Result<ClosureStats, BuildError> {
        let seeds = self.seed_roots(registry, id)?;
        self.close_over_references(registry, id, seeds)
    }

    /// Claim every unowned unit matching a root pattern. The builder seeds
    /// all modules before running any closure so that one module's closure
    /// cannot take another module's roots.
    pub fn seed_roots(
        &mut self,
        registry: &mut UnitRegistry,
        id: ModuleId,
    ) -> Result<Vec<KlassId>, BuildError> {
        let config = self.get(id).config.clone();
        let seeds: Vec<KlassId> = registry
            .klasses()
            .filter(|k| k.module().is_none() && k.exists() && config.is_root(k.name()))
            .map(|k| k.id())
            .collect();
        for &k in &seeds {
            self.claim_klass(registry, id, k)?;
        }
        Ok(seeds)
    }

    /// Follow references from `seeds`, then claim include-matched units
    /// (without following them) and resources.
    pub fn close_over_references(
        &mut self,
        registry: &mut UnitRegistry,
        id: ModuleId,
        seeds: Vec<KlassId>,
    ) -> Result<ClosureStats, BuildError> {
        let config = self.get(id).config.clone();
        let mut stats = ClosureStats {
            roots: seeds.len(),
            ..Default::default()
        };

        let mut queue = VecDeque::from(seeds);
        while let Some(k) = queue.pop_front() {
            let refs: Vec<KlassId> = registry.klass(k).references().collect();
            for r in refs {
                let target = registry.klass(r);
                if target.module().is_some() {
                    continue;
                }
                if !target.exists() || config.is_excluded(target.name()) {
                    trace!(
                        module = config.name(),
                        from = registry.klass(k).name(),
                        to = target.name(),
                        "unresolved reference"
                    );
                    self.get_mut(id).unresolved.insert(Reference {
                        referrer: k,
                        referree: r,
                    });
                    continue;
                }
                self.claim_klass(registry, id, r)?;
                queue.push_back(r);
                stats.reached += 1;
            }
        }

        if !config.includes().is_empty() {
            let included: Vec<KlassId> = registry
                .klasses()
                .filter(|k| k.module().is_none() && k.exists() && config.is_included(k.name()))
                .map(|k| k.id())
                .collect();
            for &k in &included {
                self.claim_klass(registry, id, k)?;
                stats.included += 1;
            }
            for &k in &included {
                let unowned: Vec<KlassId> = registry
                    .klass(k)
                    .references()
                    .filter(|&r| registry.klass(r).module().is_none())
                    .collect();
                let module = self.get_mut(id);
                for r in unowned {
                    module.unresolved.insert(Reference {
                        referrer: k,
                        referree: r,
                    });
                }
            }
        }

        let owned = self.get(id).classes.clone();
        let resources: Vec<ResourceId> = registry
            .resources()
            .filter(|r| r.module().is_none())
            .filter(|r| {
                let by_pattern = r.matches(config.includes()) && !r.matches(config.excludes());
                by_pattern || r.provided_by(registry, &owned)
            })
            .map(|r| r.id())
            .collect();
        for r in resources {
            self.claim_resource(registry, id, r)?;
            stats.resources += 1;
        }

        stats.unresolved = self.get(id).unresolved.len();
        debug!(
            module = config.name(),
            roots = stats.roots,
            reached = stats.reached,
            included = stats.included,
            resources = stats.resources,
            unresolved = stats.unresolved,
            "root closure complete"
        );
        Ok(stats)
    }

    /// Give every still-unowned parsed unit and resource to `id`
    pub fn assign_unknown(
        &mut self,
        registry: &mut UnitRegistry,
        id: ModuleId,
    ) -> Result<usize, BuildError> {
        let klasses: Vec<KlassId> = registry
            .klasses()
            .filter(|k| k.module().is_none() && k.exists())
            .map(|k| k.id())
            .collect();
        let resources: Vec<ResourceId> = registry
            .resources()
            .filter(|r| r.module().is_none())
            .map(|r| r.id())
            .collect();
        let count = klasses.len() + resources.len();
        for k in klasses {
            self.claim_klass(registry, id, k)?;
        }
        for r in resources {
            self.claim_resource(registry, id, r)?;
        }
        Ok(count)
    }

    /// Resolve member declarations, assign groups and merge member content
    /// into parents. With `merge` unset, members are validated but every
    /// module stays its own group.
    pub fn build_module_members(&mut self, merge: bool) -> Result<(), BuildError> {
        for index in 0..self.modules.len() {
            let parent = ModuleId::new(index);
            let names = self.modules[index].config.members().to_vec();
            let context = format!("members of \"{}\"", self.name(parent));
            for name in names {
                let child = self.require(&name, &context)?;
                if child == parent {
                    return Err(BuildError::MemberCycle(name));
                }
                if let Some(existing) = self.get(child).parent {
                    return Err(BuildError::MultipleParents {
                        module: name,
                        first: self.name(existing).to_string(),
                        second: self.name(parent).to_string(),
                    });
                }
                self.get_mut(child).parent = Some(parent);
                self.get_mut(parent).members.push(child);
            }
        }

        let post_order = self.assign_groups(merge)?;
        if !merge {
            return Ok(());
        }

        for id in post_order {
            let Some(parent) = self.get(id).parent else {
                continue;
            };
            let child = self.get(id);
            let classes = child.classes.clone();
            let resources = child.resources.clone();
            let unresolved = child.unresolved.clone();
            let target = self.get_mut(parent);
            target.classes.extend(classes);
            target.resources.extend(resources);
            target.unresolved.extend(unresolved);
        }
        Ok(())
    }

    /// Depth-first walk from every parent-less module. Returns the modules
    /// in post-order (members before their parents).
    fn assign_groups(&mut self, merge: bool) -> Result<Vec<ModuleId>, BuildError> {
        let count = self.modules.len();
        let mut visited = vec![false; count];
        let mut on_stack = vec![false; count];
        let mut post_order = Vec::with_capacity(count);

        let roots: Vec<ModuleId> = self
            .modules
            .iter()
            .filter(|m| m.parent.is_none())
            .map(|m| m.id)
            .collect();

        for root in roots {
            visited[root.index()] = true;
            on_stack[root.index()] = true;
            let mut stack: Vec<(ModuleId, usize)> = vec![(root, 0)];

            while let Some(frame) = stack.last_mut() {
                let (current, next) = *frame;
                let members = &self.modules[current.index()].members;
                if next < members.len() {
                    frame.1 += 1;
                    let child = members[next];
                    if on_stack[child.index()] || visited[child.index()] {
                        return Err(BuildError::MemberCycle(self.name(child).to_string()));
                    }
                    visited[child.index()] = true;
                    on_stack[child.index()] = true;
                    let base = self.modules[current.index()].is_base;
                    let module = &mut self.modules[child.index()];
                    if merge {
                        module.group = root;
                        module.is_base |= base;
                    }
                    stack.push((child, 0));
                } else {
                    on_stack[current.index()] = false;
                    post_order.push(current);
                    stack.pop();
                }
            }
        }

        // modules left unvisited only hang off each other
        if let Some(index) = visited.iter().position(|v| !v) {
            return Err(BuildError::MemberCycle(self.modules[index].name().to_string()));
        }
        Ok(post_order)
    }
}
