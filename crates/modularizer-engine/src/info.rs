//! Finalized per-module metadata and the permits fixup

use crate::dependence::Dependence;
use crate::error::BuildError;
use crate::module::ModuleId;
use crate::view::ModuleViews;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Finalized metadata of a top-level module
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    module: ModuleId,
    name: String,
    version: String,
    requires: Vec<Dependence>,
    permits: BTreeSet<String>,
    views: ModuleViews,
    main_class: Option<String>,
    frozen: bool,
}

impl ModuleInfo {
    pub fn new(
        module: ModuleId,
        name: impl Into<String>,
        version: impl Into<String>,
        requires: impl IntoIterator<Item = Dependence>,
    ) -> Self {
        let mut requires: Vec<Dependence> = requires.into_iter().collect();
        requires.sort();
        requires.dedup();
        Self {
            module,
            name: name.into(),
            version: version.into(),
            requires,
            permits: BTreeSet::new(),
            views: ModuleViews::default(),
            main_class: None,
            frozen: false,
        }
    }

    pub fn with_views(mut self, views: ModuleViews) -> Self {
        self.views = views;
        self
    }

    pub fn with_main_class(mut self, main_class: Option<String>) -> Self {
        self.main_class = main_class;
        self
    }

    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Requires sorted by target module name
    pub fn requires(&self) -> &[Dependence] {
        &self.requires
    }

    pub fn find_requires(&self, module: &str) -> Option<&Dependence> {
        self.requires.iter().find(|d| d.module_name() == module)
    }

    pub fn permits(&self) -> &BTreeSet<String> {
        &self.permits
    }

    pub fn views(&self) -> &ModuleViews {
        &self.views
    }

    /// Packages exported by the default view
    pub fn exports(&self) -> BTreeSet<String> {
        self.views
            .default_view()
            .map(|v| v.exports.clone())
            .unwrap_or_default()
    }

    pub fn main_class(&self) -> Option<&str> {
        self.main_class.as_deref()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Add a permitted requester. Returns whether the set grew; adding to a
    /// frozen set fails unless the name is already present.
    pub fn add_permit(&mut self, permit: &str) -> Result<bool, BuildError> {
        if self.permits.contains(permit) {
            return Ok(false);
        }
        if self.frozen {
            return Err(BuildError::PermitsFrozen {
                module: self.name.clone(),
                permit: permit.to_string(),
            });
        }
        self.permits.insert(permit.to_string());
        Ok(true)
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }
}

/// Propagate LOCAL edges into permits.
///
/// Pass one: every LOCAL requester is permitted by its target. Pass two:
/// a target with any permit also permits every module requiring it.
/// Returns the number of permits added; a second run adds none.
pub fn fixup_permits(infos: &mut BTreeMap<ModuleId, ModuleInfo>) -> Result<usize, BuildError> {
    let edges: Vec<Edge> = infos
        .values()
        .flat_map(|info| {
            info.requires.iter().map(move |d| Edge {
                target: d.module(),
                target_name: d.module_name().to_string(),
                requester: info.name.clone(),
                local: d.is_local(),
            })
        })
        .collect();

    let mut added = 0;
    for edge in edges.iter().filter(|e| e.local) {
        let info = lookup(infos, edge)?;
        if info.add_permit(&edge.requester)? {
            added += 1;
        }
    }

    for edge in &edges {
        let info = lookup(infos, edge)?;
        if !info.permits.is_empty() && info.add_permit(&edge.requester)? {
            added += 1;
        }
    }

    debug!(added, "permits fixup complete");
    Ok(added)
}

/// Freeze every permits set
pub fn freeze_permits(infos: &mut BTreeMap<ModuleId, ModuleInfo>) {
    for info in infos.values_mut() {
        info.freeze();
    }
}

struct Edge {
    target: ModuleId,
    target_name: String,
    requester: String,
    local: bool,
}

fn lookup<'a>(
    infos: &'a mut BTreeMap<ModuleId, ModuleInfo>,
    edge: &Edge,
) -> Result<&'a mut ModuleInfo, BuildError> {
    infos
        .get_mut(&edge.target)
        .ok_or_else(|| BuildError::MissingModuleInfo(edge.target_name.clone()))
}
