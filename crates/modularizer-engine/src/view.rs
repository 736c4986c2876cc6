//! Export views of a top-level module
//!
//! Every module has a default view named after itself and, unless disabled,
//! an internal view (`<module>.internal`) exporting all of its packages.
//! Declared views add further named surfaces.

use crate::config::{internal_view_name, ViewConfig};
use crate::dependence::Dependence;
use crate::error::BuildError;
use crate::package::PackageInfo;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Default,
    Internal,
    Named,
}

/// One export surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleView {
    pub name: String,
    pub kind: ViewKind,
    pub exports: BTreeSet<String>,
    pub permits: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,
}

impl ModuleView {
    pub fn exports_package(&self, package: &str) -> bool {
        self.exports.contains(package)
    }
}

/// All views of one top-level module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleViews {
    views: Vec<ModuleView>,
}

impl ModuleViews {
    /// Build the views of a module from its merged view declarations and
    /// package summary
    pub fn build(
        module: &str,
        main_class: Option<&str>,
        internal_view: bool,
        declared: &[ViewConfig],
        packages: &BTreeMap<String, PackageInfo>,
    ) -> Self {
        let mut views = vec![ModuleView {
            name: module.to_string(),
            kind: ViewKind::Default,
            exports: packages
                .values()
                .filter(|p| p.exported)
                .map(|p| p.name.clone())
                .collect(),
            permits: BTreeSet::new(),
            main_class: main_class.map(str::to_string),
        }];
        if internal_view {
            views.push(ModuleView {
                name: internal_view_name(module),
                kind: ViewKind::Internal,
                exports: packages
                    .values()
                    .filter(|p| p.has_classes())
                    .map(|p| p.name.clone())
                    .collect(),
                permits: BTreeSet::new(),
                main_class: None,
            });
        }
        views.extend(declared.iter().map(|v| ModuleView {
            name: v.name.clone(),
            kind: ViewKind::Named,
            exports: v.exports.clone(),
            permits: v.permits.iter().cloned().collect(),
            main_class: v.main_class.clone(),
        }));
        Self { views }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleView> {
        self.views.iter()
    }

    pub fn find(&self, name: &str) -> Option<&ModuleView> {
        self.views.iter().find(|v| v.name == name)
    }

    pub fn default_view(&self) -> Option<&ModuleView> {
        self.views.iter().find(|v| v.kind == ViewKind::Default)
    }

    pub fn internal_view(&self) -> Option<&ModuleView> {
        self.views.iter().find(|v| v.kind == ViewKind::Internal)
    }

    /// The view a reference into `package` goes through: a named view
    /// exporting it, else the default view, else the internal view
    pub fn view_for_package(&self, package: &str) -> Option<&ModuleView> {
        self.views
            .iter()
            .find(|v| v.kind == ViewKind::Named && v.exports_package(package))
            .or_else(|| self.default_view().filter(|v| v.exports_package(package)))
            .or_else(|| self.internal_view())
    }

    /// Select the view satisfying a dependence.
    ///
    /// A dependence naming a declared view binds to it. Otherwise LOCAL
    /// edges bind to the internal view unless `allow_local_default` is set,
    /// and edges into unexported packages need the internal view.
    pub fn select(
        &self,
        dependence: &Dependence,
        requester: &str,
        allow_local_default: bool,
    ) -> Result<&ModuleView, BuildError> {
        if dependence.targets_view() {
            if let Some(view) = self.find(dependence.target()) {
                return Ok(view);
            }
        }
        let wants_internal =
            dependence.is_internal() || (dependence.is_local() && !allow_local_default);
        let chosen = if wants_internal {
            match self.internal_view() {
                Some(view) => Some(view),
                None if dependence.is_internal() => None,
                None => self.default_view(),
            }
        } else {
            self.default_view()
        };
        chosen.ok_or_else(|| BuildError::ViewNotFound {
            module: requester.to_string(),
            dependence: dependence.to_string(),
        })
    }
}
