//! Dependence edges between top-level modules

use crate::error::BuildError;
use crate::module::ModuleId;
use bitflags::bitflags;
use std::cmp::Ordering;
use std::fmt;

bitflags! {
    /// Modifiers carried by a dependence
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    pub struct Modifiers: u8 {
        /// Re-exported to the requester's own dependents
        const PUBLIC = 1;
        /// Satisfied only if the target is present
        const OPTIONAL = 1 << 1;
        /// Friend-level access to the target's internals
        const LOCAL = 1 << 2;
    }
}

impl Modifiers {
    /// Modifier keywords in declaration order
    pub fn keywords(self) -> Vec<&'static str> {
        let mut words = Vec::new();
        if self.contains(Modifiers::PUBLIC) {
            words.push("public");
        }
        if self.contains(Modifiers::OPTIONAL) {
            words.push("optional");
        }
        if self.contains(Modifiers::LOCAL) {
            words.push("local");
        }
        words
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keywords().join(" "))
    }
}

/// A directed, modifier-tagged edge to a top-level module
///
/// `target` is the name the edge was requested under: the module name or
/// the name of one of its views. Two dependences are equal when they point
/// at the same module.
#[derive(Debug, Clone)]
pub struct Dependence {
    target: String,
    module: ModuleId,
    module_name: String,
    modifiers: Modifiers,
    internal: bool,
    view: Option<String>,
}

impl Dependence {
    pub fn new(module: ModuleId, module_name: impl Into<String>, modifiers: Modifiers) -> Self {
        let module_name = module_name.into();
        Self {
            target: module_name.clone(),
            module,
            module_name,
            modifiers,
            internal: false,
            view: None,
        }
    }

    /// Request a specific view of the module
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Mark the edge as reaching into packages the module does not export
    pub fn with_internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn is_optional(&self) -> bool {
        self.modifiers.contains(Modifiers::OPTIONAL)
    }

    pub fn is_local(&self) -> bool {
        self.modifiers.contains(Modifiers::LOCAL)
    }

    pub fn is_public(&self) -> bool {
        self.modifiers.contains(Modifiers::PUBLIC)
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }

    /// Whether the edge names a view instead of the module itself
    pub fn targets_view(&self) -> bool {
        self.target != self.module_name
    }

    /// Resolved view name, available after finalization
    pub fn view(&self) -> Option<&str> {
        self.view.as_deref()
    }

    pub(crate) fn add_modifiers(&mut self, modifiers: Modifiers) -> bool {
        let before = self.modifiers;
        self.modifiers |= modifiers;
        before != self.modifiers
    }

    pub(crate) fn remove_modifiers(&mut self, modifiers: Modifiers) -> bool {
        let before = self.modifiers;
        self.modifiers.remove(modifiers);
        before != self.modifiers
    }

    pub(crate) fn set_view(&mut self, view: String) {
        self.view = Some(view);
    }

    /// Point the edge at another module, keeping its modifiers
    pub(crate) fn redirect(&mut self, module: ModuleId, module_name: &str) {
        self.module = module;
        self.module_name = module_name.to_string();
        self.target = module_name.to_string();
        self.view = None;
    }

    /// Fold another candidate edge to the same module into this one.
    ///
    /// A non-optional candidate clears OPTIONAL; LOCAL and PUBLIC are never
    /// removed. Two different explicit views of one module cannot be
    /// reconciled and fail the build. Returns whether anything changed.
    pub fn merge(&mut self, requester: &str, other: &Dependence) -> Result<bool, BuildError> {
        debug_assert_eq!(self.module, other.module);
        let mut changed = false;

        if other.targets_view() && self.target != other.target {
            if self.targets_view() {
                return Err(BuildError::ConflictingDependence {
                    module: requester.to_string(),
                    existing: self.to_string(),
                    incoming: other.to_string(),
                });
            }
            self.target = other.target.clone();
            changed = true;
        }

        if !other.is_optional() {
            changed |= self.remove_modifiers(Modifiers::OPTIONAL);
        }
        changed |= self.add_modifiers(other.modifiers & (Modifiers::LOCAL | Modifiers::PUBLIC));

        if other.internal && !self.internal {
            self.internal = true;
            changed = true;
        }
        Ok(changed)
    }
}

impl PartialEq for Dependence {
    fn eq(&self, other: &Self) -> bool {
        self.module == other.module
    }
}

impl Eq for Dependence {}

impl PartialOrd for Dependence {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Dependence {
    fn cmp(&self, other: &Self) -> Ordering {
        self.module_name
            .cmp(&other.module_name)
            .then(self.module.cmp(&other.module))
    }
}

impl fmt::Display for Dependence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for word in self.modifiers.keywords() {
            write!(f, "{} ", word)?;
        }
        write!(f, "{}", self.view.as_deref().unwrap_or(&self.target))
    }
}
