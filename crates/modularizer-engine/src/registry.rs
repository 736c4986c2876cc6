//! Unit registry
//!
//! Interns compiled units ("klasses") and resource files by name and owns
//! the full reference graph. Units are created lazily on first mention and
//! live for the whole run. Each unit and resource carries a write-once
//! owning module.

use crate::module::ModuleId;
use crate::pattern::{split_name, PatternSet};
use crate::service::{ServiceDescriptor, ServiceError};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised while populating the registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A unit was parsed twice
    #[error("Class {0} is already registered")]
    DuplicateClass(String),

    /// A resource was added twice
    #[error("Resource {0} is already registered")]
    DuplicateResource(String),

    /// Signature and manifest files are not module resources
    #[error("\"{0}\" is not a resource file")]
    NotAResource(String),

    /// Malformed service descriptor
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Stable index of a unit in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KlassId(u32);

impl KlassId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable index of a resource in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(u32);

impl ResourceId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Output of the compiled-unit parser
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassRecord {
    /// Fully qualified unit name
    pub name: String,
    /// Package name (derived from `name` when absent)
    pub package: Option<String>,
    /// Public visibility
    pub is_public: bool,
    /// Size of the unit in bytes
    pub size: u64,
    /// Names of referenced units
    pub references: Vec<String>,
}

impl ClassRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn public(mut self) -> Self {
        self.is_public = true;
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_references<I, S>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references.extend(refs.into_iter().map(Into::into));
        self
    }
}

/// A compiled unit
#[derive(Debug, Clone)]
pub struct Klass {
    id: KlassId,
    name: String,
    package: String,
    is_public: bool,
    size: u64,
    exists: bool,
    references: BTreeSet<KlassId>,
    referrers: BTreeSet<KlassId>,
    module: Option<ModuleId>,
}

impl Klass {
    fn new(id: KlassId, name: &str) -> Self {
        let (package, _) = split_name(name);
        Self {
            id,
            name: name.to_string(),
            package: package.to_string(),
            is_public: false,
            size: 0,
            exists: false,
            references: BTreeSet::new(),
            referrers: BTreeSet::new(),
            module: None,
        }
    }

    pub fn id(&self) -> KlassId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn is_public(&self) -> bool {
        self.is_public
    }

    /// Nested units carry `$` in their name
    pub fn is_inner(&self) -> bool {
        self.name.contains('$')
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether the unit was parsed, as opposed to only referenced
    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn references(&self) -> impl Iterator<Item = KlassId> + '_ {
        self.references.iter().copied()
    }

    pub fn referrers(&self) -> impl Iterator<Item = KlassId> + '_ {
        self.referrers.iter().copied()
    }

    /// The module that claimed this unit
    pub fn module(&self) -> Option<ModuleId> {
        self.module
    }

    /// Claim the unit for a module. Returns the existing owner on a
    /// second claim.
    pub(crate) fn set_module(&mut self, module: ModuleId) -> Result<(), ModuleId> {
        match self.module {
            Some(owner) => Err(owner),
            None => {
                self.module = Some(module);
                Ok(())
            }
        }
    }
}

/// A resource file
#[derive(Debug, Clone)]
pub struct Resource {
    id: ResourceId,
    name: String,
    size: u64,
    module: Option<ModuleId>,
    service: Option<ServiceDescriptor>,
}

impl Resource {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Path with `/` separators
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn module(&self) -> Option<ModuleId> {
        self.module
    }

    pub fn is_service(&self) -> bool {
        self.service.is_some()
    }

    pub fn service(&self) -> Option<&ServiceDescriptor> {
        self.service.as_ref()
    }

    /// Package derived from the directory part of the path
    pub fn package(&self) -> String {
        match self.name.rfind('/') {
            Some(i) => self.name[..i].replace('/', "."),
            None => String::new(),
        }
    }

    /// Match against include/exclude patterns. Service descriptors are
    /// matched by their first provider (or service) class name.
    pub fn matches(&self, patterns: &PatternSet) -> bool {
        match &self.service {
            Some(d) => patterns.matches_class(d.match_name()) || patterns.matches_resource(&self.name),
            None => patterns.matches_resource(&self.name),
        }
    }

    /// Whether any provider listed by this descriptor belongs to `units`
    pub fn provided_by(&self, registry: &UnitRegistry, units: &BTreeSet<KlassId>) -> bool {
        match &self.service {
            Some(d) => d
                .providers()
                .iter()
                .filter_map(|p| registry.find_klass(p))
                .any(|k| units.contains(&k)),
            None => false,
        }
    }

    pub(crate) fn set_module(&mut self, module: ModuleId) -> Result<(), ModuleId> {
        match self.module {
            Some(owner) => Err(owner),
            None => {
                self.module = Some(module);
                Ok(())
            }
        }
    }
}

/// Registry of all units and resources seen during a run
#[derive(Debug, Default)]
pub struct UnitRegistry {
    klasses: Vec<Klass>,
    klass_index: FxHashMap<String, KlassId>,
    resources: Vec<Resource>,
    resource_index: FxHashMap<String, ResourceId>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signature files and the jar manifest are not resources
    pub fn is_resource(path: &str) -> bool {
        let name = path.replace('\\', "/");
        if name.ends_with("META-INF/MANIFEST.MF") || name.contains("META-INF/JCE_RSA.") {
            return false;
        }
        !(name.contains("META-INF/") && (name.ends_with(".RSA") || name.ends_with(".SF")))
    }

    /// Look up a unit, creating a placeholder if it was never seen
    pub fn intern_klass(&mut self, name: &str) -> KlassId {
        if let Some(&id) = self.klass_index.get(name) {
            return id;
        }
        let id = KlassId(self.klasses.len() as u32);
        self.klasses.push(Klass::new(id, name));
        self.klass_index.insert(name.to_string(), id);
        id
    }

    /// Register a parsed unit and its outgoing references
    pub fn register_class(&mut self, record: ClassRecord) -> Result<KlassId, RegistryError> {
        let id = self.intern_klass(&record.name);
        {
            let k = &mut self.klasses[id.index()];
            if k.exists {
                return Err(RegistryError::DuplicateClass(record.name));
            }
            k.exists = true;
            k.is_public = record.is_public;
            k.size = record.size;
            if let Some(package) = record.package {
                k.package = package;
            }
        }
        for target in &record.references {
            let to = self.intern_klass(target);
            self.add_reference(id, to);
        }
        Ok(id)
    }

    /// Record a reference edge and its back-reference
    pub fn add_reference(&mut self, from: KlassId, to: KlassId) {
        if from == to {
            return;
        }
        self.klasses[from.index()].references.insert(to);
        self.klasses[to.index()].referrers.insert(from);
    }

    /// Record a reference edge by unit names
    pub fn add_reference_by_name(&mut self, from: &str, to: &str) -> (KlassId, KlassId) {
        let f = self.intern_klass(from);
        let t = self.intern_klass(to);
        self.add_reference(f, t);
        (f, t)
    }

    pub fn find_klass(&self, name: &str) -> Option<KlassId> {
        self.klass_index.get(name).copied()
    }

    pub fn klass(&self, id: KlassId) -> &Klass {
        &self.klasses[id.index()]
    }

    pub(crate) fn klass_mut(&mut self, id: KlassId) -> &mut Klass {
        &mut self.klasses[id.index()]
    }

    /// All units in registration order
    pub fn klasses(&self) -> impl Iterator<Item = &Klass> {
        self.klasses.iter()
    }

    pub fn klass_count(&self) -> usize {
        self.klasses.len()
    }

    /// Add a resource file. `contents` is only consulted for service
    /// descriptors.
    pub fn add_resource(
        &mut self,
        path: &str,
        size: u64,
        contents: Option<&str>,
    ) -> Result<ResourceId, RegistryError> {
        let name = path.replace('\\', "/");
        if !Self::is_resource(&name) {
            return Err(RegistryError::NotAResource(name));
        }
        if self.resource_index.contains_key(&name) {
            return Err(RegistryError::DuplicateResource(name));
        }
        let service = if ServiceDescriptor::is_descriptor(&name) {
            Some(match contents {
                Some(text) => ServiceDescriptor::parse(&name, text)?,
                None => ServiceDescriptor::new(&name),
            })
        } else {
            None
        };
        let id = ResourceId(self.resources.len() as u32);
        self.resources.push(Resource {
            id,
            name: name.clone(),
            size,
            module: None,
            service,
        });
        self.resource_index.insert(name, id);
        Ok(id)
    }

    /// Append a provider to a service descriptor, creating the descriptor
    /// resource if needed
    pub fn add_service_provider(
        &mut self,
        path: &str,
        provider: &str,
    ) -> Result<ResourceId, RegistryError> {
        let name = path.replace('\\', "/");
        let id = match self.resource_index.get(&name) {
            Some(&id) => id,
            None => self.add_resource(&name, 0, None)?,
        };
        let resource = &mut self.resources[id.index()];
        let descriptor = resource
            .service
            .get_or_insert_with(|| ServiceDescriptor::new(&name));
        descriptor.add_provider(&name, provider)?;
        Ok(id)
    }

    pub fn find_resource(&self, path: &str) -> Option<ResourceId> {
        self.resource_index.get(path).copied()
    }

    pub fn resource(&self, id: ResourceId) -> &Resource {
        &self.resources[id.index()]
    }

    pub(crate) fn resource_mut(&mut self, id: ResourceId) -> &mut Resource {
        &mut self.resources[id.index()]
    }

    /// All resources in registration order
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_class_and_references() {
        let mut reg = UnitRegistry::new();
        let main = reg
            .register_class(
                ClassRecord::new("com.foo.Main")
                    .public()
                    .with_size(100)
                    .with_references(["com.bar.Helper", "com.foo.Main"]),
            )
            .unwrap();

        let k = reg.klass(main);
        assert_eq!(k.name(), "com.foo.Main");
        assert_eq!(k.package(), "com.foo");
        assert!(k.is_public());
        assert!(k.exists());
        assert_eq!(k.size(), 100);

        let helper = reg.find_klass("com.bar.Helper").unwrap();
        assert!(!reg.klass(helper).exists());
        assert_eq!(k.references().collect::<Vec<_>>(), vec![helper]);
        assert_eq!(reg.klass(helper).referrers().collect::<Vec<_>>(), vec![main]);
    }

    #[test]
    fn test_placeholder_becomes_parsed() {
        let mut reg = UnitRegistry::new();
        reg.add_reference_by_name("a.A", "b.B");
        let b = reg.register_class(ClassRecord::new("b.B").with_size(7)).unwrap();
        assert!(reg.klass(b).exists());
        assert_eq!(reg.klass_count(), 2);
    }

    #[test]
    fn test_duplicate_class() {
        let mut reg = UnitRegistry::new();
        reg.register_class(ClassRecord::new("a.A")).unwrap();
        let err = reg.register_class(ClassRecord::new("a.A")).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateClass(name) if name == "a.A"));
    }

    #[test]
    fn test_explicit_package() {
        let mut reg = UnitRegistry::new();
        let mut record = ClassRecord::new("Outer$Inner");
        record.package = Some("p".to_string());
        let id = reg.register_class(record).unwrap();
        assert_eq!(reg.klass(id).package(), "p");
        assert!(reg.klass(id).is_inner());
    }

    #[test]
    fn test_write_once_module() {
        let mut reg = UnitRegistry::new();
        let id = reg.intern_klass("a.A");
        let k = reg.klass_mut(id);
        assert!(k.set_module(ModuleId::new(0)).is_ok());
        assert_eq!(k.set_module(ModuleId::new(1)), Err(ModuleId::new(0)));
        assert_eq!(k.module(), Some(ModuleId::new(0)));
    }

    #[test]
    fn test_resources() {
        let mut reg = UnitRegistry::new();
        let id = reg.add_resource("com/foo/app.properties", 12, None).unwrap();
        let r = reg.resource(id);
        assert_eq!(r.package(), "com.foo");
        assert!(!r.is_service());
        assert!(matches!(
            reg.add_resource("com/foo/app.properties", 1, None),
            Err(RegistryError::DuplicateResource(_))
        ));
        assert!(matches!(
            reg.add_resource("META-INF/MANIFEST.MF", 1, None),
            Err(RegistryError::NotAResource(_))
        ));
        assert!(matches!(
            reg.add_resource("META-INF/SIGNER.SF", 1, None),
            Err(RegistryError::NotAResource(_))
        ));
    }

    #[test]
    fn test_service_descriptor_resource() {
        let mut reg = UnitRegistry::new();
        let impl_id = reg.register_class(ClassRecord::new("com.foo.impl.SpiImpl")).unwrap();
        let id = reg
            .add_service_provider("META-INF/services/com.foo.Spi", "com.foo.impl.SpiImpl")
            .unwrap();
        let r = reg.resource(id);
        assert!(r.is_service());
        assert_eq!(r.service().unwrap().match_name(), "com.foo.impl.SpiImpl");

        let includes = PatternSet::parse(&["com.foo.impl.*"]).unwrap();
        assert!(r.matches(&includes));

        let units: BTreeSet<KlassId> = [impl_id].into_iter().collect();
        assert!(r.provided_by(&reg, &units));
        assert!(!r.provided_by(&reg, &BTreeSet::new()));
    }
}
