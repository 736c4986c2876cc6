//! Module configuration (modules.toml)
//!
//! The declarative file is parsed once into [`ConfigFile`] and compiled into
//! immutable [`ModuleConfig`] records. Patterns are validated at compile time
//! so the engine never sees a malformed one.

use crate::dependence::Modifiers;
use crate::pattern::{PatternError, PatternSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),

    /// Malformed pattern in a module declaration
    #[error("Invalid pattern in module \"{module}\": {source}")]
    PatternError {
        module: String,
        #[source]
        source: PatternError,
    },
}

/// Top-level config file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigFile {
    /// Global settings
    #[serde(default)]
    pub settings: Settings,

    /// Module declarations
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleDecl>,

    /// Synthetic dependency edges
    #[serde(default, rename = "dependency")]
    pub dependencies: Vec<DependencyDecl>,

    /// Optional reference rules
    #[serde(default)]
    pub optional: Vec<OptionalDecl>,

    /// Platform variant settings (omit to use the generic engine)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformSettings>,
}

/// Global settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Default version of every module
    #[serde(default = "default_version")]
    pub version: String,

    /// Name of the foundational module
    #[serde(default = "default_base_module")]
    pub base_module: String,

    /// Catch-all module for units nobody claimed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unknown_module: Option<String>,

    /// Packages exported by default views (empty means every package)
    #[serde(default)]
    pub exported_packages: Vec<String>,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_base_module() -> String {
    "base".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            base_module: default_base_module(),
            unknown_module: None,
            exported_packages: Vec::new(),
        }
    }
}

/// A `[[module]]` entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ModuleDecl {
    pub name: String,

    /// Overrides the global version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub roots: Vec<String>,

    #[serde(default)]
    pub includes: Vec<String>,

    #[serde(default)]
    pub excludes: Vec<String>,

    /// Sub-modules aggregated into this one
    #[serde(default)]
    pub members: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,

    #[serde(default)]
    pub allow_empty: bool,

    /// LOCAL requesters may bind to the default view
    #[serde(default)]
    pub allow_local_default: bool,

    #[serde(default = "default_true")]
    pub internal_view: bool,

    #[serde(default)]
    pub permits: Vec<String>,

    #[serde(default)]
    pub requires: Vec<RequiresDecl>,

    #[serde(default, rename = "view")]
    pub views: Vec<ViewDecl>,
}

/// Explicit requires entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RequiresDecl {
    pub name: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub reexport: bool,
}

impl RequiresDecl {
    pub fn modifiers(&self) -> Modifiers {
        let mut mods = Modifiers::empty();
        mods.set(Modifiers::OPTIONAL, self.optional);
        mods.set(Modifiers::LOCAL, self.local);
        mods.set(Modifiers::PUBLIC, self.reexport);
        mods
    }
}

/// Additional named view
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ViewDecl {
    pub name: String,
    #[serde(default)]
    pub exports: Vec<String>,
    #[serde(default)]
    pub permits: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,
}

/// Synthetic edge between two modules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DependencyDecl {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub reexport: bool,
}

/// Unit references from `from` to `to` are optional
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionalDecl {
    pub from: String,
    pub to: String,
}

/// `[platform]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct PlatformSettings {
    #[serde(default = "default_boot_module")]
    pub boot_module: String,
    #[serde(default = "default_platform_base")]
    pub base_module: String,
    #[serde(default = "default_jdk_module")]
    pub jdk_module: String,
    #[serde(default = "default_jre_module")]
    pub jre_module: String,
    #[serde(default = "default_jre_tools_module")]
    pub jre_tools_module: String,
    #[serde(default = "default_internal_prefix")]
    pub internal_prefix: String,
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
}

fn default_boot_module() -> String {
    "jdk.boot".to_string()
}

fn default_platform_base() -> String {
    "jdk.base".to_string()
}

fn default_jdk_module() -> String {
    "jdk".to_string()
}

fn default_jre_module() -> String {
    "jdk.jre".to_string()
}

fn default_jre_tools_module() -> String {
    "jdk.tools.jre".to_string()
}

fn default_internal_prefix() -> String {
    "sun.".to_string()
}

fn default_public_prefix() -> String {
    "jdk.".to_string()
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            boot_module: default_boot_module(),
            base_module: default_platform_base(),
            jdk_module: default_jdk_module(),
            jre_module: default_jre_module(),
            jre_tools_module: default_jre_tools_module(),
            internal_prefix: default_internal_prefix(),
            public_prefix: default_public_prefix(),
        }
    }
}

impl ConfigFile {
    /// Parse a config from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a config from a string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: ConfigFile = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every declaration. Cross-module references are checked by
    /// the builder once all modules exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settings.version.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Default version cannot be empty".to_string(),
            ));
        }
        for decl in &self.modules {
            validate_module(decl)?;
        }
        for dep in &self.dependencies {
            if dep.from.is_empty() || dep.to.is_empty() {
                return Err(ConfigError::ValidationError(
                    "Dependency endpoints cannot be empty".to_string(),
                ));
            }
        }
        for rule in &self.optional {
            for pattern in [&rule.from, &rule.to] {
                crate::pattern::Pattern::parse(pattern).map_err(|source| {
                    ConfigError::PatternError {
                        module: "[[optional]]".to_string(),
                        source,
                    }
                })?;
            }
        }
        Ok(())
    }

    /// Compile every module declaration
    pub fn module_configs(&self) -> Result<Vec<ModuleConfig>, ConfigError> {
        self.modules
            .iter()
            .map(|decl| ModuleConfig::from_decl(decl, &self.settings.version))
            .collect()
    }

    /// Write config to a file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn validate_module(decl: &ModuleDecl) -> Result<(), ConfigError> {
    if !is_valid_module_name(&decl.name) {
        return Err(ConfigError::ValidationError(format!(
            "Invalid module name: \"{}\". Must be dot-separated identifiers",
            decl.name
        )));
    }
    if decl.members.iter().any(|m| m == &decl.name) {
        return Err(ConfigError::ValidationError(format!(
            "Module \"{}\" cannot be a member of itself",
            decl.name
        )));
    }
    if let Some(version) = &decl.version {
        if version.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Module \"{}\" has an empty version",
                decl.name
            )));
        }
    }
    for req in &decl.requires {
        if req.name.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Module \"{}\" has a requires entry without a name",
                decl.name
            )));
        }
    }

    let mut names = BTreeSet::new();
    names.insert(decl.name.as_str());
    for view in &decl.views {
        if !is_valid_module_name(&view.name) {
            return Err(ConfigError::ValidationError(format!(
                "Module \"{}\" has an invalid view name \"{}\"",
                decl.name, view.name
            )));
        }
        if !names.insert(view.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Duplicate view \"{}\" in module \"{}\"",
                view.name, decl.name
            )));
        }
        if decl.internal_view && view.name == internal_view_name(&decl.name) {
            return Err(ConfigError::ValidationError(format!(
                "View \"{}\" clashes with the internal view of \"{}\"",
                view.name, decl.name
            )));
        }
    }

    compile_patterns(&decl.name, &decl.roots)?;
    compile_patterns(&decl.name, &decl.includes)?;
    compile_patterns(&decl.name, &decl.excludes)?;
    Ok(())
}

fn compile_patterns(module: &str, inputs: &[String]) -> Result<PatternSet, ConfigError> {
    PatternSet::parse(inputs).map_err(|source| ConfigError::PatternError {
        module: module.to_string(),
        source,
    })
}

/// Module names are dot-separated identifier segments (`-` allowed)
fn is_valid_module_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        })
}

/// Name of a module's internal view
pub fn internal_view_name(module: &str) -> String {
    format!("{}.internal", module)
}

/// An explicit requires entry after compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequireSpec {
    /// Target module or view name
    pub name: String,
    pub modifiers: Modifiers,
}

/// A named view after compilation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewConfig {
    pub name: String,
    pub exports: BTreeSet<String>,
    pub permits: Vec<String>,
    pub main_class: Option<String>,
}

/// Immutable configuration of one module
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleConfig {
    name: String,
    version: String,
    roots: PatternSet,
    includes: PatternSet,
    excludes: PatternSet,
    requires: Vec<RequireSpec>,
    permits: Vec<String>,
    members: Vec<String>,
    main_class: Option<String>,
    allow_empty: bool,
    allow_local_default: bool,
    internal_view: bool,
    views: Vec<ViewConfig>,
}

impl ModuleConfig {
    /// A config with no patterns, used for modules synthesized by the engine
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            roots: PatternSet::new(),
            includes: PatternSet::new(),
            excludes: PatternSet::new(),
            requires: Vec::new(),
            permits: Vec::new(),
            members: Vec::new(),
            main_class: None,
            allow_empty: false,
            allow_local_default: false,
            internal_view: true,
            views: Vec::new(),
        }
    }

    /// Compile a declaration
    pub fn from_decl(decl: &ModuleDecl, default_version: &str) -> Result<Self, ConfigError> {
        validate_module(decl)?;
        Ok(Self {
            name: decl.name.clone(),
            version: decl
                .version
                .clone()
                .unwrap_or_else(|| default_version.to_string()),
            roots: compile_patterns(&decl.name, &decl.roots)?,
            includes: compile_patterns(&decl.name, &decl.includes)?,
            excludes: compile_patterns(&decl.name, &decl.excludes)?,
            requires: decl
                .requires
                .iter()
                .map(|r| RequireSpec {
                    name: r.name.clone(),
                    modifiers: r.modifiers(),
                })
                .collect(),
            permits: decl.permits.clone(),
            members: decl.members.clone(),
            main_class: decl.main_class.clone(),
            allow_empty: decl.allow_empty,
            allow_local_default: decl.allow_local_default,
            internal_view: decl.internal_view,
            views: decl
                .views
                .iter()
                .map(|v| ViewConfig {
                    name: v.name.clone(),
                    exports: v.exports.iter().cloned().collect(),
                    permits: v.permits.clone(),
                    main_class: v.main_class.clone(),
                })
                .collect(),
        })
    }

    pub fn with_roots(mut self, roots: PatternSet) -> Self {
        self.roots = roots;
        self
    }

    pub fn with_includes(mut self, includes: PatternSet) -> Self {
        self.includes = includes;
        self
    }

    pub fn with_excludes(mut self, excludes: PatternSet) -> Self {
        self.excludes = excludes;
        self
    }

    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members.extend(members.into_iter().map(Into::into));
        self
    }

    pub fn with_requires(mut self, name: impl Into<String>, modifiers: Modifiers) -> Self {
        self.requires.push(RequireSpec {
            name: name.into(),
            modifiers,
        });
        self
    }

    pub fn with_permits(mut self, name: impl Into<String>) -> Self {
        self.permits.push(name.into());
        self
    }

    pub fn with_main_class(mut self, main_class: impl Into<String>) -> Self {
        self.main_class = Some(main_class.into());
        self
    }

    pub fn with_allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }

    pub fn with_internal_view(mut self, internal: bool) -> Self {
        self.internal_view = internal;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn roots(&self) -> &PatternSet {
        &self.roots
    }

    pub fn includes(&self) -> &PatternSet {
        &self.includes
    }

    pub fn excludes(&self) -> &PatternSet {
        &self.excludes
    }

    pub fn requires(&self) -> &[RequireSpec] {
        &self.requires
    }

    pub fn permits(&self) -> &[String] {
        &self.permits
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn main_class(&self) -> Option<&str> {
        self.main_class.as_deref()
    }

    pub fn allow_empty(&self) -> bool {
        self.allow_empty
    }

    pub fn allow_local_default(&self) -> bool {
        self.allow_local_default
    }

    pub fn has_internal_view(&self) -> bool {
        self.internal_view
    }

    pub fn views(&self) -> &[ViewConfig] {
        &self.views
    }

    /// Root pattern match, minus exclusions
    pub fn is_root(&self, name: &str) -> bool {
        self.roots.matches_class(name) && !self.excludes.matches_class(name)
    }

    /// Include pattern match, minus exclusions
    pub fn is_included(&self, name: &str) -> bool {
        self.includes.matches_class(name) && !self.excludes.matches_class(name)
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excludes.matches_class(name)
    }
}
