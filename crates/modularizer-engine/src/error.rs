//! Errors raised by the resolution engine

use crate::config::ConfigError;
use thiserror::Error;

/// Fatal conditions that abort a build
///
/// Every variant names the module or unit responsible so the failure can be
/// traced back to a configuration entry.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Two modules share a name
    #[error("Module \"{0}\" already exists")]
    DuplicateModule(String),

    /// A view name collides with another module or view
    #[error("View \"{view}\" of module \"{module}\" clashes with an existing module or view")]
    DuplicateView { module: String, view: String },

    /// A module referenced from requires/permits/members does not exist
    #[error("Module \"{name}\" referenced by {context} doesn't exist")]
    UnknownModule { name: String, context: String },

    /// The members declarations contain a cycle
    #[error("Cycle detected in module members: module {0}")]
    MemberCycle(String),

    /// A module is declared as member of more than one parent
    #[error("Module \"{module}\" is a member of both \"{first}\" and \"{second}\"")]
    MultipleParents {
        module: String,
        first: String,
        second: String,
    },

    /// Non-optional dependences form a cycle
    #[error("Circular module dependency detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// A unit or resource was claimed twice
    #[error("{item} is already owned by module \"{owner}\"; \"{claimant}\" cannot claim it")]
    OwnershipViolation {
        item: String,
        owner: String,
        claimant: String,
    },

    /// Two dependences on the same module request different views
    #[error("Unexpected dependence from \"{module}\": {existing} conflicts with {incoming}")]
    ConflictingDependence {
        module: String,
        existing: String,
        incoming: String,
    },

    /// No view of the target module satisfies a dependence
    #[error("Module \"{module}\" requires {dependence} but no view exports it")]
    ViewNotFound { module: String, dependence: String },

    /// Attempt to add a permit after the fixup pass completed
    #[error("Permits of module \"{module}\" are frozen; cannot add \"{permit}\"")]
    PermitsFrozen { module: String, permit: String },

    /// A dependence targets a module without finalized module info
    #[error("No module info for module \"{0}\"")]
    MissingModuleInfo(String),

    /// Module info was created twice
    #[error("Module info already created for \"{0}\"")]
    ModuleInfoExists(String),

    /// Platform variant misconfiguration
    #[error("Platform configuration error: {0}")]
    Platform(String),
}
