//! Injection points consulted while computing dependences

use crate::config::{ConfigError, DependencyDecl, OptionalDecl};
use crate::dependence::Modifiers;
use crate::pattern::Pattern;
use crate::registry::Klass;
use std::collections::BTreeSet;

/// Decides whether a static reference is only conditionally reachable
pub trait OptionalityClassifier {
    fn is_optional(&self, from: &Klass, to: &Klass) -> bool;
}

/// Every reference is required
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverOptional;

impl OptionalityClassifier for NeverOptional {
    fn is_optional(&self, _from: &Klass, _to: &Klass) -> bool {
        false
    }
}

/// Classifier driven by `[[optional]]` pattern pairs and exact edges read
/// from the class list
#[derive(Debug, Clone, Default)]
pub struct OptionalRules {
    rules: Vec<(Pattern, Pattern)>,
    edges: BTreeSet<(String, String)>,
}

impl OptionalRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_decls(decls: &[OptionalDecl]) -> Result<Self, ConfigError> {
        let mut rules = Self::new();
        for decl in decls {
            let from = Pattern::parse(&decl.from).map_err(|source| ConfigError::PatternError {
                module: "[[optional]]".to_string(),
                source,
            })?;
            let to = Pattern::parse(&decl.to).map_err(|source| ConfigError::PatternError {
                module: "[[optional]]".to_string(),
                source,
            })?;
            rules.add_rule(from, to);
        }
        Ok(rules)
    }

    pub fn add_rule(&mut self, from: Pattern, to: Pattern) {
        self.rules.push((from, to));
    }

    /// Mark one unit-to-unit edge optional
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.edges.insert((from.into(), to.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.edges.is_empty()
    }

    /// Append the rules and edges of another set
    pub fn extend(&mut self, other: OptionalRules) {
        self.rules.extend(other.rules);
        self.edges.extend(other.edges);
    }
}

impl OptionalityClassifier for OptionalRules {
    fn is_optional(&self, from: &Klass, to: &Klass) -> bool {
        self.edges
            .contains(&(from.name().to_string(), to.name().to_string()))
            || self
                .rules
                .iter()
                .any(|(f, t)| f.matches_class(from.name()) && t.matches_class(to.name()))
    }
}

/// A module-level edge not visible to static reference scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticEdge {
    /// Target module or view name
    pub to: String,
    pub modifiers: Modifiers,
}

/// Source of reflection / dynamic-lookup edges
pub trait SyntheticDependencySource {
    /// Edges leaving the named module
    fn edges_for(&self, module: &str) -> Vec<SyntheticEdge>;

    /// Names of every module this source has edges from
    fn sources(&self) -> Vec<String> {
        Vec::new()
    }
}

/// No synthetic edges
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSyntheticEdges;

impl SyntheticDependencySource for NoSyntheticEdges {
    fn edges_for(&self, _module: &str) -> Vec<SyntheticEdge> {
        Vec::new()
    }
}

/// Synthetic edges declared as `[[dependency]]` entries
#[derive(Debug, Clone, Default)]
pub struct DeclaredEdges {
    edges: Vec<(String, SyntheticEdge)>,
}

impl DeclaredEdges {
    pub fn new(decls: &[DependencyDecl]) -> Self {
        let edges = decls
            .iter()
            .map(|d| {
                let mut modifiers = Modifiers::empty();
                modifiers.set(Modifiers::OPTIONAL, d.optional);
                modifiers.set(Modifiers::LOCAL, d.local);
                modifiers.set(Modifiers::PUBLIC, d.reexport);
                (
                    d.from.clone(),
                    SyntheticEdge {
                        to: d.to.clone(),
                        modifiers,
                    },
                )
            })
            .collect();
        Self { edges }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

impl SyntheticDependencySource for DeclaredEdges {
    fn edges_for(&self, module: &str) -> Vec<SyntheticEdge> {
        self.edges
            .iter()
            .filter(|(from, _)| from == module)
            .map(|(_, edge)| edge.clone())
            .collect()
    }

    fn sources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.edges.iter().map(|(from, _)| from.clone()).collect();
        names.sort();
        names.dedup();
        names
    }
}
