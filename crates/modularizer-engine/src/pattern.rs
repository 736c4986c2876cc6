//! Name patterns for root, include and exclude rules
//!
//! A pattern is matched against a unit split into its package and simple
//! name. Supported forms:
//! - `com.foo.Bar` - exact name
//! - `com.foo.*` - units directly in package `com.foo`
//! - `com.foo.**` - units in `com.foo` and every sub-package
//! - `com.foo.Bar*` - units in `com.foo` whose simple name starts with `Bar`
//! - `*` or `**` - everything
//!
//! Resource paths use `/` as separator; both the pattern and the path are
//! normalised to `.` before matching.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while parsing a pattern
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PatternError {
    /// Pattern is empty
    #[error("Empty pattern")]
    Empty,

    /// Pattern contains whitespace
    #[error("Pattern contains whitespace: '{0}'")]
    Whitespace(String),

    /// Wildcard outside the last segment
    #[error("Wildcard is only allowed at the end of a pattern: '{0}'")]
    MisplacedWildcard(String),
}

/// A compiled name pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// Matches every name
    All,
    /// Matches one fully qualified name
    Exact(String),
    /// Matches names directly inside a package
    Package(String),
    /// Matches names inside a package or any of its sub-packages
    Subtree(String),
    /// Matches names inside a package whose simple name has a prefix
    Prefix { package: String, prefix: String },
}

impl Pattern {
    /// Parse a pattern string
    pub fn parse(input: &str) -> Result<Self, PatternError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PatternError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(PatternError::Whitespace(input.to_string()));
        }

        let normalized = trimmed.replace('/', ".");
        if normalized == "*" || normalized == "**" {
            return Ok(Pattern::All);
        }

        let pattern = if let Some(pkg) = normalized.strip_suffix(".**") {
            Pattern::Subtree(pkg.to_string())
        } else if let Some(pkg) = normalized.strip_suffix(".*") {
            Pattern::Package(pkg.to_string())
        } else if let Some(head) = normalized.strip_suffix('*') {
            let (package, prefix) = split_name(head);
            Pattern::Prefix {
                package: package.to_string(),
                prefix: prefix.to_string(),
            }
        } else {
            Pattern::Exact(normalized.clone())
        };

        let stem = match &pattern {
            Pattern::Subtree(p) | Pattern::Package(p) | Pattern::Exact(p) => p.as_str(),
            Pattern::Prefix { package, prefix } => {
                if package.contains('*') || prefix.contains('*') {
                    return Err(PatternError::MisplacedWildcard(input.to_string()));
                }
                ""
            }
            Pattern::All => "",
        };
        if stem.contains('*') || (stem.is_empty() && !matches!(pattern, Pattern::Prefix { .. })) {
            return Err(PatternError::MisplacedWildcard(input.to_string()));
        }

        Ok(pattern)
    }

    /// Check whether a unit name (dotted) matches
    pub fn matches_class(&self, name: &str) -> bool {
        let (package, simple) = split_name(name);
        self.matches_parts(package, simple)
    }

    /// Check whether a resource path (slash separated) matches
    pub fn matches_resource(&self, path: &str) -> bool {
        let (dir, file) = match path.rfind('/') {
            Some(i) => (&path[..i], &path[i + 1..]),
            None => ("", path),
        };
        let package = dir.replace('/', ".");
        self.matches_parts(&package, file)
    }

    fn matches_parts(&self, package: &str, simple: &str) -> bool {
        match self {
            Pattern::All => true,
            Pattern::Exact(name) => {
                if package.is_empty() {
                    name == simple
                } else {
                    name.len() == package.len() + 1 + simple.len()
                        && name.starts_with(package)
                        && name[package.len()..].starts_with('.')
                        && name.ends_with(simple)
                }
            }
            Pattern::Package(p) => package == p,
            Pattern::Subtree(p) => {
                package == p || (package.starts_with(p.as_str()) && package[p.len()..].starts_with('.'))
            }
            Pattern::Prefix {
                package: p,
                prefix,
            } => package == p && simple.starts_with(prefix.as_str()),
        }
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pattern::parse(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::All => write!(f, "**"),
            Pattern::Exact(name) => write!(f, "{}", name),
            Pattern::Package(p) => write!(f, "{}.*", p),
            Pattern::Subtree(p) => write!(f, "{}.**", p),
            Pattern::Prefix { package, prefix } if package.is_empty() => write!(f, "{}*", prefix),
            Pattern::Prefix { package, prefix } => write!(f, "{}.{}*", package, prefix),
        }
    }
}

impl Serialize for Pattern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pattern::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// An ordered list of patterns; matches if any member matches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile a list of pattern strings
    pub fn parse<S: AsRef<str>>(inputs: &[S]) -> Result<Self, PatternError> {
        let patterns = inputs
            .iter()
            .map(|s| Pattern::parse(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Add a pattern
    pub fn push(&mut self, pattern: Pattern) {
        self.patterns.push(pattern);
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    pub fn matches_class(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches_class(name))
    }

    pub fn matches_resource(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches_resource(path))
    }
}

/// Split a dotted name into (package, simple name)
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) => (&name[..i], &name[i + 1..]),
        None => ("", name),
    }
}
