//! Class-list reader
//!
//! Line-oriented feeder for the unit registry:
//!
//! ```text
//! class com.foo.Main public 1024
//! resource com/foo/app.properties 12
//! provider META-INF/services/com.foo.Spi com.foo.SpiImpl
//! com.foo.Main -> com.bar.Helper
//! [optional] com.foo.Main -> com.baz.Opt
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use crate::hooks::OptionalRules;
use crate::registry::{ClassRecord, RegistryError, UnitRegistry};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors reading a class list
#[derive(Debug, Error)]
pub enum ClassListError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("line {line}: {source}")]
    EntryError {
        line: usize,
        #[source]
        source: RegistryError,
    },
}

/// What a class list contributed
#[derive(Debug, Default)]
pub struct ClassList {
    pub classes: usize,
    pub resources: usize,
    pub providers: usize,
    pub edges: usize,
    /// `[optional]` edges, for the optionality classifier
    pub optional: OptionalRules,
}

impl ClassList {
    pub fn from_file(path: impl AsRef<Path>, registry: &mut UnitRegistry) -> Result<Self, ClassListError> {
        let file = File::open(path.as_ref())?;
        Self::read(BufReader::new(file), registry)
    }

    pub fn from_str(text: &str, registry: &mut UnitRegistry) -> Result<Self, ClassListError> {
        Self::read(text.as_bytes(), registry)
    }

    /// Feed every line of `reader` into `registry`
    pub fn read(reader: impl BufRead, registry: &mut UnitRegistry) -> Result<Self, ClassListError> {
        let mut list = Self::default();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            list.read_line(index + 1, line.trim(), registry)?;
        }
        debug!(
            classes = list.classes,
            resources = list.resources,
            edges = list.edges,
            "class list read"
        );
        Ok(list)
    }

    fn read_line(&mut self, line: usize, text: &str, registry: &mut UnitRegistry) -> Result<(), ClassListError> {
        if text.is_empty() || text.starts_with('#') {
            return Ok(());
        }
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let registered = |source: RegistryError| ClassListError::EntryError { line, source };

        match tokens.as_slice() {
            ["class", name, rest @ ..] => {
                let mut record = ClassRecord::new(*name);
                for token in rest {
                    match *token {
                        "public" => record = record.public(),
                        size => record = record.with_size(parse_size(line, size)?),
                    }
                }
                registry.register_class(record).map_err(registered)?;
                self.classes += 1;
            }
            ["resource", path, size] => {
                let size = parse_size(line, size)?;
                registry.add_resource(path, size, None).map_err(registered)?;
                self.resources += 1;
            }
            ["provider", path, provider] => {
                registry.add_service_provider(path, provider).map_err(registered)?;
                self.providers += 1;
            }
            ["[optional]", from, "->", to] => {
                registry.add_reference_by_name(from, to);
                self.optional.add_edge(*from, *to);
                self.edges += 1;
            }
            [from, "->", to] => {
                registry.add_reference_by_name(from, to);
                self.edges += 1;
            }
            _ => {
                return Err(ClassListError::SyntaxError {
                    line,
                    message: format!("unrecognized entry \"{}\"", text),
                })
            }
        }
        Ok(())
    }
}

fn parse_size(line: usize, token: &str) -> Result<u64, ClassListError> {
    token.parse().map_err(|_| ClassListError::SyntaxError {
        line,
        message: format!("invalid size \"{}\"", token),
    })
}
