//! Subcommand implementations

pub mod build;
pub mod check;
