//! Modularizer command-line driver
//!
//! Loads a module config and class lists, runs the engine and writes the
//! resulting module reports.

pub mod commands;
pub mod logging;
pub mod output;
