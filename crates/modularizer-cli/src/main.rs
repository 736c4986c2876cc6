//! Modularizer CLI
//!
//! Partitions compiled units into modules as described by a module config
//! and writes module descriptors and list files.

use clap::{Parser, Subcommand};
use modularizer_cli::commands::build::{self, BuildArgs, OutputFormat};
use modularizer_cli::commands::check;
use modularizer_cli::logging::init_logging;
use modularizer_cli::output::{resolve_color_choice, StyledOutput};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "modularizer")]
#[command(about = "Module aggregation and dependency resolution for compiled classes", long_about = None)]
#[command(version)]
struct Cli {
    /// Log filter (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Color output: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve modules and write reports
    Build {
        /// Module config (TOML)
        #[arg(short, long, default_value = "modules.toml")]
        config: PathBuf,
        /// Class list files
        #[arg(long = "classes", required = true)]
        classes: Vec<PathBuf>,
        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Report format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Keep member modules separate
        #[arg(long)]
        no_merge: bool,
    },

    /// Validate a config, resolving modules when class lists are given
    Check {
        /// Module config (TOML)
        #[arg(short, long, default_value = "modules.toml")]
        config: PathBuf,
        /// Class list files
        #[arg(long = "classes")]
        classes: Vec<PathBuf>,
        /// Keep member modules separate
        #[arg(long)]
        no_merge: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());
    let mut out = StyledOutput::new(resolve_color_choice(cli.color.as_deref()));

    match cli.command {
        Commands::Build {
            config,
            classes,
            output,
            format,
            no_merge,
        } => {
            let args = BuildArgs {
                config,
                classes,
                output,
                format,
                merge: !no_merge,
            };
            build::execute(&args, &mut out)?;
        }

        Commands::Check {
            config,
            classes,
            no_merge,
        } => {
            check::execute(&config, &classes, !no_merge, &mut out)?;
        }
    }

    Ok(())
}
