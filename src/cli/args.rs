//! Command-line argument parsing and validation

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// HytalesHub - packages the converter mod and converts Minecraft regions
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "hytaleshub")]
pub struct Args {
    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// JSON configuration file (defaults to hytaleshub.json when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Project directory
    #[arg(short = 'C', long = "project-dir", global = true, default_value = ".")]
    pub project_dir: PathBuf,

    /// Build property override, `key=value` (repeatable)
    #[arg(short = 'P', long = "property", global = true, value_name = "KEY=VALUE")]
    pub properties: Vec<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve dependencies, render resources and write all archives
    Package {
        /// Build directory
        #[arg(short = 'b', long = "build-dir")]
        build_dir: Option<PathBuf>,
    },

    /// Render templated resources into the build directory
    Template,

    /// Resolve declared dependencies and print them
    Resolve,

    /// Generate version information file
    Version {
        /// Output file for version information
        #[arg(short = 'o', long = "output-file", default_value = "version.env")]
        output_file: PathBuf,
    },

    /// Extract block CSVs from Minecraft region files
    Extract,

    /// Match extracted Minecraft blocks to Hytale block ids
    Map,

    /// Rewrite extracted CSVs with the block mapping
    Convert,

    /// Place converted regions
    Spawn {
        /// Worker threads (overrides SpawnThreads)
        #[arg(short = 't', long)]
        threads: Option<usize>,
    },

    /// Extract, map, convert and spawn in one go
    Run,
}

/// Parse command line arguments
pub fn parse_args() -> Args {
    Args::parse()
}
