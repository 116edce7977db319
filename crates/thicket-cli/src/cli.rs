//! CLI argument definitions.
//!
//! Each command corresponds to a handler in the [`super::commands`] module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "thicket",
    version,
    about = "Resolve JavaScript module dependencies into a local cache",
    long_about = "thicket resolves module dependencies with version expressions against \
                  direct URLs, jam, bower, volo and npm registries, and keeps every resolved \
                  module in a local cache."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Module cache directory (defaults to `[cache] dir` or ~/.thicket/modules)
    #[arg(long, global = true, env = "THICKET_CACHE")]
    pub home: Option<PathBuf>,

    /// Backend to use, in order; repeat to build a chain
    #[arg(short, long = "backend", global = true, value_name = "NAME")]
    pub backends: Vec<String>,

    /// Use only modules already in the cache
    #[arg(long, global = true)]
    pub offline: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve modules such as `jquery/1.8.3` and print their tree
    Resolve {
        /// Module addresses: name, name/version, backend@name/version or a URL
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// Resolve the dependencies of a package.json
    Install {
        /// Project manifest (defaults to the nearest package.json)
        #[arg(short, long)]
        manifest: Option<PathBuf>,
        /// Copy each module's entry file into this directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Display the dependency tree of a package.json
    Tree {
        /// Project manifest (defaults to the nearest package.json)
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// Inspect or clear the module cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached modules
    List,
    /// Show cache location and size
    Stats,
    /// Remove every cached module
    Clean,
}

pub fn parse() -> Cli {
    Cli::parse()
}
