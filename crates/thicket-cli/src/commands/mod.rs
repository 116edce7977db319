//! Command dispatch and handler modules.

mod cache;
mod install;
mod resolve;
mod tree;

use miette::Result;
use thicket_core::config::GlobalConfig;
use thicket_ops::Session;

use crate::cli::{Cli, Command};

/// Route a parsed CLI invocation to the appropriate command handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    let config = GlobalConfig::load()?;
    let session = Session {
        home: cli.home,
        backends: cli.backends,
        offline: cli.offline,
    };
    tracing::debug!("Session: {session:?}");

    match cli.command {
        Command::Resolve { addresses } => resolve::exec(&config, &session, &addresses),
        Command::Install { manifest, out } => {
            install::exec(&config, &session, manifest.as_deref(), out)
        }
        Command::Tree { manifest } => tree::exec(&config, &session, manifest.as_deref()),
        Command::Cache { action } => cache::exec(&config, &session, action),
    }
}
