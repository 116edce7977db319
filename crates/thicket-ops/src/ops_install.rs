//! Operation: resolve a project's dependencies, optionally flattening their
//! entry files into one directory.

use std::path::{Path, PathBuf};

use thicket_core::config::GlobalConfig;
use thicket_util::progress::{spinner, status, status_info};

use crate::Session;

/// Options for `thicket install`.
#[derive(Debug, Default)]
pub struct InstallOptions {
    /// Copy every entry file here, one per module name.
    pub out: Option<PathBuf>,
}

#[derive(Debug)]
pub struct InstallSummary {
    /// Modules in the graph, the project itself excluded.
    pub modules: usize,
    /// Files written by flattening, in tree order.
    pub flattened: Vec<PathBuf>,
}

pub fn install(
    config: &GlobalConfig,
    session: &Session,
    manifest: &Path,
    opts: &InstallOptions,
) -> miette::Result<InstallSummary> {
    let mut resolver = session.resolver(config)?;

    let sp = spinner("Resolving dependencies...");
    let result = resolver.resolve_manifest(manifest);
    sp.finish_and_clear();
    let resolution = result?;

    let modules = resolution
        .graph
        .modules()
        .filter(|m| !m.is_project())
        .count();
    status(
        "Installed",
        &format!(
            "{modules} module{} into {}",
            if modules == 1 { "" } else { "s" },
            resolver.cache().home().display()
        ),
    );

    let mut flattened = Vec::new();
    if let Some(out) = &opts.out {
        for &root in &resolution.roots {
            flattened.extend(resolution.graph.flatten(root, out)?);
        }
        status_info(
            "Flattened",
            &format!("{} files into {}", flattened.len(), out.display()),
        );
    }

    Ok(InstallSummary { modules, flattened })
}
