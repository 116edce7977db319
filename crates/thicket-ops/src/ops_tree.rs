//! Operation: display the dependency tree of a project.

use std::path::Path;

use thicket_core::config::GlobalConfig;
use thicket_util::progress::spinner;

use crate::Session;

/// Resolve `manifest` and print its tree. Returns the rendered text.
pub fn tree(config: &GlobalConfig, session: &Session, manifest: &Path) -> miette::Result<String> {
    let mut resolver = session.resolver(config)?;

    let sp = spinner("Resolving dependencies...");
    let result = resolver.resolve_manifest(manifest);
    sp.finish_and_clear();

    let rendered = result?.render();
    print!("{rendered}");
    Ok(rendered)
}
