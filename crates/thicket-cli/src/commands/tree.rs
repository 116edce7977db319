//! Handler for `thicket tree`.

use std::path::Path;

use miette::Result;
use thicket_core::config::GlobalConfig;
use thicket_ops::{locate_manifest, ops_tree, Session};

pub fn exec(config: &GlobalConfig, session: &Session, manifest: Option<&Path>) -> Result<()> {
    let manifest = locate_manifest(manifest)?;
    ops_tree::tree(config, session, &manifest)?;
    Ok(())
}
