//! Handler for `thicket install`.

use std::path::{Path, PathBuf};

use miette::Result;
use thicket_core::config::GlobalConfig;
use thicket_ops::ops_install::{self, InstallOptions};
use thicket_ops::{locate_manifest, Session};

pub fn exec(
    config: &GlobalConfig,
    session: &Session,
    manifest: Option<&Path>,
    out: Option<PathBuf>,
) -> Result<()> {
    let manifest = locate_manifest(manifest)?;
    ops_install::install(config, session, &manifest, &InstallOptions { out })?;
    Ok(())
}
