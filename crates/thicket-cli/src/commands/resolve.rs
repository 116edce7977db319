//! Handler for `thicket resolve`.

use miette::Result;
use thicket_core::config::GlobalConfig;
use thicket_ops::{ops_resolve, Session};

pub fn exec(config: &GlobalConfig, session: &Session, addresses: &[String]) -> Result<()> {
    ops_resolve::resolve(config, session, addresses)?;
    Ok(())
}
