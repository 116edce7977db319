//! Cache command implementation.

use miette::Result;
use thicket_core::config::GlobalConfig;
use thicket_ops::{ops_cache, Session};

use crate::cli::CacheAction;

pub fn exec(config: &GlobalConfig, session: &Session, action: CacheAction) -> Result<()> {
    match action {
        CacheAction::List => ops_cache::list(config, session).map(|_| ()),
        CacheAction::Stats => ops_cache::stats(config, session),
        CacheAction::Clean => ops_cache::clean(config, session).map(|_| ()),
    }
}
