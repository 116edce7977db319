//! Operation: inspect and clear the module cache.

use thicket_core::config::GlobalConfig;
use thicket_util::errors::ThicketError;
use thicket_util::fs::format_size;
use thicket_util::progress::status;

use crate::Session;

/// Print every committed module, one `namespace  name@revision` per line.
/// Returns the number of modules listed.
pub fn list(config: &GlobalConfig, session: &Session) -> miette::Result<usize> {
    let cache = session.open_cache(config)?;
    let modules = cache.list();
    if modules.is_empty() {
        println!("No cached modules in {}", cache.home().display());
        return Ok(0);
    }
    for (id, module) in &modules {
        println!("{:<8} {id}", module.namespace);
    }
    Ok(modules.len())
}

/// Print cache location, module count and size.
pub fn stats(config: &GlobalConfig, session: &Session) -> miette::Result<()> {
    let cache = session.open_cache(config)?;
    println!("Module cache: {}", cache.home().display());
    println!("  Modules: {}", cache.list().len());
    println!("  Size:    {}", format_size(cache.size()));
    Ok(())
}

/// Remove every cached module. Returns the bytes freed.
pub fn clean(config: &GlobalConfig, session: &Session) -> miette::Result<u64> {
    let mut cache = session.open_cache(config)?;
    let freed = cache.clean().map_err(|e| ThicketError::Generic {
        message: format!("failed to clear {}: {e}", cache.home().display()),
    })?;
    status(
        "Removed",
        &format!("{} ({} freed)", cache.home().display(), format_size(freed)),
    );
    Ok(freed)
}
