//! Operation: resolve module addresses given on the command line.

use thicket_core::config::GlobalConfig;
use thicket_core::dependency::Address;
use thicket_resolver::{Resolution, ResolveError};
use thicket_util::progress::{spinner, status};

use crate::Session;

/// Resolve every address into one graph and print its tree.
///
/// All addresses are parsed before anything is fetched.
pub fn resolve(
    config: &GlobalConfig,
    session: &Session,
    addresses: &[String],
) -> miette::Result<Resolution> {
    let parsed = addresses
        .iter()
        .map(|a| {
            Address::parse(a).ok_or_else(|| ResolveError::Address {
                address: a.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut resolver = session.resolver(config)?;
    let sp = spinner(&format!("Resolving {}...", addresses.join(", ")));
    let result = resolver.resolve_all(&parsed);
    sp.finish_and_clear();
    let resolution = result?;

    for module in resolution.root_modules() {
        status(
            "Resolved",
            &format!("{} ({})", module.id, module.entry_path().display()),
        );
    }
    print!("{}", resolution.render());
    Ok(resolution)
}
