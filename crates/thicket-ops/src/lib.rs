pub mod ops_cache;
pub mod ops_install;
pub mod ops_resolve;
pub mod ops_tree;

use std::path::{Path, PathBuf};

use thicket_core::config::GlobalConfig;
use thicket_registry::backend_chain;
use thicket_resolver::{EngineOptions, ModuleCache, Resolver};
use thicket_util::errors::ThicketError;
use thicket_util::fs::find_ancestor_with;
use thicket_util::progress::status_warn;

/// Command-line overrides layered over [`GlobalConfig`].
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Module cache root; `[cache] dir` when unset.
    pub home: Option<PathBuf>,
    /// Backend chain; `[resolve] backends` when empty.
    pub backends: Vec<String>,
    pub offline: bool,
}

impl Session {
    pub fn cache_dir(&self, config: &GlobalConfig) -> PathBuf {
        self.home.clone().unwrap_or_else(|| config.cache_dir())
    }

    /// Read the module cache under the effective home.
    pub fn open_cache(&self, config: &GlobalConfig) -> miette::Result<ModuleCache> {
        let dir = self.cache_dir(config);
        tracing::debug!("Module cache at {}", dir.display());
        ModuleCache::open(&dir).map_err(|e| {
            ThicketError::Generic {
                message: format!("failed to read module cache {}: {e}", dir.display()),
            }
            .into()
        })
    }

    /// Resolver over the effective cache and backend chain.
    pub fn resolver(&self, config: &GlobalConfig) -> miette::Result<Resolver> {
        let names = if self.backends.is_empty() {
            config.resolve.backends.clone()
        } else {
            self.backends.clone()
        };
        let backends = backend_chain(config, &names)?;
        let options = EngineOptions {
            offline: self.offline || config.resolve.offline,
        };
        if options.offline {
            status_warn("Offline", "resolving from cached modules only");
        }
        Ok(Resolver::new(self.open_cache(config)?, backends).with_options(options))
    }
}

/// The project manifest to use: `explicit` when given, else the nearest
/// `package.json` at or above the current directory.
pub fn locate_manifest(explicit: Option<&Path>) -> miette::Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(ThicketError::Manifest {
            message: format!("{} does not exist", path.display()),
        }
        .into());
    }
    let cwd = std::env::current_dir().map_err(ThicketError::Io)?;
    find_ancestor_with(&cwd, "package.json")
        .map(|dir| dir.join("package.json"))
        .ok_or_else(|| {
            ThicketError::Manifest {
                message: format!(
                    "could not find package.json in {} or any parent directory",
                    cwd.display()
                ),
            }
            .into()
        })
}
