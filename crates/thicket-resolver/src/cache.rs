//! On-disk module cache and the in-memory registry built from it.
//!
//! Layout: `<home>/<namespace>/<name>/<version>/module.json`. Opening a cache
//! reads every committed manifest; an id that failed in some namespace gets an
//! in-memory tombstone that lasts for the current run only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thicket_core::dependency::ModuleId;
use thicket_core::manifest::ModuleManifest;
use thicket_core::MODULE_MANIFEST;
use thicket_util::fs::{dir_size, ensure_dir};

use crate::error::ResolveError;

/// A committed module as recorded on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedModule {
    pub namespace: String,
    pub home: PathBuf,
    pub manifest: ModuleManifest,
}

#[derive(Debug, Clone)]
pub enum CacheEntry {
    Committed(CachedModule),
    /// Namespaces in which resolution failed earlier in this run.
    Tombstone(Vec<String>),
}

#[derive(Debug)]
pub struct ModuleCache {
    home: PathBuf,
    entries: HashMap<ModuleId, CacheEntry>,
}

impl ModuleCache {
    /// An empty registry over `home`; nothing is read from disk.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            entries: HashMap::new(),
        }
    }

    /// Open `home` and register every committed module found under it.
    ///
    /// Unreadable manifests are skipped with a warning.
    pub fn open(home: impl Into<PathBuf>) -> std::io::Result<Self> {
        let mut cache = Self::new(home);
        if !cache.home.is_dir() {
            return Ok(cache);
        }
        for namespace in subdirs(&cache.home)? {
            let ns = dir_name(&namespace);
            for root in subdirs(&namespace)? {
                for home in subdirs(&root)? {
                    let manifest_path = home.join(MODULE_MANIFEST);
                    if !manifest_path.is_file() {
                        continue;
                    }
                    match ModuleManifest::read(&manifest_path) {
                        Ok(manifest) => {
                            let id = ModuleId::new(&manifest.name, &manifest.version);
                            cache.entries.insert(
                                id,
                                CacheEntry::Committed(CachedModule {
                                    namespace: ns.clone(),
                                    home,
                                    manifest,
                                }),
                            );
                        }
                        Err(e) => {
                            tracing::warn!("Ignoring cached module at {}: {e}", home.display());
                        }
                    }
                }
            }
        }
        tracing::debug!(
            "Loaded {} cached modules from {}",
            cache.entries.len(),
            cache.home.display()
        );
        Ok(cache)
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Directory grouping every version of `name` in `namespace`.
    pub fn module_root(&self, namespace: &str, name: &str) -> PathBuf {
        self.home.join(namespace).join(path_segment(name))
    }

    /// Directory holding one module's content and manifest.
    pub fn module_home(&self, namespace: &str, id: &ModuleId) -> PathBuf {
        self.module_root(namespace, id.name())
            .join(path_segment(id.revision()))
    }

    pub fn get(&self, id: &ModuleId) -> Option<&CacheEntry> {
        self.entries.get(id)
    }

    pub fn committed(&self, id: &ModuleId) -> Option<&CachedModule> {
        match self.entries.get(id) {
            Some(CacheEntry::Committed(module)) => Some(module),
            _ => None,
        }
    }

    pub fn is_tombstoned(&self, namespace: &str, id: &ModuleId) -> bool {
        match self.entries.get(id) {
            Some(CacheEntry::Tombstone(failed)) => failed.iter().any(|ns| ns == namespace),
            _ => false,
        }
    }

    /// Write the manifest into the module home and register the module.
    pub fn commit(&mut self, id: ModuleId, module: CachedModule) -> Result<(), ResolveError> {
        ensure_dir(&module.home)?;
        let path = module.home.join(MODULE_MANIFEST);
        module
            .manifest
            .write(&path)
            .map_err(|e| ResolveError::Manifest {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        self.entries.insert(id, CacheEntry::Committed(module));
        Ok(())
    }

    /// Mark `id` as failed in `namespace` for the rest of this run.
    ///
    /// A committed entry is left alone.
    pub fn tombstone(&mut self, namespace: &str, id: ModuleId) {
        let entry = self
            .entries
            .entry(id)
            .or_insert_with(|| CacheEntry::Tombstone(Vec::new()));
        if let CacheEntry::Tombstone(failed) = entry {
            if !failed.iter().any(|ns| ns == namespace) {
                failed.push(namespace.to_string());
            }
        }
    }

    /// Committed revisions of `name` under `namespace`.
    pub fn versions(&self, namespace: &str, name: &str) -> Vec<&str> {
        let mut versions: Vec<&str> = self
            .entries
            .iter()
            .filter_map(|(id, entry)| match entry {
                CacheEntry::Committed(m) if m.namespace == namespace && id.name() == name => {
                    Some(id.revision())
                }
                _ => None,
            })
            .collect();
        versions.sort_unstable();
        versions
    }

    /// All committed modules, sorted by id.
    pub fn list(&self) -> Vec<(&ModuleId, &CachedModule)> {
        let mut modules: Vec<_> = self
            .entries
            .iter()
            .filter_map(|(id, entry)| match entry {
                CacheEntry::Committed(m) => Some((id, m)),
                CacheEntry::Tombstone(_) => None,
            })
            .collect();
        modules.sort_by(|a, b| a.0.cmp(b.0));
        modules
    }

    /// Total size of the cache directory in bytes.
    pub fn size(&self) -> u64 {
        dir_size(&self.home)
    }

    /// Delete everything under the cache home. Returns the bytes freed.
    pub fn clean(&mut self) -> std::io::Result<u64> {
        let freed = self.size();
        if self.home.exists() {
            std::fs::remove_dir_all(&self.home)?;
        }
        self.entries.clear();
        Ok(freed)
    }
}

fn subdirs(path: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Make a name or revision safe to use as a single directory name.
///
/// URL revisions become `https___host_path_file.js`.
pub fn path_segment(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+' | '@') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use tempfile::TempDir;

    fn manifest(name: &str, version: &str) -> ModuleManifest {
        ModuleManifest {
            name: name.into(),
            version: version.into(),
            main: format!("{name}.js"),
            dependencies: IndexMap::new(),
            sha256: None,
        }
    }

    #[test]
    fn commit_then_reopen() {
        let tmp = TempDir::new().unwrap();
        let mut cache = ModuleCache::new(tmp.path());
        let id = ModuleId::new("jquery", "1.8.3");
        let home = cache.module_home("jam", &id);
        cache
            .commit(
                id.clone(),
                CachedModule {
                    namespace: "jam".into(),
                    home: home.clone(),
                    manifest: manifest("jquery", "1.8.3"),
                },
            )
            .unwrap();
        assert!(home.join(MODULE_MANIFEST).is_file());
        assert_eq!(home, tmp.path().join("jam").join("jquery").join("1.8.3"));

        let reopened = ModuleCache::open(tmp.path()).unwrap();
        let cached = reopened.committed(&id).unwrap();
        assert_eq!(cached.namespace, "jam");
        assert_eq!(cached.manifest.main, "jquery.js");
        assert_eq!(reopened.versions("jam", "jquery"), ["1.8.3"]);
        assert!(reopened.versions("npm", "jquery").is_empty());
    }

    #[test]
    fn open_skips_broken_manifests() {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path().join("npm").join("broken").join("1.0.0");
        std::fs::create_dir_all(&home).unwrap();
        std::fs::write(home.join(MODULE_MANIFEST), "{not json").unwrap();
        let cache = ModuleCache::open(tmp.path()).unwrap();
        assert!(cache.list().is_empty());
    }

    #[test]
    fn open_missing_home_is_empty() {
        let tmp = TempDir::new().unwrap();
        let cache = ModuleCache::open(tmp.path().join("absent")).unwrap();
        assert!(cache.list().is_empty());
    }

    #[test]
    fn tombstones_are_not_committed() {
        let mut cache = ModuleCache::new("/nonexistent");
        let id = ModuleId::new("a", "1.0.0");
        cache.tombstone("jam", id.clone());
        assert!(cache.is_tombstoned("jam", &id));
        assert!(!cache.is_tombstoned("npm", &id));
        assert!(cache.committed(&id).is_none());
        assert!(cache.list().is_empty());
    }

    #[test]
    fn url_revisions_get_safe_directories() {
        let cache = ModuleCache::new("/cache");
        let id = ModuleId::new("jquery", "https://code.jquery.com/jquery.js");
        let home = cache.module_home("url", &id);
        assert_eq!(
            home,
            PathBuf::from("/cache/url/jquery/https___code.jquery.com_jquery.js")
        );
    }

    #[test]
    fn clean_removes_everything() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("modules");
        let mut cache = ModuleCache::new(&root);
        let id = ModuleId::new("a", "1.0.0");
        let home = cache.module_home("jam", &id);
        cache
            .commit(
                id,
                CachedModule {
                    namespace: "jam".into(),
                    home,
                    manifest: manifest("a", "1.0.0"),
                },
            )
            .unwrap();
        assert!(cache.size() > 0);
        let freed = cache.clean().unwrap();
        assert!(freed > 0);
        assert!(!root.exists());
        assert!(cache.list().is_empty());
    }
}
