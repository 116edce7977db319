//! Registries that publish one JSON document per package with every
//! version's manifest inline, and tarballs at a predictable path.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use thicket_core::dependency::{DependencyDescriptor, ModuleId};
use thicket_core::manifest::PackageManifest;
use thicket_resolver::{Backend, FetchedModule, ResolveError, ResolvedRevision, VersionRequest};
use thicket_util::hash::sha256_bytes;

use crate::archive::extract_tar_gz;
use crate::download::{join_url, HttpClient};

#[derive(Debug, Deserialize)]
struct RegistryEntry {
    #[serde(default)]
    versions: IndexMap<String, PackageManifest>,
}

/// `<registry>/<name>` lists versions; the content of a version lives at
/// `<registry>/<name>/<name>-<version>.tar.gz`.
pub struct FlatRegistryBackend {
    name: String,
    client: HttpClient,
    registry: String,
}

impl FlatRegistryBackend {
    pub fn new(name: impl Into<String>, client: HttpClient, registry: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client,
            registry: registry.into(),
        }
    }

    fn tarball_url(&self, name: &str, version: &str) -> String {
        join_url(&self.registry, &format!("{name}/{name}-{version}.tar.gz"))
    }
}

impl Backend for FlatRegistryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_resolve(&self, descriptor: &DependencyDescriptor) -> bool {
        !descriptor.is_url()
    }

    fn do_resolve(
        &self,
        descriptor: &DependencyDescriptor,
        request: &VersionRequest,
    ) -> Result<ResolvedRevision, ResolveError> {
        let url = join_url(&self.registry, &descriptor.name);
        let mut entry: RegistryEntry = self.client.require_json(&url)?;
        let version = request
            .select(entry.versions.keys().map(String::as_str))
            .map(str::to_string)
            .ok_or_else(|| ResolveError::unresolved(descriptor.id(), "no matches found"))?;
        tracing::debug!("{} picked {}@{version}", self.name, descriptor.name);

        let mut manifest = entry.versions.shift_remove(&version).unwrap_or_default();
        if manifest.name.is_empty() {
            manifest.name = descriptor.name.clone();
        }
        let mut revision = ResolvedRevision::new(
            ModuleId::new(&descriptor.name, &version),
            self.tarball_url(&descriptor.name, &version),
        );
        revision.manifest = Some(manifest);
        Ok(revision)
    }

    fn fetch(&self, revision: &ResolvedRevision, home: &Path) -> Result<FetchedModule, ResolveError> {
        let bytes = self.client.require_bytes(&revision.source)?;
        extract_tar_gz(&bytes, home).map_err(|e| ResolveError::Integrity {
            id: revision.id.to_string(),
            message: format!("unreadable tarball {}: {e}", revision.source),
        })?;

        let manifest = match &revision.manifest {
            Some(manifest) => manifest.clone(),
            None => read_manifest(home, revision.id.name())?,
        };
        let mut fetched = FetchedModule::from_manifest(&manifest);
        fetched.sha256 = Some(sha256_bytes(&bytes));
        Ok(fetched)
    }
}

/// Read the first of `names` present in `home`; a bare manifest named after
/// the module when none is.
pub(crate) fn read_manifest_from(
    home: &Path,
    module: &str,
    names: &[&str],
) -> Result<PackageManifest, ResolveError> {
    for name in names {
        let path = home.join(name);
        if !path.is_file() {
            continue;
        }
        let mut manifest = PackageManifest::load(&path).map_err(|e| ResolveError::Manifest {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if manifest.name.is_empty() {
            manifest.name = module.to_string();
        }
        return Ok(manifest);
    }
    Ok(PackageManifest {
        name: module.to_string(),
        ..Default::default()
    })
}

fn read_manifest(home: &Path, module: &str) -> Result<PackageManifest, ResolveError> {
    read_manifest_from(home, module, &["package.json"])
}
