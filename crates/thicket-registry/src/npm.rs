//! npm-style registries: a package document with publish times and a
//! `dist.tarball` per version.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use thicket_core::dependency::{DependencyDescriptor, ModuleId};
use thicket_core::manifest::PackageManifest;
use thicket_resolver::{
    Backend, FetchedModule, ResolveError, ResolvedRevision, Version, VersionRequest,
};
use thicket_util::hash::sha256_bytes;

use crate::archive::extract_tar_gz;
use crate::checksum::verify_sha1;
use crate::download::{join_url, HttpClient};
use crate::flat::read_manifest_from;

#[derive(Debug, Deserialize)]
struct PackageDocument {
    /// Version to ISO-8601 publish time, plus `created` and `modified`.
    #[serde(default)]
    time: IndexMap<String, String>,
    #[serde(default)]
    versions: IndexMap<String, VersionDocument>,
}

#[derive(Debug, Deserialize)]
struct VersionDocument {
    #[serde(flatten)]
    manifest: PackageManifest,
    dist: Option<Dist>,
}

#[derive(Debug, Deserialize)]
struct Dist {
    tarball: String,
    shasum: Option<String>,
}

impl PackageDocument {
    /// The most recently published version.
    fn latest(&self) -> Option<&str> {
        self.time
            .iter()
            .filter(|(version, _)| {
                self.versions.contains_key(*version) && Version::parse(version).is_ok()
            })
            .max_by(|a, b| a.1.cmp(b.1))
            .map(|(version, _)| version.as_str())
    }
}

pub struct ArchiveRegistryBackend {
    name: String,
    client: HttpClient,
    registry: String,
}

impl ArchiveRegistryBackend {
    pub fn new(name: impl Into<String>, client: HttpClient, registry: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client,
            registry: registry.into(),
        }
    }
}

impl Backend for ArchiveRegistryBackend {
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
        let url = join_url(&self.registry, &encode_name(&descriptor.name));
        let mut document: PackageDocument = self.client.require_json(&url)?;

        let picked = match request {
            VersionRequest::Latest => document
                .latest()
                .or_else(|| request.select(document.versions.keys().map(String::as_str))),
            VersionRequest::Expr(_) => request.select(document.versions.keys().map(String::as_str)),
        };
        let version = picked
            .map(str::to_string)
            .ok_or_else(|| ResolveError::unresolved(descriptor.id(), "no matches found"))?;

        let Some(entry) = document.versions.shift_remove(&version) else {
            return Err(ResolveError::unresolved(descriptor.id(), "no matches found"));
        };
        let dist = entry.dist.ok_or_else(|| ResolveError::Metadata {
            url: url.clone(),
            message: format!("version {version} has no dist.tarball"),
        })?;

        let mut revision =
            ResolvedRevision::new(ModuleId::new(&descriptor.name, &version), dist.tarball);
        revision.manifest = Some(entry.manifest);
        revision.checksum = dist.shasum.filter(|sum| !sum.trim().is_empty());
        Ok(revision)
    }

    fn fetch(&self, revision: &ResolvedRevision, home: &Path) -> Result<FetchedModule, ResolveError> {
        let bytes = self.client.require_bytes(&revision.source)?;
        if let Some(expected) = &revision.checksum {
            verify_sha1(&revision.id, &bytes, expected)?;
        }
        extract_tar_gz(&bytes, home).map_err(|e| ResolveError::Integrity {
            id: revision.id.to_string(),
            message: format!("unreadable tarball {}: {e}", revision.source),
        })?;

        // The packaged manifest wins over registry metadata.
        let manifest = if home.join("package.json").is_file() {
            read_manifest_from(home, revision.id.name(), &["package.json"])?
        } else {
            revision.manifest.clone().unwrap_or_else(|| PackageManifest {
                name: revision.id.name().to_string(),
                ..Default::default()
            })
        };
        let mut fetched = FetchedModule::from_manifest(&manifest);
        fetched.sha256 = Some(sha256_bytes(&bytes));
        Ok(fetched)
    }
}

/// Scoped names such as `@types/node` are requested as `@types%2Fnode`.
fn encode_name(name: &str) -> String {
    if name.starts_with('@') {
        name.replace('/', "%2F")
    } else {
        name.to_string()
    }
}
