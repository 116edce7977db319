//! Packages published as GitHub repositories: a name index points at the
//! repository, versions are its tags.

use std::cell::OnceCell;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use thicket_core::dependency::{DependencyDescriptor, ModuleId};
use thicket_resolver::{Backend, FetchedModule, ResolveError, ResolvedRevision, VersionRequest};
use thicket_util::hash::sha256_bytes;

use crate::archive::extract_tar_gz;
use crate::download::HttpClient;
use crate::flat::read_manifest_from;
use crate::github::{github_repository, GitHub, GitHubEndpoints};

const DESCRIPTORS: [&str; 2] = ["component.json", "package.json"];

#[derive(Debug, Deserialize)]
struct IndexEntry {
    name: String,
    url: String,
}

pub struct TagBackend {
    name: String,
    client: HttpClient,
    /// JSON array of `{name, url}` entries.
    index_url: String,
    github: GitHub,
    /// Package index, downloaded once per backend.
    index: OnceCell<IndexMap<String, String>>,
}

impl TagBackend {
    pub fn new(
        name: impl Into<String>,
        client: HttpClient,
        index_url: impl Into<String>,
        endpoints: GitHubEndpoints,
    ) -> Self {
        Self {
            name: name.into(),
            github: GitHub {
                client: client.clone(),
                endpoints,
            },
            client,
            index_url: index_url.into(),
            index: OnceCell::new(),
        }
    }

    fn repository_url(&self, package: &str) -> Result<Option<String>, ResolveError> {
        if let Some(index) = self.index.get() {
            return Ok(index.get(package).cloned());
        }
        let entries: Vec<IndexEntry> = self.client.require_json(&self.index_url)?;
        let index: IndexMap<String, String> =
            entries.into_iter().map(|e| (e.name, e.url)).collect();
        let url = index.get(package).cloned();
        let _ = self.index.set(index);
        Ok(url)
    }
}

impl Backend for TagBackend {
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
        let Some(url) = self.repository_url(&descriptor.name)? else {
            return Err(ResolveError::unresolved(
                descriptor.id(),
                "not in the package index",
            ));
        };
        let (owner, repo) = github_repository(&url).ok_or_else(|| {
            ResolveError::unresolved(descriptor.id(), format!("{url} is not a GitHub repository"))
        })?;

        let reference = self.github.select_ref(descriptor, request, &owner, &repo)?;
        Ok(ResolvedRevision::new(
            ModuleId::new(&descriptor.name, &reference),
            self.github.archive_url(&owner, &repo, &reference),
        ))
    }

    fn fetch(&self, revision: &ResolvedRevision, home: &Path) -> Result<FetchedModule, ResolveError> {
        let bytes = self.client.require_bytes(&revision.source)?;
        extract_tar_gz(&bytes, home).map_err(|e| ResolveError::Integrity {
            id: revision.id.to_string(),
            message: format!("unreadable archive {}: {e}", revision.source),
        })?;
        let manifest = read_manifest_from(home, revision.id.name(), &DESCRIPTORS)?;
        let mut fetched = FetchedModule::from_manifest(&manifest);
        fetched.sha256 = Some(sha256_bytes(&bytes));
        Ok(fetched)
    }
}
