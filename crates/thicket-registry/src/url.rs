//! Modules addressed directly by URL.

use std::path::Path;

use thicket_core::dependency::{is_url, split_file_name, url_file_name, DependencyDescriptor, ModuleId};
use thicket_resolver::{
    Backend, FetchedModule, ModuleCache, ResolveError, ResolvedRevision, VersionRequest,
};

use thicket_util::hash::sha256_bytes;

use crate::download::HttpClient;

const RAW_GITHUB_HOSTS: [&str; 2] = ["raw.github.com", "raw.githubusercontent.com"];

/// Downloads a single file; the module has no dependencies.
pub struct UrlBackend {
    client: HttpClient,
}

impl UrlBackend {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Work out the module id for a URL without touching the network.
    ///
    /// * `raw.github(usercontent).com/<owner>/<repo>/<rev>/...` uses `<rev>`;
    /// * a file named `<module>-<version>.js` uses `<version>`;
    /// * anything else uses the URL itself as the revision.
    fn revision_for(&self, descriptor: &DependencyDescriptor) -> Result<ResolvedRevision, ResolveError> {
        let url = if is_url(&descriptor.version) {
            descriptor.version.as_str()
        } else if is_url(&descriptor.name) {
            descriptor.name.as_str()
        } else {
            return Err(ResolveError::unresolved(descriptor.id(), "not a URL"));
        };
        let file = url_file_name(url)
            .ok_or_else(|| ResolveError::unresolved(descriptor.id(), "URL has no file name"))?;
        let (file_module, file_version) = split_file_name(file);
        let name = if is_url(&descriptor.name) {
            file_module
        } else {
            descriptor.name.clone()
        };

        let revision = raw_github_ref(url)
            .map(str::to_string)
            .or(file_version)
            .unwrap_or_else(|| url.to_string());
        Ok(ResolvedRevision::new(ModuleId::new(name, &revision), url))
    }
}

/// The git ref of a raw GitHub file URL.
fn raw_github_ref(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let mut segments = rest.split('/');
    let host = segments.next()?;
    if !RAW_GITHUB_HOSTS.iter().any(|h| host.eq_ignore_ascii_case(h)) {
        return None;
    }
    let _owner = segments.next()?;
    let _repo = segments.next()?;
    segments.next().filter(|rev| !rev.is_empty())
}

impl Backend for UrlBackend {
    fn name(&self) -> &str {
        "url"
    }

    fn can_resolve(&self, descriptor: &DependencyDescriptor) -> bool {
        descriptor.is_url()
    }

    fn resolve_local(
        &self,
        cache: &ModuleCache,
        descriptor: &DependencyDescriptor,
        _request: &VersionRequest,
    ) -> Option<ModuleId> {
        let revision = self.revision_for(descriptor).ok()?;
        cache.committed(&revision.id).map(|_| revision.id)
    }

    fn do_resolve(
        &self,
        descriptor: &DependencyDescriptor,
        _request: &VersionRequest,
    ) -> Result<ResolvedRevision, ResolveError> {
        self.revision_for(descriptor)
    }

    fn fetch(&self, revision: &ResolvedRevision, home: &Path) -> Result<FetchedModule, ResolveError> {
        let file = url_file_name(&revision.source).ok_or_else(|| {
            ResolveError::unresolved(revision.id.to_string(), "URL has no file name")
        })?;
        let bytes = self.client.require_bytes(&revision.source)?;
        let sha256 = sha256_bytes(&bytes);
        std::fs::write(home.join(file), bytes)?;
        Ok(FetchedModule {
            main: file.to_string(),
            sha256: Some(sha256),
            ..Default::default()
        })
    }
}
