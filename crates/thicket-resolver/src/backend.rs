//! The contract every module source implements.

use std::path::Path;

use indexmap::IndexMap;
use thicket_core::dependency::{DependencyDescriptor, ModuleId};
use thicket_core::manifest::PackageManifest;

use crate::cache::ModuleCache;
use crate::error::ResolveError;
use crate::expression::VersionRequest;

/// A version chosen by a backend, ready to be fetched.
#[derive(Debug, Clone)]
pub struct ResolvedRevision {
    pub id: ModuleId,
    /// Where the content comes from: a tarball URL, a file URL or a git ref.
    pub source: String,
    /// Manifest already known from registry metadata, if any.
    pub manifest: Option<PackageManifest>,
    /// Expected SHA-1 of the downloaded content, when the registry publishes one.
    pub checksum: Option<String>,
}

impl ResolvedRevision {
    pub fn new(id: ModuleId, source: impl Into<String>) -> Self {
        Self {
            id,
            source: source.into(),
            manifest: None,
            checksum: None,
        }
    }
}

/// What a fetch left in the module home.
#[derive(Debug, Clone, Default)]
pub struct FetchedModule {
    /// Entry file relative to the home directory.
    pub main: String,
    /// Declared dependencies, in manifest order.
    pub dependencies: IndexMap<String, String>,
    /// Digest of the downloaded content, when there was a download.
    pub sha256: Option<String>,
}

impl FetchedModule {
    /// Entry file and dependencies as declared by `manifest`.
    pub fn from_manifest(manifest: &PackageManifest) -> Self {
        Self {
            main: manifest.main_entry(),
            dependencies: manifest.effective_dependencies(),
            sha256: None,
        }
    }
}

/// A source of module metadata and content.
///
/// Backends only answer questions about single modules; recursion over
/// dependencies, caching and rollback are the engine's job.
pub trait Backend {
    /// Namespace directory under the cache home, and the name used in
    /// addresses such as `npm@left-pad/1.0.0`.
    fn name(&self) -> &str;

    fn can_resolve(&self, descriptor: &DependencyDescriptor) -> bool;

    /// Pick a version from what is already committed in the cache.
    fn resolve_local(
        &self,
        cache: &ModuleCache,
        descriptor: &DependencyDescriptor,
        request: &VersionRequest,
    ) -> Option<ModuleId> {
        let versions = cache.versions(self.name(), &descriptor.name);
        request
            .select(versions)
            .map(|rev| ModuleId::new(&descriptor.name, rev))
    }

    /// Choose the concrete revision for `request`.
    fn do_resolve(
        &self,
        descriptor: &DependencyDescriptor,
        request: &VersionRequest,
    ) -> Result<ResolvedRevision, ResolveError>;

    /// Materialize the revision's content under `home`.
    fn fetch(&self, revision: &ResolvedRevision, home: &Path)
        -> Result<FetchedModule, ResolveError>;
}
