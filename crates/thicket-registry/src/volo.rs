//! volo-style packages: a GitHub repository found by search, versioned by
//! its tags. A `volo.url` in the repository's `package.json` (or in the
//! shared `volojs/repos` overrides) names a single file to download;
//! without one the tag's archive is the module.

use std::path::Path;

use serde::Deserialize;
use thicket_core::dependency::{url_file_name, DependencyDescriptor, ModuleId};
use thicket_core::manifest::PackageManifest;
use thicket_resolver::{Backend, FetchedModule, ResolveError, ResolvedRevision, VersionRequest};
use thicket_util::hash::sha256_bytes;

use crate::archive::extract_tar_gz;
use crate::download::{join_url, HttpClient};
use crate::flat::read_manifest_from;
use crate::github::{GitHub, GitHubEndpoints};

/// Repository holding `package.json` overrides for projects that ship none.
const OVERRIDES_OWNER: &str = "volojs";
const OVERRIDES_REPO: &str = "repos";
const OVERRIDES_REF: &str = "master";

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    items: Vec<Repository>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    name: String,
    owner: Owner,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

pub struct VoloBackend {
    client: HttpClient,
    github: GitHub,
}

impl VoloBackend {
    pub fn new(client: HttpClient, endpoints: GitHubEndpoints) -> Self {
        Self {
            github: GitHub {
                client: client.clone(),
                endpoints,
            },
            client,
        }
    }

    /// `owner/repo` of the JavaScript repository named `package`, preferring
    /// an exact name match over the top search hit.
    fn repository(&self, package: &str) -> Result<Option<(String, String)>, ResolveError> {
        let url = join_url(
            &self.github.endpoints.api,
            &format!("search/repositories?q={package}+language:javascript"),
        );
        let Some(results) = self.client.get_json::<SearchResults>(&url)? else {
            return Ok(None);
        };
        let mut items = results.items;
        let pick = items
            .iter()
            .position(|r| r.name.eq_ignore_ascii_case(package))
            .unwrap_or(0);
        if pick >= items.len() {
            return Ok(None);
        }
        let repo = items.swap_remove(pick);
        Ok(Some((repo.owner.login, repo.name)))
    }

    /// A `package.json` from the raw file host; absent or unreadable is `None`.
    fn package_at(&self, url: &str) -> Result<Option<PackageManifest>, ResolveError> {
        match self.client.get_json::<PackageManifest>(url) {
            Ok(package) => Ok(package),
            Err(ResolveError::Metadata { message, .. }) => {
                tracing::debug!("Ignoring unreadable {url}: {message}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// The package declaring a `volo.url`: the repository's own at
    /// `reference`, else the shared override for the repository.
    fn download_package(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<Option<PackageManifest>, ResolveError> {
        let own = self.github.raw_url(owner, repo, reference, "package.json");
        if let Some(package) = self.package_at(&own)? {
            if package.volo_url().is_some() {
                return Ok(Some(package));
            }
        }
        let shared = self.github.raw_url(
            OVERRIDES_OWNER,
            OVERRIDES_REPO,
            OVERRIDES_REF,
            &format!("{owner}/{repo}/package.json"),
        );
        Ok(self
            .package_at(&shared)?
            .filter(|package| package.volo_url().is_some()))
    }

    fn fetch_file(
        &self,
        revision: &ResolvedRevision,
        package: &PackageManifest,
        template: &str,
        home: &Path,
    ) -> Result<FetchedModule, ResolveError> {
        let url = template.replace("{version}", revision.id.revision());
        let file = url_file_name(&url).ok_or_else(|| {
            ResolveError::unresolved(revision.id.to_string(), format!("{url} has no file name"))
        })?;
        let bytes = self.client.require_bytes(&url)?;
        let sha256 = sha256_bytes(&bytes);
        std::fs::write(home.join(file), bytes)?;
        Ok(FetchedModule {
            main: file.to_string(),
            dependencies: package.effective_dependencies(),
            sha256: Some(sha256),
        })
    }

    fn fetch_archive(
        &self,
        revision: &ResolvedRevision,
        owner: &str,
        repo: &str,
        home: &Path,
    ) -> Result<FetchedModule, ResolveError> {
        let url = self.github.archive_url(owner, repo, revision.id.revision());
        let bytes = self.client.require_bytes(&url)?;
        extract_tar_gz(&bytes, home).map_err(|e| ResolveError::Integrity {
            id: revision.id.to_string(),
            message: format!("unreadable archive {url}: {e}"),
        })?;
        let manifest = read_manifest_from(home, repo, &["package.json"])?;
        let mut fetched = FetchedModule::from_manifest(&manifest);
        fetched.sha256 = Some(sha256_bytes(&bytes));
        Ok(fetched)
    }
}

impl Backend for VoloBackend {
    fn name(&self) -> &str {
        "volo"
    }

    fn can_resolve(&self, descriptor: &DependencyDescriptor) -> bool {
        !descriptor.is_url()
    }

    fn do_resolve(
        &self,
        descriptor: &DependencyDescriptor,
        request: &VersionRequest,
    ) -> Result<ResolvedRevision, ResolveError> {
        let Some((owner, repo)) = self.repository(&descriptor.name)? else {
            return Err(ResolveError::unresolved(
                descriptor.id(),
                "no GitHub repository found",
            ));
        };
        let reference = self.github.select_ref(descriptor, request, &owner, &repo)?;
        Ok(ResolvedRevision::new(
            ModuleId::new(&descriptor.name, &reference),
            format!("{owner}/{repo}"),
        ))
    }

    fn fetch(&self, revision: &ResolvedRevision, home: &Path) -> Result<FetchedModule, ResolveError> {
        let (owner, repo) = revision.source.split_once('/').ok_or_else(|| {
            ResolveError::unresolved(
                revision.id.to_string(),
                format!("`{}` is not a repository", revision.source),
            )
        })?;
        let package = self.download_package(owner, repo, revision.id.revision())?;
        match package.as_ref().and_then(|p| p.volo_url().map(|url| (p, url))) {
            Some((package, template)) => self.fetch_file(revision, package, template, home),
            None => self.fetch_archive(revision, owner, repo, home),
        }
    }
}
