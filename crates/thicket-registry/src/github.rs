//! GitHub plumbing shared by the repository-backed backends.

use serde::Deserialize;
use thicket_core::dependency::DependencyDescriptor;
use thicket_resolver::{ResolveError, Version, VersionRequest};

use crate::download::{join_url, HttpClient};

const DEFAULT_BRANCH: &str = "master";

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

/// GitHub hosts: the REST API, archive downloads and raw files.
#[derive(Debug, Clone)]
pub struct GitHubEndpoints {
    pub api: String,
    pub archive: String,
    pub raw: String,
}

#[derive(Debug, Clone)]
pub(crate) struct GitHub {
    pub(crate) client: HttpClient,
    pub(crate) endpoints: GitHubEndpoints,
}

impl GitHub {
    /// Tags of `owner/repo`, highest version first. Tags that are not
    /// versions sort after every version.
    pub(crate) fn tags(&self, owner: &str, repo: &str) -> Result<Vec<String>, ResolveError> {
        let url = join_url(&self.endpoints.api, &format!("repos/{owner}/{repo}/tags"));
        let tags: Vec<Tag> = self.client.require_json(&url)?;
        let mut tags: Vec<(Option<Version>, String)> = tags
            .into_iter()
            .map(|t| (Version::parse(&t.name).ok(), t.name))
            .collect();
        tags.sort_by(|a, b| match (&a.0, &b.0) {
            (Some(x), Some(y)) => y.cmp(x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.1.cmp(&b.1),
        });
        Ok(tags.into_iter().map(|(_, name)| name).collect())
    }

    /// The git ref `request` picks among the repository's tags: the newest
    /// tag (or the default branch) for `latest`, else the best match.
    pub(crate) fn select_ref(
        &self,
        descriptor: &DependencyDescriptor,
        request: &VersionRequest,
        owner: &str,
        repo: &str,
    ) -> Result<String, ResolveError> {
        let tags = self.tags(owner, repo)?;
        let reference = match request {
            VersionRequest::Latest => tags
                .first()
                .map(String::as_str)
                .unwrap_or(DEFAULT_BRANCH)
                .to_string(),
            VersionRequest::Expr(_) => request
                .select(tags.iter().map(String::as_str))
                .map(str::to_string)
                .ok_or_else(|| ResolveError::unresolved(descriptor.id(), "no matches found"))?,
        };
        tracing::debug!("{owner}/{repo} resolved {} to {reference}", descriptor.version);
        Ok(reference)
    }

    pub(crate) fn archive_url(&self, owner: &str, repo: &str, reference: &str) -> String {
        join_url(
            &self.endpoints.archive,
            &format!("{owner}/{repo}/archive/{reference}.tar.gz"),
        )
    }

    pub(crate) fn raw_url(&self, owner: &str, repo: &str, reference: &str, path: &str) -> String {
        join_url(&self.endpoints.raw, &format!("{owner}/{repo}/{reference}/{path}"))
    }
}

/// `owner/repo` of a GitHub repository URL in any of its usual spellings.
pub fn github_repository(url: &str) -> Option<(String, String)> {
    let (_, rest) = url.split_once("github.com")?;
    let rest = rest.trim_start_matches([':', '/']);
    let mut parts = rest.split('/').filter(|p| !p.is_empty());
    let owner = parts.next()?;
    let repo = parts.next()?;
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    Some((owner.to_string(), repo.to_string()))
}
