//! Module backends: direct URLs, flat (jam-style) and archive (npm-style)
//! registries, GitHub tag indexes (bower-style) and searched GitHub
//! repositories (volo-style), plus the HTTP transport and tarball extraction
//! they share.

pub mod archive;
pub mod checksum;
pub mod download;
pub mod flat;
pub mod github;
pub mod npm;
pub mod tags;
pub mod url;
pub mod volo;

use thicket_core::config::GlobalConfig;
use thicket_resolver::Backend;
use thicket_util::errors::ThicketError;

pub use download::HttpClient;
pub use flat::FlatRegistryBackend;
pub use github::GitHubEndpoints;
pub use npm::ArchiveRegistryBackend;
pub use tags::TagBackend;
pub use url::UrlBackend;
pub use volo::VoloBackend;

/// Build the backends named in `names`, in that order, from the registry
/// endpoints in `config`.
pub fn backend_chain(
    config: &GlobalConfig,
    names: &[String],
) -> miette::Result<Vec<Box<dyn Backend>>> {
    let client = HttpClient::new(&config.http)?;
    let registries = &config.registries;
    let github = GitHubEndpoints {
        api: registries.github_api.clone(),
        archive: registries.github_archive.clone(),
        raw: registries.github_raw.clone(),
    };

    names
        .iter()
        .map(|name| -> miette::Result<Box<dyn Backend>> {
            match name.as_str() {
                "url" => Ok(Box::new(UrlBackend::new(client.clone()))),
                "jam" => Ok(Box::new(FlatRegistryBackend::new(
                    "jam",
                    client.clone(),
                    &registries.jam,
                ))),
                "npm" => Ok(Box::new(ArchiveRegistryBackend::new(
                    "npm",
                    client.clone(),
                    &registries.npm,
                ))),
                "bower" => Ok(Box::new(TagBackend::new(
                    "bower",
                    client.clone(),
                    &registries.bower,
                    github.clone(),
                ))),
                "volo" => Ok(Box::new(VoloBackend::new(client.clone(), github.clone()))),
                other => Err(ThicketError::Config {
                    message: format!("unknown backend `{other}`"),
                }
                .into()),
            }
        })
        .collect()
}
