//! `package.json`-style manifests and the persisted `module.json`.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thicket_util::errors::ThicketError;

/// The `main` field: either a single path or a list of candidate paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MainEntry {
    Single(String),
    Many(Vec<String>),
}

/// Registry-specific overrides nested under `jam` or `volo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestOverrides {
    #[serde(default)]
    pub main: Option<MainEntry>,
    #[serde(default)]
    pub dependencies: IndexMap<String, String>,
    /// Download URL of the single file, with `{version}` standing for the revision.
    #[serde(default)]
    pub url: Option<String>,
}

/// A package manifest as published by registries and projects.
///
/// Unknown fields are ignored. Dependencies keep their declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub main: Option<MainEntry>,
    #[serde(default)]
    pub dependencies: IndexMap<String, String>,
    #[serde(default)]
    pub jam: Option<ManifestOverrides>,
    #[serde(default)]
    pub volo: Option<ManifestOverrides>,
}

impl PackageManifest {
    pub fn from_json_str(content: &str) -> miette::Result<Self> {
        serde_json::from_str(content).map_err(|e| {
            ThicketError::Manifest {
                message: format!("invalid package manifest: {e}"),
            }
            .into()
        })
    }

    pub fn load(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ThicketError::Manifest {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        Self::from_json_str(&content)
    }

    fn overrides(&self) -> impl Iterator<Item = &ManifestOverrides> {
        self.jam.iter().chain(self.volo.iter())
    }

    /// The module's entry file, normalized.
    ///
    /// Registry overrides win over the top-level `main`; without any `main`
    /// the entry defaults to `<name>.js`.
    pub fn main_entry(&self) -> String {
        let declared = self
            .overrides()
            .find_map(|o| o.main.as_ref())
            .or(self.main.as_ref())
            .and_then(pick_main);
        match declared {
            Some(main) => normalize_main(&main),
            None => normalize_main(&self.name),
        }
    }

    /// Dependencies to resolve, honouring registry overrides when they declare any.
    ///
    /// `github:owner/repo[/version]` values become the version expression.
    pub fn effective_dependencies(&self) -> IndexMap<String, String> {
        self.overrides()
            .map(|o| &o.dependencies)
            .find(|deps| !deps.is_empty())
            .unwrap_or(&self.dependencies)
            .iter()
            .map(|(name, spec)| (name.clone(), github_dependency_version(spec)))
            .collect()
    }

    /// The volo download URL template, if one is declared.
    pub fn volo_url(&self) -> Option<&str> {
        self.volo
            .as_ref()
            .and_then(|o| o.url.as_deref())
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Version expression of a dependency value.
///
/// `github:owner/repo/1.0` yields `1.0`, `github:owner/repo` yields `latest`,
/// anything else is returned unchanged.
pub fn github_dependency_version(spec: &str) -> String {
    let Some(path) = spec.trim().strip_prefix("github:") else {
        return spec.to_string();
    };
    let parts: Vec<&str> = path.split('/').collect();
    match parts.as_slice() {
        [_, _, version] if !version.is_empty() => version.to_string(),
        _ => "latest".to_string(),
    }
}

fn pick_main(entry: &MainEntry) -> Option<String> {
    match entry {
        MainEntry::Single(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        MainEntry::Single(_) => None,
        MainEntry::Many(list) => list
            .iter()
            .find(|m| m.ends_with(".js"))
            .or_else(|| list.first())
            .cloned(),
    }
}

/// Normalize an entry path: strip a leading `./` or `/`, append `.js` if missing.
pub fn normalize_main(main: &str) -> String {
    let trimmed = main.trim();
    let trimmed = trimmed.strip_prefix('.').unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);
    if trimmed.ends_with(".js") {
        trimmed.to_string()
    } else {
        format!("{trimmed}.js")
    }
}

/// The manifest written as `module.json` into each committed module home.
///
/// Dependencies map names to the concrete revisions they resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub name: String,
    pub version: String,
    pub main: String,
    #[serde(default)]
    pub dependencies: IndexMap<String, String>,
    /// SHA-256 of the downloaded file or archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl ModuleManifest {
    pub fn read(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ThicketError::Manifest {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ThicketError::Manifest {
                message: format!("invalid module manifest {}: {e}", path.display()),
            }
            .into()
        })
    }

    pub fn write(&self, path: &Path) -> miette::Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(|e| ThicketError::Manifest {
            message: format!("failed to serialize module manifest: {e}"),
        })?;
        std::fs::write(path, content + "\n").map_err(|e| {
            ThicketError::Manifest {
                message: format!("failed to write {}: {e}", path.display()),
            }
            .into()
        })
    }
}
