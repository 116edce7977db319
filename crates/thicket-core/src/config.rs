use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thicket_util::errors::ThicketError;

/// Backend names understood by the default backend chain.
pub const KNOWN_BACKENDS: [&str; 5] = ["url", "jam", "bower", "volo", "npm"];

/// Global user configuration loaded from `~/.thicket/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub resolve: ResolveConfig,

    #[serde(default)]
    pub registries: RegistryConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

/// Module cache settings from `[cache]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Module home root. Defaults to `<data dir>/modules`.
    #[serde(default)]
    pub dir: Option<String>,
}

/// Resolution settings from `[resolve]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Backend chain, tried in order.
    #[serde(default = "default_backends")]
    pub backends: Vec<String>,
    #[serde(default)]
    pub offline: bool,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            backends: default_backends(),
            offline: false,
        }
    }
}

fn default_backends() -> Vec<String> {
    KNOWN_BACKENDS.iter().map(|s| s.to_string()).collect()
}

/// Registry endpoints from `[registries]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_jam")]
    pub jam: String,
    #[serde(default = "default_npm")]
    pub npm: String,
    /// Package index mapping names to repositories.
    #[serde(default = "default_bower")]
    pub bower: String,
    #[serde(default = "default_github_api", rename = "github-api")]
    pub github_api: String,
    #[serde(default = "default_github_archive", rename = "github-archive")]
    pub github_archive: String,
    /// Raw file host, `<base>/<owner>/<repo>/<ref>/<path>`.
    #[serde(default = "default_github_raw", rename = "github-raw")]
    pub github_raw: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            jam: default_jam(),
            npm: default_npm(),
            bower: default_bower(),
            github_api: default_github_api(),
            github_archive: default_github_archive(),
            github_raw: default_github_raw(),
        }
    }
}

fn default_jam() -> String {
    "http://jamjs.org/repository".to_string()
}

fn default_npm() -> String {
    "https://registry.npmjs.org".to_string()
}

fn default_bower() -> String {
    "https://registry.bower.io/packages".to_string()
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}

fn default_github_archive() -> String {
    "https://github.com".to_string()
}

fn default_github_raw() -> String {
    "https://raw.githubusercontent.com".to_string()
}

/// HTTP client settings from `[http]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout", rename = "timeout-secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_user_agent", rename = "user-agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            retries: default_retries(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    format!("thicket/{}", env!("CARGO_PKG_VERSION"))
}

impl GlobalConfig {
    /// Load `~/.thicket/config.toml`, or return defaults if the file doesn't exist.
    pub fn load() -> miette::Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load a config file, returning defaults when `path` is not a file.
    pub fn load_from(path: &Path) -> miette::Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ThicketError::Config {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ThicketError::Config {
            message: format!("failed to parse {}: {e}", path.display()),
        })?;
        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject unknown backend names and an empty chain.
    pub fn validate(&self) -> miette::Result<()> {
        if self.resolve.backends.is_empty() {
            return Err(ThicketError::Config {
                message: "resolve.backends must name at least one backend".to_string(),
            }
            .into());
        }
        if let Some(unknown) = self
            .resolve
            .backends
            .iter()
            .find(|b| !KNOWN_BACKENDS.contains(&b.as_str()))
        {
            return Err(ThicketError::Config {
                message: format!(
                    "unknown backend `{unknown}` (known: {})",
                    KNOWN_BACKENDS.join(", ")
                ),
            }
            .into());
        }
        Ok(())
    }

    /// The module cache root with `~` expanded.
    pub fn cache_dir(&self) -> PathBuf {
        match &self.cache.dir {
            Some(dir) => expand_home(dir),
            None => dirs_path().join("modules"),
        }
    }

    /// Returns the default path to the global config file.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }
}

fn home_dir() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
}

/// Returns the thicket data directory: `$THICKET_HOME`, else `~/.thicket/`.
pub fn dirs_path() -> PathBuf {
    match std::env::var_os("THICKET_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => home_dir().join(".thicket"),
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None if path == "~" => home_dir(),
        None => PathBuf::from(path),
    }
}
