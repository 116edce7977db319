use std::fmt;
use std::path::PathBuf;

/// URL schemes accepted for direct-URL dependencies.
pub const URL_SCHEMES: [&str; 6] = ["https", "http", "git+ssh", "git+https", "git+http", "git"];

/// Identity of one concrete module: a name plus a resolved revision.
///
/// Whitespace is stripped from the revision on construction, so `"1.0 "` and
/// `"1.0"` name the same module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId {
    name: String,
    revision: String,
}

impl ModuleId {
    pub fn new(name: impl Into<String>, revision: &str) -> Self {
        Self {
            name: name.into(),
            revision: revision.chars().filter(|c| !c.is_whitespace()).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// `true` when the revision is a URL rather than a version string.
    pub fn is_url_revision(&self) -> bool {
        is_url(&self.revision)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.revision)
    }
}

/// A request for a module: name plus an unparsed version expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDescriptor {
    pub name: String,
    pub version: String,
    /// Manifest (or module home) that declared this dependency, if any.
    pub origin: Option<PathBuf>,
}

impl DependencyDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Symbolic identifier `name@version-expression`.
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    /// `true` when either the version or the name is a direct URL.
    pub fn is_url(&self) -> bool {
        is_url(&self.version) || is_url(&self.name)
    }
}

impl fmt::Display for DependencyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// A module address as typed on the command line.
///
/// Accepted forms: `name`, `name/version`, `name@version`,
/// `backend@name/version` and absolute URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub backend: Option<String>,
    pub name: String,
    pub version: String,
}

impl Address {
    /// Parse an address. Returns `None` for empty input or an empty name.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        if is_url(s) {
            let file = url_file_name(s)?;
            let (name, _) = split_file_name(file);
            return Some(Self {
                backend: None,
                name,
                version: s.to_string(),
            });
        }

        // name@https://host/file.js
        if let Some((name, rest)) = s.split_once('@') {
            if is_url(rest) {
                return non_empty(None, name, rest);
            }
        }

        if let Some((head, version)) = s.split_once('/') {
            return match head.split_once('@') {
                Some((backend, name)) => non_empty(Some(backend), name, version),
                None => non_empty(None, head, version),
            };
        }

        match s.split_once('@') {
            Some((name, version)) => non_empty(None, name, version),
            None => non_empty(None, s, "latest"),
        }
    }

    pub fn descriptor(&self) -> DependencyDescriptor {
        DependencyDescriptor::new(&self.name, &self.version)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.backend {
            Some(backend) => write!(f, "{backend}@{}/{}", self.name, self.version),
            None => write!(f, "{}@{}", self.name, self.version),
        }
    }
}

fn non_empty(backend: Option<&str>, name: &str, version: &str) -> Option<Address> {
    let name = name.trim();
    if name.is_empty() || backend.is_some_and(|b| b.trim().is_empty()) {
        return None;
    }
    let version = match version.trim() {
        "" => "latest",
        v => v,
    };
    Some(Address {
        backend: backend.map(|b| b.trim().to_string()),
        name: name.to_string(),
        version: version.to_string(),
    })
}

/// `true` for `scheme://rest` with one of the [`URL_SCHEMES`].
pub fn is_url(s: &str) -> bool {
    match s.split_once("://") {
        Some((scheme, rest)) => {
            !rest.is_empty() && URL_SCHEMES.iter().any(|known| scheme.eq_ignore_ascii_case(known))
        }
        None => false,
    }
}

/// Last non-empty path segment of a URL, ignoring query and fragment.
pub fn url_file_name(url: &str) -> Option<&str> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let path = without_query.split_once("://").map_or(without_query, |(_, p)| p);
    path.rsplit('/').find(|seg| !seg.is_empty())
}

/// Split a file name such as `jquery-1.8.3.min.js` into `("jquery", Some("1.8.3"))`.
///
/// The `.js` extension and a trailing `.min` are dropped. The version is the
/// text after the first `-` that is followed by a digit.
pub fn split_file_name(file: &str) -> (String, Option<String>) {
    let stem = file.strip_suffix(".js").unwrap_or(file);
    let stem = stem.strip_suffix(".min").unwrap_or(stem);

    let bytes = stem.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'-' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) && i > 0 {
            return (stem[..i].to_string(), Some(stem[i + 1..].to_string()));
        }
    }
    (stem.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_id_strips_whitespace() {
        let id = ModuleId::new("jquery", " 1.8 .3 ");
        assert_eq!(id.revision(), "1.8.3");
        assert_eq!(id, ModuleId::new("jquery", "1.8.3"));
        assert_eq!(id.to_string(), "jquery@1.8.3");
    }

    #[test]
    fn url_detection() {
        assert!(is_url("https://code.jquery.com/jquery-1.8.3.js"));
        assert!(is_url("git+ssh://git@github.com/a/b.git"));
        assert!(!is_url("ftp://example.com/x.js"));
        assert!(!is_url(">=1.0.0"));
        assert!(!is_url("http://"));
    }

    #[test]
    fn split_versioned_file_name() {
        assert_eq!(
            split_file_name("jquery-1.8.3.min.js"),
            ("jquery".to_string(), Some("1.8.3".to_string()))
        );
        assert_eq!(
            split_file_name("backbone-relational.js"),
            ("backbone-relational".to_string(), None)
        );
    }
}
