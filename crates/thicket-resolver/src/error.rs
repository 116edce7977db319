use miette::Diagnostic;
use thiserror::Error;

use crate::parser::ParseError;

/// Failure kinds raised while resolving modules.
///
/// The facade branches on [`ResolveError::is_not_found`] to decide whether the
/// next backend gets a chance.
#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    /// No backend could produce a matching version.
    #[error("unable to resolve {id}: {reason}")]
    #[diagnostic(code(thicket::unresolved))]
    Unresolved { id: String, reason: String },

    /// The fetched module is missing its entry file or manifest.
    #[error("invalid module {id}: {message}")]
    #[diagnostic(code(thicket::integrity))]
    Integrity { id: String, message: String },

    /// The remote reported that the resource does not exist.
    #[error("{url} does not exist")]
    #[diagnostic(code(thicket::not_found))]
    NotFound { url: String },

    /// Any other transport failure.
    #[error("failed to fetch {url}: {message}")]
    #[diagnostic(code(thicket::transport), help("check your network connection and registry settings"))]
    Transport { url: String, message: String },

    /// Registry metadata that could not be understood.
    #[error("unexpected metadata from {url}: {message}")]
    #[diagnostic(code(thicket::metadata))]
    Metadata { url: String, message: String },

    /// A module address that could not be parsed.
    #[error("invalid module address `{address}`")]
    #[diagnostic(
        code(thicket::address),
        help("use `name`, `name/version`, `name@version`, `backend@name/version` or a URL")
    )]
    Address { address: String },

    /// A project manifest that could not be loaded.
    #[error("invalid manifest {path}: {message}")]
    #[diagnostic(code(thicket::manifest))]
    Manifest { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An unexpected failure, with the chain of modules being resolved.
    #[error("can't resolve {path}: {source}")]
    #[diagnostic(code(thicket::resolution_path))]
    ResolutionPath {
        path: String,
        #[source]
        source: Box<ResolveError>,
    },
}

impl ResolveError {
    /// `true` for failures that let the next backend try: transport 404,
    /// integrity failures and unresolved dependencies.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ResolveError::NotFound { .. }
                | ResolveError::Integrity { .. }
                | ResolveError::Unresolved { .. }
        )
    }

    /// Wrap `self` with the `a@1 -> b@2` chain unless it is a not-found kind
    /// or already carries a chain.
    pub fn with_path(self, chain: &[String]) -> Self {
        if self.is_not_found() || matches!(self, ResolveError::ResolutionPath { .. }) {
            return self;
        }
        ResolveError::ResolutionPath {
            path: chain.join(" -> "),
            source: Box::new(self),
        }
    }

    pub fn unresolved(id: impl Into<String>, reason: impl Into<String>) -> Self {
        ResolveError::Unresolved {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_kinds() {
        assert!(ResolveError::NotFound { url: "u".into() }.is_not_found());
        assert!(ResolveError::unresolved("a@1", "no match").is_not_found());
        assert!(ResolveError::Integrity {
            id: "a@1".into(),
            message: "missing".into()
        }
        .is_not_found());
        assert!(!ResolveError::Transport {
            url: "u".into(),
            message: "reset".into()
        }
        .is_not_found());
    }

    #[test]
    fn path_wraps_unexpected_failures_once() {
        let chain = vec!["a@1.0.0".to_string(), "b@2.0.0".to_string()];
        let err = ResolveError::Transport {
            url: "http://r/b".into(),
            message: "connection reset".into(),
        }
        .with_path(&chain)
        .with_path(&chain[..1]);
        match &err {
            ResolveError::ResolutionPath { path, .. } => assert_eq!(path, "a@1.0.0 -> b@2.0.0"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.to_string().starts_with("can't resolve a@1.0.0 -> b@2.0.0: failed to fetch"));
    }

    #[test]
    fn path_leaves_not_found_alone() {
        let err = ResolveError::NotFound { url: "u".into() }.with_path(&["a@1".to_string()]);
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }
}
