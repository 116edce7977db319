use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for thicket operations outside the resolution engine.
#[derive(Debug, Error, Diagnostic)]
pub enum ThicketError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or malformed package manifest (e.g. package.json).
    #[error("Manifest error: {message}")]
    #[diagnostic(help("Check your package.json for syntax errors"))]
    Manifest { message: String },

    /// Invalid global configuration.
    #[error("Config error: {message}")]
    #[diagnostic(help("Check ~/.thicket/config.toml"))]
    Config { message: String },

    /// Network request or download failed.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}
