//! Module resolution engine: the version expression language, pluggable
//! backends with not-found fallback, the on-disk module cache with rollback,
//! and the resolved module graph.

pub mod backend;
pub mod cache;
mod engine;
pub mod error;
pub mod expression;
pub mod graph;
pub mod parser;
pub mod resolver;
pub mod version;

pub use backend::{Backend, FetchedModule, ResolvedRevision};
pub use cache::ModuleCache;
pub use engine::EngineOptions;
pub use error::ResolveError;
pub use expression::{Expression, VersionRequest};
pub use graph::{Module, ModuleGraph};
pub use resolver::{Resolution, Resolver};
pub use version::Version;
