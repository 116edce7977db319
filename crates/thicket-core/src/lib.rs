//! Core data types for thicket.
//!
//! This crate defines the values the resolver passes around: concrete module
//! identities, dependency descriptors and the address syntax users type,
//! `package.json`-style manifests and the persisted `module.json`, plus the
//! global configuration file.
//!
//! This crate is intentionally free of network I/O.

/// File name of the manifest written into every committed module home.
pub const MODULE_MANIFEST: &str = "module.json";

pub mod config;
pub mod dependency;
pub mod manifest;
