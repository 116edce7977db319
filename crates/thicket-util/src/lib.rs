//! Shared utilities for thicket.
//!
//! Cross-cutting concerns used by the other thicket crates: the top-level
//! error type, filesystem helpers for module homes, hashing for archive
//! verification, and terminal status output.

pub mod errors;
pub mod fs;
pub mod hash;
pub mod progress;
