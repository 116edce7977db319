//! Content checksum verification.

use thicket_core::dependency::ModuleId;
use thicket_resolver::ResolveError;
use thicket_util::hash::sha1_bytes;

/// Compare the SHA-1 of `data` with a registry-published `shasum`.
///
/// A mismatch is an integrity failure, so the next backend gets a chance.
pub fn verify_sha1(id: &ModuleId, data: &[u8], expected: &str) -> Result<(), ResolveError> {
    let actual = sha1_bytes(data);
    if actual.eq_ignore_ascii_case(expected.trim()) {
        tracing::debug!("SHA-1 ok for {id}");
        Ok(())
    } else {
        Err(ResolveError::Integrity {
            id: id.to_string(),
            message: format!("SHA-1 mismatch: expected {expected}, got {actual}"),
        })
    }
}
