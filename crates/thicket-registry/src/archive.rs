//! Gzipped tarball extraction.

use std::io;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

/// Unpack a `.tar.gz` into `dest`, dropping the leading directory that
/// registry and GitHub tarballs wrap their content in (`package/`,
/// `repo-1.0.0/`).
///
/// Entries at the top level are kept as they are. Entries that would escape
/// `dest`, and anything that is neither a file nor a directory, are skipped.
/// Returns the number of files written.
pub fn extract_tar_gz(bytes: &[u8], dest: &Path) -> io::Result<usize> {
    let mut archive = Archive::new(GzDecoder::new(bytes));
    let mut written = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let kind = entry.header().entry_type();
        if !kind.is_file() && !kind.is_dir() {
            continue;
        }
        let path = entry.path()?.into_owned();
        let Some(relative) = strip_leading_dir(&path) else {
            continue;
        };
        let target = dest.join(&relative);
        if kind.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(&target)?;
        written += 1;
    }

    tracing::debug!("Extracted {written} files into {}", dest.display());
    Ok(written)
}

fn strip_leading_dir(path: &Path) -> Option<PathBuf> {
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    let parts: Vec<_> = path
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    match parts.len() {
        0 => None,
        1 => Some(parts.iter().collect()),
        _ => Some(parts[1..].iter().collect()),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    /// Build a gzipped tarball from `(path, contents)` pairs.
    pub fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::tarball;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn strips_the_wrapping_directory() {
        let tmp = TempDir::new().unwrap();
        let bytes = tarball(&[
            ("package/package.json", r#"{"name":"left-pad"}"#),
            ("package/lib/index.js", "module.exports = 1;"),
        ]);

        let count = extract_tar_gz(&bytes, tmp.path()).unwrap();
        assert_eq!(count, 2);
        assert!(tmp.path().join("package.json").is_file());
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("lib").join("index.js")).unwrap(),
            "module.exports = 1;"
        );
        assert!(!tmp.path().join("package").exists());
    }

    #[test]
    fn keeps_top_level_files() {
        let tmp = TempDir::new().unwrap();
        let bytes = tarball(&[("underscore.js", "var _ = {};")]);
        extract_tar_gz(&bytes, tmp.path()).unwrap();
        assert!(tmp.path().join("underscore.js").is_file());
    }

    #[test]
    fn rejects_garbage() {
        let tmp = TempDir::new().unwrap();
        assert!(extract_tar_gz(b"not a tarball", tmp.path()).is_err());
    }

    #[test]
    fn parent_components_are_never_followed() {
        assert!(strip_leading_dir(Path::new("package/../../etc/passwd")).is_none());
        assert!(strip_leading_dir(Path::new("/abs/file.js")).is_none());
        assert_eq!(
            strip_leading_dir(Path::new("./package/a.js")),
            Some(PathBuf::from("a.js"))
        );
    }
}
