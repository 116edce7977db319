use std::path::{Path, PathBuf};

/// Walk up from `start` looking for a file named `filename`.
/// Returns the path to the directory containing the file, or `None`.
pub fn find_ancestor_with(start: &Path, filename: &str) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(filename).is_file() {
            return Some(current.to_path_buf());
        }
        current = current.parent()?;
    }
}

/// Ensure a directory exists, creating it and any parents if needed.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Depth-first search under `root` for a regular file called `name`.
///
/// Entries are visited in sorted order so the result is stable across
/// platforms. Returns the path relative to `root`.
pub fn find_file(root: &Path, name: &str) -> std::io::Result<Option<PathBuf>> {
    if !root.is_dir() {
        return Ok(None);
    }
    let mut entries: Vec<_> = std::fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();

    for path in &entries {
        if path.is_file() && path.file_name().is_some_and(|n| n == name) {
            return Ok(path.strip_prefix(root).ok().map(Path::to_path_buf));
        }
    }
    for path in &entries {
        if path.is_dir() {
            if let Some(found) = find_file(path, name)? {
                return Ok(Some(path.strip_prefix(root).unwrap_or(path).join(found)));
            }
        }
    }
    Ok(None)
}

/// Remove a module home directory, then its parent if that left it empty.
///
/// Missing directories are not an error.
pub fn remove_home_and_empty_parent(home: &Path) -> std::io::Result<()> {
    if home.exists() {
        std::fs::remove_dir_all(home)?;
    }
    if let Some(parent) = home.parent() {
        if is_empty_dir(parent)? {
            std::fs::remove_dir(parent)?;
        }
    }
    Ok(())
}

/// `true` when `path` is an existing directory with no entries.
pub fn is_empty_dir(path: &Path) -> std::io::Result<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    Ok(std::fs::read_dir(path)?.next().is_none())
}

/// Total size in bytes of all files under `path`.
pub fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| {
            let p = e.path();
            if p.is_dir() {
                dir_size(&p)
            } else {
                e.metadata().map(|m| m.len()).unwrap_or(0)
            }
        })
        .sum()
}

/// Format a byte count for humans (`1.5 MB`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
