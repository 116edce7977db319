use thicket_util::fs::{
    dir_size, ensure_dir, find_ancestor_with, find_file, format_size, is_empty_dir,
    remove_home_and_empty_parent,
};
use tempfile::TempDir;

#[test]
fn test_find_ancestor_with_nested() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("package.json"), "{}").unwrap();
    let nested = tmp.path().join("a").join("b");
    std::fs::create_dir_all(&nested).unwrap();
    assert_eq!(
        find_ancestor_with(&nested, "package.json"),
        Some(tmp.path().to_path_buf())
    );
}

#[test]
fn test_ensure_dir_creates_nested() {
    let tmp = TempDir::new().unwrap();
    let deep = tmp.path().join("x").join("y");
    ensure_dir(&deep).unwrap();
    assert!(deep.is_dir());
    ensure_dir(&deep).unwrap();
}

#[test]
fn test_find_file_prefers_shallow_match() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("dist")).unwrap();
    std::fs::write(tmp.path().join("dist/jquery.js"), "deep").unwrap();
    std::fs::write(tmp.path().join("jquery.js"), "top").unwrap();
    let found = find_file(tmp.path(), "jquery.js").unwrap();
    assert_eq!(found, Some("jquery.js".into()));
}

#[test]
fn test_find_file_recurses() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("lib/src")).unwrap();
    std::fs::write(tmp.path().join("lib/src/underscore.js"), "").unwrap();
    let found = find_file(tmp.path(), "underscore.js").unwrap();
    assert_eq!(found, Some(std::path::Path::new("lib").join("src").join("underscore.js")));
}

#[test]
fn test_find_file_missing() {
    let tmp = TempDir::new().unwrap();
    assert_eq!(find_file(tmp.path(), "nope.js").unwrap(), None);
    assert_eq!(find_file(&tmp.path().join("absent"), "nope.js").unwrap(), None);
}

#[test]
fn test_remove_home_drops_empty_root() {
    let tmp = TempDir::new().unwrap();
    let home = tmp.path().join("jquery").join("1.8.3");
    std::fs::create_dir_all(&home).unwrap();
    std::fs::write(home.join("jquery.js"), "").unwrap();

    remove_home_and_empty_parent(&home).unwrap();
    assert!(!home.exists());
    assert!(!tmp.path().join("jquery").exists());
    assert!(tmp.path().exists());
}

#[test]
fn test_remove_home_keeps_populated_root() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("jquery");
    std::fs::create_dir_all(root.join("1.8.3")).unwrap();
    std::fs::create_dir_all(root.join("1.9.0")).unwrap();

    remove_home_and_empty_parent(&root.join("1.9.0")).unwrap();
    assert!(root.join("1.8.3").is_dir());
    assert!(!root.join("1.9.0").exists());
}

#[test]
fn test_is_empty_dir() {
    let tmp = TempDir::new().unwrap();
    assert!(is_empty_dir(tmp.path()).unwrap());
    std::fs::write(tmp.path().join("f"), "x").unwrap();
    assert!(!is_empty_dir(tmp.path()).unwrap());
    assert!(!is_empty_dir(&tmp.path().join("f")).unwrap());
}

#[test]
fn test_dir_size_sums_nested_files() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("a")).unwrap();
    std::fs::write(tmp.path().join("a/one"), "12345").unwrap();
    std::fs::write(tmp.path().join("two"), "123").unwrap();
    assert_eq!(dir_size(tmp.path()), 8);
}

#[test]
fn test_format_size() {
    assert_eq!(format_size(512), "512 B");
    assert_eq!(format_size(1536), "1.5 KB");
    assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
}
