use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn thicket_cmd(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("thicket").unwrap();
    cmd.env("THICKET_HOME", data_dir)
        .env_remove("THICKET_CACHE")
        .env_remove("RUST_LOG");
    cmd
}

fn seed_module(cache: &Path, name: &str, version: &str, deps: &str) {
    let home = cache.join("jam").join(name).join(version);
    fs::create_dir_all(&home).unwrap();
    fs::write(home.join(format!("{name}.js")), "/* module */").unwrap();
    fs::write(
        home.join("module.json"),
        format!(
            r#"{{"name": "{name}", "version": "{version}", "main": "{name}.js", "dependencies": {deps}}}"#
        ),
    )
    .unwrap();
}

#[test]
fn test_offline_resolve_from_cache() {
    let tmp = TempDir::new().unwrap();
    let cache = tmp.path().join("modules");
    seed_module(&cache, "jquery", "1.8.3", "{}");
    seed_module(&cache, "jquery-ui", "1.9.2", r#"{"jquery": "1.8.3"}"#);

    thicket_cmd(tmp.path())
        .args(["--offline", "-b", "jam", "resolve", "jquery-ui/1.9.2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("jquery-ui@1.9.2\n└── jquery@1.8.3\n"));
}

#[test]
fn test_offline_miss_fails() {
    let tmp = TempDir::new().unwrap();
    thicket_cmd(tmp.path())
        .args(["--offline", "resolve", "jquery/1.8.3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("jquery@1.8.3"));
}

#[test]
fn test_invalid_address_fails() {
    let tmp = TempDir::new().unwrap();
    thicket_cmd(tmp.path())
        .args(["--offline", "resolve", "/1.0.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid module address"));
}

#[test]
fn test_unknown_backend_in_config_fails() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        "[resolve]\nbackends = [\"jam\", \"maven\"]\n",
    )
    .unwrap();
    thicket_cmd(tmp.path())
        .args(["cache", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown backend"));
}

#[test]
fn test_install_missing_manifest_fails() {
    let tmp = TempDir::new().unwrap();
    thicket_cmd(tmp.path())
        .current_dir(tmp.path())
        .args(["install", "--manifest", "nope/package.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_offline_install_and_tree() {
    let tmp = TempDir::new().unwrap();
    seed_module(&tmp.path().join("modules"), "underscore", "1.4.4", "{}");
    let project = tmp.path().join("app");
    fs::create_dir_all(&project).unwrap();
    fs::write(
        project.join("package.json"),
        r#"{"name": "app", "version": "1.0.0", "dependencies": {"underscore": "~1.4"}}"#,
    )
    .unwrap();

    thicket_cmd(tmp.path())
        .current_dir(&project)
        .args(["--offline", "-b", "jam", "install", "--out", "vendor"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Installed"));
    assert!(project.join("vendor").join("underscore-1.4.4.js").is_file());

    thicket_cmd(tmp.path())
        .current_dir(&project)
        .args(["--offline", "-b", "jam", "tree"])
        .assert()
        .success()
        .stdout(predicate::str::contains("app@1.0.0\n└── underscore@1.4.4\n"));
}
