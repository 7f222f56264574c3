use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Binary isolated from the user's configuration and queue database
fn anilib(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("anilib").unwrap();
    cmd.env("XDG_CONFIG_HOME", dir.path().join("config"))
        .env(
            "ANILIB_STORAGE__DATABASE_PATH",
            dir.path().join("data").join("queue.db"),
        )
        .env_remove("ANILIB_REGISTRY__USERNAME")
        .env_remove("ANILIB_REGISTRY__PASSWORD");
    cmd
}

#[test]
fn test_version() {
    let mut cmd = Command::cargo_bin("anilib").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_queue_add_is_deduplicated() {
    let dir = TempDir::new().unwrap();

    anilib(&dir)
        .args(["queue", "add", "group", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Queued GetReleaseGroup_7"));

    anilib(&dir)
        .args(["queue", "add", "group", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Already queued GetReleaseGroup_7"));

    anilib(&dir)
        .args(["queue", "count"])
        .assert()
        .success()
        .stdout(predicate::str::contains("general: 1"))
        .stdout(predicate::str::contains("total: 1"));
}

#[test]
fn test_queue_list_in_priority_order() {
    let dir = TempDir::new().unwrap();

    anilib(&dir)
        .args(["queue", "add", "sync-mylist"])
        .assert()
        .success();
    anilib(&dir)
        .args(["queue", "add", "--now", "anime", "42"])
        .assert()
        .success();
    anilib(&dir)
        .args(["queue", "add", "image", "http://img.example/1.jpg"])
        .arg(dir.path().join("1.jpg"))
        .assert()
        .success();

    let output = anilib(&dir)
        .args(["queue", "list", "--queue", "general"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let anime = stdout.find("GetAnimeHttp_42").unwrap();
    let sync = stdout.find("SyncMyList_all").unwrap();
    assert!(anime < sync, "user-initiated command should be listed first");
    assert!(!stdout.contains("DownloadImage"));
}

#[test]
fn test_queue_clear() {
    let dir = TempDir::new().unwrap();

    anilib(&dir)
        .args(["queue", "add", "file", "1024", "ABCDEF0123456789ABCDEF0123456789"])
        .assert()
        .success();

    anilib(&dir)
        .args(["queue", "clear", "--queue", "general"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 commands"));

    anilib(&dir)
        .args(["queue", "count"])
        .assert()
        .success()
        .stdout(predicate::str::contains("total: 0"));
}

#[test]
fn test_invalid_vote_is_rejected() {
    let dir = TempDir::new().unwrap();

    anilib(&dir)
        .args(["queue", "add", "vote", "42", "1500"])
        .assert()
        .failure();

    anilib(&dir)
        .args(["queue", "count"])
        .assert()
        .success()
        .stdout(predicate::str::contains("total: 0"));
}

#[test]
fn test_unknown_queue_name() {
    let dir = TempDir::new().unwrap();

    anilib(&dir)
        .args(["queue", "clear", "--queue", "downloads"])
        .assert()
        .failure();
}

#[test]
fn test_run_requires_credentials() {
    let dir = TempDir::new().unwrap();

    anilib(&dir)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("config init"));
}

#[test]
fn test_config_path_honours_xdg() {
    let dir = TempDir::new().unwrap();

    anilib(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("anilib"))
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_completions() {
    let mut cmd = Command::cargo_bin("anilib").unwrap();
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("anilib"));
}
