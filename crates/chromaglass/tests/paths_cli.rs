use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn chromaglass(config_dir: &std::path::Path, cache_dir: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_chromaglass"));
    command
        .env("CHROMAGLASS_CONFIG_DIR", config_dir)
        .env("CHROMAGLASS_CACHE_DIR", cache_dir);
    command
}

#[test]
fn paths_command_reports_overridden_directories() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    let cache_dir = root.path().join("cache");

    let output = chromaglass(&config_dir, &cache_dir)
        .arg("paths")
        .output()
        .expect("failed to run chromaglass paths");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&config_dir.display().to_string()));
    assert!(stdout.contains(&cache_dir.display().to_string()));
    assert!(stdout.contains("chromaglass.toml"));

    // Discovery creates the directories so later writes cannot fail.
    assert!(config_dir.is_dir());
    assert!(cache_dir.is_dir());
}

#[test]
fn missing_explicit_config_is_a_startup_error() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    let cache_dir = root.path().join("cache");

    let output = chromaglass(&config_dir, &cache_dir)
        .args(["--config", "/nonexistent/chromaglass.toml"])
        .output()
        .expect("failed to run chromaglass");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("config file not found"));
}

#[test]
fn invalid_config_file_is_rejected_before_launch() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    let cache_dir = root.path().join("cache");
    fs::create_dir_all(&config_dir).unwrap();

    let config_file = config_dir.join("broken.toml");
    fs::write(&config_file, "[surface]\nwidth = 0\n").unwrap();

    let output = chromaglass(&config_dir, &cache_dir)
        .arg("--config")
        .arg(&config_file)
        .output()
        .expect("failed to run chromaglass");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("surface size must be non-zero"));
}
