use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::tempdir;

fn dupechain(args: &[&str], config_home: &Path, env: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_dupechain"));
    command
        .args(args)
        .env_remove("RUST_LOG")
        .env("XDG_CONFIG_HOME", config_home)
        .env("HOME", config_home)
        .stdin(Stdio::null());
    for (key, value) in env {
        command.env(key, value);
    }
    command.output().unwrap()
}

fn tree(dir: &Path) {
    for (name, content) in [("a", "XXX"), ("b", "XXX"), ("c", "YYY")] {
        File::create(dir.join(name))
            .unwrap()
            .write_all(content.as_bytes())
            .unwrap();
    }
}

fn lines(output: &Output) -> usize {
    String::from_utf8_lossy(&output.stdout).lines().count()
}

#[test]
fn test_explicit_config_file() {
    let dir = tempdir().unwrap();
    let home = tempdir().unwrap();
    tree(dir.path());
    let config = home.path().join("custom.toml");
    fs::write(&config, "filters = [\"size\"]\noutput = \"json\"\n").unwrap();

    let output = dupechain(
        &["--config", config.to_str().unwrap(), dir.path().to_str().unwrap()],
        home.path(),
        &[],
    );

    assert_eq!(output.status.code(), Some(0));
    let line: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim()).unwrap();
    assert_eq!(line["files"].as_array().unwrap().len(), 3);
    assert_eq!(line["filters"], serde_json::json!(["3"]));
}

#[test]
fn test_environment_overrides_file_and_cli_overrides_environment() {
    let dir = tempdir().unwrap();
    let home = tempdir().unwrap();
    tree(dir.path());
    let config = home.path().join("custom.toml");
    fs::write(&config, "output = \"basic\"\nthreshold = 5\n").unwrap();
    let root = dir.path().to_str().unwrap();
    let config_arg = config.to_str().unwrap();

    let from_file = dupechain(&["--config", config_arg, root], home.path(), &[]);
    assert_eq!(lines(&from_file), 0);

    let from_env = dupechain(
        &["--config", config_arg, root],
        home.path(),
        &[("DUPECHAIN_THRESHOLD", "1")],
    );
    assert_eq!(lines(&from_env), 3);

    let from_cli = dupechain(
        &["--config", config_arg, "--threshold", "2", root],
        home.path(),
        &[("DUPECHAIN_THRESHOLD", "1")],
    );
    assert_eq!(lines(&from_cli), 2);
}

#[cfg(target_os = "linux")]
#[test]
fn test_platform_config_file_is_picked_up() {
    let dir = tempdir().unwrap();
    let home = tempdir().unwrap();
    tree(dir.path());
    let config_dir = home.path().join("dupechain");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "output = \"basic\"\nthreshold = 1\n").unwrap();

    let output = dupechain(&[dir.path().to_str().unwrap()], home.path(), &[]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(lines(&output), 3);
}

#[test]
fn test_missing_config_file_is_config_error() {
    let dir = tempdir().unwrap();
    let home = tempdir().unwrap();

    let output = dupechain(
        &["--config", "/no/such/config.toml", dir.path().to_str().unwrap()],
        home.path(),
        &[],
    );

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_invalid_config_value_is_config_error() {
    let dir = tempdir().unwrap();
    let home = tempdir().unwrap();
    let config = home.path().join("bad.toml");
    fs::write(&config, "threshold = \"lots\"\n").unwrap();

    let output = dupechain(
        &["--config", config.to_str().unwrap(), dir.path().to_str().unwrap()],
        home.path(),
        &[],
    );

    assert_eq!(output.status.code(), Some(2));
}
