use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::{tempdir, TempDir};

/// Run the binary with an isolated config directory and no terminal.
fn dupechain(args: &[&str], config_home: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dupechain"))
        .args(args)
        .env_remove("RUST_LOG")
        .env("XDG_CONFIG_HOME", config_home)
        .env("HOME", config_home)
        .stdin(Stdio::null())
        .output()
        .unwrap()
}

fn scenario() -> TempDir {
    let dir = tempdir().unwrap();
    for (name, content) in [("a", "XXX"), ("b", "XXX"), ("c", "YYY")] {
        File::create(dir.path().join(name))
            .unwrap()
            .write_all(content.as_bytes())
            .unwrap();
    }
    dir
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_basic_listing() {
    let dir = scenario();
    let home = tempdir().unwrap();
    let root = dir.path().to_str().unwrap();

    let output = dupechain(&["--output", "basic", "--no-progress", root], home.path());

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    let expected = format!(
        "{}\n{}\n",
        dir.path().join("a").display(),
        dir.path().join("b").display()
    );
    assert_eq!(stdout(&output), expected);
}

#[test]
fn test_pretty_listing_is_default() {
    let dir = scenario();
    let home = tempdir().unwrap();

    let output = dupechain(&[dir.path().to_str().unwrap()], home.path());

    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    assert!(text.starts_with(&dir.path().join("a").display().to_string()));
    assert!(text.contains(&format!("\n    {}\n\n", dir.path().join("b").display())));
}

#[test]
fn test_json_lines() {
    let dir = scenario();
    let home = tempdir().unwrap();

    let output = dupechain(
        &["--output", "json", "-t", "1", dir.path().to_str().unwrap()],
        home.path(),
    );

    assert_eq!(output.status.code(), Some(0));
    let lines: Vec<serde_json::Value> = stdout(&output)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["files"].as_array().unwrap().len(), 2);
    assert_eq!(lines[0]["filters"].as_array().unwrap().len(), 4);
}

#[test]
fn test_remove_without_terminal_needs_yes() {
    let dir = scenario();
    let home = tempdir().unwrap();

    let output = dupechain(&["--remove", dir.path().to_str().unwrap()], home.path());

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("--yes"));
    assert!(dir.path().join("b").exists());
}

#[test]
fn test_remove_with_yes() {
    let dir = scenario();
    let home = tempdir().unwrap();

    let output = dupechain(&["--remove", "--yes", dir.path().to_str().unwrap()], home.path());

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert!(dir.path().join("a").exists());
    assert!(!dir.path().join("b").exists());
    assert!(dir.path().join("c").exists());
}

#[test]
fn test_unknown_filter_suggests_and_exits_2() {
    let dir = scenario();
    let home = tempdir().unwrap();

    let output = dupechain(&["-f", "md6", dir.path().to_str().unwrap()], home.path());

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("did you mean 'md5'"));
}

#[test]
fn test_missing_directory_exits_2() {
    let home = tempdir().unwrap();
    let missing = home.path().join("nope");

    let output = dupechain(&[missing.to_str().unwrap()], home.path());

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("DC002"));
}

#[test]
fn test_json_errors() {
    let home = tempdir().unwrap();
    let missing = home.path().join("nope");

    let output = dupechain(&["--json-errors", missing.to_str().unwrap()], home.path());

    let err: serde_json::Value = serde_json::from_str(stderr(&output).trim()).unwrap();
    assert_eq!(err["code"], "DC002");
    assert_eq!(err["exit_code"], 2);
    assert_eq!(err["interrupted"], false);
}

#[test]
fn test_merge_error_conflict_exits_3() {
    let one = tempdir().unwrap();
    let two = tempdir().unwrap();
    let home = tempdir().unwrap();
    for dir in [&one, &two] {
        File::create(dir.path().join("same.txt"))
            .unwrap()
            .write_all(b"payload")
            .unwrap();
    }
    let dest = home.path().join("merged");
    let spec = format!("{}:ERROR", dest.display());

    let output = dupechain(
        &[
            "--merge",
            &spec,
            one.path().to_str().unwrap(),
            two.path().to_str().unwrap(),
        ],
        home.path(),
    );

    assert_eq!(output.status.code(), Some(3));
    assert_eq!(stdout(&output).lines().count(), 1);
}

#[test]
fn test_bad_template_is_config_error() {
    let dir = scenario();
    let home = tempdir().unwrap();

    let output = dupechain(
        &["--exec", "echo {bogus}", dir.path().to_str().unwrap()],
        home.path(),
    );

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_list_filters() {
    let home = tempdir().unwrap();

    let output = dupechain(&["--list-filters"], home.path());

    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    for name in ["size", "partial-md5", "md5", "sha256", "blake3", "bytes", "name", "mtime"] {
        assert!(text.contains(name), "missing {name}");
    }
}

#[cfg(unix)]
#[test]
fn test_exec_failure_exits_3() {
    let dir = scenario();
    let home = tempdir().unwrap();

    let output = dupechain(
        &["--exec", "exit 7", dir.path().to_str().unwrap()],
        home.path(),
    );

    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_exec_label_past_chain_is_config_error() {
    let dir = scenario();
    let home = tempdir().unwrap();

    let output = dupechain(
        &["-f", "size", "--exec", "echo {f2}", dir.path().to_str().unwrap()],
        home.path(),
    );

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("{f2}"));
    assert!(stdout(&output).is_empty());
}
