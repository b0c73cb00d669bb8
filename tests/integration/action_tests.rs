use dupechain::actions::confirm::FixedAnswer;
use dupechain::actions::{ActionError, ActionExecutor, ActionPolicy, ConfirmMode};
use dupechain::context::RunContext;
use dupechain::duplicates::{DuplicateFinder, DuplicateGroup, FilterChain, FinderConfig};
use dupechain::output::OutputFormat;
use dupechain::scanner::{Signature, Walker, WalkerConfig};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

fn write(dir: &Path, name: &str, content: &[u8]) {
    File::create(dir.join(name))
        .unwrap()
        .write_all(content)
        .unwrap();
}

fn scenario(dir: &Path) -> Vec<DuplicateGroup> {
    write(dir, "a", b"XXX");
    write(dir, "b", b"XXX");
    write(dir, "c", b"YYY");

    let finder = DuplicateFinder::new(FinderConfig::default().with_chain(
        FilterChain::new(vec![Signature::Size, Signature::Md5, Signature::Bytes]).unwrap(),
    ));
    let walker = Walker::new(dir, WalkerConfig::default());
    finder.scan(&walker, &RunContext::new()).collect()
}

#[test]
fn test_remove_scenario_keeps_source_and_unique_file() {
    let dir = tempdir().unwrap();
    let groups = scenario(dir.path());

    let mut executor = ActionExecutor::new(ActionPolicy::Remove, Vec::new()).with_threshold(2);
    executor.run(groups).unwrap();

    assert!(dir.path().join("a").exists());
    assert!(!dir.path().join("b").exists());
    assert!(dir.path().join("c").exists());

    let (_, report) = executor.into_parts();
    assert_eq!(report.groups_acted, 1);
    assert_eq!(report.groups_skipped, 1);
    assert_eq!(report.files_removed, 1);
}

#[cfg(unix)]
#[test]
fn test_link_shares_storage() {
    use std::os::unix::fs::MetadataExt;

    let dir = tempdir().unwrap();
    let groups = scenario(dir.path());
    let (a, b) = (dir.path().join("a"), dir.path().join("b"));

    let mut executor = ActionExecutor::new(ActionPolicy::Link, Vec::new());
    executor.run(groups).unwrap();
    assert_eq!(executor.report().files_linked, 1);

    assert_eq!(fs::metadata(&a).unwrap().ino(), fs::metadata(&b).unwrap().ino());

    fs::OpenOptions::new()
        .append(true)
        .open(&b)
        .unwrap()
        .write_all(b"!")
        .unwrap();
    assert_eq!(fs::read(&a).unwrap(), b"XXX!");

    fs::remove_file(&a).unwrap();
    assert_eq!(fs::read(&b).unwrap(), b"XXX!");
}

#[test]
fn test_print_pretty_listing() {
    let dir = tempdir().unwrap();
    let groups = scenario(dir.path());

    let mut executor = ActionExecutor::new(ActionPolicy::Print(OutputFormat::Pretty), Vec::new());
    executor.run(groups).unwrap();
    let (out, _) = executor.into_parts();

    let expected = format!(
        "{}\n    {}\n\n",
        dir.path().join("a").display(),
        dir.path().join("b").display()
    );
    assert_eq!(String::from_utf8(out).unwrap(), expected);
}

#[test]
fn test_print_json_lines_with_singletons() {
    let dir = tempdir().unwrap();
    let groups = scenario(dir.path());

    let mut executor = ActionExecutor::new(ActionPolicy::Print(OutputFormat::Json), Vec::new())
        .with_threshold(1);
    executor.run(groups).unwrap();
    let (out, _) = executor.into_parts();

    let lines: Vec<serde_json::Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["files"].as_array().unwrap().len(), 2);
    assert_eq!(lines[0]["filters"].as_array().unwrap().len(), 3);
    assert_eq!(lines[0]["filters"][0], "3");
    assert_eq!(lines[1]["files"].as_array().unwrap().len(), 1);
    assert!(lines[1]["files"][0].as_str().unwrap().ends_with('c'));
}

#[test]
fn test_declining_stops_before_any_removal() {
    let dir = tempdir().unwrap();
    let groups = scenario(dir.path());

    let mut executor = ActionExecutor::new(ActionPolicy::Remove, Vec::new())
        .with_confirmer(Box::new(FixedAnswer(false)), ConfirmMode::Destructive);
    let err = executor.run(groups).unwrap_err();

    assert!(matches!(err, ActionError::Declined));
    assert!(dir.path().join("b").exists());
}

#[test]
fn test_remove_tolerates_vanished_duplicate() {
    let dir = tempdir().unwrap();
    let groups = scenario(dir.path());
    fs::remove_file(dir.path().join("b")).unwrap();

    let mut executor = ActionExecutor::new(ActionPolicy::Remove, Vec::new());
    executor.run(groups).unwrap();

    assert_eq!(executor.report().files_missing, 1);
    assert!(dir.path().join("a").exists());
}
