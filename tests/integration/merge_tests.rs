use dupechain::actions::{
    ActionError, ActionExecutor, ActionPolicy, Condition, MergeAction, OverwriteStrategy,
};
use dupechain::context::RunContext;
use dupechain::duplicates::{DuplicateFinder, DuplicateGroup, FilterChain, FinderConfig};
use dupechain::scanner::{Signature, Walker, WalkerConfig};
use filetime::{set_file_mtime, FileTime};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    File::create(path).unwrap().write_all(content).unwrap();
}

fn groups(roots: &[&Path], chain: Vec<Signature>) -> Vec<DuplicateGroup> {
    let finder =
        DuplicateFinder::new(FinderConfig::default().with_chain(FilterChain::new(chain).unwrap()));
    let walker = Walker::with_roots(
        roots.iter().map(|p| p.to_path_buf()),
        WalkerConfig::default(),
    );
    finder.scan(&walker, &RunContext::new()).collect()
}

fn merge(
    dest: &Path,
    strategy: OverwriteStrategy,
    groups: Vec<DuplicateGroup>,
) -> (Result<(), ActionError>, Vec<PathBuf>) {
    let policy = ActionPolicy::Merge(MergeAction::new(dest, strategy));
    let mut executor = ActionExecutor::new(policy, Vec::new());
    let result = executor.run(groups);
    let (out, _) = executor.into_parts();
    let copied = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(PathBuf::from)
        .collect();
    (result, copied)
}

/// Three roots, each holding `x.txt`; the first two are identical.
fn same_name_roots() -> (TempDir, Vec<PathBuf>) {
    let dir = tempdir().unwrap();
    let roots: Vec<PathBuf> = ["one", "two", "three"]
        .iter()
        .map(|r| dir.path().join(r))
        .collect();
    write(&roots[0].join("x.txt"), b"shared");
    write(&roots[1].join("x.txt"), b"shared");
    write(&roots[2].join("x.txt"), b"shared");
    (dir, roots)
}

#[test]
fn test_count_never_overwrites() {
    let (dir, roots) = same_name_roots();
    let dest = dir.path().join("merged");
    let found = groups(
        &[&roots[0], &roots[1]],
        vec![Signature::Size, Signature::Md5, Signature::Bytes],
    );

    let (result, copied) = merge(&dest, OverwriteStrategy::Count, found);
    result.unwrap();

    assert_eq!(copied.len(), 2);
    assert_eq!(copied[0].file_name().unwrap(), "x.txt");
    assert_eq!(copied[1].file_name().unwrap(), "x_0001.txt");
    assert_eq!(copied[0].parent(), copied[1].parent());
    assert!(copied[0].starts_with(&dest));
    for path in &copied {
        assert_eq!(fs::read(path).unwrap(), b"shared");
    }
}

#[test]
fn test_count_directory_follows_labels() {
    let (dir, roots) = same_name_roots();
    let dest = dir.path().join("merged");
    let found = groups(&[&roots[0], &roots[1]], vec![Signature::Size]);

    let (result, copied) = merge(&dest, OverwriteStrategy::Count, found);
    result.unwrap();

    assert_eq!(copied[0], dest.join("6").join("x.txt"));
}

#[test]
fn test_error_aborts_at_first_collision() {
    let (dir, roots) = same_name_roots();
    let dest = dir.path().join("merged");
    let found = groups(
        &[&roots[0], &roots[1], &roots[2]],
        vec![Signature::Size, Signature::Md5],
    );
    assert_eq!(found[0].len(), 3);

    let (result, copied) = merge(&dest, OverwriteStrategy::Error, found);

    assert!(matches!(result, Err(ActionError::Conflict { .. })));
    assert_eq!(copied.len(), 1);
    let group_dir = copied[0].parent().unwrap();
    assert_eq!(fs::read_dir(group_dir).unwrap().count(), 1);
}

#[test]
fn test_ignore_skips_taken_names() {
    let (dir, roots) = same_name_roots();
    let dest = dir.path().join("merged");
    let found = groups(&[&roots[0], &roots[1]], vec![Signature::Size]);

    let policy = ActionPolicy::Merge(MergeAction::new(&dest, OverwriteStrategy::Ignore));
    let mut executor = ActionExecutor::new(policy, Vec::new());
    executor.run(found).unwrap();

    assert_eq!(executor.report().files_copied, 1);
    assert_eq!(executor.report().files_skipped, 1);
}

#[test]
fn test_condition_larger_overwrites_with_bigger_file() {
    let dir = tempdir().unwrap();
    let small = dir.path().join("a/report.txt");
    let large = dir.path().join("b/report.txt");
    write(&small, b"v1");
    write(&large, b"version two");
    let dest = dir.path().join("merged");

    let found = groups(
        &[&dir.path().join("a"), &dir.path().join("b")],
        vec![Signature::Name],
    );
    let (result, copied) = merge(
        &dest,
        OverwriteStrategy::Condition(Condition::Larger),
        found,
    );
    result.unwrap();

    let target = dest.join("report.txt").join("report.txt");
    assert_eq!(copied, vec![target.clone(), target.clone()]);
    assert_eq!(fs::read(&target).unwrap(), b"version two");
}

/// Merge `source` (alone, threshold 1) over an existing copy with the given mtime.
fn merge_over_existing(
    dir: &Path,
    source: &Path,
    existing_mtime: i64,
    condition: Condition,
) -> (Vec<PathBuf>, Vec<u8>) {
    let dest = dir.join(format!("dest-{existing_mtime}-{condition}"));
    let target = dest.join("notes.md").join("notes.md");
    write(&target, b"existing");
    set_file_mtime(&target, FileTime::from_unix_time(existing_mtime, 0)).unwrap();

    let found = groups(&[source.parent().unwrap()], vec![Signature::Name]);
    let policy = ActionPolicy::Merge(MergeAction::new(
        &dest,
        OverwriteStrategy::Condition(condition),
    ));
    let mut executor = ActionExecutor::new(policy, Vec::new()).with_threshold(1);
    executor.run(found).unwrap();
    let (out, _) = executor.into_parts();
    let copied = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(PathBuf::from)
        .collect();
    (copied, fs::read(&target).unwrap())
}

#[test]
fn test_condition_newer_and_older() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("src/notes.md");
    write(&source, b"incoming");
    set_file_mtime(&source, FileTime::from_unix_time(2_000_000, 0)).unwrap();

    let (copied, content) = merge_over_existing(dir.path(), &source, 1_000_000, Condition::Newer);
    assert_eq!(copied.len(), 1);
    assert_eq!(content, b"incoming");

    let (copied, content) = merge_over_existing(dir.path(), &source, 3_000_000, Condition::Newer);
    assert!(copied.is_empty());
    assert_eq!(content, b"existing");

    let (copied, content) = merge_over_existing(dir.path(), &source, 3_000_000, Condition::Older);
    assert_eq!(copied.len(), 1);
    assert_eq!(content, b"incoming");
}

#[test]
fn test_parse_then_merge() {
    let (dir, roots) = same_name_roots();
    let dest = dir.path().join("merged");
    let spec = format!("{}:count", dest.display());
    let action = MergeAction::parse(&spec).unwrap();
    assert_eq!(action.dest(), dest.as_path());
    assert_eq!(action.strategy(), OverwriteStrategy::Count);

    let found = groups(&[&roots[0]], vec![Signature::Size]);
    let mut executor = ActionExecutor::new(ActionPolicy::Merge(action), Vec::new()).with_threshold(1);
    executor.run(found).unwrap();
    assert_eq!(executor.report().files_copied, 1);
}
