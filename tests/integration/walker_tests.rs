use dupechain::context::RunContext;
use dupechain::duplicates::DuplicateFinder;
use dupechain::scanner::{Walker, WalkerConfig};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

fn write(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    File::create(path).unwrap().write_all(content).unwrap();
}

fn file_names(walker: &Walker) -> Vec<String> {
    walker
        .walk()
        .filter_map(Result::ok)
        .map(|c| c.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_parent_and_child_roots_scan_each_file_once() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("sub");
    write(&dir.path().join("a.txt"), b"content");
    write(&sub.join("b.txt"), b"content");

    let walker = Walker::with_roots(
        vec![dir.path().to_path_buf(), sub.clone()],
        WalkerConfig::default(),
    );
    let mut stream = DuplicateFinder::with_defaults().scan(&walker, &RunContext::new());
    let groups: Vec<_> = stream.by_ref().collect();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
    assert_eq!(stream.finish().unwrap().candidates, 2);
}

#[test]
fn test_include_and_exclude_globs() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("keep.jpg"), b"1");
    write(&dir.path().join("skip.tmp"), b"2");
    write(&dir.path().join("nested/also.jpg"), b"3");
    write(&dir.path().join("nested/draft.jpg"), b"4");

    let config = WalkerConfig {
        include: vec!["*.jpg".into()],
        exclude: vec!["draft*".into()],
        ..WalkerConfig::default()
    };
    let walker = Walker::new(dir.path(), config);

    assert_eq!(file_names(&walker), vec!["keep.jpg", "also.jpg"]);
}

#[test]
fn test_directory_substring_filters() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("photos/2023/a.jpg"), b"1");
    write(&dir.path().join("photos/cache/b.jpg"), b"2");
    write(&dir.path().join("music/c.mp3"), b"3");

    let config = WalkerConfig {
        dir_include: vec!["photos".into()],
        dir_exclude: vec!["cache".into()],
        ..WalkerConfig::default()
    };
    let walker = Walker::new(dir.path(), config);

    assert_eq!(file_names(&walker), vec!["a.jpg"]);
}

#[test]
fn test_hidden_and_empty_files_are_opt_in() {
    let dir = tempdir().unwrap();
    write(&dir.path().join(".hidden"), b"secret");
    write(&dir.path().join(".git/config"), b"x");
    write(&dir.path().join("empty"), b"");
    write(&dir.path().join("visible"), b"v");

    let default = Walker::new(dir.path(), WalkerConfig::default());
    assert_eq!(file_names(&default), vec!["visible"]);

    let everything = Walker::new(
        dir.path(),
        WalkerConfig {
            follow_hidden: true,
            empty_files: true,
            ..WalkerConfig::default()
        },
    );
    let mut names = file_names(&everything);
    names.sort();
    assert_eq!(names, vec![".hidden", "config", "empty", "visible"]);
}

#[test]
fn test_no_recursive_stays_at_top_level() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("top"), b"1");
    write(&dir.path().join("deep/below"), b"2");

    let walker = Walker::new(
        dir.path(),
        WalkerConfig {
            recursive: false,
            ..WalkerConfig::default()
        },
    );

    assert_eq!(file_names(&walker), vec!["top"]);
}

#[cfg(unix)]
#[test]
fn test_hardlinks_are_one_physical_file() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("original");
    write(&original, b"identical content");
    fs::hard_link(&original, dir.path().join("zlink")).unwrap();

    let walker = Walker::new(dir.path(), WalkerConfig::default());
    assert_eq!(file_names(&walker), vec!["original"]);

    let keep = Walker::new(
        dir.path(),
        WalkerConfig {
            keep_hardlinks: true,
            ..WalkerConfig::default()
        },
    );
    assert_eq!(file_names(&keep), vec!["original", "zlink"]);
}
