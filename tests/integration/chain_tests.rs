use dupechain::context::RunContext;
use dupechain::duplicates::{
    DuplicateFinder, DuplicateGroup, FilterChain, FinderConfig, Partitioning,
};
use dupechain::scanner::{Candidate, Signature, Walker, WalkerConfig};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    File::create(&path).unwrap().write_all(content).unwrap();
    path
}

fn finder(chain: &[Signature], partitioning: Partitioning) -> DuplicateFinder {
    DuplicateFinder::new(
        FinderConfig::default()
            .with_chain(FilterChain::new(chain.to_vec()).unwrap())
            .with_partitioning(partitioning),
    )
}

fn names(group: &DuplicateGroup) -> Vec<String> {
    group
        .paths()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

fn scan(dir: &Path, finder: &DuplicateFinder) -> Vec<DuplicateGroup> {
    let walker = Walker::new(dir, WalkerConfig::default());
    finder.scan(&walker, &RunContext::new()).collect()
}

#[test]
fn test_scenario_size_md5_bytes() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"XXX");
    write(dir.path(), "b", b"XXX");
    write(dir.path(), "c", b"YYY");

    let finder = finder(
        &[Signature::Size, Signature::Md5, Signature::Bytes],
        Partitioning::Reference,
    );
    let groups = scan(dir.path(), &finder);

    assert_eq!(groups.len(), 2);
    assert_eq!(names(&groups[0]), vec!["a", "b"]);
    assert_eq!(names(&groups[1]), vec!["c"]);

    let md5 = Signature::Md5.probe(&dir.path().join("a")).unwrap();
    assert_eq!(groups[0].labels.len(), 3);
    assert_eq!(groups[0].labels[0].as_str(), "3");
    assert_eq!(groups[0].labels[1], md5);
    assert_eq!(groups[1].labels[0].as_str(), "3");
}

#[test]
fn test_identical_files_form_one_group_in_walk_order() {
    let dir = tempdir().unwrap();
    for name in ["d", "b", "e", "a", "c"] {
        write(dir.path(), name, b"same content everywhere");
    }

    let groups = scan(dir.path(), &DuplicateFinder::with_defaults());

    assert_eq!(groups.len(), 1);
    assert_eq!(names(&groups[0]), vec!["a", "b", "c", "d", "e"]);
    assert_eq!(groups[0].labels.len(), 4);
}

#[test]
fn test_same_size_distinct_content_never_groups() {
    let dir = tempdir().unwrap();
    write(dir.path(), "one", b"aaaa");
    write(dir.path(), "two", b"bbbb");
    write(dir.path(), "three", b"cccc");

    let groups = scan(dir.path(), &DuplicateFinder::with_defaults());

    assert_eq!(groups.len(), 3);
    assert!(groups.iter().all(|g| g.len() == 1));
}

#[test]
fn test_vanished_candidate_does_not_disturb_others() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a", b"XXX");
    let b = write(dir.path(), "b", b"XXX");
    let ghost = Candidate::new(dir.path().join("ghost"), 3, std::time::SystemTime::UNIX_EPOCH);

    let candidates = vec![
        Candidate::from_path(&a).unwrap(),
        ghost,
        Candidate::from_path(&b).unwrap(),
    ];
    let mut stream = DuplicateFinder::with_defaults().find(candidates, &RunContext::new());
    let groups: Vec<_> = stream.by_ref().collect();

    assert_eq!(groups.len(), 1);
    assert_eq!(names(&groups[0]), vec!["a", "b"]);
    let stats = stream.finish().unwrap();
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.candidates, 3);
}

#[test]
fn test_file_vanishing_during_refinement_is_dropped() {
    for mode in [Partitioning::Reference, Partitioning::Equivalence] {
        let dir = tempdir().unwrap();
        let paths: Vec<PathBuf> = ["a", "b", "c", "d"]
            .iter()
            .map(|name| write(dir.path(), name, b"XXXX"))
            .collect();
        let candidates: Vec<Candidate> = paths
            .iter()
            .map(|p| Candidate::from_path(p).unwrap())
            .collect();

        let finder = finder(&[Signature::Size, Signature::Md5, Signature::Bytes], mode);
        let mut stream = finder.find(candidates, &RunContext::new());

        // Size is keyed already; md5 and bytes run on the first pull.
        std::fs::remove_file(&paths[0]).unwrap();
        std::fs::remove_file(&paths[2]).unwrap();

        let groups: Vec<_> = stream.by_ref().collect();
        assert_eq!(groups.len(), 1, "{mode}");
        assert_eq!(names(&groups[0]), vec!["b", "d"], "{mode}");
        assert_eq!(groups[0].labels.len(), 3, "{mode}");

        let stats = stream.finish().unwrap();
        assert_eq!(stats.dropped, 2, "{mode}");
        assert_eq!(stats.candidates, 4, "{mode}");
    }
}

#[test]
fn test_reference_mode_splits_non_reference_pairs_into_singletons() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"XX");
    write(dir.path(), "b", b"YY");
    write(dir.path(), "c", b"XX");
    write(dir.path(), "d", b"YY");

    let groups = scan(
        dir.path(),
        &finder(&[Signature::Size, Signature::Md5], Partitioning::Reference),
    );

    let shapes: Vec<Vec<String>> = groups.iter().map(names).collect();
    assert_eq!(shapes, vec![vec!["a", "c"], vec!["b"], vec!["d"]]);
}

#[test]
fn test_equivalence_mode_keeps_every_pair() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"XX");
    write(dir.path(), "b", b"YY");
    write(dir.path(), "c", b"XX");
    write(dir.path(), "d", b"YY");

    let groups = scan(
        dir.path(),
        &finder(&[Signature::Size, Signature::Md5], Partitioning::Equivalence),
    );

    let shapes: Vec<Vec<String>> = groups.iter().map(names).collect();
    assert_eq!(shapes, vec![vec!["a", "c"], vec!["b", "d"]]);
}

#[test]
fn test_same_tree_same_output() {
    let dir = tempdir().unwrap();
    for (i, content) in ["x", "y", "x", "zz", "y", "x"].iter().enumerate() {
        write(dir.path(), &format!("f{i}"), content.as_bytes());
    }

    let first = scan(dir.path(), &DuplicateFinder::with_defaults());
    let second = scan(dir.path(), &DuplicateFinder::with_defaults());

    assert_eq!(first, second);
}

#[test]
fn test_name_filter_groups_by_basename_across_roots() {
    let one = tempdir().unwrap();
    let two = tempdir().unwrap();
    write(one.path(), "report.txt", b"draft");
    write(two.path(), "report.txt", b"final version");

    let walker = Walker::with_roots(
        vec![one.path().to_path_buf(), two.path().to_path_buf()],
        WalkerConfig::default(),
    );
    let groups: Vec<_> = finder(&[Signature::Name], Partitioning::Reference)
        .scan(&walker, &RunContext::new())
        .collect();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
    assert_eq!(groups[0].labels[0].as_str(), "report.txt");
}
