//! Integration tests for PrefixSearchIndex
//!
//! These tests verify:
//! - First occurrence wins across directories
//! - Empty prefixes never match
//! - No file name is returned twice, for any prefix and path length

use camino::Utf8PathBuf;
use pathedit::models::{ExtensionSet, PathEntry};
use pathedit::PrefixSearchIndex;
use proptest::prelude::*;
use std::collections::HashSet;
use std::fs;
use tempfile::TempDir;

const NAMES: [&str; 6] = ["alpha.exe", "alps.cmd", "beta.exe", "bravo.bat", "al.exe", "b.txt"];

fn build_path(temp: &TempDir, layout: &[Vec<usize>]) -> Vec<PathEntry> {
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    layout
        .iter()
        .enumerate()
        .map(|(i, files)| {
            let dir = root.join(format!("d{}", i));
            fs::create_dir_all(&dir).unwrap();
            for &file in files {
                fs::write(dir.join(NAMES[file]), b"").unwrap();
            }
            PathEntry::with_variables(dir.as_str(), |_| None)
        })
        .collect()
}

fn index() -> PrefixSearchIndex {
    PrefixSearchIndex::new(ExtensionSet::for_shadowing([".exe", ".cmd", ".bat"]))
}

#[test]
fn test_first_occurrence_wins() {
    let temp = TempDir::new().unwrap();
    let path = build_path(&temp, &[vec![0], vec![0, 1, 2]]);
    let first_dir = path[0].resolved().to_path_buf();
    let second_dir = path[1].resolved().to_path_buf();

    let index = index();
    index.set_path(path);

    let found = index.search("al");
    let pairs: Vec<(&str, &Utf8PathBuf)> = found
        .iter()
        .map(|m| (m.filename.as_str(), &m.directory))
        .collect();
    assert_eq!(
        pairs,
        vec![("alpha.exe", &first_dir), ("alps.cmd", &second_dir)]
    );
}

#[test]
fn test_unrecognized_extension_not_returned() {
    let temp = TempDir::new().unwrap();
    let path = build_path(&temp, &[vec![5, 2]]);

    let index = index();
    index.set_path(path);

    let found = index.search("b");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].filename, "beta.exe");
}

#[test]
fn test_replacing_path_changes_results() {
    let temp = TempDir::new().unwrap();
    let path = build_path(&temp, &[vec![0], vec![3]]);

    let index = index();
    index.set_path(path.clone());
    assert_eq!(index.search("br").len(), 1);

    index.set_path(vec![path[0].clone()]);
    assert!(index.search("br").is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_search_never_duplicates_names(
        layout in prop::collection::vec(prop::collection::vec(0usize..NAMES.len(), 0..5), 2..5),
        prefix in "[ab]{0,3}",
    ) {
        let temp = TempDir::new().unwrap();
        let index = index();
        index.set_path(build_path(&temp, &layout));

        let found = index.search(&prefix);
        if prefix.is_empty() {
            prop_assert!(found.is_empty());
        }

        let mut seen = HashSet::new();
        for m in &found {
            prop_assert!(m.filename.starts_with(&prefix));
            prop_assert!(seen.insert(m.filename.clone()), "duplicate {}", m.filename);
        }
    }
}
