use crate::models::{ExtensionSet, PathEntry, PathMatch};
use crate::models::path_entry::fold_name;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Prefix lookup over the current ordered path, for autocomplete.
///
/// The path is swapped atomically as a whole; a search clones the `Arc` under a short read
/// lock and then walks its own snapshot, so it never waits on a running scan.
#[derive(Debug)]
pub struct PrefixSearchIndex {
    current_path: RwLock<Arc<Vec<PathEntry>>>,
    extensions: ExtensionSet,
}

impl PrefixSearchIndex {
    pub fn new(extensions: ExtensionSet) -> Self {
        Self {
            current_path: RwLock::new(Arc::new(Vec::new())),
            extensions,
        }
    }

    /// Replace the path searched by subsequent calls
    pub fn set_path(&self, entries: Vec<PathEntry>) {
        *self.current_path.write() = Arc::new(entries);
    }

    pub fn current_path(&self) -> Arc<Vec<PathEntry>> {
        Arc::clone(&self.current_path.read())
    }

    pub fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }

    /// Files starting with `prefix`, in path order then directory order.
    ///
    /// Only recognized extensions are returned, and a file name already yielded by an
    /// earlier directory is skipped, since that earlier copy is the one that would run.
    /// An empty prefix returns nothing.
    pub fn search(&self, prefix: &str) -> Vec<PathMatch> {
        if prefix.is_empty() {
            return Vec::new();
        }

        let path = self.current_path();
        let mut seen: HashSet<String> = HashSet::new();
        let mut matches = Vec::new();

        for entry in path.iter() {
            let found: Vec<PathMatch> = entry
                .find(prefix)
                .into_iter()
                .filter(|m| self.extensions.matches_file(&m.filename))
                .filter(|m| !seen.contains(&*fold_name(&m.filename)))
                .collect();

            seen.extend(found.iter().map(|m| fold_name(&m.filename).into_owned()));
            matches.extend(found);
        }

        tracing::debug!(
            "Prefix '{}' matched {} files across {} directories",
            prefix,
            matches.len(),
            path.len()
        );
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn entry(temp: &TempDir, name: &str) -> PathEntry {
        let dir = temp.path().join(name);
        fs::create_dir_all(&dir).unwrap();
        PathEntry::new(dir.to_str().unwrap())
    }

    #[test]
    fn test_empty_prefix_returns_nothing() {
        let temp = TempDir::new().unwrap();
        let a = entry(&temp, "A");
        fs::write(a.resolved().join("foo.exe"), b"").unwrap();

        let index = PrefixSearchIndex::new(ExtensionSet::new([".exe"]));
        index.set_path(vec![a]);

        assert!(index.search("").is_empty());
    }

    #[test]
    fn test_first_directory_wins() {
        let temp = TempDir::new().unwrap();
        let a = entry(&temp, "A");
        let b = entry(&temp, "B");
        fs::write(a.resolved().join("foo.exe"), b"").unwrap();
        fs::write(b.resolved().join("foo.exe"), b"").unwrap();
        fs::write(b.resolved().join("fob.exe"), b"").unwrap();
        fs::write(b.resolved().join("foo.txt"), b"").unwrap();

        let index = PrefixSearchIndex::new(ExtensionSet::for_shadowing([".exe"]));
        index.set_path(vec![a.clone(), b.clone()]);

        let results = index.search("fo");
        assert_eq!(
            results,
            vec![
                PathMatch::new(a.resolved(), "foo.exe"),
                PathMatch::new(b.resolved(), "fob.exe"),
            ]
        );
    }

    #[test]
    fn test_missing_directories_are_skipped() {
        let temp = TempDir::new().unwrap();
        let missing = PathEntry::new(temp.path().join("gone").to_str().unwrap());
        let b = entry(&temp, "B");
        fs::write(b.resolved().join("zip.exe"), b"").unwrap();

        let index = PrefixSearchIndex::new(ExtensionSet::new([".exe"]));
        index.set_path(vec![missing, b]);

        assert_eq!(index.search("z").len(), 1);
    }
}
