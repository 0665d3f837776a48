use super::PathEntry;
use std::collections::HashSet;

/// One line of a before/after comparison of a path list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffPath {
    pub entry: PathEntry,
    pub is_added: bool,
}

impl DiffPath {
    pub fn symbolic(&self) -> &str {
        self.entry.symbolic()
    }
}

/// Entries removed from `old` (in old order) followed by entries added in `new` (in new
/// order). Reordering alone produces no lines.
pub fn diff_paths(old: &[PathEntry], new: &[PathEntry]) -> Vec<DiffPath> {
    let old_set: HashSet<&PathEntry> = old.iter().collect();
    let new_set: HashSet<&PathEntry> = new.iter().collect();

    let removed = old
        .iter()
        .filter(|entry| !new_set.contains(entry))
        .map(|entry| DiffPath {
            entry: entry.clone(),
            is_added: false,
        });

    let added = new
        .iter()
        .filter(|entry| !old_set.contains(entry))
        .map(|entry| DiffPath {
            entry: entry.clone(),
            is_added: true,
        });

    removed.chain(added).collect()
}
