// Editing state
//
// Holds the system and user path lists being edited, remembers what was loaded so the
// host can show a diff before saving, and emits change events for display updates.

use crate::models::{DiffPath, IssueSet, PathEntry, diff_paths};
use crate::services::{ConflictEngine, EngineError};
use crate::store::{Partition, PathStore};
use anyhow::Result;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Change events emitted when the edited lists change
#[derive(Clone, Debug, PartialEq)]
pub enum EditorChange {
    /// A partition was replaced by freshly loaded entries
    PathLoaded { partition: Partition, entries: usize },

    /// Entries were appended to a partition
    EntriesAdded { partition: Partition, count: usize },

    /// An entry was removed
    EntryRemoved { partition: Partition, symbolic: String },

    /// An entry changed position within its partition
    EntryMoved {
        partition: Partition,
        from: usize,
        to: usize,
    },

    /// The current lists were written and are now the saved baseline
    Saved,
}

#[derive(Debug, Default)]
struct EditorLists {
    system: Vec<Arc<IssueSet>>,
    user: Vec<Arc<IssueSet>>,
    saved_system: Vec<PathEntry>,
    saved_user: Vec<PathEntry>,
}

impl EditorLists {
    fn list(&self, partition: Partition) -> &Vec<Arc<IssueSet>> {
        match partition {
            Partition::System => &self.system,
            Partition::User => &self.user,
        }
    }

    fn list_mut(&mut self, partition: Partition) -> &mut Vec<Arc<IssueSet>> {
        match partition {
            Partition::System => &mut self.system,
            Partition::User => &mut self.user,
        }
    }

    fn saved(&self, partition: Partition) -> &Vec<PathEntry> {
        match partition {
            Partition::System => &self.saved_system,
            Partition::User => &self.saved_user,
        }
    }

    fn entries(&self, partition: Partition) -> Vec<PathEntry> {
        self.list(partition)
            .iter()
            .map(|set| set.entry().clone())
            .collect()
    }

    fn contains(&self, entry: &PathEntry) -> bool {
        self.system
            .iter()
            .chain(self.user.iter())
            .any(|set| set.entry() == entry)
    }
}

/// Thread-safe editing state for both path partitions.
///
/// Entries are held as `Arc<IssueSet>` so the conflict engine annotates the same objects
/// the host displays. Clones share state and the change channel.
#[derive(Clone)]
pub struct PathEditorState {
    lists: Arc<RwLock<EditorLists>>,
    change_tx: broadcast::Sender<EditorChange>,
}

impl PathEditorState {
    /// Create empty state with a change channel buffer of 100 events
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(100);
        Self {
            lists: Arc::new(RwLock::new(EditorLists::default())),
            change_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EditorChange> {
        self.change_tx.subscribe()
    }

    /// Replace a partition and make it the saved baseline
    pub fn load(&self, partition: Partition, entries: Vec<PathEntry>) {
        let count = entries.len();
        {
            let mut lists = self.lists.write();
            *lists.list_mut(partition) = entries
                .iter()
                .cloned()
                .map(|entry| Arc::new(IssueSet::new(entry)))
                .collect();
            match partition {
                Partition::System => lists.saved_system = entries,
                Partition::User => lists.saved_user = entries,
            }
        }

        tracing::info!("Loaded {} {} path entries", count, partition);
        self.emit(EditorChange::PathLoaded {
            partition,
            entries: count,
        });
    }

    /// Load both partitions from a store
    pub fn load_from(&self, store: &dyn PathStore) -> Result<()> {
        for partition in Partition::ALL {
            self.load(partition, store.read(partition)?);
        }
        Ok(())
    }

    /// Write both partitions to a store. Partitions the store refuses are skipped with a
    /// warning and stay dirty.
    pub fn save_to(&self, store: &dyn PathStore) -> Result<()> {
        let mut saved_all = true;
        for partition in Partition::ALL {
            if !store.is_writable(partition) {
                tracing::warn!("Skipping save of read-only {} path", partition);
                saved_all = false;
                continue;
            }

            let entries = self.entries(partition);
            store.write(partition, &entries)?;

            let mut lists = self.lists.write();
            match partition {
                Partition::System => lists.saved_system = entries,
                Partition::User => lists.saved_user = entries,
            }
        }

        if saved_all {
            self.emit(EditorChange::Saved);
        }
        Ok(())
    }

    pub fn issue_sets(&self, partition: Partition) -> Vec<Arc<IssueSet>> {
        self.lists.read().list(partition).clone()
    }

    pub fn entries(&self, partition: Partition) -> Vec<PathEntry> {
        self.lists.read().entries(partition)
    }

    /// Append entries that are not already present in either partition.
    ///
    /// Returns the number of entries added.
    pub fn add_entries(&self, partition: Partition, entries: Vec<PathEntry>) -> usize {
        let added = {
            let mut lists = self.lists.write();
            let mut added = 0;
            for entry in entries {
                if lists.contains(&entry) {
                    tracing::debug!("{} is already on the path", entry);
                    continue;
                }
                lists.list_mut(partition).push(Arc::new(IssueSet::new(entry)));
                added += 1;
            }
            added
        };

        if added > 0 {
            self.emit(EditorChange::EntriesAdded {
                partition,
                count: added,
            });
        }
        added
    }

    pub fn remove(&self, partition: Partition, index: usize) -> Option<PathEntry> {
        let removed = {
            let mut lists = self.lists.write();
            let list = lists.list_mut(partition);
            (index < list.len()).then(|| list.remove(index))
        }?;

        let entry = removed.entry().clone();
        self.emit(EditorChange::EntryRemoved {
            partition,
            symbolic: entry.symbolic().to_string(),
        });
        Some(entry)
    }

    /// Move an entry within its partition. Returns `false` for out-of-range indices.
    pub fn move_entry(&self, partition: Partition, from: usize, to: usize) -> bool {
        {
            let mut lists = self.lists.write();
            let list = lists.list_mut(partition);
            if from >= list.len() || to >= list.len() {
                return false;
            }
            let item = list.remove(from);
            list.insert(to, item);
        }

        self.emit(EditorChange::EntryMoved {
            partition,
            from,
            to,
        });
        true
    }

    /// System entries followed by user entries, the order the OS resolves them in
    pub fn combined(&self) -> Vec<Arc<IssueSet>> {
        let lists = self.lists.read();
        lists.system.iter().chain(lists.user.iter()).cloned().collect()
    }

    /// Removed and added entries relative to the saved baseline
    pub fn changes(&self, partition: Partition) -> Vec<DiffPath> {
        let lists = self.lists.read();
        diff_paths(lists.saved(partition), &lists.entries(partition))
    }

    /// Whether any partition differs from its baseline, including order
    pub fn is_dirty(&self) -> bool {
        let lists = self.lists.read();
        Partition::ALL
            .iter()
            .any(|&partition| lists.saved(partition) != &lists.entries(partition))
    }

    /// Make the current lists the saved baseline, for hosts that persist on their own
    pub fn mark_saved(&self) {
        {
            let mut lists = self.lists.write();
            let system = lists.entries(Partition::System);
            let user = lists.entries(Partition::User);
            lists.saved_system = system;
            lists.saved_user = user;
        }
        self.emit(EditorChange::Saved);
    }

    /// Submit the combined path to the conflict engine
    pub fn recheck(&self, engine: &ConflictEngine) -> Result<u64, EngineError> {
        engine.check(&self.combined())
    }

    fn emit(&self, change: EditorChange) {
        // Ignore send errors - it's OK if no one is listening
        let _ = self.change_tx.send(change);
    }
}

impl Default for PathEditorState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryPathStore;

    fn entry(path: &str) -> PathEntry {
        PathEntry::with_variables(path, |_| None)
    }

    fn loaded_state() -> PathEditorState {
        let state = PathEditorState::new();
        state.load(Partition::System, vec![entry("/sys/a"), entry("/sys/b")]);
        state.load(Partition::User, vec![entry("/home/u/bin")]);
        state
    }

    #[test]
    fn test_combined_is_system_then_user() {
        let state = loaded_state();
        let combined: Vec<String> = state
            .combined()
            .iter()
            .map(|set| set.entry().symbolic().to_string())
            .collect();
        assert_eq!(combined, vec!["/sys/a", "/sys/b", "/home/u/bin"]);
        assert!(!state.is_dirty());
    }

    #[test]
    fn test_add_entries_skips_duplicates_across_partitions() {
        let state = loaded_state();
        let mut rx = state.subscribe();

        let added = state.add_entries(
            Partition::User,
            vec![entry("/SYS/A"), entry("/opt/bin"), entry("/opt/bin")],
        );

        assert_eq!(added, 1);
        assert_eq!(state.entries(Partition::User).len(), 2);
        assert_eq!(
            rx.try_recv().unwrap(),
            EditorChange::EntriesAdded {
                partition: Partition::User,
                count: 1
            }
        );
    }

    #[test]
    fn test_changes_against_baseline() {
        let state = loaded_state();
        state.remove(Partition::System, 0);
        state.add_entries(Partition::System, vec![entry("/sys/c")]);

        let changes = state.changes(Partition::System);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].symbolic(), "/sys/a");
        assert!(!changes[0].is_added);
        assert_eq!(changes[1].symbolic(), "/sys/c");
        assert!(changes[1].is_added);
        assert!(state.changes(Partition::User).is_empty());
    }

    #[test]
    fn test_reorder_makes_dirty_without_diff() {
        let state = loaded_state();
        assert!(state.move_entry(Partition::System, 1, 0));
        assert!(state.is_dirty());
        assert!(state.changes(Partition::System).is_empty());
        assert!(!state.move_entry(Partition::System, 0, 5));
    }

    #[test]
    fn test_remove_out_of_range() {
        let state = loaded_state();
        assert!(state.remove(Partition::User, 3).is_none());
        assert_eq!(state.entries(Partition::User).len(), 1);
    }

    #[test]
    fn test_save_skips_read_only_partition() {
        let store = MemoryPathStore::new()
            .with_entries(Partition::System, &["/sys/a"])
            .with_read_only(Partition::System);
        let state = PathEditorState::new();
        state.load_from(&store).unwrap();

        state.add_entries(Partition::System, vec![entry("/sys/z")]);
        state.add_entries(Partition::User, vec![entry("/u/bin")]);
        state.save_to(&store).unwrap();

        assert_eq!(store.read(Partition::User).unwrap().len(), 1);
        assert_eq!(store.read(Partition::System).unwrap().len(), 1);
        assert!(state.is_dirty());
        assert!(state.changes(Partition::User).is_empty());
    }

    #[test]
    fn test_mark_saved_resets_baseline() {
        let state = loaded_state();
        state.remove(Partition::User, 0);
        assert!(state.is_dirty());

        let mut rx = state.subscribe();
        state.mark_saved();

        assert!(!state.is_dirty());
        assert!(state.changes(Partition::User).is_empty());
        assert_eq!(rx.try_recv().unwrap(), EditorChange::Saved);
    }

    #[test]
    fn test_clones_share_state() {
        let state = PathEditorState::new();
        let other = state.clone();
        state.add_entries(Partition::User, vec![entry("/x")]);
        assert_eq!(other.entries(Partition::User).len(), 1);
    }
}
