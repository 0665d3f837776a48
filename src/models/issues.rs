use super::PathEntry;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

/// Issue text recorded for entries whose directory is missing.
pub const MISSING_ISSUE: &str = "Does not exist";

/// Buffer size of the per-entry change channel
const CHANGE_CHANNEL_CAPACITY: usize = 32;

/// How loudly an entry should be flagged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AlertLevel {
    /// Directory exists and nothing was found
    Ok = 0,
    /// Directory exists but has issues (shadowed files)
    Warning = 1,
    /// Directory does not exist
    Missing = 2,
}

impl AlertLevel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Change notifications for one [`IssueSet`].
///
/// Every add or clear emits both variants so observers bound to either value refresh.
/// The level carried here uses the directory existence seen at the last clear.
#[derive(Clone, Debug, PartialEq)]
pub enum IssueChange {
    IssuesChanged { count: usize },
    AlertLevelChanged { level: AlertLevel },
}

/// Issues found for one path entry.
///
/// Appended to by the scan worker while display code reads snapshots; the list itself is
/// never handed out.
#[derive(Debug)]
pub struct IssueSet {
    entry: PathEntry,
    issues: Mutex<Vec<String>>,
    /// Existence as of construction or the last `clear_issues`
    directory_present: AtomicBool,
    change_tx: broadcast::Sender<IssueChange>,
}

impl IssueSet {
    pub fn new(entry: PathEntry) -> Self {
        let (change_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let directory_present = AtomicBool::new(entry.exists());
        Self {
            entry,
            issues: Mutex::new(Vec::new()),
            directory_present,
            change_tx,
        }
    }

    pub fn entry(&self) -> &PathEntry {
        &self.entry
    }

    /// Append an issue. Duplicates are kept; insertion order is display order.
    pub fn add_issue(&self, issue: impl Into<String>) {
        let count = {
            let mut issues = self.issues.lock();
            issues.push(issue.into());
            issues.len()
        };
        self.notify(count);
    }

    /// Remove all issues and re-check whether the directory exists.
    pub fn clear_issues(&self) {
        self.issues.lock().clear();
        self.directory_present
            .store(self.entry.exists(), Ordering::Relaxed);
        self.notify(0);
    }

    /// Whether the directory existed at the last `clear_issues` (or at construction)
    pub fn directory_exists(&self) -> bool {
        self.directory_present.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of the issues
    pub fn issues(&self) -> Vec<String> {
        self.issues.lock().clone()
    }

    pub fn issue_count(&self) -> usize {
        self.issues.lock().len()
    }

    /// 2 when the directory is missing, 1 when issues exist, 0 otherwise.
    ///
    /// Checks the directory now, unlike the levels carried by [`IssueChange`].
    pub fn alert_level(&self) -> AlertLevel {
        level_for(self.entry.exists(), self.issue_count())
    }

    /// Subscribe to [`IssueChange`] events
    pub fn subscribe(&self) -> broadcast::Receiver<IssueChange> {
        self.change_tx.subscribe()
    }

    fn notify(&self, count: usize) {
        // Nobody listening is fine
        let _ = self.change_tx.send(IssueChange::IssuesChanged { count });
        let _ = self.change_tx.send(IssueChange::AlertLevelChanged {
            level: level_for(self.directory_exists(), count),
        });
    }
}

fn level_for(exists: bool, count: usize) -> AlertLevel {
    if !exists {
        AlertLevel::Missing
    } else if count > 0 {
        AlertLevel::Warning
    } else {
        AlertLevel::Ok
    }
}

impl From<PathEntry> for IssueSet {
    fn from(entry: PathEntry) -> Self {
        Self::new(entry)
    }
}

impl fmt::Display for IssueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.entry, f)
    }
}
