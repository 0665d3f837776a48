//! Bounded-depth search for `bin` directories worth adding to the path.
//!
//! The walk is depth-first and cooperative: the [`ProgressSink`] is told about every
//! directory before it is expanded and asked whether to stop. A directory named `bin` is
//! recorded and not descended into. Directories that cannot be enumerated are skipped.
//!
//! # Examples
//!
//! ```ignore
//! use pathedit::services::{DirectoryDiscovery, LoggingProgress};
//!
//! let progress = LoggingProgress::new();
//! let mut discovery = DirectoryDiscovery::new("C:/Program Files", 4);
//! let candidates = discovery.run(&progress);
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Name of the directories the walk is looking for
const CANDIDATE_DIR_NAME: &str = "bin";

/// Receives walk progress and decides on cancellation.
#[cfg_attr(test, mockall::automock)]
pub trait ProgressSink: Send + Sync {
    /// Called once before the walk starts
    fn begin(&self);

    /// Called for every directory before it is examined
    fn report_progress(&self, directory: &Utf8Path);

    /// Called for every candidate as soon as it is found
    fn report_candidate(&self, candidate: &Utf8Path);

    /// Called once when the walk ends, cancelled or not
    fn done(&self);

    /// Polled at every directory boundary
    fn is_cancelled(&self) -> bool;
}

/// Lifecycle of a single discovery run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    NotStarted,
    Running,
    Completed,
    Cancelled,
}

/// One discovery run rooted at a directory.
#[derive(Debug)]
pub struct DirectoryDiscovery {
    root: Utf8PathBuf,
    max_depth: usize,
    skip_dirs: Vec<String>,
    state: DiscoveryState,
    results: Vec<Utf8PathBuf>,
}

impl DirectoryDiscovery {
    /// Walk at most `max_depth` levels below `root`. The OS installation directory is never
    /// descended into.
    pub fn new(root: impl Into<Utf8PathBuf>, max_depth: usize) -> Self {
        let skip_dirs = os_directory()
            .map(|dir| vec![skip_key(&dir)])
            .unwrap_or_default();

        Self {
            root: root.into(),
            max_depth,
            skip_dirs,
            state: DiscoveryState::NotStarted,
            results: Vec::new(),
        }
    }

    /// Never descend into these directories either
    pub fn with_skip_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Utf8Path>,
    {
        self.skip_dirs
            .extend(dirs.into_iter().map(|dir| skip_key(dir.as_ref())));
        self
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Walk the tree and return every candidate found.
    ///
    /// When the sink cancels, the candidates found before cancellation was observed are
    /// returned. A run happens once; calling again returns the earlier results.
    pub fn run(&mut self, sink: &dyn ProgressSink) -> Vec<Utf8PathBuf> {
        if self.state != DiscoveryState::NotStarted {
            tracing::warn!("Discovery under {} already ran", self.root);
            return self.results.clone();
        }

        tracing::info!(
            "Searching for {} directories under {} (max depth {})",
            CANDIDATE_DIR_NAME,
            self.root,
            self.max_depth
        );

        self.state = DiscoveryState::Running;
        sink.begin();

        let root = self.root.clone();
        let finished = self.visit(&root, 0, sink);

        self.state = if finished {
            DiscoveryState::Completed
        } else {
            DiscoveryState::Cancelled
        };
        sink.done();

        tracing::info!(
            "Discovery {:?} with {} candidates",
            self.state,
            self.results.len()
        );
        self.results.clone()
    }

    /// Returns `false` once cancellation has been observed.
    fn visit(&mut self, dir: &Utf8Path, depth: usize, sink: &dyn ProgressSink) -> bool {
        sink.report_progress(dir);
        if sink.is_cancelled() {
            return false;
        }

        if is_candidate(dir) {
            tracing::debug!("Found candidate {}", dir);
            self.results.push(dir.to_path_buf());
            sink.report_candidate(dir);
            return true;
        }

        if depth >= self.max_depth || self.is_skipped(dir) {
            return true;
        }

        for child in list_subdirectories(dir) {
            if !self.visit(&child, depth + 1, sink) {
                return false;
            }
            if sink.is_cancelled() {
                return false;
            }
        }
        true
    }

    fn is_skipped(&self, dir: &Utf8Path) -> bool {
        let key = skip_key(dir);
        self.skip_dirs.iter().any(|skip| *skip == key)
    }
}

/// The OS installation directory (`%SystemRoot%`), when the environment names one
pub fn os_directory() -> Option<Utf8PathBuf> {
    ["SystemRoot", "windir"]
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .filter(|value| !value.is_empty())
        .map(Utf8PathBuf::from)
}

fn is_candidate(dir: &Utf8Path) -> bool {
    dir.file_name()
        .is_some_and(|name| name.eq_ignore_ascii_case(CANDIDATE_DIR_NAME))
}

fn skip_key(dir: &Utf8Path) -> String {
    dir.as_str().trim_end_matches(['/', '\\']).to_lowercase()
}

/// Immediate subdirectories sorted by name. Unreadable directories have none.
fn list_subdirectories(dir: &Utf8Path) -> Vec<Utf8PathBuf> {
    let reader = match dir.read_dir_utf8() {
        Ok(reader) => reader,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            tracing::debug!("Access denied to {}, skipping", dir);
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!("Cannot enumerate {}: {}", dir, e);
            return Vec::new();
        }
    };

    let mut children: Vec<Utf8PathBuf> = reader
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
        .map(|entry| entry.into_path())
        .collect();
    children.sort();
    children
}

/// A [`ProgressSink`] that logs through `tracing` and is cancelled by calling
/// [`cancel`](Self::cancel), typically from another thread.
#[derive(Debug, Default)]
pub struct LoggingProgress {
    cancelled: AtomicBool,
    visited: AtomicUsize,
    candidates: AtomicUsize,
}

impl LoggingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn visited(&self) -> usize {
        self.visited.load(Ordering::Relaxed)
    }

    pub fn candidates(&self) -> usize {
        self.candidates.load(Ordering::Relaxed)
    }
}

impl ProgressSink for LoggingProgress {
    fn begin(&self) {
        tracing::debug!("Discovery started");
    }

    fn report_progress(&self, directory: &Utf8Path) {
        self.visited.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("Scanning {}", directory);
    }

    fn report_candidate(&self, candidate: &Utf8Path) {
        self.candidates.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Candidate: {}", candidate);
    }

    fn done(&self) {
        tracing::debug!(
            "Discovery done: {} directories visited, {} candidates",
            self.visited(),
            self.candidates()
        );
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn utf8_root(temp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_bin_directories_found_and_not_descended() {
        let temp = TempDir::new().unwrap();
        let root = utf8_root(&temp);
        fs::create_dir_all(root.join("tool/bin/nested/bin")).unwrap();
        fs::create_dir_all(root.join("other/BIN")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();

        let progress = LoggingProgress::new();
        let mut discovery = DirectoryDiscovery::new(root.clone(), 5);
        let found = discovery.run(&progress);

        assert_eq!(found, vec![root.join("other/BIN"), root.join("tool/bin")]);
        assert_eq!(discovery.state(), DiscoveryState::Completed);
        assert_eq!(progress.candidates(), 2);
    }

    #[test]
    fn test_depth_limit() {
        let temp = TempDir::new().unwrap();
        let root = utf8_root(&temp);
        fs::create_dir_all(root.join("a/b/bin")).unwrap();

        let shallow = DirectoryDiscovery::new(root.clone(), 2).run(&LoggingProgress::new());
        assert!(shallow.is_empty());

        let deep = DirectoryDiscovery::new(root.clone(), 3).run(&LoggingProgress::new());
        assert_eq!(deep, vec![root.join("a/b/bin")]);
    }

    #[test]
    fn test_skip_dirs_not_descended() {
        let temp = TempDir::new().unwrap();
        let root = utf8_root(&temp);
        fs::create_dir_all(root.join("windows/bin")).unwrap();
        fs::create_dir_all(root.join("apps/bin")).unwrap();

        let found = DirectoryDiscovery::new(root.clone(), 3)
            .with_skip_dirs([root.join("Windows")])
            .run(&LoggingProgress::new());

        assert_eq!(found, vec![root.join("apps/bin")]);
    }

    #[test]
    fn test_second_run_returns_previous_results() {
        let temp = TempDir::new().unwrap();
        let root = utf8_root(&temp).join("bin");
        fs::create_dir_all(&root).unwrap();

        let mut discovery = DirectoryDiscovery::new(root.clone(), 0);
        let progress = LoggingProgress::new();
        assert_eq!(discovery.run(&progress), vec![root.clone()]);
        assert_eq!(discovery.run(&progress), vec![root]);
        assert_eq!(progress.visited(), 1);
    }

    #[test]
    fn test_sink_protocol_with_mock() {
        let temp = TempDir::new().unwrap();
        let root = utf8_root(&temp);
        fs::create_dir_all(root.join("x/bin")).unwrap();

        let mut sink = MockProgressSink::new();
        sink.expect_begin().times(1).return_const(());
        // root, x, x/bin
        sink.expect_report_progress().times(3).return_const(());
        sink.expect_report_candidate().times(1).return_const(());
        sink.expect_is_cancelled().return_const(false);
        sink.expect_done().times(1).return_const(());

        let found = DirectoryDiscovery::new(root.clone(), 4).run(&sink);
        assert_eq!(found, vec![root.join("x/bin")]);
    }

    #[test]
    fn test_cancelled_before_start_visits_only_root() {
        let temp = TempDir::new().unwrap();
        let root = utf8_root(&temp);
        fs::create_dir_all(root.join("bin")).unwrap();

        let progress = LoggingProgress::new();
        progress.cancel();

        let mut discovery = DirectoryDiscovery::new(root, 3);
        assert!(discovery.run(&progress).is_empty());
        assert_eq!(discovery.state(), DiscoveryState::Cancelled);
        assert_eq!(progress.visited(), 1);
    }
}
