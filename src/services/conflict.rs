//! Background shadow detection over the ordered search path.
//!
//! # Threading
//!
//! [`ConflictEngine`] owns one dedicated worker thread. Requests travel through a
//! `tokio::sync::watch` channel, which only ever holds the latest value: requests that
//! arrive while a scan runs overwrite each other, and the worker picks up whichever is
//! newest once it is free. Each request gets a generation number from a
//! [`GenerationTracker`]; bumping it makes the running scan's [`ScanToken`] report
//! cancelled, and the scan stops at the next entry boundary.
//!
//! The current path used by prefix search is swapped synchronously inside
//! [`ConflictEngine::check`], before the worker sees the request.

use super::cancel::{GenerationTracker, ScanToken};
use super::listing_cache::DirectoryListingCache;
use super::search::PrefixSearchIndex;
use crate::metrics::ScanMetrics;
use crate::models::path_entry::names_equal;
use crate::models::{ExtensionSet, IssueSet, MISSING_ISSUE, PathEntry, PathMatch};
use camino::Utf8Path;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{broadcast, watch};

/// Buffer size of the scan event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Errors surfaced to the host. Filesystem trouble never shows up here; it becomes an
/// issue string or an empty result instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Conflict engine has been disposed")]
    Disposed,

    #[error("Failed to start scan worker: {0}")]
    Worker(#[from] std::io::Error),
}

/// Progress of background scans, keyed by the generation returned from `check`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanEvent {
    Started { generation: u64, entries: usize },
    Completed { generation: u64, issues: usize },
    Cancelled { generation: u64 },
}

impl ScanEvent {
    pub fn generation(&self) -> u64 {
        match self {
            ScanEvent::Started { generation, .. }
            | ScanEvent::Completed { generation, .. }
            | ScanEvent::Cancelled { generation } => *generation,
        }
    }
}

/// Tuning knobs for [`ConflictEngine::with_options`]
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Expire cached directory listings after this long. `None` keeps them until cleared.
    pub cache_ttl: Option<Duration>,
}

#[derive(Debug)]
struct ScanRequest {
    generation: u64,
    entries: Vec<Arc<IssueSet>>,
}

/// State the worker shares with the engine handle
#[derive(Debug)]
struct ScanContext {
    extensions: ExtensionSet,
    cache: DirectoryListingCache,
    generations: GenerationTracker,
    metrics: Arc<ScanMetrics>,
    events: broadcast::Sender<ScanEvent>,
}

/// Detects shadowed executables in the ordered path on a background worker.
pub struct ConflictEngine {
    context: Arc<ScanContext>,
    index: Arc<PrefixSearchIndex>,
    request_tx: Option<watch::Sender<Option<Arc<ScanRequest>>>>,
    worker: Option<JoinHandle<()>>,
    /// Keeps path swap, cancellation and enqueue of one `check` together
    submit_lock: Mutex<()>,
}

impl ConflictEngine {
    /// Create an engine for the host's executable extensions. `.dll` is always added.
    pub fn new<I, S>(executable_extensions: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_options(executable_extensions, EngineOptions::default())
    }

    pub fn with_options<I, S>(
        executable_extensions: I,
        options: EngineOptions,
    ) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = ExtensionSet::for_shadowing(executable_extensions);
        let metrics = Arc::new(ScanMetrics::new());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let context = Arc::new(ScanContext {
            cache: DirectoryListingCache::with_ttl(options.cache_ttl)
                .with_metrics(Arc::clone(&metrics)),
            extensions: extensions.clone(),
            generations: GenerationTracker::new(),
            metrics,
            events,
        });

        // The worker only needs an executor for `changed().await`; scanning itself is
        // blocking work on this dedicated thread.
        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        let (request_tx, request_rx) = watch::channel(None);

        let worker_context = Arc::clone(&context);
        let worker = thread::Builder::new()
            .name("pathedit-scan".to_string())
            .spawn(move || runtime.block_on(scan_loop(worker_context, request_rx)))?;

        tracing::info!(
            "Conflict engine started with extensions: {}",
            extensions.iter().collect::<Vec<_>>().join(", ")
        );

        Ok(Self {
            context,
            index: Arc::new(PrefixSearchIndex::new(extensions)),
            request_tx: Some(request_tx),
            worker: Some(worker),
            submit_lock: Mutex::new(()),
        })
    }

    /// Scan `path` for missing directories and shadowed files.
    ///
    /// The current path seen by [`search`](Self::search) is replaced before this returns.
    /// Any scan in progress is cancelled; intermediate requests may be skipped, but the
    /// last one submitted always runs to completion. Returns the generation number that
    /// [`ScanEvent`]s for this request carry.
    pub fn check(&self, path: &[Arc<IssueSet>]) -> Result<u64, EngineError> {
        let request_tx = self.request_tx.as_ref().ok_or(EngineError::Disposed)?;
        let _submit = self.submit_lock.lock();

        self.index
            .set_path(path.iter().map(|set| set.entry().clone()).collect());

        let generation = self.context.generations.next_generation();
        self.context.metrics.record_scan_requested();
        request_tx.send_replace(Some(Arc::new(ScanRequest {
            generation,
            entries: path.to_vec(),
        })));

        tracing::debug!("Queued scan {} for {} entries", generation, path.len());
        Ok(generation)
    }

    /// Files in the current path starting with `prefix`; see [`PrefixSearchIndex::search`].
    pub fn search(&self, prefix: &str) -> Result<Vec<PathMatch>, EngineError> {
        self.ensure_live()?;
        Ok(self.index.search(prefix))
    }

    /// Shared handle to the prefix index, for autocomplete surfaces
    pub fn search_index(&self) -> Result<Arc<PrefixSearchIndex>, EngineError> {
        self.ensure_live()?;
        Ok(Arc::clone(&self.index))
    }

    /// The most recently checked path
    pub fn current_path(&self) -> Arc<Vec<PathEntry>> {
        self.index.current_path()
    }

    pub fn extensions(&self) -> &ExtensionSet {
        &self.context.extensions
    }

    pub fn metrics(&self) -> Arc<ScanMetrics> {
        Arc::clone(&self.context.metrics)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.context.events.subscribe()
    }

    /// Forget the cached listing of one directory so the next scan re-reads it
    pub fn invalidate_cache(&self, dir: &Utf8Path) -> bool {
        self.context.cache.invalidate(dir)
    }

    pub fn clear_cache(&self) {
        self.context.cache.clear();
        tracing::debug!("Directory listing cache cleared");
    }

    pub fn is_disposed(&self) -> bool {
        self.request_tx.is_none()
    }

    /// Stop the worker and wait for it to exit. Later calls to `check` or `search` fail
    /// with [`EngineError::Disposed`].
    pub fn dispose(&mut self) {
        let Some(request_tx) = self.request_tx.take() else {
            return;
        };

        self.context.generations.next_generation();
        drop(request_tx);

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Scan worker panicked before shutdown");
            }
        }
        tracing::info!("Conflict engine disposed");
    }

    fn ensure_live(&self) -> Result<(), EngineError> {
        if self.is_disposed() {
            return Err(EngineError::Disposed);
        }
        Ok(())
    }
}

impl Drop for ConflictEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn scan_loop(
    context: Arc<ScanContext>,
    mut request_rx: watch::Receiver<Option<Arc<ScanRequest>>>,
) {
    tracing::debug!("Scan worker running");

    // Ends once the engine drops the sender
    while request_rx.changed().await.is_ok() {
        let request = request_rx.borrow_and_update().clone();
        if let Some(request) = request {
            context.run_scan(&request);
        }
    }

    tracing::debug!("Scan worker stopped");
}

impl ScanContext {
    fn run_scan(&self, request: &ScanRequest) {
        let token = self.generations.token_for(request.generation);
        if token.is_cancelled() {
            self.finish_cancelled(&token);
            return;
        }

        let started = Instant::now();
        self.metrics.record_scan_started();
        let _ = self.events.send(ScanEvent::Started {
            generation: request.generation,
            entries: request.entries.len(),
        });

        let path: Vec<PathEntry> = request
            .entries
            .iter()
            .map(|set| set.entry().clone())
            .collect();
        let mut issues = 0;

        for set in &request.entries {
            if token.is_cancelled() {
                self.finish_cancelled(&token);
                return;
            }
            issues += self.annotate(set, &path, &token);
        }

        let elapsed = started.elapsed();
        self.metrics.record_scan_completed(elapsed);
        tracing::info!(
            "Scan {} finished: {} entries, {} issues in {:.2?}",
            request.generation,
            path.len(),
            issues,
            elapsed
        );
        let _ = self.events.send(ScanEvent::Completed {
            generation: request.generation,
            issues,
        });
    }

    /// Re-evaluate one entry. Returns the number of issues added.
    fn annotate(&self, set: &IssueSet, path: &[PathEntry], token: &ScanToken) -> usize {
        // Refreshes the set's existence flag; the only stat for this entry
        set.clear_issues();

        let entry = set.entry();
        if !set.directory_exists() {
            set.add_issue(MISSING_ISSUE);
            return 1;
        }

        let mut added = 0;
        for file in self.cache.list(entry.resolved(), &self.extensions).iter() {
            if token.is_cancelled() {
                break;
            }

            let Some(provider) = self.first_provider(path, file) else {
                continue;
            };

            if provider != entry {
                set.add_issue(format!("{} shadowed by {}", file, provider.resolved().join(file)));
                self.metrics.record_shadow_issue();
                added += 1;
            }
        }
        added
    }

    /// The earliest entry in `path` whose directory offers `file`.
    fn first_provider<'a>(&self, path: &'a [PathEntry], file: &str) -> Option<&'a PathEntry> {
        path.iter().find(|candidate| {
            self.cache
                .list(candidate.resolved(), &self.extensions)
                .iter()
                .any(|name| names_equal(name, file))
        })
    }

    fn finish_cancelled(&self, token: &ScanToken) {
        self.metrics.record_scan_cancelled();
        tracing::debug!("Scan {} superseded", token.generation());
        let _ = self.events.send(ScanEvent::Cancelled {
            generation: token.generation(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn wait_for_completion(rx: &mut broadcast::Receiver<ScanEvent>, generation: u64) -> usize {
        loop {
            match rx.blocking_recv().unwrap() {
                ScanEvent::Completed { generation: g, issues } if g == generation => return issues,
                _ => continue,
            }
        }
    }

    fn issue_set(dir: &std::path::Path) -> Arc<IssueSet> {
        Arc::new(IssueSet::new(PathEntry::new(dir.to_str().unwrap())))
    }

    #[test]
    fn test_missing_directory_only_gets_one_issue() {
        let temp = TempDir::new().unwrap();
        let missing = issue_set(&temp.path().join("missing"));

        let engine = ConflictEngine::new([".exe"]).unwrap();
        let mut rx = engine.subscribe();
        let generation = engine.check(&[Arc::clone(&missing)]).unwrap();

        assert_eq!(wait_for_completion(&mut rx, generation), 1);
        assert_eq!(missing.issues(), vec![MISSING_ISSUE.to_string()]);
    }

    #[test]
    fn test_dll_always_participates() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        fs::write(a.join("shared.dll"), b"").unwrap();
        fs::write(b.join("shared.dll"), b"").unwrap();

        let engine = ConflictEngine::new(Vec::<String>::new()).unwrap();
        assert!(engine.extensions().contains(".dll"));

        let sets = vec![issue_set(&a), issue_set(&b)];
        let mut rx = engine.subscribe();
        let generation = engine.check(&sets).unwrap();

        assert_eq!(wait_for_completion(&mut rx, generation), 1);
        assert!(sets[0].issues().is_empty());
        assert_eq!(sets[1].issues().len(), 1);
    }

    #[test]
    fn test_current_path_updated_synchronously() {
        let temp = TempDir::new().unwrap();
        let engine = ConflictEngine::new([".exe"]).unwrap();

        engine.check(&[issue_set(temp.path())]).unwrap();
        assert_eq!(engine.current_path().len(), 1);
    }

    #[test]
    fn test_disposed_engine_rejects_calls() {
        let mut engine = ConflictEngine::new([".exe"]).unwrap();
        engine.dispose();
        engine.dispose();

        assert!(engine.is_disposed());
        assert!(matches!(engine.check(&[]), Err(EngineError::Disposed)));
        assert!(matches!(engine.search("a"), Err(EngineError::Disposed)));
    }

    #[test]
    fn test_scan_event_generation() {
        assert_eq!(ScanEvent::Cancelled { generation: 7 }.generation(), 7);
        assert_eq!(
            ScanEvent::Started {
                generation: 3,
                entries: 0
            }
            .generation(),
            3
        );
    }
}
