use crate::metrics::ScanMetrics;
use crate::models::ExtensionSet;
use crate::models::path_entry::fold_name;
use camino::Utf8Path;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CachedListing {
    files: Arc<[String]>,
    loaded_at: Instant,
}

/// Memoized, extension-filtered file listings keyed by resolved directory.
///
/// Keys follow the host's file name case rules, so `C:\Tools` and `c:\tools` share one
/// listing on Windows.
///
/// Listings live until invalidated, cleared, or older than the optional TTL. Failed
/// enumerations are returned as empty and not stored, so a directory that was briefly
/// unreachable is tried again on the next request.
#[derive(Debug)]
pub struct DirectoryListingCache {
    listings: RwLock<HashMap<String, CachedListing>>,
    ttl: Option<Duration>,
    metrics: Arc<ScanMetrics>,
}

impl DirectoryListingCache {
    pub fn new() -> Self {
        Self::with_ttl(None)
    }

    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            listings: RwLock::new(HashMap::new()),
            ttl,
            metrics: Arc::new(ScanMetrics::new()),
        }
    }

    /// Report hits and misses into shared metrics
    pub fn with_metrics(mut self, metrics: Arc<ScanMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Files in `dir` whose extension is in `extensions`.
    ///
    /// The cache key is the directory alone; callers are expected to use one extension set
    /// per cache.
    pub fn list(&self, dir: &Utf8Path, extensions: &ExtensionSet) -> Arc<[String]> {
        if let Some(listing) = self.fresh(dir) {
            self.metrics.record_cache_hit();
            return listing;
        }

        self.metrics.record_cache_miss();
        // Enumerate outside the lock; a slow directory must not stall other lookups
        match enumerate_files(dir, extensions) {
            Some(files) => {
                let files: Arc<[String]> = files.into();
                self.listings.write().insert(
                    cache_key(dir),
                    CachedListing {
                        files: Arc::clone(&files),
                        loaded_at: Instant::now(),
                    },
                );
                files
            }
            None => {
                self.metrics.record_enumeration_failure();
                Arc::from(Vec::new())
            }
        }
    }

    /// Drop the listing for one directory. Returns whether one was cached.
    pub fn invalidate(&self, dir: &Utf8Path) -> bool {
        self.listings.write().remove(&cache_key(dir)).is_some()
    }

    pub fn clear(&self) {
        self.listings.write().clear();
    }

    pub fn len(&self) -> usize {
        self.listings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.read().is_empty()
    }

    fn fresh(&self, dir: &Utf8Path) -> Option<Arc<[String]>> {
        let listings = self.listings.read();
        let listing = listings.get(&cache_key(dir))?;
        match self.ttl {
            Some(ttl) if listing.loaded_at.elapsed() >= ttl => None,
            _ => Some(Arc::clone(&listing.files)),
        }
    }
}

impl Default for DirectoryListingCache {
    fn default() -> Self {
        Self::new()
    }
}

fn cache_key(dir: &Utf8Path) -> String {
    fold_name(dir.as_str().trim_end_matches(['/', '\\'])).into_owned()
}

/// `None` when the directory cannot be enumerated at all.
fn enumerate_files(dir: &Utf8Path, extensions: &ExtensionSet) -> Option<Vec<String>> {
    let reader = match dir.read_dir_utf8() {
        Ok(reader) => reader,
        Err(e) => {
            tracing::debug!("Treating {} as empty: {}", dir, e);
            return None;
        }
    };

    let mut files: Vec<String> = reader
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string())
        .filter(|name| extensions.matches_file(name))
        .collect();
    files.sort();

    tracing::debug!("Listed {} matching files in {}", files.len(), dir);
    Some(files)
}
