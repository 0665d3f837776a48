// Scan metrics
//
// Lightweight counters for the conflict engine and directory listing cache

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters shared by the conflict engine, its worker and the listing cache.
///
/// Atomic and lock-free so the scan worker never contends with readers. Logged on
/// shutdown by the host.
#[derive(Debug)]
pub struct ScanMetrics {
    /// Check requests accepted
    pub scans_requested: AtomicU64,

    /// Scans the worker started
    pub scans_started: AtomicU64,

    /// Scans that ran to the last entry
    pub scans_completed: AtomicU64,

    /// Scans abandoned because a newer request arrived
    pub scans_cancelled: AtomicU64,

    /// Listings served from the cache
    pub cache_hits: AtomicU64,

    /// Listings that had to enumerate the directory
    pub cache_misses: AtomicU64,

    /// Directory enumerations that failed and were treated as empty
    pub enumeration_failures: AtomicU64,

    /// Shadowing issues reported
    pub shadow_issues: AtomicU64,

    /// Total time spent in completed scans, in milliseconds
    pub total_scan_time_ms: AtomicU64,

    start_time: Instant,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self {
            scans_requested: AtomicU64::new(0),
            scans_started: AtomicU64::new(0),
            scans_completed: AtomicU64::new(0),
            scans_cancelled: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            enumeration_failures: AtomicU64::new(0),
            shadow_issues: AtomicU64::new(0),
            total_scan_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_scan_requested(&self) {
        self.scans_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scan_started(&self) {
        self.scans_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scan_completed(&self, duration: Duration) {
        self.scans_completed.fetch_add(1, Ordering::Relaxed);
        self.total_scan_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_scan_cancelled(&self) {
        self.scans_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enumeration_failure(&self) {
        self.enumeration_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shadow_issue(&self) {
        self.shadow_issues.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Fraction of listings served from cache, 0.0 when nothing was listed yet
    pub fn cache_hit_ratio(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let total = hits + self.cache_misses.load(Ordering::Relaxed);
        if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Average duration of a completed scan in milliseconds
    pub fn avg_scan_time_ms(&self) -> f64 {
        let total = self.total_scan_time_ms.load(Ordering::Relaxed);
        let count = self.scans_completed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Scan Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Scans: {} requested, {} started, {} completed, {} cancelled (avg: {:.2}ms)",
            self.scans_requested.load(Ordering::Relaxed),
            self.scans_started.load(Ordering::Relaxed),
            self.scans_completed.load(Ordering::Relaxed),
            self.scans_cancelled.load(Ordering::Relaxed),
            self.avg_scan_time_ms()
        );
        tracing::info!(
            "Listing cache: {} hits, {} misses ({:.0}% hit rate), {} failed enumerations",
            self.cache_hits.load(Ordering::Relaxed),
            self.cache_misses.load(Ordering::Relaxed),
            self.cache_hit_ratio() * 100.0,
            self.enumeration_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Shadow issues reported: {}",
            self.shadow_issues.load(Ordering::Relaxed)
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}
