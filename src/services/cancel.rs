//! Generation-based cancellation for background scans.
//!
//! Every accepted request gets the next generation number. A [`ScanToken`] stays live
//! only while its generation is the newest one, so bumping the tracker cancels every
//! scan in flight without having to reach them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out generation numbers; the latest one is the only live generation.
#[derive(Debug, Clone, Default)]
pub struct GenerationTracker {
    active: Arc<AtomicU64>,
}

impl GenerationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to a new generation, cancelling tokens of all older ones.
    pub fn next_generation(&self) -> u64 {
        self.active.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    pub fn token_for(&self, generation: u64) -> ScanToken {
        ScanToken {
            active: Arc::clone(&self.active),
            generation,
        }
    }
}

/// Cooperative cancellation check handed to a running scan.
#[derive(Debug, Clone)]
pub struct ScanToken {
    active: Arc<AtomicU64>,
    generation: u64,
}

impl ScanToken {
    /// A token that is never cancelled
    pub fn never() -> Self {
        Self {
            active: Arc::new(AtomicU64::new(0)),
            generation: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.active.load(Ordering::Relaxed) != self.generation
    }
}
