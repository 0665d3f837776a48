//! Services module - the path conflict and discovery engine.
//!
//! Everything here works on [`PathEntry`](crate::models::PathEntry) values and the
//! filesystem only; hosts supply the path and present the results.
//!
//! # Components
//!
//! - [`ConflictEngine`]: single background worker that annotates each entry's
//!   [`IssueSet`](crate::models::IssueSet) with missing-directory and shadowing issues.
//!   New requests cancel and replace the scan in flight.
//! - [`DirectoryListingCache`]: memoized, extension-filtered directory listings shared by
//!   every scan of one engine.
//! - [`PrefixSearchIndex`]: synchronous prefix lookup over the engine's current path,
//!   first directory wins.
//! - [`DirectoryDiscovery`]: cancellable, depth-bounded walk that proposes `bin`
//!   directories to add.
//!
//! # Failure policy
//!
//! Missing or unreadable directories never raise errors. A missing entry becomes the
//! issue "Does not exist"; an unreadable one simply offers no files. Only misuse of a
//! disposed engine is reported, as [`EngineError::Disposed`].

pub mod cancel;
pub mod conflict;
pub mod discovery;
pub mod listing_cache;
pub mod search;

pub use cancel::{GenerationTracker, ScanToken};
pub use conflict::{ConflictEngine, EngineError, EngineOptions, ScanEvent};
pub use discovery::{DirectoryDiscovery, DiscoveryState, LoggingProgress, ProgressSink, os_directory};
pub use listing_cache::DirectoryListingCache;
pub use search::PrefixSearchIndex;
