//! Data models for the path editor engine.
//!
//! - [`PathEntry`]: one directory of the ordered search path (symbolic and resolved form)
//! - [`IssueSet`]: thread-safe issue list attached to an entry, plus its [`AlertLevel`]
//! - [`ExtensionSet`]: the recognized executable extensions
//! - [`DiffPath`]: added/removed lines when comparing two path lists
//!
//! # Architecture Note
//!
//! `PathEntry` values are immutable and replaced rather than edited. `IssueSet` is the only
//! mutable model and is shared as `Arc<IssueSet>` between the scan worker and readers.

pub mod diff;
pub mod extensions;
pub mod issues;
pub mod path_entry;

pub use diff::{DiffPath, diff_paths};
pub use extensions::{ExtensionSet, LIBRARY_EXTENSION};
pub use issues::{AlertLevel, IssueChange, IssueSet, MISSING_ISSUE};
pub use path_entry::{EnvironmentSnapshot, PathEntry, PathMatch};
