// pathedit - search path editor engine
//
// This is the library crate containing shadow detection, prefix search, bin directory
// discovery and the editing state hosts build on. The binary crate (main.rs) is a
// command line host.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod store;

// Re-export commonly used types for convenience
pub use config::{ConfigManager, Settings};
pub use models::{AlertLevel, DiffPath, ExtensionSet, IssueSet, PathEntry, PathMatch};
pub use services::{ConflictEngine, DirectoryDiscovery, EngineError, PrefixSearchIndex, ScanEvent};
pub use state::{EditorChange, PathEditorState};
pub use store::{Partition, PathStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
