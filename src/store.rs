//! Persistent store boundary for the ordered path.
//!
//! The engine never persists anything itself. Hosts read the system and user partitions
//! through a [`PathStore`], edit them, and write them back. Symbolic forms are stored so
//! placeholders like `%SystemRoot%` survive a round trip.

use crate::models::PathEntry;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;

/// Separator of the flat path-list format
pub const PATH_LIST_SEPARATOR: char = ';';

/// The two named partitions of the search path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    System,
    User,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::System, Partition::User];
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::System => f.write_str("system"),
            Partition::User => f.write_str("user"),
        }
    }
}

/// Reads and writes the ordered path of each partition.
pub trait PathStore: Send + Sync {
    fn read(&self, partition: Partition) -> Result<Vec<PathEntry>>;

    fn write(&self, partition: Partition, entries: &[PathEntry]) -> Result<()>;

    /// Whether `write` can succeed for this partition without elevation
    fn is_writable(&self, partition: Partition) -> bool;
}

/// Split a `;`-joined path list, dropping empty items.
pub fn parse_path_list(raw: &str) -> Vec<PathEntry> {
    raw.split(PATH_LIST_SEPARATOR)
        .filter(|item| !item.trim().is_empty())
        .map(PathEntry::new)
        .collect()
}

/// Join the symbolic forms with `;`.
pub fn join_path_list(entries: &[PathEntry]) -> String {
    entries
        .iter()
        .map(PathEntry::symbolic)
        .collect::<Vec<_>>()
        .join(&PATH_LIST_SEPARATOR.to_string())
}

/// Split a `PATHEXT`-style list into lower-cased extensions, dropping empty items.
pub fn parse_extensions(pathext: &str) -> Vec<String> {
    pathext
        .split(PATH_LIST_SEPARATOR)
        .map(str::trim)
        .filter(|ext| !ext.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// In-memory store, for tests and hosts without persistence.
#[derive(Debug, Default)]
pub struct MemoryPathStore {
    lists: Mutex<IndexMap<Partition, Vec<String>>>,
    read_only: Vec<Partition>,
}

impl MemoryPathStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse writes to `partition`, like a system partition without elevation
    pub fn with_read_only(mut self, partition: Partition) -> Self {
        self.read_only.push(partition);
        self
    }

    pub fn with_entries(self, partition: Partition, symbolic: &[&str]) -> Self {
        self.lists.lock().insert(
            partition,
            symbolic.iter().map(|s| s.to_string()).collect(),
        );
        self
    }
}

impl PathStore for MemoryPathStore {
    fn read(&self, partition: Partition) -> Result<Vec<PathEntry>> {
        Ok(self
            .lists
            .lock()
            .get(&partition)
            .map(|items| items.iter().map(PathEntry::new).collect())
            .unwrap_or_default())
    }

    fn write(&self, partition: Partition, entries: &[PathEntry]) -> Result<()> {
        if !self.is_writable(partition) {
            anyhow::bail!("The {} path is read-only", partition);
        }
        self.lists.lock().insert(
            partition,
            entries.iter().map(|e| e.symbolic().to_string()).collect(),
        );
        Ok(())
    }

    fn is_writable(&self, partition: Partition) -> bool {
        !self.read_only.contains(&partition)
    }
}

/// YAML file holding one list of symbolic paths per partition:
///
/// ```yaml
/// system:
/// - '%SystemRoot%\system32'
/// user:
/// - C:\Tools\bin
/// ```
#[derive(Debug, Clone)]
pub struct YamlPathStore {
    file: Utf8PathBuf,
}

type StoredLists = IndexMap<Partition, Vec<String>>;

impl YamlPathStore {
    pub fn new(file: impl Into<Utf8PathBuf>) -> Self {
        Self { file: file.into() }
    }

    pub fn file(&self) -> &Utf8Path {
        &self.file
    }

    fn load(&self) -> Result<StoredLists> {
        if !self.file.exists() {
            tracing::debug!("Path store {} not found, starting empty", self.file);
            return Ok(StoredLists::new());
        }

        let contents = fs::read_to_string(&self.file)
            .with_context(|| format!("Failed to read path store: {}", self.file))?;
        let lists: Option<StoredLists> = serde_yaml_ng::from_str(&contents)
            .with_context(|| format!("Failed to parse path store: {}", self.file))?;
        Ok(lists.unwrap_or_default())
    }
}

impl PathStore for YamlPathStore {
    fn read(&self, partition: Partition) -> Result<Vec<PathEntry>> {
        let mut lists = self.load()?;
        let entries: Vec<PathEntry> = lists
            .swap_remove(&partition)
            .unwrap_or_default()
            .iter()
            .filter(|item| !item.trim().is_empty())
            .map(PathEntry::new)
            .collect();

        tracing::info!("Read {} {} path entries from {}", entries.len(), partition, self.file);
        Ok(entries)
    }

    fn write(&self, partition: Partition, entries: &[PathEntry]) -> Result<()> {
        let mut lists = self.load()?;
        for known in Partition::ALL {
            lists.entry(known).or_default();
        }
        lists.insert(
            partition,
            entries.iter().map(|e| e.symbolic().to_string()).collect(),
        );

        let yaml = serde_yaml_ng::to_string(&lists).context("Failed to serialize path store")?;
        if let Some(parent) = self.file.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent))?;
            }
        }
        fs::write(&self.file, yaml)
            .with_context(|| format!("Failed to write path store: {}", self.file))?;

        tracing::info!("Wrote {} {} path entries to {}", entries.len(), partition, self.file);
        Ok(())
    }

    fn is_writable(&self, _partition: Partition) -> bool {
        match fs::metadata(&self.file) {
            Ok(metadata) => !metadata.permissions().readonly(),
            Err(_) => true,
        }
    }
}
