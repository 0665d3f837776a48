//! Directory entries of the ordered search path.
//!
//! A [`PathEntry`] carries two forms of the same directory:
//! - the **symbolic** form as stored by the host (`%WINDIR%\System32`)
//! - the **resolved** form: placeholders substituted, absolute, lexically normalized
//!
//! Entries compare equal when their resolved forms match case-insensitively, which is how
//! the target environment treats directory names.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

/// Matches a drive-letter prefix such as `C:`.
static DRIVE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]:").expect("Invalid drive prefix regex"));

/// Characters that can never appear in a directory path.
const ILLEGAL_PATH_CHARS: [char; 4] = ['"', '<', '>', '|'];

/// Environment variables with values this short are never used as placeholders.
const MIN_PLACEHOLDER_VALUE_LEN: usize = 3;

/// One directory in the ordered search path.
#[derive(Debug, Clone)]
pub struct PathEntry {
    symbolic: String,
    resolved: Utf8PathBuf,
    key: String,
}

impl PathEntry {
    /// Create an entry from its symbolic form, expanding placeholders from the process
    /// environment.
    ///
    /// Never fails: illegal characters are stripped and malformed drive-letter paths are
    /// truncated instead of rejected.
    pub fn new(symbolic: impl AsRef<str>) -> Self {
        Self::with_variables(symbolic, |name| std::env::var(name).ok())
    }

    /// Create an entry, resolving `%NAME%` placeholders through `lookup`.
    pub fn with_variables<F>(symbolic: impl AsRef<str>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let symbolic = sanitize(symbolic.as_ref());
        let resolved = resolve(&expand_placeholders(&symbolic, lookup));
        Self::from_parts(symbolic, resolved)
    }

    /// Create an entry for a concrete directory, replacing the longest matching environment
    /// variable value with its placeholder.
    ///
    /// `C:\Windows\System32` becomes `%SystemRoot%\System32` when the snapshot knows
    /// `SystemRoot`. Falls back to the raw path when no variable matches.
    pub fn from_file_path(path: impl AsRef<str>, environment: &EnvironmentSnapshot) -> Self {
        let raw = sanitize(path.as_ref());
        match environment.substitute(&raw) {
            Some(symbolic) => {
                let resolved = resolve(&raw);
                Self::from_parts(symbolic, resolved)
            }
            None => Self::with_variables(raw, |name| environment.lookup(name).map(str::to_owned)),
        }
    }

    fn from_parts(symbolic: String, resolved: Utf8PathBuf) -> Self {
        let key = resolved.as_str().to_lowercase();
        Self {
            symbolic,
            resolved,
            key,
        }
    }

    /// The path with placeholders (`%WINDIR%`, etc.)
    pub fn symbolic(&self) -> &str {
        &self.symbolic
    }

    /// The absolute directory this entry points at
    pub fn resolved(&self) -> &Utf8Path {
        &self.resolved
    }

    /// Whether the directory exists right now. Not cached.
    pub fn exists(&self) -> bool {
        self.resolved.is_dir()
    }

    /// List files in the directory whose name starts with `prefix`.
    ///
    /// Prefix comparison follows the host filesystem's case rules. A directory that cannot
    /// be enumerated yields no matches.
    pub fn find(&self, prefix: &str) -> Vec<PathMatch> {
        let reader = match self.resolved.read_dir_utf8() {
            Ok(reader) => reader,
            Err(e) => {
                tracing::debug!("Cannot enumerate {}: {}", self.resolved, e);
                return Vec::new();
            }
        };

        let mut matches: Vec<PathMatch> = reader
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter(|entry| name_starts_with(entry.file_name(), prefix))
            .map(|entry| PathMatch::new(self.resolved.clone(), entry.file_name()))
            .collect();

        matches.sort_by(|a, b| a.filename.cmp(&b.filename));
        matches
    }
}

impl PartialEq for PathEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PathEntry {}

impl Hash for PathEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for PathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbolic)
    }
}

/// A file found in one of the path's directories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    pub directory: Utf8PathBuf,
    pub filename: String,
}

impl PathMatch {
    pub fn new(directory: impl Into<Utf8PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            filename: filename.into(),
        }
    }

    pub fn full_path(&self) -> Utf8PathBuf {
        self.directory.join(&self.filename)
    }
}

impl fmt::Display for PathMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_path())
    }
}

/// Environment variables usable as placeholders, longest value first.
///
/// Only variables pointing at an existing directory with a value longer than three
/// characters are kept, so short values like `C:\` never swallow a path. Capture once and
/// share; the host decides when a fresh snapshot is needed.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentSnapshot {
    variables: Vec<(String, String)>,
}

impl EnvironmentSnapshot {
    /// Snapshot the process environment
    pub fn capture() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build a snapshot from explicit `(name, value)` pairs.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut variables: Vec<(String, String)> = vars
            .into_iter()
            .map(|(name, value)| {
                let value: String = value.into();
                (name.into(), trim_trailing_separators(&value).to_string())
            })
            .filter(|(_, value)| value.len() > MIN_PLACEHOLDER_VALUE_LEN)
            .filter(|(_, value)| Utf8Path::new(value).is_dir())
            .collect();

        variables.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));

        tracing::debug!("Environment snapshot holds {} directory variables", variables.len());
        Self { variables }
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Value of a captured variable, matched case-insensitively by name
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|(var, _)| var.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Replace the longest variable value that prefixes `path` with `%NAME%`.
    ///
    /// The prefix must end on a path component boundary.
    pub fn substitute(&self, path: &str) -> Option<String> {
        self.variables.iter().find_map(|(name, value)| {
            let head = path.get(..value.len())?;
            let rest = &path[value.len()..];
            let on_boundary = rest.is_empty() || rest.starts_with(['/', '\\']);
            (head.eq_ignore_ascii_case(value) && on_boundary).then(|| format!("%{}%{}", name, rest))
        })
    }
}

/// Strip illegal characters, unify separators and cut off colon-joined garbage.
fn sanitize(input: &str) -> String {
    let mut cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !c.is_control() && !ILLEGAL_PATH_CHARS.contains(c))
        .map(|c| if c == '/' { std::path::MAIN_SEPARATOR } else { c })
        .collect();

    // "C:\tools:D:\bin" keeps only the first drive-rooted segment
    if DRIVE_PREFIX.is_match(&cleaned) {
        if let Some(offset) = cleaned[2..].find(':') {
            cleaned.truncate(offset + 2);
        }
    }

    cleaned
}

/// Substitute `%NAME%` tokens. Unknown names are left in place.
fn expand_placeholders<F>(symbolic: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut expanded = String::with_capacity(symbolic.len());
    let mut rest = symbolic;

    while let Some(start) = rest.find('%') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('%') else {
            break;
        };

        let name = &after[..end];
        expanded.push_str(&rest[..start]);
        match (!name.is_empty()).then(|| lookup(name)).flatten() {
            Some(value) => {
                expanded.push_str(&value);
                rest = &after[end + 1..];
            }
            None => {
                // Keep the opening '%' and retry from the closing one
                expanded.push('%');
                expanded.push_str(name);
                rest = &after[end..];
            }
        }
    }

    expanded.push_str(rest);
    expanded
}

/// Make absolute and normalize lexically, which also drops trailing separators.
fn resolve(expanded: &str) -> Utf8PathBuf {
    let path = Utf8Path::new(expanded);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir()
            .ok()
            .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
        {
            Some(cwd) => cwd.join(path),
            None => path.to_path_buf(),
        }
    };

    let mut normalized = Utf8PathBuf::new();
    for component in absolute.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_str()),
        }
    }
    normalized
}

fn trim_trailing_separators(value: &str) -> &str {
    let trimmed = value.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() { value } else { trimmed }
}

/// Fold a file name the way the host filesystem compares names.
pub(crate) fn fold_name(name: &str) -> Cow<'_, str> {
    if cfg!(windows) {
        Cow::Owned(name.to_lowercase())
    } else {
        Cow::Borrowed(name)
    }
}

pub(crate) fn names_equal(a: &str, b: &str) -> bool {
    fold_name(a) == fold_name(b)
}

fn name_starts_with(name: &str, prefix: &str) -> bool {
    fold_name(name).starts_with(&*fold_name(prefix))
}
