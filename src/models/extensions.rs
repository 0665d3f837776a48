use camino::Utf8Path;
use std::collections::BTreeSet;

/// Dynamic libraries take part in shadowing even though they are not run directly.
pub const LIBRARY_EXTENSION: &str = ".dll";

/// Lower-cased file extensions (with leading dot) that count as executables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionSet {
    extensions: BTreeSet<String>,
}

impl ExtensionSet {
    /// Build a set from host-supplied extensions such as `.EXE` or `cmd`.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .filter_map(|ext| normalize_extension(ext.as_ref()))
            .collect();
        Self { extensions }
    }

    /// Build the set used for shadow detection: the host extensions plus `.dll`.
    pub fn for_shadowing<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new(extensions);
        set.extensions.insert(LIBRARY_EXTENSION.to_string());
        set
    }

    /// Parse a `PATHEXT`-style list (`.COM;.EXE;.BAT`).
    pub fn from_pathext(pathext: &str) -> Self {
        Self::new(pathext.split(';'))
    }

    pub fn contains(&self, extension: &str) -> bool {
        normalize_extension(extension).is_some_and(|ext| self.extensions.contains(&ext))
    }

    /// Whether a file name carries one of the recognized extensions
    pub fn matches_file(&self, filename: &str) -> bool {
        Utf8Path::new(filename)
            .extension()
            .is_some_and(|ext| self.extensions.contains(&format!(".{}", ext.to_lowercase())))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!(".{}", trimmed.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions_lowercased() {
        let set = ExtensionSet::new([".EXE", "Cmd", " .bat "]);
        assert!(set.contains(".exe"));
        assert!(set.contains(".cmd"));
        assert!(set.contains("BAT"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_shadowing_set_always_has_dll() {
        let set = ExtensionSet::for_shadowing([".exe"]);
        assert!(set.contains(".dll"));
        assert!(set.contains(".exe"));

        let empty = ExtensionSet::for_shadowing(Vec::<String>::new());
        assert_eq!(empty.iter().collect::<Vec<_>>(), vec![".dll"]);
    }

    #[test]
    fn test_from_pathext() {
        let set = ExtensionSet::from_pathext(".COM;.EXE;;.BAT;");
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![".bat", ".com", ".exe"]);
    }

    #[test]
    fn test_matches_file() {
        let set = ExtensionSet::new([".exe"]);
        assert!(set.matches_file("tool.exe"));
        assert!(set.matches_file("TOOL.EXE"));
        assert!(!set.matches_file("tool.txt"));
        assert!(!set.matches_file("exe"));
        assert!(!set.matches_file("tool"));
    }
}
