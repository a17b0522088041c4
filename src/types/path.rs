//! Root-relative paths for source tree nodes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Path of a file relative to the project root.
///
/// Always `/`-separated and lexically normalized (no `.`, no `..`, no
/// leading or trailing separator). Implements `Ord` so that sets of paths
/// iterate in a deterministic order on every platform.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectPath(String);

impl ProjectPath {
    /// Normalize a relative path string.
    ///
    /// Returns `None` when the path is absolute, empty after normalization,
    /// or climbs above the project root.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('/') || raw.starts_with('\\') || has_drive_prefix(raw) {
            return None;
        }

        let mut parts: Vec<&str> = Vec::new();
        for part in raw.split(['/', '\\']) {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop()?;
                }
                other => parts.push(other),
            }
        }

        if parts.is_empty() {
            None
        } else {
            Some(Self(parts.join("/")))
        }
    }

    /// Build a project path from a filesystem path already relative to the root.
    pub fn from_relative(path: &Path) -> Option<Self> {
        let mut parts = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?.to_string()),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Self::parse(&parts.join("/"))
    }

    /// Get the path as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory containing this path, `""` for files at the root.
    pub fn parent_dir(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    /// Final path component.
    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Extension of the final component including the dot, lowercased.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(name[idx..].to_ascii_lowercase()),
        }
    }

    /// Whether the final component carries the given extension (case-insensitive).
    pub fn has_extension(&self, ext: &str) -> bool {
        self.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Join a relative reference onto a base directory (`""` is the root).
    pub fn join(base_dir: &str, reference: &str) -> Option<Self> {
        if base_dir.is_empty() {
            Self::parse(reference)
        } else {
            Self::parse(&format!("{}/{}", base_dir, reference))
        }
    }

    /// Absolute location of this path under `root`.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for part in self.0.split('/') {
            path.push(part);
        }
        path
    }
}

fn has_drive_prefix(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ProjectPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_dots() {
        let path = ProjectPath::parse("./sections/../sections/intro.tex").unwrap();
        assert_eq!(path.as_str(), "sections/intro.tex");
    }

    #[test]
    fn test_parse_rejects_escape_and_absolute() {
        assert!(ProjectPath::parse("../outside.tex").is_none());
        assert!(ProjectPath::parse("/etc/passwd").is_none());
        assert!(ProjectPath::parse("C:/paper/main.tex").is_none());
        assert!(ProjectPath::parse("  ").is_none());
    }

    #[test]
    fn test_backslashes_become_separators() {
        let path = ProjectPath::parse("figs\\plot.pdf").unwrap();
        assert_eq!(path.as_str(), "figs/plot.pdf");
    }

    #[test]
    fn test_parent_and_extension() {
        let path = ProjectPath::parse("a/b/Fig.PNG").unwrap();
        assert_eq!(path.parent_dir(), "a/b");
        assert_eq!(path.file_name(), "Fig.PNG");
        assert_eq!(path.extension().as_deref(), Some(".png"));
        assert!(path.has_extension(".png"));

        let root = ProjectPath::parse("main.tex").unwrap();
        assert_eq!(root.parent_dir(), "");
        assert!(ProjectPath::parse(".latexmkrc").unwrap().extension().is_none());
    }

    #[test]
    fn test_join() {
        assert_eq!(ProjectPath::join("sec", "a.tex").unwrap().as_str(), "sec/a.tex");
        assert_eq!(ProjectPath::join("sec", "../b.tex").unwrap().as_str(), "b.tex");
        assert_eq!(ProjectPath::join("", "c.tex").unwrap().as_str(), "c.tex");
        assert!(ProjectPath::join("", "../c.tex").is_none());
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let mut paths = vec![
            ProjectPath::parse("z.tex").unwrap(),
            ProjectPath::parse("a/b.tex").unwrap(),
            ProjectPath::parse("a.tex").unwrap(),
        ];
        paths.sort();
        let names: Vec<_> = paths.iter().map(|p| p.as_str()).collect();
        assert_eq!(names, vec!["a.tex", "a/b.tex", "z.tex"]);
    }
}
