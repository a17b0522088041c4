//! In-memory source tree for tests and benchmarks.

use std::collections::BTreeMap;

use super::SourceTree;
use crate::types::ProjectPath;

/// Error type for the in-memory tree.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryError {
    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(ProjectPath),
}

/// In-memory source tree.
///
/// Uses a BTreeMap for deterministic iteration order.
#[derive(Debug, Clone, Default)]
pub struct InMemorySourceTree {
    files: BTreeMap<ProjectPath, Vec<u8>>,
}

impl InMemorySourceTree {
    /// Create a new empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file. Paths that do not normalize inside the root are ignored.
    pub fn add_file(&mut self, path: &str, content: impl Into<Vec<u8>>) -> &mut Self {
        if let Some(path) = ProjectPath::parse(path) {
            self.files.insert(path, content.into());
        }
        self
    }

    /// Builder-style variant of [`add_file`](Self::add_file).
    pub fn with_file(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.add_file(path, content);
        self
    }

    /// Number of files.
    pub fn num_files(&self) -> usize {
        self.files.len()
    }
}

impl SourceTree for InMemorySourceTree {
    type Error = InMemoryError;

    fn contains(&self, path: &ProjectPath) -> bool {
        self.files.contains_key(path)
    }

    fn read(&self, path: &ProjectPath) -> Result<Vec<u8>, Self::Error> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| InMemoryError::FileNotFound(path.clone()))
    }

    fn files(&self) -> Vec<ProjectPath> {
        self.files.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_read() {
        let tree = InMemorySourceTree::new()
            .with_file("./sec/../main.tex", "hello")
            .with_file("../escape.tex", "ignored");

        assert_eq!(tree.num_files(), 1);
        let main = ProjectPath::parse("main.tex").unwrap();
        assert!(tree.contains(&main));
        assert_eq!(tree.read(&main).unwrap(), b"hello");
        assert_eq!(tree.read_text(&main).unwrap().text, "hello");
    }

    #[test]
    fn test_missing_file() {
        let tree = InMemorySourceTree::new();
        let err = tree.read(&ProjectPath::parse("x.tex").unwrap()).unwrap_err();
        assert!(matches!(err, InMemoryError::FileNotFound(_)));
    }
}
