//! Filesystem source tree.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::SourceTree;
use crate::types::ProjectPath;

/// Directories never scanned.
const IGNORED_DIRS: &[&str] = &[".git", ".svn", ".hg"];

/// Error type for the filesystem tree.
#[derive(Debug, thiserror::Error)]
pub enum FsTreeError {
    /// The root is not a directory.
    #[error("Project root is not a directory: {0}")]
    NotADirectory(PathBuf),
    /// A file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The path was not part of the scanned tree.
    #[error("Not in source tree: {0}")]
    NotInTree(ProjectPath),
}

/// Source tree backed by a directory on disk.
///
/// The file list is captured once at scan time; later changes on disk are
/// not observed by `contains`/`files`.
#[derive(Debug, Clone)]
pub struct FsSourceTree {
    root: PathBuf,
    files: BTreeSet<ProjectPath>,
}

impl FsSourceTree {
    /// Scan every regular file under `root`.
    pub fn scan(root: impl AsRef<Path>) -> Result<Self, FsTreeError> {
        Self::scan_excluding(root, &[])
    }

    /// Scan `root`, skipping the given directories (e.g. an output directory
    /// nested inside the project).
    pub fn scan_excluding(root: impl AsRef<Path>, excluded: &[PathBuf]) -> Result<Self, FsTreeError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(FsTreeError::NotADirectory(root));
        }

        let excluded: Vec<PathBuf> = excluded
            .iter()
            .map(|p| p.canonicalize().unwrap_or_else(|_| p.clone()))
            .collect();

        let mut files = BTreeSet::new();
        let walker = WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let is_ignored = entry.file_type().is_dir()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| IGNORED_DIRS.contains(&name));
                let is_excluded = !excluded.is_empty()
                    && entry
                        .path()
                        .canonicalize()
                        .map(|p| excluded.iter().any(|e| p.starts_with(e)))
                        .unwrap_or(false);
                !is_ignored && !is_excluded
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(
                        path = %err.path().map(|p| p.display().to_string()).unwrap_or_default(),
                        error = %err,
                        "skipping unreadable entry"
                    );
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = match entry.path().strip_prefix(&root) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            match ProjectPath::from_relative(relative) {
                Some(path) => {
                    files.insert(path);
                }
                None => tracing::debug!(path = %relative.display(), "skipping non-UTF-8 path"),
            }
        }

        tracing::debug!(root = %root.display(), files = files.len(), "scanned source tree");
        Ok(Self { root, files })
    }

    /// Root directory of the tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of files.
    pub fn num_files(&self) -> usize {
        self.files.len()
    }
}

impl SourceTree for FsSourceTree {
    type Error = FsTreeError;

    fn contains(&self, path: &ProjectPath) -> bool {
        self.files.contains(path)
    }

    fn read(&self, path: &ProjectPath) -> Result<Vec<u8>, Self::Error> {
        if !self.files.contains(path) {
            return Err(FsTreeError::NotInTree(path.clone()));
        }
        let full = path.to_path(&self.root);
        std::fs::read(&full).map_err(|source| FsTreeError::Io { path: full, source })
    }

    fn files(&self) -> Vec<ProjectPath> {
        self.files.iter().cloned().collect()
    }

    fn local_root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}
