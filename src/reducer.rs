//! Tree reducer.
//!
//! Copies a [`ReachableSet`] out of a source tree into an output directory:
//!
//! | Role | Output |
//! |------|--------|
//! | document | comments stripped per line, line structure kept |
//! | figure, style, support file | byte-for-byte |
//! | bibliography | only cited entries, each verbatim |
//!
//! Relative paths are preserved, so the output mirrors the reachable subset
//! of the input.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use crate::bib::{BibError, BibFilter};
use crate::comments::CommentStripper;
use crate::policy::CleanPolicy;
use crate::store::SourceTree;
use crate::types::{
    CopiedFile, CopyMode, CopyReport, NodeKind, ProjectPath, ReachableSet, ResolveWarning,
};
use crate::REPORT_SCHEMA_VERSION;

/// Error type for reducer operations.
#[derive(Debug, thiserror::Error)]
pub enum ReduceError {
    /// The output directory already has content and overwriting was not requested.
    #[error("Output directory already exists and is not empty: {0}")]
    OutputDirExists(PathBuf),
    /// The output directory is the source root or contains it.
    #[error("Output directory would overwrite the source tree: {0}")]
    OutputIsSource(PathBuf),
    /// A bibliography entry could not be delimited.
    #[error("Malformed bibliography entry '{key}' in {path} at line {line}")]
    MalformedBibEntry {
        /// Bibliography file.
        path: ProjectPath,
        /// 1-based line of the entry.
        line: usize,
        /// Entry key, or its type when no key could be read.
        key: String,
    },
    /// A reachable file could not be read from the source tree.
    #[error("Failed to read {path}: {message}")]
    Source {
        /// File that failed.
        path: ProjectPath,
        /// Store error message.
        message: String,
    },
    /// Writing the output failed.
    #[error("Failed to write {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Reduction options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReduceOptions {
    /// Clear and reuse an existing, non-empty output directory.
    pub overwrite: bool,
}

/// Copies the reachable part of a source tree.
pub struct TreeReducer<S: SourceTree> {
    store: Arc<S>,
    policy: CleanPolicy,
    bib: BibFilter,
}

impl<S: SourceTree> TreeReducer<S> {
    /// Create a reducer for a tree and policy.
    pub fn new(store: Arc<S>, policy: CleanPolicy) -> Self {
        Self { store, policy, bib: BibFilter::new() }
    }

    /// Write `reachable` into `output_dir`.
    ///
    /// Resolution warnings are carried into the report unchanged. A
    /// malformed bibliography aborts the run; files already written are
    /// left in place.
    pub fn reduce(
        &self,
        output_dir: &Path,
        reachable: &ReachableSet,
        warnings: &[ResolveWarning],
        options: ReduceOptions,
    ) -> Result<CopyReport, ReduceError> {
        self.prepare_output(output_dir, options)?;

        let stripper = CommentStripper::new(&self.policy);
        let mut files = Vec::with_capacity(reachable.num_files());
        let mut kept_keys: BTreeSet<String> = BTreeSet::new();

        for doc in &reachable.documents {
            let source = self.store.read_text(doc).map_err(|e| source_error(doc, e))?;
            let stripped = stripper.strip(&source.text);
            let bytes = source.encode(&stripped.text);
            let written = write_file(output_dir, doc, &bytes)?;
            tracing::debug!(path = %doc, lines_changed = stripped.lines_changed, "stripped document");
            files.push(CopiedFile {
                path: doc.clone(),
                kind: NodeKind::Document,
                mode: CopyMode::Stripped { lines_changed: stripped.lines_changed },
                bytes: written,
            });
        }

        for bib in &reachable.bibliographies {
            let source = self.store.read_text(bib).map_err(|e| source_error(bib, e))?;
            let filtered = self
                .bib
                .filter(&source.text, &reachable.citations)
                .map_err(|e| match e {
                    BibError::Malformed { line, key, reason } => {
                        tracing::error!(path = %bib, line, key = %key, reason = %reason, "malformed bibliography entry");
                        ReduceError::MalformedBibEntry { path: bib.clone(), line, key }
                    }
                })?;
            let written = write_file(output_dir, bib, &source.encode(&filtered.text))?;
            tracing::debug!(path = %bib, kept = filtered.kept, dropped = filtered.dropped, "filtered bibliography");
            kept_keys.extend(filtered.kept_keys);
            files.push(CopiedFile {
                path: bib.clone(),
                kind: NodeKind::Bibliography,
                mode: CopyMode::FilteredBibliography { kept: filtered.kept, dropped: filtered.dropped },
                bytes: written,
            });
        }

        if !reachable.bibliographies.is_empty() && !reachable.citations.cites_everything() {
            let missing: Vec<&str> =
                reachable.citations.iter().filter(|k| !kept_keys.contains(*k)).collect();
            if !missing.is_empty() {
                tracing::warn!(count = missing.len(), keys = ?missing, "cited keys not found in any bibliography");
            }
        }

        for (asset, kind) in &reachable.assets {
            let bytes = self.store.read(asset).map_err(|e| source_error(asset, e))?;
            let written = write_file(output_dir, asset, &bytes)?;
            files.push(CopiedFile {
                path: asset.clone(),
                kind: *kind,
                mode: CopyMode::Verbatim,
                bytes: written,
            });
        }

        let bytes_written = files.iter().map(|f| f.bytes).sum();
        tracing::info!(
            output = %output_dir.display(),
            files = files.len(),
            bytes = bytes_written,
            warnings = warnings.len(),
            "reduction complete"
        );

        Ok(CopyReport {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            fingerprint: reachable.fingerprint(),
            files,
            warnings: warnings.to_vec(),
            bytes_written,
            completed_at: Utc::now(),
        })
    }

    fn prepare_output(&self, output_dir: &Path, options: ReduceOptions) -> Result<(), ReduceError> {
        if let Some(root) = self.store.local_root() {
            let root = root.canonicalize().map_err(|source| ReduceError::Io {
                path: root.to_path_buf(),
                source,
            })?;
            if let Ok(output) = output_dir.canonicalize() {
                if root.starts_with(&output) {
                    return Err(ReduceError::OutputIsSource(output_dir.to_path_buf()));
                }
            }
        }

        let io_err = |source| ReduceError::Io { path: output_dir.to_path_buf(), source };

        if output_dir.exists() {
            let populated = !output_dir.is_dir()
                || std::fs::read_dir(output_dir).map_err(io_err)?.next().is_some();
            if populated {
                if !options.overwrite {
                    return Err(ReduceError::OutputDirExists(output_dir.to_path_buf()));
                }
                tracing::info!(output = %output_dir.display(), "clearing existing output directory");
                if output_dir.is_dir() {
                    std::fs::remove_dir_all(output_dir).map_err(io_err)?;
                } else {
                    std::fs::remove_file(output_dir).map_err(io_err)?;
                }
            }
        }

        std::fs::create_dir_all(output_dir).map_err(io_err)
    }
}

fn source_error<E: std::error::Error>(path: &ProjectPath, err: E) -> ReduceError {
    ReduceError::Source { path: path.clone(), message: err.to_string() }
}

fn write_file(output_dir: &Path, path: &ProjectPath, bytes: &[u8]) -> Result<u64, ReduceError> {
    let target = path.to_path(output_dir);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ReduceError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(&target, bytes).map_err(|source| ReduceError::Io { path: target, source })?;
    Ok(bytes.len() as u64)
}
