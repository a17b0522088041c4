//! Structured outputs of resolution and reduction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::graph::{EdgeKind, NodeKind};
use super::path::ProjectPath;
use super::reachable::ReachableFingerprint;

/// Non-fatal problem found while resolving dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolveWarning {
    /// A directive names a file that no resolution rule could locate.
    ///
    /// The edge is dropped; the directive line itself is still copied.
    UnresolvedReference {
        /// Document containing the directive.
        source: ProjectPath,
        /// 1-based line number of the directive.
        line: usize,
        /// Directive family.
        kind: EdgeKind,
        /// Argument as written in the source.
        target: String,
    },
}

impl fmt::Display for ResolveWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedReference { source, line, kind, target } => {
                write!(f, "{}:{}: unresolved {} reference '{}'", source, line, kind, target)
            }
        }
    }
}

/// How a single output file was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CopyMode {
    /// TeX source with comments removed.
    Stripped {
        /// Number of lines that lost comment text.
        lines_changed: usize,
    },
    /// Byte-for-byte copy.
    Verbatim,
    /// Bibliography restricted to cited entries.
    FilteredBibliography {
        /// Entries written.
        kept: usize,
        /// Entries dropped.
        dropped: usize,
    },
}

/// One file written by the reducer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopiedFile {
    /// Path relative to both roots.
    pub path: ProjectPath,
    /// Role of the file.
    pub kind: NodeKind,
    /// How the content was produced.
    pub mode: CopyMode,
    /// Bytes written.
    pub bytes: u64,
}

/// Summary of one reduction run.
///
/// Produced even when warnings occurred, so callers always get a record of
/// what was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyReport {
    /// Schema version of this report.
    pub schema_version: String,
    /// Identity of the reachable set that was copied.
    pub fingerprint: ReachableFingerprint,
    /// Files written, in write order.
    pub files: Vec<CopiedFile>,
    /// Warnings carried over from resolution.
    pub warnings: Vec<ResolveWarning>,
    /// Total bytes written.
    pub bytes_written: u64,
    /// When the reduction finished.
    pub completed_at: DateTime<Utc>,
}

impl CopyReport {
    /// Number of files written.
    pub fn files_copied(&self) -> usize {
        self.files.len()
    }

    /// Whether the run finished without warnings.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Look up a written file.
    pub fn file(&self, path: &str) -> Option<&CopiedFile> {
        self.files.iter().find(|f| f.path.as_str() == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display() {
        let warning = ResolveWarning::UnresolvedReference {
            source: ProjectPath::parse("sec/intro.tex").unwrap(),
            line: 12,
            kind: EdgeKind::Graphics,
            target: "plots/missing".to_string(),
        };
        assert_eq!(
            warning.to_string(),
            "sec/intro.tex:12: unresolved graphics reference 'plots/missing'"
        );
    }

    #[test]
    fn test_warning_serializes_tagged() {
        let warning = ResolveWarning::UnresolvedReference {
            source: ProjectPath::parse("main.tex").unwrap(),
            line: 3,
            kind: EdgeKind::Input,
            target: "appendix".to_string(),
        };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["type"], "unresolved_reference");
        assert_eq!(json["source"], "main.tex");
        assert_eq!(json["kind"], "input");
    }
}
