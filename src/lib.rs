//! # texprune
//!
//! Minimal, comment-free LaTeX source trees, and proof that they still
//! compile to the same document.
//!
//! texprune answers one question:
//!
//! > Given a main document, which files, figures and bibliography entries
//! > does it **actually need**?
//!
//! ## Core Contract
//!
//! 1. Starting from the main document, follow inclusion, graphics,
//!    bibliography and citation directives to a fixed point (the reachable set)
//! 2. Copy exactly that set into an output directory, stripping comments from
//!    documents and uncited entries from bibliographies
//! 3. Compile both trees and compare the PDFs by hash, text and pixels,
//!    reporting every method's verdict
//!
//! ## Architecture
//!
//! ```text
//! main.tex → DependencyResolver → ReachableSet → TreeReducer → CopyReport
//!                  ↓                                  ↓
//!             SourceTree (fs or memory)          output dir
//!
//! (original, cleaned) → Verifier → Compiler × 2 → hash → text → visual
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same tree + same policy → identical reachable set and fingerprint
//! - Documents are expanded depth-first in source order
//! - Every collection in a report is ordered

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod policy;
pub mod canonical;
pub mod comments;
pub mod store;
pub mod resolver;
pub mod bib;
pub mod reducer;
pub mod discover;
pub mod verify;

// Re-exports
pub use types::{
    CitationSet, CopiedFile, CopyMode, CopyReport, DependencyGraph, DiffLine, DiffPayload, Edge,
    EdgeKind, Method, MethodVerdict, NodeKind, ProjectPath, ReachableFingerprint, ReachableSet, ResolveWarning,
    VerificationReport, Verdict,
};
pub use policy::{CleanPolicy, DirectiveSet};
pub use canonical::{canonical_hash, canonical_hash_hex, content_digest, to_canonical_bytes};
pub use comments::{strip_comments, CommentStripper};
pub use store::{FsSourceTree, InMemorySourceTree, SourceTree};
pub use resolver::{DependencyResolver, Resolution, ResolveError};
pub use bib::{BibError, BibFilter};
pub use reducer::{ReduceError, ReduceOptions, TreeReducer};
pub use discover::{find_main_file, DiscoverError};
pub use verify::{
    Compiler, LatexmkCompiler, PopplerRaster, PopplerText, Rasterizer, TextExtractor, Verifier,
    VerifyError, VerifyOptions,
};

/// Schema version for serialized reports.
pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";

/// Default clean policy version.
pub const DEFAULT_POLICY_VERSION: &str = "clean_policy_v1";
