//! Core types for the resolver, reducer and verifier.

pub mod path;
pub mod graph;
pub mod reachable;
pub mod report;
pub mod verdict;

pub use path::ProjectPath;
pub use graph::{DependencyGraph, Edge, EdgeKind, NodeKind};
pub use reachable::{CitationSet, ReachableFingerprint, ReachableSet, WILDCARD_CITATION};
pub use report::{CopiedFile, CopyMode, CopyReport, ResolveWarning};
pub use verdict::{
    DiffLine, DiffOp, DiffPayload, Method, MethodVerdict, PageDifference, Region,
    VerificationReport, Verdict,
};
