//! Reachable set types.
//!
//! ## Invariants
//!
//! 1. **Closure**: every document reachable from the main file through
//!    inclusion directives is in `documents`
//! 2. **Immutability**: a `ReachableSet` is built once by the resolver and only
//!    read afterwards; there are no mutating methods outside the crate
//! 3. **Determinism**: all collections are ordered, so the fingerprint of the
//!    same tree under the same policy is identical across runs

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::graph::NodeKind;
use super::path::ProjectPath;
use crate::canonical::canonical_hash_hex;
use crate::REPORT_SCHEMA_VERSION;

/// Key that keeps every bibliography entry (`\nocite{*}`).
pub const WILDCARD_CITATION: &str = "*";

/// Citation keys found in reachable documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CitationSet(BTreeSet<String>);

impl CitationSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key verbatim. Empty keys are ignored.
    pub fn insert(&mut self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        self.0.insert(key.to_string())
    }

    /// Whether the key was cited.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    /// Whether `\nocite{*}` was seen.
    pub fn cites_everything(&self) -> bool {
        self.0.contains(WILDCARD_CITATION)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no key was cited.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<'a> FromIterator<&'a str> for CitationSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = Self::new();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

/// Content-derived identity of a reachable set.
///
/// Two runs over the same tree with the same policy produce the same
/// fingerprint, which makes reduced trees reproducible and comparable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReachableFingerprint(String);

impl ReachableFingerprint {
    /// Create a fingerprint from a hash string.
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    /// Get the fingerprint as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReachableFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed point of the traversal from the main document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachableSet {
    /// The main document.
    pub main: ProjectPath,
    /// Reachable TeX documents in discovery order (main first).
    pub documents: Vec<ProjectPath>,
    /// Reachable non-document files (figures, styles, support files).
    pub assets: BTreeMap<ProjectPath, NodeKind>,
    /// Referenced bibliography databases.
    pub bibliographies: BTreeSet<ProjectPath>,
    /// Citation keys from reachable documents.
    pub citations: CitationSet,
    /// Hash of the policy the set was resolved under.
    pub policy_hash: String,
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    schema_version: &'a str,
    main: &'a ProjectPath,
    documents: BTreeSet<&'a ProjectPath>,
    assets: &'a BTreeMap<ProjectPath, NodeKind>,
    bibliographies: &'a BTreeSet<ProjectPath>,
    citations: &'a CitationSet,
    policy_hash: &'a str,
}

impl ReachableSet {
    pub(crate) fn new(main: ProjectPath, policy_hash: String) -> Self {
        Self {
            documents: vec![main.clone()],
            main,
            assets: BTreeMap::new(),
            bibliographies: BTreeSet::new(),
            citations: CitationSet::new(),
            policy_hash,
        }
    }

    /// Whether a path is part of the set in any role.
    pub fn contains(&self, path: &ProjectPath) -> bool {
        self.documents.contains(path)
            || self.assets.contains_key(path)
            || self.bibliographies.contains(path)
    }

    /// Total number of files the reducer will write.
    pub fn num_files(&self) -> usize {
        self.documents.len() + self.assets.len() + self.bibliographies.len()
    }

    /// Number of figure assets.
    pub fn num_figures(&self) -> usize {
        self.assets.values().filter(|k| **k == NodeKind::Figure).count()
    }

    /// Compute the content-derived fingerprint.
    ///
    /// Documents are hashed as a set so traversal order does not leak into
    /// the identity.
    pub fn fingerprint(&self) -> ReachableFingerprint {
        let input = FingerprintInput {
            schema_version: REPORT_SCHEMA_VERSION,
            main: &self.main,
            documents: self.documents.iter().collect(),
            assets: &self.assets,
            bibliographies: &self.bibliographies,
            citations: &self.citations,
            policy_hash: &self.policy_hash,
        };
        ReachableFingerprint::new(canonical_hash_hex(&input))
    }
}
