//! Dependency resolver.
//!
//! Walks a source tree from the main document and computes the closed set of
//! documents, assets and citation keys the document actually needs.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::comments::{SourceLine, SourceLines};
use crate::policy::{CleanPolicy, Directive, DirectiveSet};
use crate::store::SourceTree;
use crate::types::{
    DependencyGraph, Edge, EdgeKind, NodeKind, ProjectPath, ReachableSet, ResolveWarning,
};

/// Error type for resolver operations.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Main file not found under the root.
    #[error("Main file not found: {0}")]
    MissingMainFile(String),
    /// A reachable document exists but could not be read.
    #[error("Failed to read {path}: {message}")]
    Read {
        /// Document that failed.
        path: ProjectPath,
        /// Store error message.
        message: String,
    },
}

/// Output of one resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The closed reachable set.
    pub reachable: ReachableSet,
    /// The graph the set was computed from.
    pub graph: DependencyGraph,
    /// Unresolved references, in discovery order.
    pub warnings: Vec<ResolveWarning>,
}

/// Per-run traversal state, owned by a single `resolve` call.
struct Traversal {
    main: ProjectPath,
    graph: DependencyGraph,
    reachable: ReachableSet,
    warnings: Vec<ResolveWarning>,
    /// Directories from `\graphicspath`, relative to the root.
    graphics_paths: Vec<String>,
}

/// Comment-free code of one document, joined across lines so that directive
/// arguments may span line breaks.
struct CodeBuffer {
    text: String,
    /// Start offset in `text` of each code segment, with its line number.
    starts: Vec<(usize, usize)>,
}

impl CodeBuffer {
    fn collect<'a>(lines: impl Iterator<Item = SourceLine<'a>>, skip_commented_out: bool) -> Self {
        let mut text = String::new();
        let mut starts = Vec::new();
        for line in lines {
            if !(line.commented_out && skip_commented_out) {
                for segment in line.code_segments() {
                    starts.push((text.len(), line.number));
                    text.push_str(segment);
                    text.push('\n');
                }
            }
        }
        Self { text, starts }
    }

    /// Line number of the segment containing `offset`.
    fn line_at(&self, offset: usize) -> usize {
        let idx = self.starts.partition_point(|(start, _)| *start <= offset);
        idx.checked_sub(1).map(|i| self.starts[i].1).unwrap_or(1)
    }
}

/// Dependency resolver over a source tree.
///
/// ## Algorithm
///
/// 1. Seed the stack with the main document
/// 2. Pop a document; skip it if already expanded, else mark it visited,
///    strip its comments and scan the remaining code for recognized
///    directives (arguments may span lines)
/// 3. Record each resolved reference as an edge; push the referenced
///    documents in reverse order, so they are expanded depth-first in the
///    order TeX reads them
/// 4. Unresolved references become warnings; the traversal continues
/// 5. After the fixed point, add style and auxiliary files per the policy
///
/// The visited set only grows and the tree is finite, so every run
/// terminates, cycles included.
pub struct DependencyResolver<S: SourceTree> {
    store: Arc<S>,
    policy: CleanPolicy,
    directives: DirectiveSet,
}

impl<S: SourceTree> DependencyResolver<S> {
    /// Create a resolver for a tree and policy.
    pub fn new(store: Arc<S>, policy: CleanPolicy) -> Self {
        Self { store, policy, directives: DirectiveSet::new() }
    }

    /// Get the policy.
    pub fn policy(&self) -> &CleanPolicy {
        &self.policy
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve everything reachable from `main_file`.
    pub fn resolve(&self, main_file: &str) -> Result<Resolution, ResolveError> {
        let main = self
            .locate_main(main_file)
            .ok_or_else(|| ResolveError::MissingMainFile(main_file.to_string()))?;

        tracing::debug!(main = %main, policy = %self.policy.policy_id(), "resolving dependencies");

        let mut state = Traversal {
            graph: DependencyGraph::new(main.clone()),
            reachable: ReachableSet::new(main.clone(), self.policy.params_hash()),
            warnings: Vec::new(),
            graphics_paths: Vec::new(),
            main: main.clone(),
        };

        let mut visited: BTreeSet<ProjectPath> = BTreeSet::new();
        let mut stack = vec![main.clone()];

        while let Some(doc) = stack.pop() {
            if !visited.insert(doc.clone()) {
                continue;
            }
            if doc != main {
                state.reachable.documents.push(doc.clone());
            }

            let children = self.scan_document(&doc, &mut state, &visited)?;
            stack.extend(children.into_iter().rev());
        }

        self.add_support_files(&mut state);

        tracing::info!(
            documents = state.reachable.documents.len(),
            figures = state.reachable.num_figures(),
            bibliographies = state.reachable.bibliographies.len(),
            citations = state.reachable.citations.len(),
            warnings = state.warnings.len(),
            "dependency resolution complete"
        );

        Ok(Resolution {
            reachable: state.reachable,
            graph: state.graph,
            warnings: state.warnings,
        })
    }

    fn locate_main(&self, main_file: &str) -> Option<ProjectPath> {
        let path = ProjectPath::parse(main_file)?;
        if self.store.contains(&path) {
            return Some(path);
        }
        if !path.has_extension(".tex") {
            let with_ext = ProjectPath::parse(&format!("{}.tex", path))?;
            if self.store.contains(&with_ext) {
                return Some(with_ext);
            }
        }
        None
    }

    /// Scan one document, returning newly discovered documents in order.
    fn scan_document(
        &self,
        doc: &ProjectPath,
        state: &mut Traversal,
        visited: &BTreeSet<ProjectPath>,
    ) -> Result<Vec<ProjectPath>, ResolveError> {
        let source = self.store.read_text(doc).map_err(|e| ResolveError::Read {
            path: doc.clone(),
            message: e.to_string(),
        })?;

        let code = CodeBuffer::collect(
            SourceLines::new(&source.text, &self.policy.verbatim_environments),
            self.policy.skip_comment_environment,
        );

        let mut discovered: Vec<ProjectPath> = Vec::new();
        for (offset, directive) in self.directives.scan_located(&code.text) {
            self.apply(doc, code.line_at(offset), directive, state, visited, &mut discovered);
        }

        Ok(discovered)
    }

    fn apply(
        &self,
        doc: &ProjectPath,
        line: usize,
        directive: Directive<'_>,
        state: &mut Traversal,
        visited: &BTreeSet<ProjectPath>,
        discovered: &mut Vec<ProjectPath>,
    ) {
        match directive {
            Directive::Input(arg) => match self.resolve_source(doc, &state.main, arg, ".tex") {
                Some(target) => {
                    tracing::debug!(source = %doc, target = %target, "input");
                    state.graph.add_edge(Edge::new(doc.clone(), target.clone(), EdgeKind::Input));
                    if !visited.contains(&target) && !discovered.contains(&target) {
                        discovered.push(target);
                    }
                }
                None => Self::unresolved(state, doc, line, EdgeKind::Input, arg),
            },
            Directive::Graphics(arg) => match self.resolve_graphic(doc, state, arg) {
                Some(target) => {
                    tracing::debug!(source = %doc, target = %target, "graphics");
                    state.graph.add_edge(Edge::new(doc.clone(), target.clone(), EdgeKind::Graphics));
                    state.reachable.assets.insert(target, NodeKind::Figure);
                }
                None => Self::unresolved(state, doc, line, EdgeKind::Graphics, arg),
            },
            Directive::GraphicsPath(dirs) => {
                for dir in dirs {
                    let joined = ProjectPath::join(state.main.parent_dir(), dir)
                        .map(|p| p.as_str().to_string())
                        .unwrap_or_default();
                    if !state.graphics_paths.contains(&joined) {
                        state.graphics_paths.push(joined);
                    }
                }
            }
            Directive::Bibliography(names) => {
                for name in names {
                    match self.resolve_source(doc, &state.main, name, ".bib") {
                        Some(target) if target.has_extension(".bib") => {
                            tracing::debug!(source = %doc, target = %target, "bibliography");
                            state.graph.add_edge(Edge::new(
                                doc.clone(),
                                target.clone(),
                                EdgeKind::Bibliography,
                            ));
                            state.reachable.bibliographies.insert(target);
                        }
                        _ => Self::unresolved(state, doc, line, EdgeKind::Bibliography, name),
                    }
                }
            }
            Directive::BibliographyStyle(name) => {
                match self.resolve_source(doc, &state.main, name, ".bst") {
                    Some(target) if target.has_extension(".bst") => {
                        state.graph.add_edge(Edge::new(
                            doc.clone(),
                            target.clone(),
                            EdgeKind::BibliographyStyle,
                        ));
                        state.reachable.assets.insert(target, NodeKind::BibliographyStyle);
                    }
                    _ => tracing::debug!(style = name, "bibliography style not in tree, assuming installed"),
                }
            }
            Directive::Citation(keys) => {
                for key in keys {
                    state.reachable.citations.insert(key);
                }
            }
        }
    }

    fn unresolved(state: &mut Traversal, doc: &ProjectPath, line: usize, kind: EdgeKind, target: &str) {
        let warning = ResolveWarning::UnresolvedReference {
            source: doc.clone(),
            line,
            kind,
            target: target.to_string(),
        };
        tracing::warn!("{}", warning);
        state.warnings.push(warning);
    }

    /// Resolve a document-like reference: the including file's directory,
    /// then the main file's directory, then the root; with the default
    /// extension appended first when absent.
    fn resolve_source(
        &self,
        doc: &ProjectPath,
        main: &ProjectPath,
        arg: &str,
        default_ext: &str,
    ) -> Option<ProjectPath> {
        let names: Vec<String> = if arg.to_ascii_lowercase().ends_with(default_ext) {
            vec![arg.to_string()]
        } else {
            vec![format!("{}{}", arg, default_ext), arg.to_string()]
        };

        let mut bases: Vec<&str> = Vec::with_capacity(3);
        for base in [doc.parent_dir(), main.parent_dir(), ""] {
            if !bases.contains(&base) {
                bases.push(base);
            }
        }

        bases.iter().find_map(|base| {
            names
                .iter()
                .filter_map(|name| ProjectPath::join(base, name))
                .find(|candidate| self.store.contains(candidate))
        })
    }

    /// Resolve a graphics reference against the main file's directory (where
    /// TeX runs), the including file's directory, `\graphicspath` entries and
    /// the policy's search directories, trying each image extension in order.
    fn resolve_graphic(&self, doc: &ProjectPath, state: &Traversal, arg: &str) -> Option<ProjectPath> {
        let mut bases: Vec<&str> = Vec::new();
        let candidates = [state.main.parent_dir(), doc.parent_dir()]
            .into_iter()
            .chain(state.graphics_paths.iter().map(String::as_str))
            .chain(self.policy.graphics_search_dirs.iter().map(String::as_str));
        for base in candidates {
            if !bases.contains(&base) {
                bases.push(base);
            }
        }

        bases.iter().find_map(|base| {
            self.policy
                .image_extensions
                .iter()
                .filter_map(|ext| ProjectPath::join(base, &format!("{}{}", arg, ext)))
                .find(|candidate| self.store.contains(candidate))
        })
    }

    fn add_support_files(&self, state: &mut Traversal) {
        if self.policy.include_style_files {
            for path in self.store.files() {
                if self.policy.is_style_file(path.file_name()) && !state.reachable.contains(&path) {
                    tracing::debug!(path = %path, "keeping style file");
                    state.graph.add_node(path.clone(), NodeKind::Support);
                    state.reachable.assets.insert(path, NodeKind::Support);
                }
            }
        }

        for name in &self.policy.auxiliary_files {
            if let Some(path) = ProjectPath::parse(name) {
                if self.store.contains(&path) && !state.reachable.contains(&path) {
                    tracing::debug!(path = %path, "keeping auxiliary file");
                    state.graph.add_node(path.clone(), NodeKind::Support);
                    state.reachable.assets.insert(path, NodeKind::Support);
                }
            }
        }
    }
}
