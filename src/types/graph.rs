//! Dependency graph types.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::path::ProjectPath;

/// Kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// TeX source that is scanned for further references.
    Document,
    /// Graphics file referenced by `\includegraphics`.
    Figure,
    /// Bibliography database (`.bib`).
    Bibliography,
    /// Local bibliography style (`.bst`).
    BibliographyStyle,
    /// Class, package, build or readme file kept alongside the sources.
    Support,
}

impl NodeKind {
    /// Whether nodes of this kind are scanned for references.
    pub fn is_document(&self) -> bool {
        matches!(self, Self::Document)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Figure => write!(f, "figure"),
            Self::Bibliography => write!(f, "bibliography"),
            Self::BibliographyStyle => write!(f, "bibliography_style"),
            Self::Support => write!(f, "support"),
        }
    }
}

/// Directive family that produced an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// `\input`, `\include`, `\subfile`.
    Input,
    /// `\includegraphics`.
    Graphics,
    /// `\bibliography`, `\addbibresource`.
    Bibliography,
    /// `\bibliographystyle`.
    BibliographyStyle,
}

impl EdgeKind {
    /// Node kind of the edge target.
    pub fn target_kind(&self) -> NodeKind {
        match self {
            Self::Input => NodeKind::Document,
            Self::Graphics => NodeKind::Figure,
            Self::Bibliography => NodeKind::Bibliography,
            Self::BibliographyStyle => NodeKind::BibliographyStyle,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Graphics => write!(f, "graphics"),
            Self::Bibliography => write!(f, "bibliography"),
            Self::BibliographyStyle => write!(f, "bibliography_style"),
        }
    }
}

/// Edge in the dependency graph: `source` references `target`.
///
/// Implements `Ord` for deterministic ordering: (source, target, kind).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Referencing document.
    pub source: ProjectPath,
    /// Referenced document or asset.
    pub target: ProjectPath,
    /// Directive family.
    pub kind: EdgeKind,
}

impl Edge {
    /// Create a new edge.
    pub fn new(source: ProjectPath, target: ProjectPath, kind: EdgeKind) -> Self {
        Self { source, target, kind }
    }
}

impl PartialOrd for Edge {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Edge {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.source
            .cmp(&other.source)
            .then_with(|| self.target.cmp(&other.target))
            .then_with(|| self.kind.cmp(&other.kind))
    }
}

/// Directed graph of file references discovered from the main document.
///
/// Nodes keep their kind; out-edges keep discovery order so the graph can be
/// rendered exactly as the sources reference each other.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    root: Option<ProjectPath>,
    nodes: BTreeMap<ProjectPath, NodeKind>,
    /// Out-edges per source, in discovery order.
    adjacency: BTreeMap<ProjectPath, Vec<(ProjectPath, EdgeKind)>>,
    edge_set: BTreeSet<Edge>,
}

impl DependencyGraph {
    /// Create a graph rooted at the main document.
    pub fn new(root: ProjectPath) -> Self {
        let mut graph = Self::default();
        graph.nodes.insert(root.clone(), NodeKind::Document);
        graph.root = Some(root);
        graph
    }

    /// The main document.
    pub fn root(&self) -> Option<&ProjectPath> {
        self.root.as_ref()
    }

    /// Record a node. The first recorded kind wins.
    pub fn add_node(&mut self, path: ProjectPath, kind: NodeKind) {
        self.nodes.entry(path).or_insert(kind);
    }

    /// Record an edge and its target node. Duplicate edges are ignored.
    ///
    /// Returns `true` if the edge was new.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        if self.edge_set.contains(&edge) {
            return false;
        }
        self.add_node(edge.target.clone(), edge.kind.target_kind());
        self.adjacency
            .entry(edge.source.clone())
            .or_default()
            .push((edge.target.clone(), edge.kind));
        self.edge_set.insert(edge);
        true
    }

    /// Kind of a node, if present.
    pub fn kind_of(&self, path: &ProjectPath) -> Option<NodeKind> {
        self.nodes.get(path).copied()
    }

    /// All nodes in path order.
    pub fn nodes(&self) -> impl Iterator<Item = (&ProjectPath, NodeKind)> {
        self.nodes.iter().map(|(p, k)| (p, *k))
    }

    /// All edges in canonical order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edge_set.iter()
    }

    /// Out-edges of a node in discovery order.
    pub fn references_of(&self, path: &ProjectPath) -> &[(ProjectPath, EdgeKind)] {
        self.adjacency.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn num_edges(&self) -> usize {
        self.edge_set.len()
    }

    /// Render the graph as an indented tree from the root, in discovery order.
    ///
    /// A document reached a second time is printed once more with a `(seen)`
    /// marker but not expanded again, so cycles render finitely.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        if let Some(root) = &self.root {
            let mut expanded = BTreeSet::new();
            out.push_str(root.as_str());
            out.push('\n');
            expanded.insert(root.clone());
            self.render_children(root, "", &mut expanded, &mut out);
        }
        out
    }

    fn render_children(
        &self,
        node: &ProjectPath,
        indent: &str,
        expanded: &mut BTreeSet<ProjectPath>,
        out: &mut String,
    ) {
        let children = self.references_of(node);
        for (i, (child, kind)) in children.iter().enumerate() {
            let last = i + 1 == children.len();
            out.push_str(indent);
            out.push_str(if last { "└── " } else { "├── " });
            out.push_str(child.as_str());

            let is_document = kind.target_kind().is_document();
            if is_document && !expanded.insert(child.clone()) {
                out.push_str(" (seen)\n");
                continue;
            }
            if !is_document {
                out.push_str(&format!(" [{}]", kind.target_kind()));
            }
            out.push('\n');

            if is_document {
                let next = format!("{}{}", indent, if last { "    " } else { "│   " });
                self.render_children(child, &next, expanded, out);
            }
        }
    }
}
