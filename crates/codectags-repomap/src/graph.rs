use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

/// Edge payload: `source` references `ident`, defined in `target`, `weight` times.
///
/// # Examples
///
/// ```
/// use codectags_repomap::graph::RefEdge;
///
/// let edge = RefEdge { ident: "parse".into(), weight: 3 };
/// assert_eq!(edge.weight, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEdge {
    /// Identifier the edge is labeled with.
    pub ident: String,
    /// Number of references to `ident` in the source file.
    pub weight: usize,
}

/// Directed multigraph of files linked by identifier references.
///
/// Nodes are repository-relative file paths; an edge `a -> b` labeled `x`
/// means `a` mentions identifier `x`, which `b` defines. Parallel edges carry
/// different identifiers.
///
/// # Examples
///
/// ```
/// use std::collections::{BTreeMap, BTreeSet};
/// use std::path::PathBuf;
/// use codectags_repomap::graph::ReferenceGraph;
///
/// let defines = BTreeMap::from([(
///     "foo".to_string(),
///     BTreeSet::from([PathBuf::from("a.py")]),
/// )]);
/// let references = BTreeMap::from([(
///     "foo".to_string(),
///     vec![PathBuf::from("b.py"), PathBuf::from("b.py")],
/// )]);
/// let graph = ReferenceGraph::build(&defines, &references, false);
/// assert_eq!(graph.node_count(), 2);
/// assert_eq!(graph.edge_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReferenceGraph {
    graph: DiGraph<PathBuf, RefEdge>,
    index: HashMap<PathBuf, NodeIndex>,
}

impl ReferenceGraph {
    /// Build the graph from identifier definers and referencing tokens.
    ///
    /// Only identifiers present in both maps create edges. One edge is added
    /// per (referencer, definer) pair, weighted by how often the referencer
    /// mentions the identifier. Same-file references are dropped unless
    /// `full` is set.
    pub fn build(
        defines: &BTreeMap<String, BTreeSet<PathBuf>>,
        references: &BTreeMap<String, Vec<PathBuf>>,
        full: bool,
    ) -> Self {
        let mut this = Self::default();

        for (ident, definers) in defines {
            let Some(referencers) = references.get(ident) else {
                continue;
            };

            let mut counts: BTreeMap<&PathBuf, usize> = BTreeMap::new();
            for referencer in referencers {
                *counts.entry(referencer).or_default() += 1;
            }

            for (referencer, num_refs) in counts {
                for definer in definers {
                    if referencer == definer && !full {
                        continue;
                    }
                    let from = this.node(referencer);
                    let to = this.node(definer);
                    this.graph.add_edge(
                        from,
                        to,
                        RefEdge {
                            ident: ident.clone(),
                            weight: num_refs,
                        },
                    );
                }
            }
        }

        this
    }

    fn node(&mut self, path: &Path) -> NodeIndex {
        if let Some(&idx) = self.index.get(path) {
            return idx;
        }
        let idx = self.graph.add_node(path.to_path_buf());
        self.index.insert(path.to_path_buf(), idx);
        idx
    }

    /// Number of files in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of (referencer, definer, identifier) edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether `path` takes part in any edge.
    pub fn contains(&self, path: &Path) -> bool {
        self.index.contains_key(path)
    }

    /// Files in insertion order.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.graph.node_weights().map(PathBuf::as_path)
    }

    /// Outgoing edges of `path` as `(definer, edge)` pairs.
    pub fn outgoing(&self, path: &Path) -> Vec<(&Path, &RefEdge)> {
        let Some(&idx) = self.index.get(path) else {
            return Vec::new();
        };
        self.graph
            .edges(idx)
            .map(|e| (self.graph[e.target()].as_path(), e.weight()))
            .collect()
    }

    /// Total outgoing weight of `path`.
    pub fn out_weight(&self, path: &Path) -> usize {
        self.outgoing(path).iter().map(|(_, e)| e.weight).sum()
    }

    pub(crate) fn inner(&self) -> &DiGraph<PathBuf, RefEdge> {
        &self.graph
    }

    pub(crate) fn index_of(&self, path: &Path) -> Option<NodeIndex> {
        self.index.get(path).copied()
    }
}

/// Treat every definition as a reference to itself.
///
/// Used when no file yielded reference tokens, so identifiers defined in more
/// than one file still connect their definers.
pub fn references_from_defines(
    defines: &BTreeMap<String, BTreeSet<PathBuf>>,
) -> BTreeMap<String, Vec<PathBuf>> {
    defines
        .iter()
        .map(|(ident, files)| (ident.clone(), files.iter().cloned().collect()))
        .collect()
}
