use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use codectags_core::{CtagsError, RankConfig};
use petgraph::visit::EdgeRef;

use crate::graph::ReferenceGraph;

/// Weight each focus file receives in the personalization vector.
const FOCUS_WEIGHT: f64 = 1.0;

/// Personalized PageRank over a [`ReferenceGraph`].
///
/// The personalization vector is both the restart distribution and the
/// destination of rank held by files without outgoing references.
///
/// # Examples
///
/// ```
/// use std::collections::{BTreeMap, BTreeSet};
/// use std::path::PathBuf;
/// use codectags_repomap::graph::ReferenceGraph;
/// use codectags_repomap::rank::PageRanker;
///
/// let defines = BTreeMap::from([("foo".to_string(), BTreeSet::from([PathBuf::from("a.py")]))]);
/// let references = BTreeMap::from([("foo".to_string(), vec![PathBuf::from("b.py")])]);
/// let graph = ReferenceGraph::build(&defines, &references, false);
///
/// let ranks = PageRanker::default().rank(&graph, &BTreeMap::new()).unwrap();
/// assert!(ranks[&PathBuf::from("a.py")] > ranks[&PathBuf::from("b.py")]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRanker {
    damping: f64,
    max_iterations: usize,
    tolerance: f64,
}

impl Default for PageRanker {
    fn default() -> Self {
        Self::from(&RankConfig::default())
    }
}

impl From<&RankConfig> for PageRanker {
    fn from(config: &RankConfig) -> Self {
        Self::new(config.damping, config.max_iterations, config.tolerance)
    }
}

impl PageRanker {
    /// Create a ranker with explicit parameters.
    pub fn new(damping: f64, max_iterations: usize, tolerance: f64) -> Self {
        Self {
            damping,
            max_iterations: max_iterations.max(1),
            tolerance,
        }
    }

    /// Rank every file in `graph`; the result sums to 1.
    ///
    /// Personalization entries naming files outside the graph are ignored.
    /// When no entry names a graph file, the uniform distribution is used.
    ///
    /// # Errors
    ///
    /// Returns [`CtagsError::DegenerateGraph`] if the graph has no edges.
    pub fn rank(
        &self,
        graph: &ReferenceGraph,
        personalization: &BTreeMap<PathBuf, f64>,
    ) -> Result<BTreeMap<PathBuf, f64>, CtagsError> {
        if graph.edge_count() == 0 {
            return Err(CtagsError::DegenerateGraph);
        }

        let g = graph.inner();
        let n = g.node_count();
        let uniform = 1.0 / n as f64;

        let mut restart = vec![0.0_f64; n];
        for (path, &weight) in personalization {
            if let Some(idx) = graph.index_of(path) {
                if weight > 0.0 {
                    restart[idx.index()] += weight;
                }
            }
        }
        let restart_total: f64 = restart.iter().sum();
        if restart_total > 0.0 {
            for p in &mut restart {
                *p /= restart_total;
            }
        } else {
            restart.fill(uniform);
        }

        let mut out_weight = vec![0.0_f64; n];
        for edge in g.edge_references() {
            out_weight[edge.source().index()] += edge.weight().weight as f64;
        }

        let d = self.damping;
        let mut ranks = vec![uniform; n];
        let mut converged = false;

        for iteration in 0..self.max_iterations {
            let dangling: f64 = ranks
                .iter()
                .zip(&out_weight)
                .filter(|(_, w)| **w == 0.0)
                .map(|(r, _)| r)
                .sum();

            let mut next = vec![0.0_f64; n];
            for edge in g.edge_references() {
                let src = edge.source().index();
                next[edge.target().index()] +=
                    d * ranks[src] * edge.weight().weight as f64 / out_weight[src];
            }

            let restart_mass = d * dangling + (1.0 - d);
            for (value, p) in next.iter_mut().zip(&restart) {
                *value += restart_mass * p;
            }

            let err: f64 = next.iter().zip(&ranks).map(|(a, b)| (a - b).abs()).sum();
            ranks = next;

            if err < n as f64 * self.tolerance {
                tracing::debug!(iterations = iteration + 1, nodes = n, "pagerank converged");
                converged = true;
                break;
            }
        }

        if !converged {
            tracing::warn!(
                max_iterations = self.max_iterations,
                "pagerank did not converge, using last iterate"
            );
        }

        let total: f64 = ranks.iter().sum();
        if total > 0.0 {
            for r in &mut ranks {
                *r /= total;
            }
        }

        Ok(g
            .node_indices()
            .map(|idx| (g[idx].clone(), ranks[idx.index()]))
            .collect())
    }
}

/// Personalization vector giving each focus file the same fixed weight.
///
/// ```
/// use std::path::PathBuf;
/// use codectags_repomap::rank::personalization_for;
///
/// let p = personalization_for([PathBuf::from("main.py")].iter());
/// assert_eq!(p[&PathBuf::from("main.py")], 1.0);
/// ```
pub fn personalization_for<'a>(
    focus: impl Iterator<Item = &'a PathBuf>,
) -> BTreeMap<PathBuf, f64> {
    focus.map(|path| (path.clone(), FOCUS_WEIGHT)).collect()
}

/// Split each file's rank across its outgoing edges by weight and sum the
/// shares per `(definer, identifier)`.
///
/// Files without outgoing edges contribute nothing here; their rank was
/// already spread by the ranker's dangling handling.
///
/// # Examples
///
/// ```
/// use std::collections::{BTreeMap, BTreeSet};
/// use std::path::PathBuf;
/// use codectags_repomap::graph::ReferenceGraph;
/// use codectags_repomap::rank::distribute;
///
/// let defines = BTreeMap::from([("foo".to_string(), BTreeSet::from([PathBuf::from("a.py")]))]);
/// let references = BTreeMap::from([("foo".to_string(), vec![PathBuf::from("b.py")])]);
/// let graph = ReferenceGraph::build(&defines, &references, false);
/// let ranks = BTreeMap::from([(PathBuf::from("a.py"), 0.6), (PathBuf::from("b.py"), 0.4)]);
///
/// let shares = distribute(&graph, &ranks);
/// assert_eq!(shares[&(PathBuf::from("a.py"), "foo".to_string())], 0.4);
/// ```
pub fn distribute(
    graph: &ReferenceGraph,
    ranks: &BTreeMap<PathBuf, f64>,
) -> BTreeMap<(PathBuf, String), f64> {
    let mut shares: BTreeMap<(PathBuf, String), f64> = BTreeMap::new();

    let sources: BTreeSet<&Path> = graph.files().collect();
    for src in sources {
        let src_rank = ranks.get(src).copied().unwrap_or(0.0);
        let edges = graph.outgoing(src);
        let total: usize = edges.iter().map(|(_, e)| e.weight).sum();
        if total == 0 {
            continue;
        }

        for (dst, edge) in edges {
            let share = src_rank * edge.weight as f64 / total as f64;
            *shares
                .entry((dst.to_path_buf(), edge.ident.clone()))
                .or_default() += share;
        }
    }

    shares
}
