//! Call-graph construction and leaf-total accounting.
//!
//! The call graph of a root bloq is the weighted DAG of "whose
//! decomposition contains whom, how many times". Expansion is an iterative
//! worklist with a visited set keyed by (optionally generalized) bloq
//! value, so it is stack-safe for deep hierarchies and terminates whenever
//! the generalizer collapses a recursive family to finitely many nodes.
//! Without a generalizer, a pathological recursive family with no base
//! case produces unboundedly many distinct nodes; bounding that is the
//! caller's obligation.

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::bloq::BloqRef;
use crate::bookkeeping::{Allocate, Free, Join, Partition, Split};
use crate::error::{DecomposeError, ProtocolError, ProtocolResult};
use crate::symbolic::SymInt;

/// A weighted DAG of bloq values, rooted at the queried bloq.
///
/// Edge `(caller, callee, m)` records that `caller`'s immediate children
/// contain `m` instances of `callee`. Multiplicities are [`SymInt`], so
/// symbolically parameterized families report closed-form counts.
#[derive(Debug, Clone)]
pub struct CallGraph {
    graph: DiGraph<BloqRef, SymInt>,
    index: FxHashMap<BloqRef, NodeIndex>,
    root: NodeIndex,
}

impl CallGraph {
    /// The (generalized) root bloq.
    pub fn root(&self) -> &BloqRef {
        &self.graph[self.root]
    }

    /// The underlying weighted graph.
    pub fn graph(&self) -> &DiGraph<BloqRef, SymInt> {
        &self.graph
    }

    /// Number of distinct bloq values in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Check whether a bloq value appears in the graph.
    pub fn contains(&self, bloq: &BloqRef) -> bool {
        self.index.contains_key(bloq)
    }

    /// The multiplicity on the edge from `caller` to `callee`, if any.
    pub fn multiplicity(&self, caller: &BloqRef, callee: &BloqRef) -> Option<&SymInt> {
        let from = *self.index.get(caller)?;
        let to = *self.index.get(callee)?;
        let edge = self.graph.find_edge(from, to)?;
        self.graph.edge_weight(edge)
    }

    /// Immediate callees of a bloq with their multiplicities.
    pub fn callees_of(&self, bloq: &BloqRef) -> Vec<(BloqRef, SymInt)> {
        let Some(&ix) = self.index.get(bloq) else {
            return vec![];
        };
        self.graph
            .edges_directed(ix, Direction::Outgoing)
            .map(|edge| (self.graph[edge.target()].clone(), edge.weight().clone()))
            .collect()
    }

    /// Bloqs with no further callees.
    pub fn leaves(&self) -> impl Iterator<Item = &BloqRef> {
        self.graph.node_indices().filter_map(|ix| {
            if self.graph.edges_directed(ix, Direction::Outgoing).count() == 0 {
                Some(&self.graph[ix])
            } else {
                None
            }
        })
    }

    /// Total multiplicity of every leaf, summed over all paths from the
    /// root.
    ///
    /// Fails with [`ProtocolError::CyclicCallGraph`] when a generalizer
    /// has collapsed a recursive family into a cycle, since path totals
    /// are undefined there.
    pub fn sigma(&self) -> ProtocolResult<FxHashMap<BloqRef, SymInt>> {
        let order = petgraph::algo::toposort(&self.graph, None)
            .map_err(|_| ProtocolError::CyclicCallGraph)?;

        let mut mult: FxHashMap<NodeIndex, SymInt> = FxHashMap::default();
        mult.insert(self.root, SymInt::Const(1));
        for ix in order {
            let m = mult.get(&ix).cloned().unwrap_or(SymInt::Const(0));
            for edge in self.graph.edges_directed(ix, Direction::Outgoing) {
                let contribution = (m.clone() * edge.weight().clone()).simplify();
                let entry = mult.entry(edge.target()).or_insert(SymInt::Const(0));
                *entry = (entry.clone() + contribution).simplify();
            }
        }

        Ok(self
            .leaves()
            .map(|bloq| {
                let ix = self.index[bloq];
                let total = mult.get(&ix).cloned().unwrap_or(SymInt::Const(0));
                (bloq.clone(), total)
            })
            .collect())
    }
}

/// Build the call graph of `root` with no generalizer.
pub fn build_call_graph(root: &BloqRef) -> ProtocolResult<CallGraph> {
    build_call_graph_with(root, |bloq| Some(bloq.clone()))
}

/// Build the call graph of `root`, canonicalizing every node through
/// `generalizer` before the visited-set lookup.
///
/// A generalizer returning `None` excludes that node's subtree from the
/// graph entirely (used to hide bookkeeping from resource reports); a
/// `None` on the root itself is an error.
pub fn build_call_graph_with<F>(root: &BloqRef, generalizer: F) -> ProtocolResult<CallGraph>
where
    F: Fn(&BloqRef) -> Option<BloqRef>,
{
    let root_g = generalizer(root).ok_or_else(|| ProtocolError::GeneralizedRoot {
        bloq: root.name(),
    })?;

    let mut graph: DiGraph<BloqRef, SymInt> = DiGraph::new();
    let mut index: FxHashMap<BloqRef, NodeIndex> = FxHashMap::default();
    let root_ix = graph.add_node(root_g.clone());
    index.insert(root_g.clone(), root_ix);

    let mut stack = vec![root_g];
    let mut expanded: FxHashSet<BloqRef> = FxHashSet::default();
    while let Some(bloq) = stack.pop() {
        if !expanded.insert(bloq.clone()) {
            continue;
        }
        trace!(bloq = %bloq.name(), "expanding call-graph node");

        let counts: Vec<(BloqRef, SymInt)> = match bloq.callees() {
            Some(counts) => counts,
            None => match bloq.decompose() {
                Ok(cbloq) => cbloq
                    .child_counts()
                    .into_iter()
                    .map(|(child, n)| (child, SymInt::Const(n)))
                    .collect(),
                // A bloq with no children is a leaf; expected, not an error.
                Err(DecomposeError::Atomic { .. }) => continue,
                Err(err) => return Err(err.into()),
            },
        };

        let caller_ix = index[&bloq];
        for (callee, count) in counts {
            let Some(callee_g) = generalizer(&callee) else {
                continue;
            };
            let callee_ix = *index
                .entry(callee_g.clone())
                .or_insert_with(|| graph.add_node(callee_g.clone()));
            match graph.find_edge(caller_ix, callee_ix) {
                Some(edge) => {
                    let weight = graph.edge_weight_mut(edge).expect("edge just found");
                    *weight = (weight.clone() + count).simplify();
                }
                None => {
                    graph.add_edge(caller_ix, callee_ix, count.simplify());
                }
            }
            stack.push(callee_g);
        }
    }

    Ok(CallGraph {
        graph,
        index,
        root: root_ix,
    })
}

impl BloqRef {
    /// Build this bloq's call graph with no generalizer.
    pub fn call_graph(&self) -> ProtocolResult<CallGraph> {
        build_call_graph(self)
    }
}

/// Generalizer dropping the builder's bookkeeping operations
/// (split/join/partition/allocate/free) from resource reports.
pub fn ignore_bookkeeping(bloq: &BloqRef) -> Option<BloqRef> {
    if bloq.is::<Split>()
        || bloq.is::<Join>()
        || bloq.is::<Partition>()
        || bloq.is::<Allocate>()
        || bloq.is::<Free>()
    {
        None
    } else {
        Some(bloq.clone())
    }
}
