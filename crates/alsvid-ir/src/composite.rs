//! The assembled, validated, immutable operation graph.

use petgraph::graph::DiGraph;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::bloq::{Bloq, BloqRef, DynBloq};
use crate::builder::BloqBuilder;
use crate::error::{BuildError, BuildResult, DecomposeError, DecomposeResult};
use crate::register::Signature;
use crate::soquet::{BloqInstance, Connection, Node, Soquet, SoquetGroup, SoquetMap};

/// A directed acyclic graph of bloq instances joined by connections, with
/// a boundary signature.
///
/// A `CompositeBloq` is produced by [`BloqBuilder::finalize`] and never
/// mutated afterwards. It satisfies [`Bloq`] itself: its decomposition is
/// itself, and every other protocol interprets it node by node in
/// topological order, which is what makes operations compose recursively.
///
/// The `binsts` vector is kept in a valid topological order: a producer
/// always precedes its consumers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeBloq {
    binsts: Vec<BloqInstance>,
    connections: Vec<Connection>,
    signature: Signature,
}

impl CompositeBloq {
    pub(crate) fn from_parts(
        binsts: Vec<BloqInstance>,
        connections: Vec<Connection>,
        signature: Signature,
    ) -> Self {
        Self {
            binsts,
            connections,
            signature,
        }
    }

    /// The contained bloq instances, in topological order.
    pub fn binsts(&self) -> &[BloqInstance] {
        &self.binsts
    }

    /// All connections of the graph.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// The structural adjoint: every node replaced by its adjoint, every
    /// connection reversed, the boundary signature flipped.
    ///
    /// Taking the adjoint twice returns a graph structurally equal to the
    /// original, provided every contained bloq's adjoint is an involution.
    #[must_use]
    pub fn adjoint(&self) -> CompositeBloq {
        fn map_inst(binst: &BloqInstance) -> BloqInstance {
            BloqInstance {
                i: binst.i,
                bloq: binst.bloq.adjoint(),
            }
        }

        fn flip(soq: &Soquet) -> Soquet {
            let node = match &soq.node {
                Node::LeftDangle => Node::RightDangle,
                Node::RightDangle => Node::LeftDangle,
                Node::Inst(binst) => Node::Inst(map_inst(binst)),
            };
            Soquet {
                node,
                reg: soq.reg.adjoint(),
                idx: soq.idx.clone(),
            }
        }

        CompositeBloq {
            binsts: self.binsts.iter().rev().map(map_inst).collect(),
            connections: self
                .connections
                .iter()
                .rev()
                .map(|c| Connection {
                    left: flip(&c.right),
                    right: flip(&c.left),
                })
                .collect(),
            signature: self.signature.adjoint(),
        }
    }

    /// Replace every decomposable node by its decomposition, one level deep.
    ///
    /// Atomic nodes and nodes blocked on symbolic parameters are kept
    /// as-is; wiring failures inside a node's decomposition propagate.
    pub fn flatten_once(&self) -> DecomposeResult<CompositeBloq> {
        let (mut bb, mut initial) = BloqBuilder::from_signature(&self.signature);
        let mut mapping: FxHashMap<Soquet, Soquet> = FxHashMap::default();

        for reg in self.signature.lefts() {
            let group = initial
                .take(&reg.name)
                .expect("from_signature binds every left register");
            for (soq, idx) in group.into_vec().into_iter().zip(reg.indices()) {
                mapping.insert(Soquet::with_idx(Node::LeftDangle, reg.clone(), idx), soq);
            }
        }

        let cons_to_prod: FxHashMap<&Soquet, &Soquet> = self
            .connections
            .iter()
            .map(|c| (&c.right, &c.left))
            .collect();

        for binst in &self.binsts {
            let sig = binst.bloq.signature();
            let node = Node::Inst(binst.clone());
            let mut ins = SoquetMap::new();
            for reg in sig.lefts() {
                let soqs: Vec<Soquet> = reg
                    .indices()
                    .into_iter()
                    .map(|idx| {
                        let inner = Soquet::with_idx(node.clone(), reg.clone(), idx);
                        let prod = cons_to_prod
                            .get(&inner)
                            .expect("validated graph connects every node input");
                        mapping
                            .get(*prod)
                            .expect("producers precede consumers in topological order")
                            .clone()
                    })
                    .collect();
                let group = if reg.shape.is_empty() {
                    SoquetGroup::One(soqs.into_iter().next().expect("one element"))
                } else {
                    SoquetGroup::Array(soqs)
                };
                ins.insert(reg.name.clone(), group);
            }
            let mut outs = match binst.bloq.decompose() {
                Ok(inner) => bb.add_from(&inner, ins)?,
                Err(DecomposeError::Atomic { .. } | DecomposeError::Symbolic { .. }) => {
                    bb.add_ref(binst.bloq.clone(), ins)?
                }
                Err(err @ DecomposeError::Build(_)) => return Err(err),
            };
            for reg in sig.rights() {
                let group = outs
                    .take(&reg.name)
                    .expect("add returns every right register");
                for (outer, idx) in group.into_vec().into_iter().zip(reg.indices()) {
                    mapping.insert(Soquet::with_idx(node.clone(), reg.clone(), idx), outer);
                }
            }
        }

        let mut final_outs = SoquetMap::new();
        for reg in self.signature.rights() {
            let soqs: Vec<Soquet> = reg
                .indices()
                .into_iter()
                .map(|idx| {
                    let inner = Soquet::with_idx(Node::RightDangle, reg.clone(), idx);
                    let prod = cons_to_prod
                        .get(&inner)
                        .expect("validated graph binds every boundary output");
                    mapping
                        .get(*prod)
                        .expect("producers precede consumers in topological order")
                        .clone()
                })
                .collect();
            let group = if reg.shape.is_empty() {
                SoquetGroup::One(soqs.into_iter().next().expect("one element"))
            } else {
                SoquetGroup::Array(soqs)
            };
            final_outs.insert(reg.name.clone(), group);
        }
        let flat = bb.finalize(final_outs)?;
        debug!(
            before = self.binsts.len(),
            after = flat.binsts.len(),
            "flattened one decomposition level"
        );
        Ok(flat)
    }

    /// Repeatedly flatten until every remaining node is a leaf.
    ///
    /// Termination is the caller's obligation for self-similar recursive
    /// bloq families without a base case, exactly as for call-graph
    /// expansion.
    pub fn flatten(&self) -> DecomposeResult<CompositeBloq> {
        let mut current = self.clone();
        loop {
            let any_decomposable = current
                .binsts
                .iter()
                .any(|binst| binst.bloq.decompose().is_ok());
            if !any_decomposable {
                return Ok(current);
            }
            current = current.flatten_once()?;
        }
    }

    /// Verify the structural invariants of the graph.
    ///
    /// Checks that:
    /// - connection endpoints carry equal element bitsizes
    /// - every soquet is produced at most once and consumed at most once
    /// - every node input/output and every boundary soquet is wired
    /// - the `binsts` vector is topologically ordered
    /// - the connection graph is acyclic
    pub fn verify_integrity(&self) -> BuildResult<()> {
        let mut produced: FxHashSet<&Soquet> = FxHashSet::default();
        let mut consumed: FxHashSet<&Soquet> = FxHashSet::default();
        for conn in &self.connections {
            if conn.left.reg.bitsize.simplify() != conn.right.reg.bitsize.simplify() {
                return Err(BuildError::InvalidGraph(format!(
                    "connection {} -> {} joins unequal bitsizes",
                    conn.left, conn.right
                )));
            }
            if !produced.insert(&conn.left) {
                return Err(BuildError::InvalidGraph(format!(
                    "soquet {} is produced more than once",
                    conn.left
                )));
            }
            if !consumed.insert(&conn.right) {
                return Err(BuildError::InvalidGraph(format!(
                    "soquet {} is consumed more than once",
                    conn.right
                )));
            }
        }

        for binst in &self.binsts {
            let sig = binst.bloq.signature();
            let node = Node::Inst(binst.clone());
            for reg in sig.lefts() {
                for idx in reg.indices() {
                    let soq = Soquet::with_idx(node.clone(), reg.clone(), idx);
                    if !consumed.contains(&soq) {
                        return Err(BuildError::InvalidGraph(format!(
                            "node input {soq} has no producing connection"
                        )));
                    }
                }
            }
            for reg in sig.rights() {
                for idx in reg.indices() {
                    let soq = Soquet::with_idx(node.clone(), reg.clone(), idx);
                    if !produced.contains(&soq) {
                        return Err(BuildError::InvalidGraph(format!(
                            "node output {soq} has no consuming connection"
                        )));
                    }
                }
            }
        }

        for reg in self.signature.lefts() {
            for idx in reg.indices() {
                let soq = Soquet::with_idx(Node::LeftDangle, reg.clone(), idx);
                if !produced.contains(&soq) {
                    return Err(BuildError::InvalidGraph(format!(
                        "left-boundary soquet {soq} is not consumed by the graph"
                    )));
                }
            }
        }
        for reg in self.signature.rights() {
            for idx in reg.indices() {
                let soq = Soquet::with_idx(Node::RightDangle, reg.clone(), idx);
                if !consumed.contains(&soq) {
                    return Err(BuildError::InvalidGraph(format!(
                        "right-boundary soquet {soq} is not produced by the graph"
                    )));
                }
            }
        }

        // Topological ordering of the binsts vector.
        let position: FxHashMap<usize, usize> = self
            .binsts
            .iter()
            .enumerate()
            .map(|(pos, binst)| (binst.i, pos))
            .collect();
        if position.len() != self.binsts.len() {
            return Err(BuildError::InvalidGraph(
                "duplicate bloq-instance id".to_string(),
            ));
        }
        for conn in &self.connections {
            if let (Node::Inst(producer), Node::Inst(consumer)) =
                (&conn.left.node, &conn.right.node)
            {
                if position[&producer.i] >= position[&consumer.i] {
                    return Err(BuildError::InvalidGraph(format!(
                        "connection {} -> {} violates topological order",
                        conn.left, conn.right
                    )));
                }
            }
        }

        // Acyclicity of the connection graph.
        let mut graph: DiGraph<(), (), u32> = DiGraph::default();
        let left = graph.add_node(());
        let right = graph.add_node(());
        let indices: FxHashMap<usize, _> = self
            .binsts
            .iter()
            .map(|binst| (binst.i, graph.add_node(())))
            .collect();
        let node_index = |node: &Node| match node {
            Node::LeftDangle => left,
            Node::RightDangle => right,
            Node::Inst(binst) => indices[&binst.i],
        };
        for conn in &self.connections {
            graph.add_edge(node_index(&conn.left.node), node_index(&conn.right.node), ());
        }
        if petgraph::algo::is_cyclic_directed(&graph) {
            return Err(BuildError::InvalidGraph(
                "connection graph contains a cycle".to_string(),
            ));
        }

        Ok(())
    }

    /// Immediate child counts: how many times each distinct bloq value
    /// appears among the contained nodes.
    pub fn child_counts(&self) -> Vec<(BloqRef, u64)> {
        let mut order: Vec<BloqRef> = vec![];
        let mut counts: FxHashMap<BloqRef, u64> = FxHashMap::default();
        for binst in &self.binsts {
            let entry = counts.entry(binst.bloq.clone()).or_insert(0);
            if *entry == 0 {
                order.push(binst.bloq.clone());
            }
            *entry += 1;
        }
        order
            .into_iter()
            .map(|bloq| {
                let count = counts[&bloq];
                (bloq, count)
            })
            .collect()
    }
}

impl Bloq for CompositeBloq {
    fn signature(&self) -> Signature {
        self.signature.clone()
    }

    fn name(&self) -> String {
        "CompositeBloq".to_string()
    }

    /// A composite graph is already decomposed.
    fn decompose(&self) -> DecomposeResult<CompositeBloq> {
        Ok(self.clone())
    }

    fn adjoint(&self) -> BloqRef {
        CompositeBloq::adjoint(self).to_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bloq::DynBloq;
    use crate::register::{Register, Side};
    use crate::soquet::SoquetMap;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct GateA;

    impl Bloq for GateA {
        fn signature(&self) -> Signature {
            Signature::build([("q", 1u64)])
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct GateB;

    impl Bloq for GateB {
        fn signature(&self) -> Signature {
            Signature::build([("q", 1u64)])
        }
    }

    /// Composes `GateA` then `GateB` on one wire.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct AThenB;

    impl Bloq for AThenB {
        fn signature(&self) -> Signature {
            Signature::build([("q", 1u64)])
        }

        fn build_composite(
            &self,
            bb: &mut BloqBuilder,
            mut regs: SoquetMap,
        ) -> DecomposeResult<SoquetMap> {
            let q = regs.take_one("q")?;
            let q = bb.add(GateA, SoquetMap::new().with("q", q))?.take_one("q")?;
            let q = bb.add(GateB, SoquetMap::new().with("q", q))?.take_one("q")?;
            Ok(SoquetMap::new().with("q", q))
        }
    }

    fn two_gate_graph() -> CompositeBloq {
        AThenB.decompose().unwrap()
    }

    #[test]
    fn test_decompose_returns_self() {
        let cbloq = two_gate_graph();
        let again = cbloq.decompose().unwrap();
        assert_eq!(again, cbloq);
    }

    #[test]
    fn test_verify_integrity() {
        two_gate_graph().verify_integrity().unwrap();
    }

    #[test]
    fn test_linear_usage_accounting() {
        let cbloq = two_gate_graph();
        // Producers: LeftDangle + 2 node outputs; consumers mirror them.
        assert_eq!(cbloq.connections().len(), 3);
        let produced: FxHashSet<_> = cbloq.connections().iter().map(|c| &c.left).collect();
        let consumed: FxHashSet<_> = cbloq.connections().iter().map(|c| &c.right).collect();
        assert_eq!(produced.len(), cbloq.connections().len());
        assert_eq!(consumed.len(), cbloq.connections().len());
    }

    #[test]
    fn test_adjoint_reverses_order() {
        let cbloq = two_gate_graph();
        let adj = cbloq.adjoint();
        adj.verify_integrity().unwrap();
        // GateA and GateB have default (wrapper) adjoints.
        let names: Vec<String> = adj.binsts().iter().map(|b| b.bloq.name()).collect();
        assert_eq!(names, vec!["GateB†", "GateA†"]);
    }

    #[test]
    fn test_adjoint_involution() {
        let cbloq = two_gate_graph();
        assert_eq!(cbloq.adjoint().adjoint(), cbloq);
    }

    #[test]
    fn test_composite_adjoint_via_trait_unwraps() {
        let cbloq = two_gate_graph();
        let as_bloq = cbloq.to_ref();
        assert_eq!(as_bloq.adjoint().adjoint(), as_bloq);
    }

    #[test]
    fn test_flatten_once_inlines_nested() {
        let sig = Signature::build([("q", 1u64)]);
        let (mut bb, mut regs) = BloqBuilder::from_signature(&sig);
        let q = regs.take_one("q").unwrap();
        let q = bb
            .add(AThenB, SoquetMap::new().with("q", q))
            .unwrap()
            .take_one("q")
            .unwrap();
        let nested = bb.finalize(SoquetMap::new().with("q", q)).unwrap();
        assert_eq!(nested.binsts().len(), 1);

        let flat = nested.flatten_once().unwrap();
        assert_eq!(flat.binsts().len(), 2);
        flat.verify_integrity().unwrap();

        // A second flatten is a fixed point: GateA and GateB are atomic.
        let flatter = flat.flatten().unwrap();
        assert_eq!(flatter.binsts().len(), 2);
    }

    #[test]
    fn test_child_counts() {
        let sig = Signature::build([("q", 1u64)]);
        let (mut bb, mut regs) = BloqBuilder::from_signature(&sig);
        let mut q = regs.take_one("q").unwrap();
        for _ in 0..3 {
            q = bb
                .add(GateA, SoquetMap::new().with("q", q))
                .unwrap()
                .take_one("q")
                .unwrap();
        }
        let cbloq = bb.finalize(SoquetMap::new().with("q", q)).unwrap();
        let counts = cbloq.child_counts();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].0, GateA.to_ref());
        assert_eq!(counts[0].1, 3);
    }

    #[test]
    fn test_left_right_boundary_views() {
        let sig = Signature::new(vec![
            Register::new("inp", 2u64).with_side(Side::Left),
            Register::new("out", 2u64).with_side(Side::Right),
        ])
        .unwrap();
        let (mut bb, mut regs) = BloqBuilder::from_signature(&sig);
        let inp = regs.take_one("inp").unwrap();
        let bits = bb.split(inp).unwrap();
        let out = bb.join(bits).unwrap();
        let cbloq = bb.finalize(SoquetMap::new().with("out", out)).unwrap();
        cbloq.verify_integrity().unwrap();
        let sig = Bloq::signature(&cbloq);
        assert_eq!(sig.lefts().count(), 1);
        assert_eq!(sig.rights().count(), 1);
    }
}
