//! Linear-usage assembly of operation graphs.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::bloq::{Bloq, BloqRef, DynBloq};
use crate::bookkeeping::{Allocate, Free, Join, Partition, Split};
use crate::composite::CompositeBloq;
use crate::error::{BuildError, BuildResult};
use crate::register::{Register, Side, Signature};
use crate::soquet::{BloqInstance, Connection, Node, Soquet, SoquetGroup, SoquetMap};
use crate::symbolic::SymInt;

/// Assembles a [`CompositeBloq`] under the linear-usage discipline.
///
/// Soquets are produced by [`BloqBuilder::add`] (and by the initial left
/// boundary) and must each be consumed exactly once, either by a later
/// `add` or by [`BloqBuilder::finalize`]. Double consumption, type
/// mismatches, and dangling soquets are reported at the call that causes
/// them; the builder performs no optimization and no deferred validation.
///
/// Two construction modes are supported:
/// - [`BloqBuilder::from_signature`] for a declared boundary (the common
///   path inside a decomposition);
/// - [`BloqBuilder::new`] + [`BloqBuilder::add_register`] for ad-hoc
///   graphs, where `finalize` infers the right boundary from its bindings.
#[derive(Debug, Default)]
pub struct BloqBuilder {
    binsts: Vec<BloqInstance>,
    connections: Vec<Connection>,
    available: FxHashSet<Soquet>,
    registers: Vec<Register>,
    declared: bool,
}

impl BloqBuilder {
    /// Builder with no declared signature.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder for a declared signature.
    ///
    /// Returns the builder plus one soquet group per left-visible register.
    pub fn from_signature(signature: &Signature) -> (Self, SoquetMap) {
        let mut bb = Self {
            registers: signature.registers().to_vec(),
            declared: true,
            ..Self::default()
        };
        let mut initial = SoquetMap::new();
        for reg in signature.lefts() {
            let group = bb.produce_group(&Node::LeftDangle, reg);
            initial.insert(reg.name.clone(), group);
        }
        (bb, initial)
    }

    /// Add a register to an auto-registering builder.
    ///
    /// Returns the register's initial soquets when it is visible on the
    /// left boundary, `None` for a right-only register.
    ///
    /// # Panics
    ///
    /// Panics if the builder was created with
    /// [`BloqBuilder::from_signature`]; a declared boundary cannot grow.
    pub fn add_register(&mut self, reg: Register) -> Option<SoquetGroup> {
        assert!(
            !self.declared,
            "add_register is only valid on auto-registering builders"
        );
        let group = reg
            .side
            .appears_left()
            .then(|| self.produce_group(&Node::LeftDangle, &reg));
        self.registers.push(reg);
        group
    }

    /// Append `bloq` to the graph.
    ///
    /// Consumes one soquet group per left-visible register of the bloq's
    /// signature and returns one fresh group per right-visible register.
    pub fn add<B: Bloq>(&mut self, bloq: B, ins: SoquetMap) -> BuildResult<SoquetMap> {
        self.add_ref(bloq.to_ref(), ins)
    }

    /// Append an already type-erased bloq to the graph.
    pub fn add_ref(&mut self, bloq: BloqRef, mut ins: SoquetMap) -> BuildResult<SoquetMap> {
        let sig = bloq.signature();
        let bloq_name = bloq.name();
        let binst = BloqInstance {
            i: self.binsts.len(),
            bloq,
        };
        let node = Node::Inst(binst.clone());
        for reg in sig.lefts() {
            let group = ins
                .take(&reg.name)
                .ok_or_else(|| BuildError::MissingSoquets {
                    name: reg.name.clone(),
                })?;
            self.consume_group(&node, reg, group)?;
        }
        if let Some(extra) = ins.names().next() {
            return Err(BuildError::UnknownRegister {
                target: bloq_name,
                name: extra.to_string(),
            });
        }
        let mut outs = SoquetMap::new();
        for reg in sig.rights() {
            let group = self.produce_group(&node, reg);
            outs.insert(reg.name.clone(), group);
        }
        self.binsts.push(binst);
        Ok(outs)
    }

    /// Split a bitsize-`n` soquet into `n` bitsize-1 soquets.
    ///
    /// Bit order is big-endian: element 0 is the most significant bit.
    pub fn split(&mut self, soq: Soquet) -> BuildResult<Vec<Soquet>> {
        let n = soq
            .reg
            .bitsize
            .as_u64()
            .ok_or_else(|| BuildError::SymbolicWidth {
                context: "split a register".to_string(),
                bitsize: soq.reg.bitsize.clone(),
            })?;
        let mut outs = self.add(Split::new(n), SoquetMap::new().with("reg", soq))?;
        outs.take_array("reg")
    }

    /// Join bitsize-1 soquets into one bitsize-`n` soquet (inverse of
    /// [`BloqBuilder::split`]).
    pub fn join(&mut self, soqs: Vec<Soquet>) -> BuildResult<Soquet> {
        if soqs.is_empty() {
            return Err(BuildError::EmptyJoin);
        }
        let n = u64::try_from(soqs.len()).expect("soquet count fits in u64");
        let mut outs = self.add(Join::new(n), SoquetMap::new().with("reg", soqs))?;
        outs.take_one("reg")
    }

    /// Regroup a flat soquet into the named sub-registers of `parts`.
    ///
    /// Fields are laid out most-significant first, in `parts` order.
    pub fn partition(&mut self, soq: Soquet, parts: Vec<Register>) -> BuildResult<SoquetMap> {
        let p = Partition::new(soq.reg.bitsize.clone(), parts)?;
        self.add(p, SoquetMap::new().with("x", soq))
    }

    /// Merge named sub-registers back into one flat soquet (inverse of
    /// [`BloqBuilder::partition`]).
    pub fn unpartition(&mut self, ins: SoquetMap, parts: Vec<Register>) -> BuildResult<Soquet> {
        let total = Partition::parts_total(&parts);
        let p = Partition::unpartition(total, parts)?;
        let mut outs = self.add(p, ins)?;
        outs.take_one("x")
    }

    /// Allocate a fresh `bitsize`-wide soquet in the all-zero state.
    pub fn allocate(&mut self, bitsize: impl Into<SymInt>) -> BuildResult<Soquet> {
        let mut outs = self.add(Allocate::new(bitsize), SoquetMap::new())?;
        outs.take_one("reg")
    }

    /// Discard a soquet (which must carry the all-zero state).
    pub fn free(&mut self, soq: Soquet) -> BuildResult<()> {
        let bitsize = soq.reg.bitsize.clone();
        self.add(Free::new(bitsize), SoquetMap::new().with("reg", soq))?;
        Ok(())
    }

    /// Inline an already-built composite graph, node by node.
    ///
    /// The composite's boundary registers bind like an ordinary bloq's,
    /// but its contained nodes are spliced into this builder directly
    /// instead of appearing as a single nested node.
    pub fn add_from(&mut self, cbloq: &CompositeBloq, mut ins: SoquetMap) -> BuildResult<SoquetMap> {
        let mut mapping: FxHashMap<Soquet, Soquet> = FxHashMap::default();

        for reg in cbloq.signature().lefts() {
            let group = ins
                .take(&reg.name)
                .ok_or_else(|| BuildError::MissingSoquets {
                    name: reg.name.clone(),
                })?;
            if group.len() != reg.num_elements() {
                return Err(BuildError::ShapeMismatch {
                    register: reg.name.clone(),
                    expected: reg.num_elements(),
                    got: group.len(),
                });
            }
            for (soq, idx) in group.into_vec().into_iter().zip(reg.indices()) {
                if soq.reg.bitsize.simplify() != reg.bitsize.simplify() {
                    return Err(BuildError::BitsizeMismatch {
                        register: reg.name.clone(),
                        soquet: soq.to_string(),
                        expected: reg.bitsize.clone(),
                        got: soq.reg.bitsize.clone(),
                    });
                }
                mapping.insert(Soquet::with_idx(Node::LeftDangle, reg.clone(), idx), soq);
            }
        }
        if let Some(extra) = ins.names().next() {
            return Err(BuildError::UnknownRegister {
                target: "inlined graph".to_string(),
                name: extra.to_string(),
            });
        }

        let cons_to_prod: FxHashMap<&Soquet, &Soquet> = cbloq
            .connections()
            .iter()
            .map(|c| (&c.right, &c.left))
            .collect();

        for binst in cbloq.binsts() {
            let sig = binst.bloq.signature();
            let node = Node::Inst(binst.clone());
            let mut sub_ins = SoquetMap::new();
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
                sub_ins.insert(reg.name.clone(), group_from_vec(reg, soqs));
            }
            let mut outs = self.add_ref(binst.bloq.clone(), sub_ins)?;
            for reg in sig.rights() {
                let group = outs
                    .take(&reg.name)
                    .expect("add returns every right register");
                for (outer, idx) in group.into_vec().into_iter().zip(reg.indices()) {
                    mapping.insert(Soquet::with_idx(node.clone(), reg.clone(), idx), outer);
                }
            }
        }

        let mut result = SoquetMap::new();
        for reg in cbloq.signature().rights() {
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
            result.insert(reg.name.clone(), group_from_vec(reg, soqs));
        }
        Ok(result)
    }

    /// Seal the graph.
    ///
    /// Every soquet produced during construction must have been consumed,
    /// except those supplied here, which become the right-boundary
    /// soquets. Any dangling soquet or unbound right register fails with
    /// an error naming the offender.
    pub fn finalize(mut self, mut outs: SoquetMap) -> BuildResult<CompositeBloq> {
        if !self.declared {
            self.synthesize_right_registers(&outs)?;
        }

        let right_regs: Vec<Register> = self
            .registers
            .iter()
            .filter(|r| r.side.appears_right())
            .cloned()
            .collect();
        for reg in &right_regs {
            let group = outs
                .take(&reg.name)
                .ok_or_else(|| BuildError::MissingSoquets {
                    name: reg.name.clone(),
                })?;
            self.consume_group(&Node::RightDangle, reg, group)?;
        }
        if let Some(extra) = outs.names().next() {
            return Err(BuildError::UnknownRegister {
                target: "right boundary".to_string(),
                name: extra.to_string(),
            });
        }

        if !self.available.is_empty() {
            let soquet = self
                .available
                .iter()
                .map(ToString::to_string)
                .min()
                .expect("non-empty set has a minimum");
            return Err(BuildError::UnconsumedSoquet { soquet });
        }

        let signature = Signature::new(self.registers)?;
        debug!(
            binsts = self.binsts.len(),
            connections = self.connections.len(),
            "finalized composite graph"
        );
        Ok(CompositeBloq::from_parts(
            self.binsts,
            self.connections,
            signature,
        ))
    }

    /// In auto-register mode, derive right-boundary registers for finalize
    /// bindings that do not match an explicitly added register.
    fn synthesize_right_registers(&mut self, outs: &SoquetMap) -> BuildResult<()> {
        for (name, group) in outs.iter() {
            let already = self
                .registers
                .iter()
                .any(|r| &r.name == name && r.side.appears_right());
            if already {
                continue;
            }
            let first = group
                .iter()
                .next()
                .ok_or_else(|| BuildError::MissingSoquets { name: name.clone() })?;
            let reg = Register::new(name.clone(), first.reg.bitsize.clone()).with_side(Side::Right);
            let reg = if group.len() == 1 {
                reg
            } else {
                reg.with_shape([group.len()])
            };
            self.registers.push(reg);
        }
        Ok(())
    }

    /// Mint fresh soquets for a register on `node` and mark them available.
    fn produce_group(&mut self, node: &Node, reg: &Register) -> SoquetGroup {
        let soqs: Vec<Soquet> = reg
            .indices()
            .into_iter()
            .map(|idx| Soquet::with_idx(node.clone(), reg.clone(), idx))
            .collect();
        for soq in &soqs {
            self.available.insert(soq.clone());
        }
        group_from_vec(reg, soqs)
    }

    /// Consume a group of soquets into `consumer`'s register, enforcing
    /// shape, bitsize, and single-use.
    fn consume_group(&mut self, consumer: &Node, reg: &Register, group: SoquetGroup) -> BuildResult<()> {
        let expected = reg.num_elements();
        if group.len() != expected {
            return Err(BuildError::ShapeMismatch {
                register: reg.name.clone(),
                expected,
                got: group.len(),
            });
        }
        for (soq, idx) in group.into_vec().into_iter().zip(reg.indices()) {
            if soq.reg.bitsize.simplify() != reg.bitsize.simplify() {
                return Err(BuildError::BitsizeMismatch {
                    register: reg.name.clone(),
                    soquet: soq.to_string(),
                    expected: reg.bitsize.clone(),
                    got: soq.reg.bitsize.clone(),
                });
            }
            if !self.available.remove(&soq) {
                return Err(BuildError::UsedSoquet {
                    soquet: soq.to_string(),
                });
            }
            self.connections.push(Connection {
                left: soq,
                right: Soquet::with_idx(consumer.clone(), reg.clone(), idx),
            });
        }
        Ok(())
    }
}

/// Package soquets as the group form matching a register's shape.
fn group_from_vec(reg: &Register, soqs: Vec<Soquet>) -> SoquetGroup {
    if reg.shape.is_empty() {
        SoquetGroup::One(
            soqs.into_iter()
                .next()
                .expect("shapeless register has exactly one element"),
        )
    } else {
        SoquetGroup::Array(soqs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bloq::Bloq;
    use crate::error::DecomposeError;

    /// Minimal two-wire atomic gate for wiring tests.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Xor;

    impl Bloq for Xor {
        fn signature(&self) -> Signature {
            Signature::build([("a", 1u64), ("b", 1u64)])
        }
    }

    #[test]
    fn test_declared_passthrough_wire() {
        let sig = Signature::build([("q", 1u64)]);
        let (bb, mut regs) = BloqBuilder::from_signature(&sig);
        let q = regs.take_one("q").unwrap();
        let cbloq = bb.finalize(SoquetMap::new().with("q", q)).unwrap();
        assert_eq!(cbloq.binsts().len(), 0);
        assert_eq!(cbloq.connections().len(), 1);
    }

    #[test]
    fn test_add_and_finalize() {
        let sig = Signature::build([("a", 1u64), ("b", 1u64)]);
        let (mut bb, mut regs) = BloqBuilder::from_signature(&sig);
        let a = regs.take_one("a").unwrap();
        let b = regs.take_one("b").unwrap();
        let mut outs = bb
            .add(Xor, SoquetMap::new().with("a", a).with("b", b))
            .unwrap();
        let a = outs.take_one("a").unwrap();
        let b = outs.take_one("b").unwrap();
        let cbloq = bb
            .finalize(SoquetMap::new().with("a", a).with("b", b))
            .unwrap();
        assert_eq!(cbloq.binsts().len(), 1);
        assert_eq!(cbloq.connections().len(), 4);
    }

    #[test]
    fn test_double_consumption_fails() {
        let sig = Signature::build([("a", 1u64), ("b", 1u64)]);
        let (mut bb, mut regs) = BloqBuilder::from_signature(&sig);
        let a = regs.take_one("a").unwrap();
        let b = regs.take_one("b").unwrap();
        bb.add(Xor, SoquetMap::new().with("a", a.clone()).with("b", b))
            .unwrap();
        // `a` was consumed above; feeding it again must fail.
        let b2 = Soquet::new(Node::LeftDangle, Register::new("phantom", 1u64));
        let err = bb
            .add(Xor, SoquetMap::new().with("a", a).with("b", b2))
            .unwrap_err();
        assert!(matches!(err, BuildError::UsedSoquet { .. }));
    }

    #[test]
    fn test_unknown_register_fails() {
        let sig = Signature::build([("a", 1u64), ("b", 1u64)]);
        let (mut bb, mut regs) = BloqBuilder::from_signature(&sig);
        let a = regs.take_one("a").unwrap();
        let b = regs.take_one("b").unwrap();
        let err = bb
            .add(
                Xor,
                SoquetMap::new().with("a", a).with("b", b.clone()).with("c", b),
            )
            .unwrap_err();
        assert!(matches!(err, BuildError::UsedSoquet { .. } | BuildError::UnknownRegister { .. }));
    }

    #[test]
    fn test_bitsize_mismatch_fails() {
        let sig = Signature::build([("wide", 4u64), ("b", 1u64)]);
        let (mut bb, mut regs) = BloqBuilder::from_signature(&sig);
        let wide = regs.take_one("wide").unwrap();
        let b = regs.take_one("b").unwrap();
        let err = bb
            .add(Xor, SoquetMap::new().with("a", wide).with("b", b))
            .unwrap_err();
        assert!(matches!(err, BuildError::BitsizeMismatch { .. }));
    }

    #[test]
    fn test_unconsumed_soquet_names_register() {
        let sig = Signature::build([("a", 1u64), ("b", 1u64)]);
        let (bb, mut regs) = BloqBuilder::from_signature(&sig);
        let a = regs.take_one("a").unwrap();
        let _b = regs.take_one("b").unwrap();
        let err = bb.finalize(SoquetMap::new().with("a", a)).unwrap_err();
        match err {
            BuildError::MissingSoquets { name } => assert_eq!(name, "b"),
            other => panic!("expected MissingSoquets, got {other:?}"),
        }
    }

    #[test]
    fn test_split_join_roundtrip_structure() {
        let sig = Signature::build([("q", 4u64)]);
        let (mut bb, mut regs) = BloqBuilder::from_signature(&sig);
        let q = regs.take_one("q").unwrap();
        let bits = bb.split(q).unwrap();
        assert_eq!(bits.len(), 4);
        let q = bb.join(bits).unwrap();
        let cbloq = bb.finalize(SoquetMap::new().with("q", q)).unwrap();
        assert_eq!(cbloq.binsts().len(), 2);
    }

    #[test]
    fn test_split_symbolic_width_fails() {
        let sig = Signature::build([("q", SymInt::symbol("n"))]);
        let (mut bb, mut regs) = BloqBuilder::from_signature(&sig);
        let q = regs.take_one("q").unwrap();
        let err = bb.split(q).unwrap_err();
        assert!(matches!(err, BuildError::SymbolicWidth { .. }));
    }

    #[test]
    fn test_auto_register_mode_infers_rights() {
        let mut bb = BloqBuilder::new();
        let a = bb
            .add_register(Register::new("a", 1u64))
            .unwrap()
            .into_one()
            .unwrap();
        let b = bb
            .add_register(Register::new("b", 1u64))
            .unwrap()
            .into_one()
            .unwrap();
        let mut outs = bb
            .add(Xor, SoquetMap::new().with("a", a).with("b", b))
            .unwrap();
        let a = outs.take_one("a").unwrap();
        let b = outs.take_one("b").unwrap();
        let cbloq = bb
            .finalize(SoquetMap::new().with("a", a).with("b", b))
            .unwrap();
        assert_eq!(cbloq.signature().rights().count(), 2);
    }

    #[test]
    fn test_allocate_free_roundtrip() {
        let mut bb = BloqBuilder::new();
        let q = bb.allocate(4u64).unwrap();
        bb.free(q).unwrap();
        let cbloq = bb.finalize(SoquetMap::new()).unwrap();
        assert_eq!(cbloq.binsts().len(), 2);
        assert!(cbloq.signature().is_empty());
    }

    #[test]
    fn test_decompose_failure_propagates_wiring_error() {
        /// A bloq whose decomposition forgets to consume a wire.
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        struct Leaky;

        impl Bloq for Leaky {
            fn signature(&self) -> Signature {
                Signature::build([("q", 2u64)])
            }

            fn build_composite(
                &self,
                bb: &mut BloqBuilder,
                mut regs: SoquetMap,
            ) -> crate::error::DecomposeResult<SoquetMap> {
                let q = regs.take_one("q")?;
                let bits = bb.split(q)?;
                // Join only one bit back; the other dangles.
                let [b0, _b1] = <[Soquet; 2]>::try_from(bits).expect("split of 2 bits");
                let q = bb.join(vec![b0])?;
                Ok(SoquetMap::new().with("q", q))
            }
        }

        let err = Leaky.decompose().unwrap_err();
        match err {
            DecomposeError::Build(BuildError::BitsizeMismatch { .. }) => {}
            other => panic!("expected bitsize mismatch at finalize, got {other:?}"),
        }
    }
}
