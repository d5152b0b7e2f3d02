//! AND gadgets: the two-input primitive and the chained n-wire form.

use alsvid_ir::{
    Bloq, BloqBuilder, BloqRef, ClassicalVals, DecomposeError, DecomposeResult, DynBloq,
    ProtocolError, ProtocolResult, Register, Side, Signature, SoquetMap, SymInt, Tensor,
    tensor_from_classical,
};

use crate::gates::TGate;

/// The two-input AND primitive: consumes two bits, produces their AND on a
/// fresh output wire.
///
/// The forward direction costs four T gates. The uncompute direction
/// (`uncompute = true`, reached via [`Bloq::adjoint`]) is measurement
/// based and costs no T gates at all, which is why compiled circuits
/// prefer uncomputing an AND to recomputing it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct And {
    /// `true` for the uncomputing (adjoint) direction.
    pub uncompute: bool,
}

impl And {
    /// The forward AND.
    pub fn new() -> Self {
        Self { uncompute: false }
    }

    fn forward_signature() -> Signature {
        Signature::new(vec![
            Register::new("a", 1u64).with_side(Side::Left),
            Register::new("b", 1u64).with_side(Side::Left),
            Register::new("target", 1u64).with_side(Side::Right),
        ])
        .expect("and signature is valid")
    }
}

impl Bloq for And {
    fn signature(&self) -> Signature {
        let forward = Self::forward_signature();
        if self.uncompute { forward.adjoint() } else { forward }
    }

    fn name(&self) -> String {
        if self.uncompute { "And†" } else { "And" }.to_string()
    }

    fn adjoint(&self) -> BloqRef {
        Self {
            uncompute: !self.uncompute,
        }
        .to_ref()
    }

    /// Classical only in the forward direction; the inputs are consumed,
    /// so the uncompute direction is not a classical function of its
    /// boundary and stays unprovided.
    fn classical_action(&self, vals: &ClassicalVals) -> Option<ProtocolResult<ClassicalVals>> {
        if self.uncompute {
            return None;
        }
        Some((|| {
            let a = vals.int("a")?;
            let b = vals.int("b")?;
            Ok(ClassicalVals::new().with("target", a & b))
        })())
    }

    fn dense_tensor(&self) -> Option<ProtocolResult<Tensor>> {
        let forward = tensor_from_classical(&And::new());
        if self.uncompute {
            Some(forward.map(|t| t.conjugate_transpose()))
        } else {
            Some(forward)
        }
    }

    fn callees(&self) -> Option<Vec<(BloqRef, SymInt)>> {
        if self.uncompute {
            Some(vec![])
        } else {
            Some(vec![(TGate::new().to_ref(), SymInt::Const(4))])
        }
    }
}

/// An n-wire AND chain: n−1 input bits consumed, their AND produced on one
/// fresh output wire, built by chaining n−2 two-input [`And`]s.
///
/// The wire count `n` may be symbolic; the chain then cannot be expanded,
/// but resource counts remain available in closed form through
/// [`Bloq::callees`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MultiAnd {
    /// Total number of wires, inputs plus output.
    pub n: SymInt,
}

impl MultiAnd {
    /// Create an AND chain over `n` total wires.
    ///
    /// # Panics
    ///
    /// Panics if a concrete `n` is less than 3 (two inputs and an output
    /// are already covered by [`And`]).
    pub fn new(n: impl Into<SymInt>) -> Self {
        let n = n.into().simplify();
        if let Some(v) = n.as_u64() {
            assert!(v >= 3, "MultiAnd requires at least 3 wires, got {v}");
        }
        Self { n }
    }

    fn num_inputs(&self) -> SymInt {
        (self.n.clone() - SymInt::Const(1)).simplify()
    }
}

impl Bloq for MultiAnd {
    fn signature(&self) -> Signature {
        Signature::new(vec![
            Register::new("xs", self.num_inputs()).with_side(Side::Left),
            Register::new("target", 1u64).with_side(Side::Right),
        ])
        .expect("multi-and signature is valid")
    }

    fn name(&self) -> String {
        "MultiAnd".to_string()
    }

    fn build_composite(
        &self,
        bb: &mut BloqBuilder,
        mut regs: SoquetMap,
    ) -> DecomposeResult<SoquetMap> {
        let n = self.n.as_u64().ok_or_else(|| DecomposeError::Symbolic {
            bloq: self.name(),
            param: self.n.clone(),
        })?;
        let xs = regs.take_one("xs")?;
        let mut bits = bb.split(xs)?.into_iter();
        let first = bits.next().expect("at least two inputs");
        let second = bits.next().expect("at least two inputs");
        let mut acc = bb
            .add(
                And::new(),
                SoquetMap::new().with("a", first).with("b", second),
            )?
            .take_one("target")?;
        for _ in 2..n - 1 {
            let next = bits.next().expect("split yields n - 1 bits");
            acc = bb
                .add(And::new(), SoquetMap::new().with("a", acc).with("b", next))?
                .take_one("target")?;
        }
        Ok(SoquetMap::new().with("target", acc))
    }

    fn classical_action(&self, vals: &ClassicalVals) -> Option<ProtocolResult<ClassicalVals>> {
        Some((|| {
            let bits = self
                .num_inputs()
                .as_u64()
                .ok_or_else(|| ProtocolError::SymbolicValue {
                    value: self.num_inputs(),
                    context: "multi-and input width".to_string(),
                })?;
            let xs = vals.int("xs")?;
            let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
            Ok(ClassicalVals::new().with("target", u64::from(xs == mask)))
        })())
    }

    fn callees(&self) -> Option<Vec<(BloqRef, SymInt)>> {
        Some(vec![(
            And::new().to_ref(),
            (self.n.clone() - SymInt::Const(2)).simplify(),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alsvid_ir::call_classically;

    #[test]
    fn test_and_classical_truth_table() {
        for (a, b) in [(0u64, 0u64), (0, 1), (1, 0), (1, 1)] {
            let out = call_classically(
                &And::new(),
                ClassicalVals::new().with("a", a).with("b", b),
            )
            .unwrap();
            assert_eq!(out.int("target").unwrap(), a & b);
        }
    }

    #[test]
    fn test_and_signature_sides() {
        let sig = And::new().signature();
        assert_eq!(sig.lefts().count(), 2);
        assert_eq!(sig.rights().count(), 1);

        let sig = And { uncompute: true }.signature();
        assert_eq!(sig.lefts().count(), 1);
        assert_eq!(sig.rights().count(), 2);
    }

    #[test]
    fn test_and_adjoint_involution() {
        let and = And::new().to_ref();
        assert_eq!(and.adjoint().adjoint(), and);
        assert_eq!(and.adjoint(), And { uncompute: true }.to_ref());
    }

    #[test]
    fn test_uncompute_has_no_classical_action() {
        assert!(
            And { uncompute: true }
                .classical_action(&ClassicalVals::new())
                .is_none()
        );
    }

    #[test]
    fn test_multiand_decomposes_into_chain() {
        let cbloq = MultiAnd::new(5u64).decompose().unwrap();
        cbloq.verify_integrity().unwrap();
        let ands = cbloq
            .binsts()
            .iter()
            .filter(|binst| binst.bloq == And::new().to_ref())
            .count();
        assert_eq!(ands, 3); // n - 2
        // One split for the flat input register, nothing else.
        assert_eq!(cbloq.binsts().len(), 4);
    }

    #[test]
    fn test_multiand_classical_matches_decomposition() {
        let gadget = MultiAnd::new(4u64);
        let cbloq = gadget.decompose().unwrap();
        for xs in 0u64..8 {
            let direct = call_classically(&gadget, ClassicalVals::new().with("xs", xs))
                .unwrap()
                .int("target")
                .unwrap();
            let via_graph = call_classically(&cbloq, ClassicalVals::new().with("xs", xs))
                .unwrap()
                .int("target")
                .unwrap();
            assert_eq!(direct, via_graph, "xs={xs:#b}");
            assert_eq!(direct, u64::from(xs == 0b111));
        }
    }

    #[test]
    fn test_multiand_symbolic_blocks_expansion_only() {
        let gadget = MultiAnd::new(SymInt::symbol("n"));
        let err = gadget.decompose().unwrap_err();
        assert!(matches!(err, DecomposeError::Symbolic { .. }));
        // Counts remain available in closed form.
        let callees = gadget.callees().unwrap();
        assert_eq!(
            callees[0].1,
            SymInt::symbol("n") - SymInt::Const(2)
        );
    }

    #[test]
    #[should_panic(expected = "at least 3 wires")]
    fn test_multiand_rejects_tiny_n() {
        let _ = MultiAnd::new(2u64);
    }
}
