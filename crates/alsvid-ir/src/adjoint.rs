//! The generic adjoint meta-operation.

use crate::bloq::{Bloq, BloqRef};
use crate::composite::CompositeBloq;
use crate::error::{DecomposeError, DecomposeResult};
use crate::register::Signature;
use crate::symbolic::SymInt;

/// The Hermitian conjugate of an arbitrary wrapped bloq.
///
/// `Adjoint` is composition, not subclassing: it holds the wrapped value
/// and delegates per protocol, so any bloq type can be wrapped uniformly.
/// Its signature swaps left and right on every register, and its
/// decomposition is the wrapped bloq's composite graph reversed with every
/// node adjointed, so the adjoint distributes anti-automorphically over
/// composition.
///
/// Tensor and classical evaluation are decompose-only through this
/// wrapper: a forward-only tensor or classical function cannot be inverted
/// generically, so primitives needing those protocols on their adjoint
/// supply a specialized adjoint value via [`Bloq::adjoint`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Adjoint {
    /// The wrapped bloq.
    pub subbloq: BloqRef,
}

impl Adjoint {
    /// Wrap a bloq.
    pub fn new(subbloq: BloqRef) -> Self {
        Self { subbloq }
    }
}

impl Bloq for Adjoint {
    fn signature(&self) -> Signature {
        self.subbloq.signature().adjoint()
    }

    fn name(&self) -> String {
        format!("{}†", self.subbloq.name())
    }

    fn decompose(&self) -> DecomposeResult<CompositeBloq> {
        match self.subbloq.decompose() {
            Ok(cbloq) => Ok(cbloq.adjoint()),
            Err(DecomposeError::Atomic { .. }) => {
                Err(DecomposeError::Atomic { bloq: self.name() })
            }
            Err(DecomposeError::Symbolic { param, .. }) => Err(DecomposeError::Symbolic {
                bloq: self.name(),
                param,
            }),
            Err(err) => Err(err),
        }
    }

    /// Unwrapping here is the explicit involution special case: generic
    /// double wrapping would never terminate structural simplification.
    fn adjoint(&self) -> BloqRef {
        self.subbloq.clone()
    }

    fn callees(&self) -> Option<Vec<(BloqRef, SymInt)>> {
        self.subbloq.callees().map(|callees| {
            callees
                .into_iter()
                .map(|(bloq, count)| (bloq.adjoint(), count))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bloq::DynBloq;
    use crate::builder::BloqBuilder;
    use crate::register::{Register, Side};
    use crate::soquet::SoquetMap;

    /// State-preparation-shaped atom: output only.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Prep;

    impl Bloq for Prep {
        fn signature(&self) -> Signature {
            Signature::new(vec![Register::new("q", 1u64).with_side(Side::Right)]).unwrap()
        }
    }

    /// An atom declaring explicit callees.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Counted;

    impl Bloq for Counted {
        fn signature(&self) -> Signature {
            Signature::build([("q", 1u64)])
        }

        fn callees(&self) -> Option<Vec<(BloqRef, SymInt)>> {
            Some(vec![(Prep.to_ref(), SymInt::Const(3))])
        }
    }

    #[test]
    fn test_signature_flips_sides() {
        let adj = Adjoint::new(Prep.to_ref());
        let sig = adj.signature();
        assert_eq!(sig.lefts().count(), 1);
        assert_eq!(sig.rights().count(), 0);
    }

    #[test]
    fn test_double_wrap_unwraps() {
        let prep = Prep.to_ref();
        let adj = prep.adjoint();
        assert!(adj.is::<Adjoint>());
        assert_eq!(adj.adjoint(), prep);
    }

    #[test]
    fn test_name() {
        let adj = Adjoint::new(Prep.to_ref());
        assert_eq!(adj.name(), "Prep†");
    }

    #[test]
    fn test_atomic_subbloq_reports_adjoint_name() {
        let adj = Adjoint::new(Prep.to_ref());
        match adj.decompose() {
            Err(DecomposeError::Atomic { bloq }) => assert_eq!(bloq, "Prep†"),
            other => panic!("expected Atomic, got {other:?}"),
        }
    }

    #[test]
    fn test_callees_map_through_adjoint() {
        let adj = Adjoint::new(Counted.to_ref());
        let callees = adj.callees().unwrap();
        assert_eq!(callees.len(), 1);
        assert_eq!(callees[0].0, Prep.to_ref().adjoint());
        assert_eq!(callees[0].1, SymInt::Const(3));
    }

    #[test]
    fn test_decompose_reverses_and_adjoints() {
        /// Prep then a plain gate on the fresh wire.
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        struct Gate;

        impl Bloq for Gate {
            fn signature(&self) -> Signature {
                Signature::build([("q", 1u64)])
            }
        }

        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        struct PrepThenGate;

        impl Bloq for PrepThenGate {
            fn signature(&self) -> Signature {
                Signature::new(vec![Register::new("q", 1u64).with_side(Side::Right)]).unwrap()
            }

            fn build_composite(
                &self,
                bb: &mut BloqBuilder,
                _regs: SoquetMap,
            ) -> DecomposeResult<SoquetMap> {
                let q = bb.add(Prep, SoquetMap::new())?.take_one("q")?;
                let q = bb.add(Gate, SoquetMap::new().with("q", q))?.take_one("q")?;
                Ok(SoquetMap::new().with("q", q))
            }
        }

        let adj = Adjoint::new(PrepThenGate.to_ref());
        let cbloq = adj.decompose().unwrap();
        cbloq.verify_integrity().unwrap();
        let names: Vec<String> = cbloq.binsts().iter().map(|b| b.bloq.name()).collect();
        assert_eq!(names, vec!["Gate†", "Prep†"]);
    }
}
