//! Classical simulation: evaluating operations on concrete bit values.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::bloq::Bloq;
use crate::bloq::BloqRef;
use crate::composite::CompositeBloq;
use crate::error::{DecomposeError, ProtocolError, ProtocolResult};
use crate::register::Register;
use crate::soquet::{Node, Soquet};

/// A concrete classical value for one register.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassicalVal {
    /// The value of a shapeless register.
    Int(u64),
    /// Per-element values of a shaped register, in row-major order.
    Array(Vec<u64>),
}

impl ClassicalVal {
    /// The scalar value, if this is an `Int`.
    pub fn as_int(&self) -> Option<u64> {
        match self {
            ClassicalVal::Int(v) => Some(*v),
            ClassicalVal::Array(_) => None,
        }
    }

    /// The element values, if this is an `Array`.
    pub fn as_array(&self) -> Option<&[u64]> {
        match self {
            ClassicalVal::Int(_) => None,
            ClassicalVal::Array(vs) => Some(vs),
        }
    }

    /// Number of elements carried.
    pub fn len(&self) -> usize {
        match self {
            ClassicalVal::Int(_) => 1,
            ClassicalVal::Array(vs) => vs.len(),
        }
    }

    /// Check if the value carries no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into per-element values.
    fn elements(&self) -> Vec<u64> {
        match self {
            ClassicalVal::Int(v) => vec![*v],
            ClassicalVal::Array(vs) => vs.clone(),
        }
    }
}

impl From<u64> for ClassicalVal {
    fn from(value: u64) -> Self {
        ClassicalVal::Int(value)
    }
}

impl From<Vec<u64>> for ClassicalVal {
    fn from(values: Vec<u64>) -> Self {
        ClassicalVal::Array(values)
    }
}

/// Ordered register-name to classical-value bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassicalVals {
    entries: BTreeMap<String, ClassicalVal>,
}

impl ClassicalVals {
    /// Create an empty binding map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding, returning the map for chaining.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, val: impl Into<ClassicalVal>) -> Self {
        self.insert(name, val);
        self
    }

    /// Insert a binding.
    pub fn insert(&mut self, name: impl Into<String>, val: impl Into<ClassicalVal>) {
        self.entries.insert(name.into(), val.into());
    }

    /// Look up a binding by name.
    pub fn get(&self, name: &str) -> Option<&ClassicalVal> {
        self.entries.get(name)
    }

    /// Remove and return a binding.
    pub fn take(&mut self, name: &str) -> Option<ClassicalVal> {
        self.entries.remove(name)
    }

    /// Read the scalar value bound to `name`.
    pub fn int(&self, name: &str) -> ProtocolResult<u64> {
        match self.get(name) {
            Some(ClassicalVal::Int(v)) => Ok(*v),
            Some(ClassicalVal::Array(vs)) => Err(ProtocolError::WrongShape {
                register: name.to_string(),
                expected: 1,
                got: vs.len(),
            }),
            None => Err(ProtocolError::MissingValue {
                register: name.to_string(),
            }),
        }
    }

    /// Read the element values bound to `name`.
    pub fn array(&self, name: &str) -> ProtocolResult<&[u64]> {
        match self.get(name) {
            Some(ClassicalVal::Array(vs)) => Ok(vs),
            Some(ClassicalVal::Int(_)) => Err(ProtocolError::WrongShape {
                register: name.to_string(),
                expected: 0,
                got: 1,
            }),
            None => Err(ProtocolError::MissingValue {
                register: name.to_string(),
            }),
        }
    }

    /// Iterate over bindings, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ClassicalVal)> {
        self.entries.iter()
    }

    /// Iterate over bound names, in name order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no bindings.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<ClassicalVal>> FromIterator<(N, V)> for ClassicalVals {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (name, val) in iter {
            map.insert(name, val);
        }
        map
    }
}

/// Evaluate `bloq` on concrete classical values.
///
/// Resolution follows the uniform three tiers: a specialized
/// [`Bloq::classical_action`] wins; otherwise the bloq is decomposed and
/// evaluated node by node, threading register values along connections in
/// topological order. A bloq that neither specializes nor decomposes fails
/// with a protocol-unsupported error.
pub fn call_classically(bloq: &dyn Bloq, vals: ClassicalVals) -> ProtocolResult<ClassicalVals> {
    let sig = bloq.signature();
    validate_boundary(sig.lefts(), &vals)?;
    for name in vals.names() {
        if sig.get_left(name).is_none() {
            return Err(ProtocolError::UnexpectedValue {
                register: name.to_string(),
            });
        }
    }

    let out = if let Some(result) = bloq.classical_action(&vals) {
        result?
    } else {
        match bloq.decompose() {
            Ok(cbloq) => eval_composite(&cbloq, &vals)?,
            Err(DecomposeError::Atomic { .. }) => {
                return Err(ProtocolError::Unsupported {
                    protocol: "classical",
                    bloq: bloq.name(),
                });
            }
            Err(err) => return Err(err.into()),
        }
    };

    validate_boundary(sig.rights(), &out)?;
    Ok(out)
}

impl BloqRef {
    /// Evaluate this bloq on concrete classical values.
    pub fn call_classically(&self, vals: ClassicalVals) -> ProtocolResult<ClassicalVals> {
        call_classically(&**self, vals)
    }
}

/// Check that every register in `regs` has a value of the right shape and
/// range.
fn validate_boundary<'a>(
    regs: impl Iterator<Item = &'a Register>,
    vals: &ClassicalVals,
) -> ProtocolResult<()> {
    for reg in regs {
        let bits = reg
            .bitsize
            .as_u64()
            .ok_or_else(|| ProtocolError::SymbolicValue {
                value: reg.bitsize.clone(),
                context: format!("classical value for register '{}'", reg.name),
            })?;
        if bits > 64 {
            return Err(ProtocolError::TooWide {
                register: reg.name.clone(),
                bits,
            });
        }
        let val = vals.get(&reg.name).ok_or_else(|| ProtocolError::MissingValue {
            register: reg.name.clone(),
        })?;
        let expected = reg.num_elements();
        let matches_shape = match val {
            ClassicalVal::Int(_) => reg.shape.is_empty(),
            ClassicalVal::Array(vs) => !reg.shape.is_empty() && vs.len() == expected,
        };
        if !matches_shape {
            return Err(ProtocolError::WrongShape {
                register: reg.name.clone(),
                expected,
                got: val.len(),
            });
        }
        let max = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        for &v in &val.elements() {
            if v > max {
                return Err(ProtocolError::OutOfRange {
                    register: reg.name.clone(),
                    value: v,
                    bits,
                });
            }
        }
    }
    Ok(())
}

/// Thread classical values through a composite graph node by node.
fn eval_composite(cbloq: &CompositeBloq, vals: &ClassicalVals) -> ProtocolResult<ClassicalVals> {
    let sig = cbloq.signature();
    let mut soq_vals: FxHashMap<Soquet, u64> = FxHashMap::default();

    for reg in sig.lefts() {
        let val = vals.get(&reg.name).ok_or_else(|| ProtocolError::MissingValue {
            register: reg.name.clone(),
        })?;
        for (element, idx) in val.elements().into_iter().zip(reg.indices()) {
            soq_vals.insert(
                Soquet::with_idx(Node::LeftDangle, reg.clone(), idx),
                element,
            );
        }
    }

    let cons_to_prod: FxHashMap<&Soquet, &Soquet> = cbloq
        .connections()
        .iter()
        .map(|c| (&c.right, &c.left))
        .collect();

    for binst in cbloq.binsts() {
        let node_sig = binst.bloq.signature();
        let node = Node::Inst(binst.clone());
        let mut ins = ClassicalVals::new();
        for reg in node_sig.lefts() {
            let elements: Vec<u64> = reg
                .indices()
                .into_iter()
                .map(|idx| {
                    let inner = Soquet::with_idx(node.clone(), reg.clone(), idx);
                    let prod = cons_to_prod
                        .get(&inner)
                        .expect("validated graph connects every node input");
                    soq_vals[*prod]
                })
                .collect();
            let val = if reg.shape.is_empty() {
                ClassicalVal::Int(elements[0])
            } else {
                ClassicalVal::Array(elements)
            };
            ins.insert(reg.name.clone(), val);
        }
        let outs = call_classically(&*binst.bloq, ins)?;
        for reg in node_sig.rights() {
            let val = outs.get(&reg.name).ok_or_else(|| ProtocolError::MissingValue {
                register: reg.name.clone(),
            })?;
            for (element, idx) in val.elements().into_iter().zip(reg.indices()) {
                soq_vals.insert(Soquet::with_idx(node.clone(), reg.clone(), idx), element);
            }
        }
    }

    let mut out = ClassicalVals::new();
    for reg in sig.rights() {
        let elements: Vec<u64> = reg
            .indices()
            .into_iter()
            .map(|idx| {
                let inner = Soquet::with_idx(Node::RightDangle, reg.clone(), idx);
                let prod = cons_to_prod
                    .get(&inner)
                    .expect("validated graph binds every boundary output");
                soq_vals[*prod]
            })
            .collect();
        let val = if reg.shape.is_empty() {
            ClassicalVal::Int(elements[0])
        } else {
            ClassicalVal::Array(elements)
        };
        out.insert(reg.name.clone(), val);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bloq::DynBloq;
    use crate::builder::BloqBuilder;
    use crate::error::DecomposeResult;
    use crate::register::Signature;
    use crate::soquet::SoquetMap;

    /// `target ^= ctrl`, the classical parity primitive.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct ParityGate;

    impl Bloq for ParityGate {
        fn signature(&self) -> Signature {
            Signature::build([("ctrl", 1u64), ("target", 1u64)])
        }

        fn classical_action(&self, vals: &ClassicalVals) -> Option<ProtocolResult<ClassicalVals>> {
            Some((|| {
                let ctrl = vals.int("ctrl")?;
                let target = vals.int("target")?;
                Ok(ClassicalVals::new()
                    .with("ctrl", ctrl)
                    .with("target", target ^ ctrl))
            })())
        }
    }

    /// Two parity gates chained on a shared target.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct DoubleParity;

    impl Bloq for DoubleParity {
        fn signature(&self) -> Signature {
            Signature::build([("a", 1u64), ("b", 1u64), ("target", 1u64)])
        }

        fn build_composite(
            &self,
            bb: &mut BloqBuilder,
            mut regs: SoquetMap,
        ) -> DecomposeResult<SoquetMap> {
            let a = regs.take_one("a")?;
            let b = regs.take_one("b")?;
            let t = regs.take_one("target")?;
            let mut outs = bb.add(ParityGate, SoquetMap::new().with("ctrl", a).with("target", t))?;
            let a = outs.take_one("ctrl")?;
            let t = outs.take_one("target")?;
            let mut outs = bb.add(ParityGate, SoquetMap::new().with("ctrl", b).with("target", t))?;
            let b = outs.take_one("ctrl")?;
            let t = outs.take_one("target")?;
            Ok(SoquetMap::new().with("a", a).with("b", b).with("target", t))
        }
    }

    #[test]
    fn test_tier1_classical_action() {
        let out = call_classically(
            &ParityGate,
            ClassicalVals::new().with("ctrl", 1u64).with("target", 1u64),
        )
        .unwrap();
        assert_eq!(out.int("target").unwrap(), 0);
        assert_eq!(out.int("ctrl").unwrap(), 1);
    }

    #[test]
    fn test_tier2_composite_threading() {
        for (a, b) in [(0u64, 0u64), (0, 1), (1, 0), (1, 1)] {
            let out = call_classically(
                &DoubleParity,
                ClassicalVals::new()
                    .with("a", a)
                    .with("b", b)
                    .with("target", 0u64),
            )
            .unwrap();
            assert_eq!(out.int("target").unwrap(), a ^ b, "a={a} b={b}");
        }
    }

    #[test]
    fn test_value_out_of_range() {
        let err = call_classically(
            &ParityGate,
            ClassicalVals::new().with("ctrl", 2u64).with("target", 0u64),
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::OutOfRange { .. }));
    }

    #[test]
    fn test_missing_value() {
        let err = call_classically(&ParityGate, ClassicalVals::new().with("ctrl", 1u64))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::MissingValue { .. }));
    }

    #[test]
    fn test_unexpected_value() {
        let err = call_classically(
            &ParityGate,
            ClassicalVals::new()
                .with("ctrl", 0u64)
                .with("target", 0u64)
                .with("bogus", 0u64),
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedValue { .. }));
    }

    #[test]
    fn test_unsupported_on_silent_atom() {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        struct Silent;

        impl Bloq for Silent {
            fn signature(&self) -> Signature {
                Signature::build([("q", 1u64)])
            }
        }

        let err =
            call_classically(&Silent, ClassicalVals::new().with("q", 0u64)).unwrap_err();
        match err {
            ProtocolError::Unsupported { protocol, bloq } => {
                assert_eq!(protocol, "classical");
                assert_eq!(bloq, "Silent");
            }
            other => panic!("expected Unsupported, got {other:?}"),
        }
    }

    #[test]
    fn test_symbolic_width_rejected() {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        struct SymWide;

        impl Bloq for SymWide {
            fn signature(&self) -> Signature {
                Signature::build([("q", crate::symbolic::SymInt::symbol("n"))])
            }
        }

        let err = call_classically(&SymWide, ClassicalVals::new().with("q", 0u64)).unwrap_err();
        assert!(matches!(err, ProtocolError::SymbolicValue { .. }));
    }

    #[test]
    fn test_bloqref_method() {
        let gate = ParityGate.to_ref();
        let out = gate
            .call_classically(ClassicalVals::new().with("ctrl", 1u64).with("target", 0u64))
            .unwrap();
        assert_eq!(out.int("target").unwrap(), 1);
    }
}
