//! Basic gates: Pauli-X, the parity (CNOT) gate, and the T gate.

use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use std::f64::consts::FRAC_PI_4;

use alsvid_ir::{
    Bloq, BloqRef, ClassicalVals, DynBloq, ProtocolResult, Signature, SymInt, Tensor,
    tensor_from_classical,
};

/// The Pauli-X (bit flip) gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct XGate;

impl Bloq for XGate {
    fn signature(&self) -> Signature {
        Signature::build([("q", 1u64)])
    }

    fn name(&self) -> String {
        "X".to_string()
    }

    fn adjoint(&self) -> BloqRef {
        self.to_ref()
    }

    fn classical_action(&self, vals: &ClassicalVals) -> Option<ProtocolResult<ClassicalVals>> {
        Some((|| {
            let q = vals.int("q")?;
            Ok(ClassicalVals::new().with("q", q ^ 1))
        })())
    }

    fn dense_tensor(&self) -> Option<ProtocolResult<Tensor>> {
        Some(tensor_from_classical(self))
    }
}

/// The two-input parity gate: `target ^= ctrl` (CNOT).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CNot;

impl Bloq for CNot {
    fn signature(&self) -> Signature {
        Signature::build([("ctrl", 1u64), ("target", 1u64)])
    }

    fn name(&self) -> String {
        "CNot".to_string()
    }

    fn adjoint(&self) -> BloqRef {
        self.to_ref()
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

    fn dense_tensor(&self) -> Option<ProtocolResult<Tensor>> {
        Some(tensor_from_classical(self))
    }
}

/// The T gate (fourth root of Z), the costed non-Clifford primitive.
///
/// Resource estimates bottom out in T counts, so `TGate` declares itself
/// an explicit call-graph leaf.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TGate {
    /// `true` for the T-dagger variant.
    pub is_adjoint: bool,
}

impl TGate {
    /// The forward T gate.
    pub fn new() -> Self {
        Self { is_adjoint: false }
    }

    /// The T-dagger gate.
    pub fn dagger() -> Self {
        Self { is_adjoint: true }
    }
}

impl Bloq for TGate {
    fn signature(&self) -> Signature {
        Signature::build([("q", 1u64)])
    }

    fn name(&self) -> String {
        if self.is_adjoint { "T†" } else { "T" }.to_string()
    }

    fn adjoint(&self) -> BloqRef {
        Self {
            is_adjoint: !self.is_adjoint,
        }
        .to_ref()
    }

    fn dense_tensor(&self) -> Option<ProtocolResult<Tensor>> {
        let sign = if self.is_adjoint { -1.0 } else { 1.0 };
        let phase = Complex64::from_polar(1.0, sign * FRAC_PI_4);
        let data = ArrayD::from_shape_vec(
            IxDyn(&[2, 2]),
            vec![
                Complex64::new(1.0, 0.0),
                Complex64::new(0.0, 0.0),
                Complex64::new(0.0, 0.0),
                phase,
            ],
        )
        .expect("2x2 tensor");
        Some(Ok(Tensor::new(data, 1)))
    }

    fn callees(&self) -> Option<Vec<(BloqRef, SymInt)>> {
        Some(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alsvid_ir::{call_classically, tensor_contract};

    #[test]
    fn test_x_classical() {
        let out = call_classically(&XGate, ClassicalVals::new().with("q", 0u64)).unwrap();
        assert_eq!(out.int("q").unwrap(), 1);
    }

    #[test]
    fn test_x_self_adjoint() {
        assert_eq!(XGate.adjoint(), XGate.to_ref());
        assert_eq!(XGate.adjoint().adjoint(), XGate.to_ref());
    }

    #[test]
    fn test_cnot_classical_table() {
        for (ctrl, target, expect) in [(0u64, 0u64, 0u64), (0, 1, 1), (1, 0, 1), (1, 1, 0)] {
            let out = call_classically(
                &CNot,
                ClassicalVals::new().with("ctrl", ctrl).with("target", target),
            )
            .unwrap();
            assert_eq!(out.int("target").unwrap(), expect);
            assert_eq!(out.int("ctrl").unwrap(), ctrl);
        }
    }

    #[test]
    fn test_cnot_tensor_shape() {
        let tensor = tensor_contract(&CNot).unwrap();
        // Two input axes, two output axes.
        assert_eq!(tensor.shape(), &[2, 2, 2, 2]);
        assert_eq!(tensor.n_left_axes(), 2);
    }

    #[test]
    fn test_t_adjoint_pair() {
        assert_eq!(TGate::new().adjoint(), TGate::dagger().to_ref());
        assert_eq!(TGate::new().adjoint().adjoint(), TGate::new().to_ref());
        assert_eq!(TGate::dagger().name(), "T†");
    }

    #[test]
    fn test_t_tensor_is_conjugate_of_dagger() {
        let t = tensor_contract(&TGate::new()).unwrap();
        let tdg = tensor_contract(&TGate::dagger()).unwrap();
        assert!(t.conjugate_transpose().allclose(&tdg, 1e-12));
    }

    #[test]
    fn test_t_is_explicit_leaf() {
        let graph = TGate::new().to_ref().call_graph().unwrap();
        assert_eq!(graph.node_count(), 1);
        let sigma = graph.sigma().unwrap();
        assert_eq!(sigma[&TGate::new().to_ref()], SymInt::Const(1));
    }
}
