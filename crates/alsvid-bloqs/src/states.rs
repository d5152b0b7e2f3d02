//! Single-qubit state preparations and their adjoint effects.
//!
//! States have right-only signatures (a fresh wire appears); effects have
//! left-only signatures (a wire is consumed). Each state's adjoint is the
//! matching effect and vice versa, so adjoint involution holds without the
//! generic wrapper.

use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use std::f64::consts::FRAC_1_SQRT_2;

use alsvid_ir::{
    Bloq, BloqRef, ClassicalVals, DynBloq, ProtocolError, ProtocolResult, Register, Side,
    Signature, Tensor,
};

fn state_signature(side: Side) -> Signature {
    Signature::new(vec![Register::new("q", 1u64).with_side(side)])
        .expect("single-register signature is valid")
}

fn vector_tensor(amplitudes: [f64; 2], n_left_axes: usize) -> Tensor {
    let data = ArrayD::from_shape_vec(
        IxDyn(&[2]),
        amplitudes
            .iter()
            .map(|&a| Complex64::new(a, 0.0))
            .collect(),
    )
    .expect("length-2 tensor");
    Tensor::new(data, n_left_axes)
}

/// Prepare a fresh wire in the computational zero state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ZeroState;

impl Bloq for ZeroState {
    fn signature(&self) -> Signature {
        state_signature(Side::Right)
    }

    fn adjoint(&self) -> BloqRef {
        ZeroEffect.to_ref()
    }

    fn classical_action(&self, _vals: &ClassicalVals) -> Option<ProtocolResult<ClassicalVals>> {
        Some(Ok(ClassicalVals::new().with("q", 0u64)))
    }

    fn dense_tensor(&self) -> Option<ProtocolResult<Tensor>> {
        Some(Ok(vector_tensor([1.0, 0.0], 0)))
    }
}

/// Project a wire onto the zero state and discard it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ZeroEffect;

impl Bloq for ZeroEffect {
    fn signature(&self) -> Signature {
        state_signature(Side::Left)
    }

    fn adjoint(&self) -> BloqRef {
        ZeroState.to_ref()
    }

    fn classical_action(&self, vals: &ClassicalVals) -> Option<ProtocolResult<ClassicalVals>> {
        Some((|| {
            let q = vals.int("q")?;
            if q != 0 {
                return Err(ProtocolError::RejectedValue {
                    bloq: self.name(),
                    register: "q".to_string(),
                    value: q,
                    reason: "zero effect applied to a nonzero value".to_string(),
                });
            }
            Ok(ClassicalVals::new())
        })())
    }

    fn dense_tensor(&self) -> Option<ProtocolResult<Tensor>> {
        Some(Ok(vector_tensor([1.0, 0.0], 1)))
    }
}

/// Prepare a fresh wire in the |+⟩ state (the fan-out state).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PlusState;

impl Bloq for PlusState {
    fn signature(&self) -> Signature {
        state_signature(Side::Right)
    }

    fn adjoint(&self) -> BloqRef {
        PlusEffect.to_ref()
    }

    fn dense_tensor(&self) -> Option<ProtocolResult<Tensor>> {
        Some(Ok(vector_tensor([FRAC_1_SQRT_2, FRAC_1_SQRT_2], 0)))
    }
}

/// Project a wire onto the |+⟩ state and discard it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PlusEffect;

impl Bloq for PlusEffect {
    fn signature(&self) -> Signature {
        state_signature(Side::Left)
    }

    fn adjoint(&self) -> BloqRef {
        PlusState.to_ref()
    }

    fn dense_tensor(&self) -> Option<ProtocolResult<Tensor>> {
        Some(Ok(vector_tensor([FRAC_1_SQRT_2, FRAC_1_SQRT_2], 1)))
    }
}
