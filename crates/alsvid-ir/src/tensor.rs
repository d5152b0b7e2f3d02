//! Dense-tensor evaluation: direct forms and network contraction.
//!
//! A bloq's tensor has one axis per boundary wire element: left-boundary
//! axes first (in signature order), then right-boundary axes, each of
//! dimension `2^bitsize`. A two-input, one-output gate therefore contracts
//! to shape `(2, 2, 2)`.
//!
//! When a bloq has no specialized tensor, its decomposition is translated
//! into a tensor network (one tensor per node, one network edge per
//! connection, boundary soquets as free indices) and contracted in
//! topological order. Contraction happens at every level of nested
//! decomposition; flattening first via
//! [`CompositeBloq::flatten`](crate::composite::CompositeBloq::flatten) is
//! an explicitly invoked alternative, not the default.

use ndarray::{Array2, ArrayD, IxDyn};
use num_complex::Complex64;
use rustc_hash::FxHashMap;

use crate::bloq::Bloq;
use crate::bloq::BloqRef;
use crate::classical::{ClassicalVals, call_classically};
use crate::composite::CompositeBloq;
use crate::error::{DecomposeError, ProtocolError, ProtocolResult};
use crate::register::Register;
use crate::soquet::{Node, Soquet};

/// A dense array representation of a bloq.
///
/// Axes are ordered left-boundary wire elements first, then
/// right-boundary; `n_left_axes` records where the split falls.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: ArrayD<Complex64>,
    n_left_axes: usize,
}

impl Tensor {
    /// Wrap dense data whose first `n_left_axes` axes are the left
    /// boundary.
    ///
    /// # Panics
    ///
    /// Panics if `n_left_axes` exceeds the array's dimensionality.
    pub fn new(data: ArrayD<Complex64>, n_left_axes: usize) -> Self {
        assert!(
            n_left_axes <= data.ndim(),
            "n_left_axes exceeds tensor dimensionality"
        );
        Self { data, n_left_axes }
    }

    /// The dense data.
    pub fn data(&self) -> &ArrayD<Complex64> {
        &self.data
    }

    /// The array shape.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Number of left-boundary axes.
    pub fn n_left_axes(&self) -> usize {
        self.n_left_axes
    }

    /// Number of right-boundary axes.
    pub fn n_right_axes(&self) -> usize {
        self.data.ndim() - self.n_left_axes
    }

    /// The conjugate transpose: elements conjugated, right axes moved
    /// before left axes. This is the tensor of the adjoint operation.
    #[must_use]
    pub fn conjugate_transpose(&self) -> Tensor {
        let ndim = self.data.ndim();
        let perm: Vec<usize> = (self.n_left_axes..ndim).chain(0..self.n_left_axes).collect();
        let view = self.data.view().permuted_axes(perm);
        let shape = view.shape().to_vec();
        let data: Vec<Complex64> = view.iter().map(Complex64::conj).collect();
        Tensor {
            data: ArrayD::from_shape_vec(IxDyn(&shape), data)
                .expect("element count preserved by transpose"),
            n_left_axes: ndim - self.n_left_axes,
        }
    }

    /// Element-wise comparison within `tol`.
    pub fn allclose(&self, other: &Tensor, tol: f64) -> bool {
        self.n_left_axes == other.n_left_axes
            && self.shape() == other.shape()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| (a - b).norm() <= tol)
    }
}

/// Compute the dense tensor of `bloq`.
///
/// A specialized [`Bloq::dense_tensor`] wins; otherwise the bloq is
/// decomposed and its composite graph contracted. A bloq that neither
/// specializes nor decomposes fails with a protocol-unsupported error.
pub fn tensor_contract(bloq: &dyn Bloq) -> ProtocolResult<Tensor> {
    if let Some(result) = bloq.dense_tensor() {
        return result;
    }
    match bloq.decompose() {
        Ok(cbloq) => cbloq_to_tensor(&cbloq),
        Err(DecomposeError::Atomic { .. }) => Err(ProtocolError::Unsupported {
            protocol: "tensor",
            bloq: bloq.name(),
        }),
        Err(err) => Err(err.into()),
    }
}

impl BloqRef {
    /// Compute this bloq's dense tensor.
    pub fn tensor_contract(&self) -> ProtocolResult<Tensor> {
        tensor_contract(&**self)
    }
}

/// Derive a 0/1 truth-table tensor from a bloq's classical action.
///
/// Every input assignment is evaluated through the classical protocol and
/// the matching `(inputs, outputs)` entry set to one. Inputs the bloq
/// rejects (effects, frees) contribute zero amplitude. All register widths
/// must be concrete.
pub fn tensor_from_classical(bloq: &dyn Bloq) -> ProtocolResult<Tensor> {
    let sig = bloq.signature();
    let lefts: Vec<Register> = sig.lefts().cloned().collect();
    let rights: Vec<Register> = sig.rights().cloned().collect();

    let mut left_dims: Vec<usize> = vec![];
    for reg in &lefts {
        let dim = axis_dim(reg)?;
        for _ in 0..reg.num_elements() {
            left_dims.push(dim);
        }
    }
    let mut right_dims: Vec<usize> = vec![];
    for reg in &rights {
        let dim = axis_dim(reg)?;
        for _ in 0..reg.num_elements() {
            right_dims.push(dim);
        }
    }

    let shape: Vec<usize> = left_dims.iter().chain(right_dims.iter()).copied().collect();
    let mut data = ArrayD::from_elem(IxDyn(&shape), Complex64::new(0.0, 0.0));
    let total: usize = left_dims.iter().product();

    for combo in 0..total {
        let mut idxs = vec![0usize; left_dims.len()];
        let mut rem = combo;
        for k in (0..left_dims.len()).rev() {
            idxs[k] = rem % left_dims[k];
            rem /= left_dims[k];
        }

        let mut vals = ClassicalVals::new();
        let mut cursor = 0;
        for reg in &lefts {
            let count = reg.num_elements();
            let elements: Vec<u64> = idxs[cursor..cursor + count]
                .iter()
                .map(|&v| v as u64)
                .collect();
            cursor += count;
            if reg.shape.is_empty() {
                vals.insert(reg.name.clone(), elements[0]);
            } else {
                vals.insert(reg.name.clone(), elements);
            }
        }

        let outs = match call_classically(bloq, vals) {
            Ok(outs) => outs,
            // A rejected input has zero amplitude.
            Err(ProtocolError::RejectedValue { .. }) => continue,
            Err(err) => return Err(err),
        };

        let mut full = idxs;
        for reg in &rights {
            let val = outs.get(&reg.name).ok_or_else(|| ProtocolError::MissingValue {
                register: reg.name.clone(),
            })?;
            match val {
                crate::classical::ClassicalVal::Int(v) => {
                    full.push(usize::try_from(*v).expect("validated value fits in usize"));
                }
                crate::classical::ClassicalVal::Array(vs) => {
                    for v in vs {
                        full.push(usize::try_from(*v).expect("validated value fits in usize"));
                    }
                }
            }
        }
        data[IxDyn(&full)] = Complex64::new(1.0, 0.0);
    }

    Ok(Tensor::new(data, left_dims.len()))
}

/// What a contraction-frontier axis currently represents.
#[derive(Debug, Clone, PartialEq)]
enum AxisTag {
    /// A free index for a left-boundary soquet.
    OpenLeft(Soquet),
    /// A free index for a right-boundary soquet.
    OpenRight(Soquet),
    /// A produced soquet awaiting its consumer.
    Live(Soquet),
}

/// Contract a composite graph's tensor network to a dense tensor.
///
/// Nodes are contracted in topological order; each node's tensor is
/// obtained via [`tensor_contract`], so nested decompositions contract
/// level by level.
pub fn cbloq_to_tensor(cbloq: &CompositeBloq) -> ProtocolResult<Tensor> {
    let sig = Bloq::signature(cbloq);
    let cons_to_prod: FxHashMap<&Soquet, &Soquet> = cbloq
        .connections()
        .iter()
        .map(|c| (&c.right, &c.left))
        .collect();
    let prod_to_cons: FxHashMap<&Soquet, &Soquet> = cbloq
        .connections()
        .iter()
        .map(|c| (&c.left, &c.right))
        .collect();

    let mut acc = ArrayD::from_elem(IxDyn(&[]), Complex64::new(1.0, 0.0));
    let mut tags: Vec<AxisTag> = vec![];

    for binst in cbloq.binsts() {
        let tensor = tensor_contract(&*binst.bloq)?;
        let node_sig = binst.bloq.signature();
        let node = Node::Inst(binst.clone());

        let mut node_tags: Vec<AxisTag> = vec![];
        let mut pairs: Vec<(usize, usize)> = vec![];
        let mut axis = 0usize;
        for reg in node_sig.lefts() {
            for idx in reg.indices() {
                let input = Soquet::with_idx(node.clone(), reg.clone(), idx);
                let producer = *cons_to_prod
                    .get(&input)
                    .expect("validated graph connects every node input");
                if producer.node.is_left_dangle() {
                    node_tags.push(AxisTag::OpenLeft(producer.clone()));
                } else {
                    let acc_axis = tags
                        .iter()
                        .position(|tag| matches!(tag, AxisTag::Live(s) if s == producer))
                        .expect("producer axis is live in the accumulator");
                    pairs.push((acc_axis, axis));
                    node_tags.push(AxisTag::Live(producer.clone()));
                }
                axis += 1;
            }
        }
        for reg in node_sig.rights() {
            for idx in reg.indices() {
                node_tags.push(AxisTag::Live(Soquet::with_idx(node.clone(), reg.clone(), idx)));
                axis += 1;
            }
        }
        debug_assert_eq!(axis, tensor.data().ndim());

        let (acc_axes, node_axes): (Vec<usize>, Vec<usize>) = pairs.into_iter().unzip();
        let contracted = tensordot(&acc, tensor.data(), &acc_axes, &node_axes);
        let mut new_tags: Vec<AxisTag> = tags
            .iter()
            .enumerate()
            .filter(|(i, _)| !acc_axes.contains(i))
            .map(|(_, tag)| tag.clone())
            .collect();
        new_tags.extend(
            node_tags
                .into_iter()
                .enumerate()
                .filter(|(i, _)| !node_axes.contains(i))
                .map(|(_, tag)| tag),
        );
        acc = contracted;
        tags = new_tags;
    }

    // Wires running straight from the left boundary to the right boundary.
    for conn in cbloq.connections() {
        if conn.left.node.is_left_dangle() && conn.right.node.is_right_dangle() {
            let dim = axis_dim(&conn.left.reg)?;
            acc = tensordot(&acc, &identity(dim), &[], &[]);
            tags.push(AxisTag::OpenLeft(conn.left.clone()));
            tags.push(AxisTag::OpenRight(conn.right.clone()));
        }
    }

    // Remaining live axes feed the right boundary.
    for tag in &mut tags {
        if let AxisTag::Live(producer) = tag {
            let consumer = *prod_to_cons
                .get(&*producer)
                .expect("validated graph consumes every produced soquet");
            debug_assert!(consumer.node.is_right_dangle());
            *tag = AxisTag::OpenRight(consumer.clone());
        }
    }

    // Permute into boundary order: signature lefts, then rights.
    let mut order: Vec<usize> = vec![];
    let mut n_left = 0usize;
    for reg in sig.lefts() {
        for idx in reg.indices() {
            let soq = Soquet::with_idx(Node::LeftDangle, reg.clone(), idx);
            let pos = tags
                .iter()
                .position(|tag| matches!(tag, AxisTag::OpenLeft(s) if *s == soq))
                .expect("left boundary axis present after contraction");
            order.push(pos);
            n_left += 1;
        }
    }
    for reg in sig.rights() {
        for idx in reg.indices() {
            let soq = Soquet::with_idx(Node::RightDangle, reg.clone(), idx);
            let pos = tags
                .iter()
                .position(|tag| matches!(tag, AxisTag::OpenRight(s) if *s == soq))
                .expect("right boundary axis present after contraction");
            order.push(pos);
        }
    }
    debug_assert_eq!(order.len(), tags.len());

    let view = acc.view().permuted_axes(order);
    let shape = view.shape().to_vec();
    let data: Vec<Complex64> = view.iter().copied().collect();
    Ok(Tensor::new(
        ArrayD::from_shape_vec(IxDyn(&shape), data).expect("element count preserved"),
        n_left,
    ))
}

/// Dimension of one tensor axis for a register element.
fn axis_dim(reg: &Register) -> ProtocolResult<usize> {
    let bits = reg
        .bitsize
        .as_u64()
        .ok_or_else(|| ProtocolError::SymbolicValue {
            value: reg.bitsize.clone(),
            context: format!("tensor axis for register '{}'", reg.name),
        })?;
    if bits > 24 {
        return Err(ProtocolError::TooWide {
            register: reg.name.clone(),
            bits,
        });
    }
    Ok(1usize << bits)
}

/// The identity matrix as a rank-2 tensor.
fn identity(dim: usize) -> ArrayD<Complex64> {
    ArrayD::from_shape_fn(IxDyn(&[dim, dim]), |ix| {
        if ix[0] == ix[1] {
            Complex64::new(1.0, 0.0)
        } else {
            Complex64::new(0.0, 0.0)
        }
    })
}

/// Contract `a` and `b` along the paired axes.
///
/// The result keeps `a`'s uncontracted axes (in order) followed by `b`'s.
fn tensordot(
    a: &ArrayD<Complex64>,
    b: &ArrayD<Complex64>,
    a_axes: &[usize],
    b_axes: &[usize],
) -> ArrayD<Complex64> {
    debug_assert_eq!(a_axes.len(), b_axes.len());
    let a_keep: Vec<usize> = (0..a.ndim()).filter(|i| !a_axes.contains(i)).collect();
    let b_keep: Vec<usize> = (0..b.ndim()).filter(|i| !b_axes.contains(i)).collect();
    let k: usize = a_axes.iter().map(|&i| a.shape()[i]).product();
    let m: usize = a_keep.iter().map(|&i| a.shape()[i]).product();
    let n: usize = b_keep.iter().map(|&i| b.shape()[i]).product();

    let a_perm: Vec<usize> = a_keep.iter().chain(a_axes.iter()).copied().collect();
    let b_perm: Vec<usize> = b_axes.iter().chain(b_keep.iter()).copied().collect();
    let a_flat: Vec<Complex64> = a.view().permuted_axes(a_perm).iter().copied().collect();
    let b_flat: Vec<Complex64> = b.view().permuted_axes(b_perm).iter().copied().collect();
    let a_mat = Array2::from_shape_vec((m, k), a_flat).expect("element count preserved");
    let b_mat = Array2::from_shape_vec((k, n), b_flat).expect("element count preserved");
    let prod = a_mat.dot(&b_mat);

    let mut shape: Vec<usize> = a_keep.iter().map(|&i| a.shape()[i]).collect();
    shape.extend(b_keep.iter().map(|&i| b.shape()[i]));
    let flat: Vec<Complex64> = prod.iter().copied().collect();
    ArrayD::from_shape_vec(IxDyn(&shape), flat).expect("element count preserved")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bloq::DynBloq;
    use crate::bookkeeping::Split;
    use crate::builder::BloqBuilder;
    use crate::classical::ClassicalVals;
    use crate::error::DecomposeResult;
    use crate::register::Signature;
    use crate::soquet::SoquetMap;

    const TOL: f64 = 1e-12;

    fn c(re: f64) -> Complex64 {
        Complex64::new(re, 0.0)
    }

    /// Classical NOT with a truth-table tensor.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct NotGate;

    impl Bloq for NotGate {
        fn signature(&self) -> Signature {
            Signature::build([("q", 1u64)])
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

    #[test]
    fn test_tensordot_matmul() {
        let a = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![c(1.0), c(2.0), c(3.0), c(4.0)])
            .unwrap();
        let b = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![c(0.0), c(1.0), c(1.0), c(0.0)])
            .unwrap();
        let prod = tensordot(&a, &b, &[1], &[0]);
        assert_eq!(prod.shape(), &[2, 2]);
        assert_eq!(prod[IxDyn(&[0, 0])], c(2.0));
        assert_eq!(prod[IxDyn(&[0, 1])], c(1.0));
        assert_eq!(prod[IxDyn(&[1, 0])], c(4.0));
        assert_eq!(prod[IxDyn(&[1, 1])], c(3.0));
    }

    #[test]
    fn test_not_gate_truth_table() {
        let tensor = tensor_contract(&NotGate).unwrap();
        assert_eq!(tensor.shape(), &[2, 2]);
        assert_eq!(tensor.n_left_axes(), 1);
        assert_eq!(tensor.data()[IxDyn(&[0, 1])], c(1.0));
        assert_eq!(tensor.data()[IxDyn(&[1, 0])], c(1.0));
        assert_eq!(tensor.data()[IxDyn(&[0, 0])], c(0.0));
    }

    #[test]
    fn test_split_tensor_shape() {
        let tensor = tensor_contract(&Split::new(2)).unwrap();
        // One 4-dim input axis, two 2-dim output axes.
        assert_eq!(tensor.shape(), &[4, 2, 2]);
        for x in 0..4usize {
            let hi = x >> 1;
            let lo = x & 1;
            assert_eq!(tensor.data()[IxDyn(&[x, hi, lo])], c(1.0));
        }
    }

    #[test]
    fn test_passthrough_wire_is_identity() {
        let sig = Signature::build([("q", 1u64)]);
        let (bb, mut regs) = BloqBuilder::from_signature(&sig);
        let q = regs.take_one("q").unwrap();
        let cbloq = bb.finalize(SoquetMap::new().with("q", q)).unwrap();
        let tensor = cbloq_to_tensor(&cbloq).unwrap();
        assert_eq!(tensor.shape(), &[2, 2]);
        assert_eq!(tensor.n_left_axes(), 1);
        assert_eq!(tensor.data()[IxDyn(&[0, 0])], c(1.0));
        assert_eq!(tensor.data()[IxDyn(&[1, 1])], c(1.0));
        assert_eq!(tensor.data()[IxDyn(&[0, 1])], c(0.0));
    }

    #[test]
    fn test_double_not_contracts_to_identity() {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        struct DoubleNot;

        impl Bloq for DoubleNot {
            fn signature(&self) -> Signature {
                Signature::build([("q", 1u64)])
            }

            fn build_composite(
                &self,
                bb: &mut BloqBuilder,
                mut regs: SoquetMap,
            ) -> DecomposeResult<SoquetMap> {
                let mut q = regs.take_one("q")?;
                for _ in 0..2 {
                    q = bb.add(NotGate, SoquetMap::new().with("q", q))?.take_one("q")?;
                }
                Ok(SoquetMap::new().with("q", q))
            }
        }

        let tensor = tensor_contract(&DoubleNot).unwrap();
        let expected = Tensor::new(identity(2), 1);
        assert!(tensor.allclose(&expected, TOL));
    }

    #[test]
    fn test_conjugate_transpose() {
        let data = ArrayD::from_shape_vec(
            IxDyn(&[2, 2]),
            vec![
                Complex64::new(1.0, 0.0),
                Complex64::new(0.0, 1.0),
                Complex64::new(0.0, 0.0),
                Complex64::new(2.0, -1.0),
            ],
        )
        .unwrap();
        let tensor = Tensor::new(data, 1);
        let adj = tensor.conjugate_transpose();
        assert_eq!(adj.n_left_axes(), 1);
        assert_eq!(adj.data()[IxDyn(&[1, 0])], Complex64::new(0.0, -1.0));
        assert!(adj.conjugate_transpose().allclose(&tensor, TOL));
    }

    #[test]
    fn test_unsupported_atom() {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        struct Opaque;

        impl Bloq for Opaque {
            fn signature(&self) -> Signature {
                Signature::build([("q", 1u64)])
            }
        }

        let err = tensor_contract(&Opaque).unwrap_err();
        match err {
            ProtocolError::Unsupported { protocol, bloq } => {
                assert_eq!(protocol, "tensor");
                assert_eq!(bloq, "Opaque");
            }
            other => panic!("expected Unsupported, got {other:?}"),
        }
    }

    #[test]
    fn test_bloqref_method() {
        let tensor = NotGate.to_ref().tensor_contract().unwrap();
        assert_eq!(tensor.shape(), &[2, 2]);
    }
}
