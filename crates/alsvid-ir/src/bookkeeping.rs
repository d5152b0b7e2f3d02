//! Bookkeeping operations emitted by the builder's reshaping helpers.
//!
//! Splits, joins, partitions, allocations and frees are ordinary bloqs so
//! that reshaping cost is accounted for uniformly; resource reports that do
//! not care about wire plumbing drop them with
//! [`crate::call_graph::ignore_bookkeeping`].
//!
//! Bit order is big-endian throughout: element 0 of a split register and
//! the first partition field hold the most significant bits.

use crate::bloq::{Bloq, BloqRef, DynBloq};
use crate::classical::{ClassicalVal, ClassicalVals};
use crate::error::{BuildError, BuildResult, ProtocolError, ProtocolResult};
use crate::register::{Register, Side, Signature};
use crate::symbolic::SymInt;
use crate::tensor::{Tensor, tensor_from_classical};

/// Split one bitsize-`n` wire into `n` bitsize-1 wires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Split {
    /// Width of the register being split.
    pub n: u64,
}

impl Split {
    /// Create a split of an `n`-bit register.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    pub fn new(n: u64) -> Self {
        assert!(n >= 1, "cannot split a zero-width register");
        Self { n }
    }

    fn width(&self) -> usize {
        usize::try_from(self.n).expect("register width fits in usize")
    }
}

impl Bloq for Split {
    fn signature(&self) -> Signature {
        Signature::new(vec![
            Register::new("reg", self.n).with_side(Side::Left),
            Register::new("reg", 1u64)
                .with_shape([self.width()])
                .with_side(Side::Right),
        ])
        .expect("split signature is valid")
    }

    fn adjoint(&self) -> BloqRef {
        Join::new(self.n).to_ref()
    }

    fn classical_action(&self, vals: &ClassicalVals) -> Option<ProtocolResult<ClassicalVals>> {
        Some((|| {
            let x = vals.int("reg")?;
            let bits: Vec<u64> = (0..self.n).map(|k| (x >> (self.n - 1 - k)) & 1).collect();
            Ok(ClassicalVals::new().with("reg", bits))
        })())
    }

    fn dense_tensor(&self) -> Option<ProtocolResult<Tensor>> {
        Some(tensor_from_classical(self))
    }
}

/// Join `n` bitsize-1 wires into one bitsize-`n` wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Join {
    /// Width of the joined register.
    pub n: u64,
}

impl Join {
    /// Create a join producing an `n`-bit register.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    pub fn new(n: u64) -> Self {
        assert!(n >= 1, "cannot join zero soquets");
        Self { n }
    }

    fn width(&self) -> usize {
        usize::try_from(self.n).expect("register width fits in usize")
    }
}

impl Bloq for Join {
    fn signature(&self) -> Signature {
        Signature::new(vec![
            Register::new("reg", 1u64)
                .with_shape([self.width()])
                .with_side(Side::Left),
            Register::new("reg", self.n).with_side(Side::Right),
        ])
        .expect("join signature is valid")
    }

    fn adjoint(&self) -> BloqRef {
        Split::new(self.n).to_ref()
    }

    fn classical_action(&self, vals: &ClassicalVals) -> Option<ProtocolResult<ClassicalVals>> {
        Some((|| {
            let bits = vals.array("reg")?;
            let x = bits
                .iter()
                .fold(0u64, |acc, &bit| (acc << 1) | (bit & 1));
            Ok(ClassicalVals::new().with("reg", x))
        })())
    }

    fn dense_tensor(&self) -> Option<ProtocolResult<Tensor>> {
        Some(tensor_from_classical(self))
    }
}

/// Regroup one flat wire into named sub-registers, or back.
///
/// Fields are laid out most-significant first, in declaration order. The
/// `partition` flag selects the direction; the adjoint flips it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    /// Total width of the flat register.
    pub n: SymInt,
    /// The named sub-registers, covering the flat register exactly.
    pub parts: Vec<Register>,
    /// `true` regroups flat → parts; `false` is the inverse.
    pub partition: bool,
}

impl Partition {
    /// Create a flat → parts regrouping.
    pub fn new(n: impl Into<SymInt>, parts: Vec<Register>) -> BuildResult<Self> {
        Self::create(n.into(), parts, true)
    }

    /// Create a parts → flat regrouping.
    pub fn unpartition(n: impl Into<SymInt>, parts: Vec<Register>) -> BuildResult<Self> {
        Self::create(n.into(), parts, false)
    }

    fn create(n: SymInt, parts: Vec<Register>, partition: bool) -> BuildResult<Self> {
        if parts.is_empty() {
            return Err(BuildError::PartitionMismatch {
                total: n,
                parts: SymInt::Const(0),
            });
        }
        for (i, part) in parts.iter().enumerate() {
            if part.name == "x" || parts[..i].iter().any(|p| p.name == part.name) {
                return Err(BuildError::DuplicateRegister {
                    name: part.name.clone(),
                });
            }
        }
        let covered = Self::parts_total(&parts);
        let total = n.simplify();
        if let (Some(a), Some(b)) = (total.as_u64(), covered.as_u64()) {
            if a != b {
                return Err(BuildError::PartitionMismatch {
                    total,
                    parts: covered,
                });
            }
        }
        Ok(Self {
            n: total,
            parts,
            partition,
        })
    }

    /// Total bits covered by a set of part registers.
    pub fn parts_total(parts: &[Register]) -> SymInt {
        parts
            .iter()
            .fold(SymInt::Const(0), |acc, r| acc + r.total_bits())
            .simplify()
    }

    fn flat_side(&self) -> Side {
        if self.partition { Side::Left } else { Side::Right }
    }
}

impl Bloq for Partition {
    fn signature(&self) -> Signature {
        let mut registers = vec![
            Register::new("x", self.n.clone()).with_side(self.flat_side()),
        ];
        registers.extend(self.parts.iter().map(|part| Register {
            side: self.flat_side().adjoint(),
            ..part.clone()
        }));
        Signature::new(registers).expect("partition signature is valid")
    }

    fn adjoint(&self) -> BloqRef {
        Self {
            partition: !self.partition,
            ..self.clone()
        }
        .to_ref()
    }

    fn classical_action(&self, vals: &ClassicalVals) -> Option<ProtocolResult<ClassicalVals>> {
        Some(if self.partition {
            self.scatter(vals)
        } else {
            self.gather(vals)
        })
    }

    fn dense_tensor(&self) -> Option<ProtocolResult<Tensor>> {
        Some(tensor_from_classical(self))
    }
}

impl Partition {
    /// Per-field widths in layout order, most significant first.
    fn field_widths(&self) -> ProtocolResult<Vec<(String, usize, u64)>> {
        let mut fields = vec![];
        for part in &self.parts {
            let bits = part
                .bitsize
                .as_u64()
                .ok_or_else(|| ProtocolError::SymbolicValue {
                    value: part.bitsize.clone(),
                    context: format!("partition field '{}'", part.name),
                })?;
            fields.push((part.name.clone(), part.num_elements(), bits));
        }
        Ok(fields)
    }

    fn scatter(&self, vals: &ClassicalVals) -> ProtocolResult<ClassicalVals> {
        let x = vals.int("x")?;
        let total = self.n.as_u64().ok_or_else(|| ProtocolError::SymbolicValue {
            value: self.n.clone(),
            context: "partition total width".to_string(),
        })?;
        let mut remaining = total;
        let mut out = ClassicalVals::new();
        for (name, elements, bits) in self.field_widths()? {
            let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
            let values: Vec<u64> = (0..elements)
                .map(|_| {
                    remaining -= bits;
                    (x >> remaining) & mask
                })
                .collect();
            let part = self
                .parts
                .iter()
                .find(|p| p.name == name)
                .expect("field came from parts");
            if part.shape.is_empty() {
                out.insert(name, values[0]);
            } else {
                out.insert(name, values);
            }
        }
        Ok(out)
    }

    fn gather(&self, vals: &ClassicalVals) -> ProtocolResult<ClassicalVals> {
        let total = self.n.as_u64().ok_or_else(|| ProtocolError::SymbolicValue {
            value: self.n.clone(),
            context: "partition total width".to_string(),
        })?;
        let mut remaining = total;
        let mut x = 0u64;
        for (name, elements, bits) in self.field_widths()? {
            let val = vals.get(&name).ok_or_else(|| ProtocolError::MissingValue {
                register: name.clone(),
            })?;
            let element_vals = match val {
                ClassicalVal::Int(v) => vec![*v],
                ClassicalVal::Array(vs) => vs.clone(),
            };
            if element_vals.len() != elements {
                return Err(ProtocolError::WrongShape {
                    register: name,
                    expected: elements,
                    got: element_vals.len(),
                });
            }
            for v in element_vals {
                remaining -= bits;
                x |= v << remaining;
            }
        }
        Ok(ClassicalVals::new().with("x", x))
    }
}

/// Allocate a fresh `n`-bit register in the all-zero state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Allocate {
    /// Width of the allocated register.
    pub n: SymInt,
}

impl Allocate {
    /// Create an allocation of `n` bits.
    pub fn new(n: impl Into<SymInt>) -> Self {
        Self { n: n.into() }
    }
}

impl Bloq for Allocate {
    fn signature(&self) -> Signature {
        Signature::new(vec![
            Register::new("reg", self.n.clone()).with_side(Side::Right),
        ])
        .expect("allocate signature is valid")
    }

    fn adjoint(&self) -> BloqRef {
        Free { n: self.n.clone() }.to_ref()
    }

    fn classical_action(&self, _vals: &ClassicalVals) -> Option<ProtocolResult<ClassicalVals>> {
        Some(Ok(ClassicalVals::new().with("reg", 0u64)))
    }

    fn dense_tensor(&self) -> Option<ProtocolResult<Tensor>> {
        Some(tensor_from_classical(self))
    }
}

/// Discard an `n`-bit register, which must carry the all-zero state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Free {
    /// Width of the discarded register.
    pub n: SymInt,
}

impl Free {
    /// Create a free of `n` bits.
    pub fn new(n: impl Into<SymInt>) -> Self {
        Self { n: n.into() }
    }
}

impl Bloq for Free {
    fn signature(&self) -> Signature {
        Signature::new(vec![
            Register::new("reg", self.n.clone()).with_side(Side::Left),
        ])
        .expect("free signature is valid")
    }

    fn adjoint(&self) -> BloqRef {
        Allocate { n: self.n.clone() }.to_ref()
    }

    fn classical_action(&self, vals: &ClassicalVals) -> Option<ProtocolResult<ClassicalVals>> {
        Some((|| {
            let value = vals.int("reg")?;
            if value != 0 {
                return Err(ProtocolError::RejectedValue {
                    bloq: self.name(),
                    register: "reg".to_string(),
                    value,
                    reason: "freed register must be zero".to_string(),
                });
            }
            Ok(ClassicalVals::new())
        })())
    }

    fn dense_tensor(&self) -> Option<ProtocolResult<Tensor>> {
        Some(tensor_from_classical(self))
    }
}
