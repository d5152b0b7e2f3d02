//! Registers and signatures: typed, directional wire declarations.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BuildError, BuildResult};
use crate::symbolic::SymInt;

/// Which boundary of an operation a register appears on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Side {
    /// Input-only: the register is consumed (discard, uncompute, reshape).
    Left,
    /// Output-only: the register is freshly produced (allocation, state prep).
    Right,
    /// The register passes through: present on both boundaries with the
    /// same name and type.
    #[default]
    Thru,
}

impl Side {
    /// Check if registers with this side appear on the left boundary.
    #[inline]
    pub fn appears_left(self) -> bool {
        matches!(self, Side::Left | Side::Thru)
    }

    /// Check if registers with this side appear on the right boundary.
    #[inline]
    pub fn appears_right(self) -> bool {
        matches!(self, Side::Right | Side::Thru)
    }

    /// The side a register takes in the adjoint operation.
    #[must_use]
    pub fn adjoint(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
            Side::Thru => Side::Thru,
        }
    }
}

/// A named, typed wire declaration with a side and optional multiplicity.
///
/// A register with a non-empty `shape` declares an array of wires; each
/// index tuple into the shape addresses one element, and each element is a
/// distinct soquet in an assembled graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Register {
    /// The register name, unique per boundary within a signature.
    pub name: String,
    /// Number of bits carried by each element.
    pub bitsize: SymInt,
    /// Multiplicity of the register; empty for a single wire.
    pub shape: Vec<usize>,
    /// Which boundary the register appears on.
    pub side: Side,
}

impl Register {
    /// Create a pass-through register with no shape.
    pub fn new(name: impl Into<String>, bitsize: impl Into<SymInt>) -> Self {
        Self {
            name: name.into(),
            bitsize: bitsize.into(),
            shape: vec![],
            side: Side::Thru,
        }
    }

    /// Set the register's shape.
    #[must_use]
    pub fn with_shape(mut self, shape: impl Into<Vec<usize>>) -> Self {
        self.shape = shape.into();
        self
    }

    /// Set the register's side.
    #[must_use]
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    /// Number of wire elements declared by the shape.
    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Total bits carried across all elements.
    pub fn total_bits(&self) -> SymInt {
        (self.bitsize.clone() * SymInt::from(self.num_elements())).simplify()
    }

    /// All index tuples into the shape, in row-major order.
    ///
    /// A shapeless register yields a single empty tuple.
    pub fn indices(&self) -> Vec<Vec<usize>> {
        let mut out = vec![vec![]];
        for &dim in &self.shape {
            let mut next = Vec::with_capacity(out.len() * dim);
            for prefix in &out {
                for i in 0..dim {
                    let mut idx = prefix.clone();
                    idx.push(i);
                    next.push(idx);
                }
            }
            out = next;
        }
        out
    }

    /// The same register as seen by the adjoint operation.
    #[must_use]
    pub fn adjoint(&self) -> Self {
        Self {
            side: self.side.adjoint(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.shape.is_empty() {
            write!(f, "[")?;
            for (i, dim) in self.shape.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{dim}")?;
            }
            write!(f, "]")?;
        }
        write!(f, ":{}", self.bitsize)
    }
}

/// An ordered sequence of registers declaring an operation's boundary.
///
/// Within a signature, register names are unique per boundary: a name may
/// appear on both boundaries only through a `Thru` register or an
/// explicitly paired `Left` + `Right` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    registers: Vec<Register>,
}

impl Signature {
    /// Create a signature, validating per-boundary name uniqueness.
    pub fn new(registers: Vec<Register>) -> BuildResult<Self> {
        for (i, reg) in registers.iter().enumerate() {
            for other in &registers[..i] {
                if other.name != reg.name {
                    continue;
                }
                let both_left = other.side.appears_left() && reg.side.appears_left();
                let both_right = other.side.appears_right() && reg.side.appears_right();
                if both_left || both_right {
                    return Err(BuildError::DuplicateRegister {
                        name: reg.name.clone(),
                    });
                }
            }
        }
        Ok(Self { registers })
    }

    /// Build an all-pass-through signature from name/bitsize pairs.
    ///
    /// # Panics
    ///
    /// Panics if the same name is given twice.
    pub fn build<N, B>(pairs: impl IntoIterator<Item = (N, B)>) -> Self
    where
        N: Into<String>,
        B: Into<SymInt>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, bitsize)| Register::new(name, bitsize))
                .collect(),
        )
        .expect("duplicate register name in Signature::build")
    }

    /// All registers in declaration order.
    pub fn registers(&self) -> &[Register] {
        &self.registers
    }

    /// Number of registers.
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    /// Check if the signature has no registers.
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Iterate over all registers.
    pub fn iter(&self) -> std::slice::Iter<'_, Register> {
        self.registers.iter()
    }

    /// Registers visible on the left boundary, in declaration order.
    pub fn lefts(&self) -> impl Iterator<Item = &Register> {
        self.registers.iter().filter(|r| r.side.appears_left())
    }

    /// Registers visible on the right boundary, in declaration order.
    pub fn rights(&self) -> impl Iterator<Item = &Register> {
        self.registers.iter().filter(|r| r.side.appears_right())
    }

    /// Look up a left-boundary register by name.
    pub fn get_left(&self, name: &str) -> Option<&Register> {
        self.lefts().find(|r| r.name == name)
    }

    /// Look up a right-boundary register by name.
    pub fn get_right(&self, name: &str) -> Option<&Register> {
        self.rights().find(|r| r.name == name)
    }

    /// The signature of the adjoint operation: every side flipped.
    #[must_use]
    pub fn adjoint(&self) -> Self {
        Self {
            registers: self.registers.iter().map(Register::adjoint).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Signature {
    type Item = &'a Register;
    type IntoIter = std::slice::Iter<'a, Register>;

    fn into_iter(self) -> Self::IntoIter {
        self.registers.iter()
    }
}
