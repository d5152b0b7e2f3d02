//! Symbolic integer expressions for parameterized register widths and counts.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A concrete or symbolic non-negative integer.
///
/// Register widths and call-graph multiplicities are `SymInt` values, so a
/// bloq family can be declared over a free size parameter and its resource
/// counts read off as closed-form expressions instead of enumerated sizes.
///
/// Unlike floating-point parameter expressions, `SymInt` is `Eq + Hash`:
/// bloq values containing it remain usable as memoization keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymInt {
    /// A concrete value.
    Const(u64),
    /// A free symbolic parameter.
    Symbol(String),
    /// Addition.
    Add(Box<SymInt>, Box<SymInt>),
    /// Subtraction. Evaluation fails (stays symbolic) on underflow.
    Sub(Box<SymInt>, Box<SymInt>),
    /// Multiplication.
    Mul(Box<SymInt>, Box<SymInt>),
}

impl SymInt {
    /// Create a concrete value.
    pub fn constant(value: u64) -> Self {
        SymInt::Const(value)
    }

    /// Create a free symbolic parameter.
    pub fn symbol(name: impl Into<String>) -> Self {
        SymInt::Symbol(name.into())
    }

    /// Check if this expression contains any free symbols.
    pub fn is_symbolic(&self) -> bool {
        match self {
            SymInt::Symbol(_) => true,
            SymInt::Const(_) => false,
            SymInt::Add(a, b) | SymInt::Sub(a, b) | SymInt::Mul(a, b) => {
                a.is_symbolic() || b.is_symbolic()
            }
        }
    }

    /// Try to evaluate as a concrete value.
    ///
    /// Returns `None` if the expression contains a free symbol or if the
    /// arithmetic over- or underflows `u64`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            SymInt::Const(v) => Some(*v),
            SymInt::Symbol(_) => None,
            SymInt::Add(a, b) => a.as_u64()?.checked_add(b.as_u64()?),
            SymInt::Sub(a, b) => a.as_u64()?.checked_sub(b.as_u64()?),
            SymInt::Mul(a, b) => a.as_u64()?.checked_mul(b.as_u64()?),
        }
    }

    /// Get all free symbol names in this expression.
    pub fn symbols(&self) -> HashSet<String> {
        let mut set = HashSet::new();
        self.collect_symbols(&mut set);
        set
    }

    fn collect_symbols(&self, set: &mut HashSet<String>) {
        match self {
            SymInt::Const(_) => {}
            SymInt::Symbol(name) => {
                set.insert(name.clone());
            }
            SymInt::Add(a, b) | SymInt::Sub(a, b) | SymInt::Mul(a, b) => {
                a.collect_symbols(set);
                b.collect_symbols(set);
            }
        }
    }

    /// Bind a symbol to a value, returning a new expression.
    #[must_use]
    pub fn bind(&self, name: &str, value: u64) -> Self {
        match self {
            SymInt::Symbol(n) if n == name => SymInt::Const(value),
            SymInt::Const(_) | SymInt::Symbol(_) => self.clone(),
            SymInt::Add(a, b) => {
                SymInt::Add(Box::new(a.bind(name, value)), Box::new(b.bind(name, value)))
            }
            SymInt::Sub(a, b) => {
                SymInt::Sub(Box::new(a.bind(name, value)), Box::new(b.bind(name, value)))
            }
            SymInt::Mul(a, b) => {
                SymInt::Mul(Box::new(a.bind(name, value)), Box::new(b.bind(name, value)))
            }
        }
    }

    /// Simplify by folding constant subexpressions and arithmetic identities
    /// (`x + 0`, `x * 1`, `x * 0`, `x - 0`).
    #[must_use]
    pub fn simplify(&self) -> Self {
        if let Some(v) = self.as_u64() {
            return SymInt::Const(v);
        }
        match self {
            SymInt::Const(_) | SymInt::Symbol(_) => self.clone(),
            SymInt::Add(a, b) => {
                let a = a.simplify();
                let b = b.simplify();
                match (&a, &b) {
                    (SymInt::Const(0), _) => b,
                    (_, SymInt::Const(0)) => a,
                    _ => SymInt::Add(Box::new(a), Box::new(b)),
                }
            }
            SymInt::Sub(a, b) => {
                let a = a.simplify();
                let b = b.simplify();
                match &b {
                    SymInt::Const(0) => a,
                    _ => SymInt::Sub(Box::new(a), Box::new(b)),
                }
            }
            SymInt::Mul(a, b) => {
                let a = a.simplify();
                let b = b.simplify();
                match (&a, &b) {
                    (SymInt::Const(0), _) | (_, SymInt::Const(0)) => SymInt::Const(0),
                    (SymInt::Const(1), _) => b,
                    (_, SymInt::Const(1)) => a,
                    _ => SymInt::Mul(Box::new(a), Box::new(b)),
                }
            }
        }
    }
}

impl fmt::Display for SymInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymInt::Const(v) => write!(f, "{v}"),
            SymInt::Symbol(name) => write!(f, "{name}"),
            SymInt::Add(a, b) => write!(f, "({a} + {b})"),
            SymInt::Sub(a, b) => write!(f, "({a} - {b})"),
            SymInt::Mul(a, b) => write!(f, "({a} * {b})"),
        }
    }
}

impl From<u64> for SymInt {
    fn from(value: u64) -> Self {
        SymInt::Const(value)
    }
}

impl From<u32> for SymInt {
    fn from(value: u32) -> Self {
        SymInt::Const(u64::from(value))
    }
}

impl From<usize> for SymInt {
    fn from(value: usize) -> Self {
        SymInt::Const(u64::try_from(value).expect("usize exceeds u64::MAX"))
    }
}

impl std::ops::Add for SymInt {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        SymInt::Add(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Sub for SymInt {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        SymInt::Sub(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Mul for SymInt {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        SymInt::Mul(Box::new(self), Box::new(rhs))
    }
}
