//! Soquets and connections: addressable wire endpoints and the edges
//! joining them.
//!
//! A soquet is produced by exactly one operation output and consumed by
//! exactly one operation input. Quantum wires cannot be implicitly copied
//! or dropped, so soquets follow a linear-usage discipline enforced by the
//! builder rather than an aliasing model.

use std::collections::BTreeMap;
use std::fmt;

use crate::bloq::{Bloq, BloqRef};
use crate::error::{BuildError, BuildResult};
use crate::register::Register;

/// One instantiation of a bloq inside a composite graph.
///
/// The index `i` distinguishes repeated uses of structurally equal bloq
/// values within the same graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BloqInstance {
    /// Position of this instance within its graph.
    pub i: usize,
    /// The operation value.
    pub bloq: BloqRef,
}

impl fmt::Display for BloqInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.bloq.name(), self.i)
    }
}

/// A node in the operation graph: a bloq instance or one of the two
/// boundary markers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    /// The graph's left boundary; inputs enter here.
    LeftDangle,
    /// The graph's right boundary; outputs leave here.
    RightDangle,
    /// An operation node.
    Inst(BloqInstance),
}

impl Node {
    /// Check if this is the left boundary marker.
    #[inline]
    pub fn is_left_dangle(&self) -> bool {
        matches!(self, Node::LeftDangle)
    }

    /// Check if this is the right boundary marker.
    #[inline]
    pub fn is_right_dangle(&self) -> bool {
        matches!(self, Node::RightDangle)
    }

    /// Get the bloq instance if this is an operation node.
    #[inline]
    pub fn inst(&self) -> Option<&BloqInstance> {
        match self {
            Node::Inst(binst) => Some(binst),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::LeftDangle => write!(f, "LeftDangle"),
            Node::RightDangle => write!(f, "RightDangle"),
            Node::Inst(binst) => write!(f, "{binst}"),
        }
    }
}

/// One concrete wire endpoint: an element of a register on a node's
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Soquet {
    /// The node this endpoint belongs to.
    pub node: Node,
    /// The register the endpoint is an element of.
    pub reg: Register,
    /// Index tuple into the register's shape; empty for a single wire.
    pub idx: Vec<usize>,
}

impl Soquet {
    /// Create a soquet for a shapeless register.
    pub fn new(node: Node, reg: Register) -> Self {
        Self {
            node,
            reg,
            idx: vec![],
        }
    }

    /// Create a soquet for one element of a shaped register.
    pub fn with_idx(node: Node, reg: Register, idx: Vec<usize>) -> Self {
        Self { node, reg, idx }
    }
}

impl fmt::Display for Soquet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.reg.name)?;
        if !self.idx.is_empty() {
            write!(f, "[")?;
            for (i, v) in self.idx.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{v}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// A directed edge from a producing soquet to a consuming soquet.
///
/// The two endpoints always carry equal element bitsizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    /// The producing endpoint.
    pub left: Soquet,
    /// The consuming endpoint.
    pub right: Soquet,
}

/// The soquets bound to a single register slot.
///
/// A shapeless register binds exactly one soquet; a shaped register binds
/// one soquet per element, flattened in row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SoquetGroup {
    /// A single wire.
    One(Soquet),
    /// A shaped register's elements in row-major order.
    Array(Vec<Soquet>),
}

impl SoquetGroup {
    /// Number of soquets in the group.
    pub fn len(&self) -> usize {
        match self {
            SoquetGroup::One(_) => 1,
            SoquetGroup::Array(soqs) => soqs.len(),
        }
    }

    /// Check if the group is empty (only possible for an empty array).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the soquets in order.
    pub fn iter(&self) -> impl Iterator<Item = &Soquet> {
        match self {
            SoquetGroup::One(soq) => std::slice::from_ref(soq).iter(),
            SoquetGroup::Array(soqs) => soqs.iter(),
        }
    }

    /// Flatten into a vector of soquets.
    pub fn into_vec(self) -> Vec<Soquet> {
        match self {
            SoquetGroup::One(soq) => vec![soq],
            SoquetGroup::Array(soqs) => soqs,
        }
    }

    /// Extract the single soquet, if this is a `One` group.
    pub fn into_one(self) -> Option<Soquet> {
        match self {
            SoquetGroup::One(soq) => Some(soq),
            SoquetGroup::Array(_) => None,
        }
    }
}

impl From<Soquet> for SoquetGroup {
    fn from(soq: Soquet) -> Self {
        SoquetGroup::One(soq)
    }
}

impl From<Vec<Soquet>> for SoquetGroup {
    fn from(soqs: Vec<Soquet>) -> Self {
        SoquetGroup::Array(soqs)
    }
}

/// Ordered register-name to soquet-group bindings.
///
/// This is the currency of the builder and of decomposition callbacks:
/// `add` consumes one, `finalize` consumes one, and `build_composite`
/// receives and returns one. Iteration order is by name, so the map is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoquetMap {
    entries: BTreeMap<String, SoquetGroup>,
}

impl SoquetMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding, returning the map for chaining.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, soqs: impl Into<SoquetGroup>) -> Self {
        self.insert(name, soqs);
        self
    }

    /// Insert a binding.
    pub fn insert(&mut self, name: impl Into<String>, soqs: impl Into<SoquetGroup>) {
        self.entries.insert(name.into(), soqs.into());
    }

    /// Look up a binding by name.
    pub fn get(&self, name: &str) -> Option<&SoquetGroup> {
        self.entries.get(name)
    }

    /// Remove and return a binding by name.
    pub fn take(&mut self, name: &str) -> Option<SoquetGroup> {
        self.entries.remove(name)
    }

    /// Remove the binding for `name`, requiring a single soquet.
    pub fn take_one(&mut self, name: &str) -> BuildResult<Soquet> {
        let group = self.take(name).ok_or_else(|| BuildError::MissingSoquets {
            name: name.to_string(),
        })?;
        let len = group.len();
        group.into_one().ok_or(BuildError::ShapeMismatch {
            register: name.to_string(),
            expected: 1,
            got: len,
        })
    }

    /// Remove the binding for `name` as a flat vector of soquets.
    pub fn take_array(&mut self, name: &str) -> BuildResult<Vec<Soquet>> {
        let group = self.take(name).ok_or_else(|| BuildError::MissingSoquets {
            name: name.to_string(),
        })?;
        Ok(group.into_vec())
    }

    /// Iterate over bound names, in name order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate over bindings, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &SoquetGroup)> {
        self.entries.iter()
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

impl IntoIterator for SoquetMap {
    type Item = (String, SoquetGroup);
    type IntoIter = std::collections::btree_map::IntoIter<String, SoquetGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<N: Into<String>, G: Into<SoquetGroup>> FromIterator<(N, G)> for SoquetMap {
    fn from_iter<T: IntoIterator<Item = (N, G)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (name, group) in iter {
            map.insert(name, group);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::Register;

    fn dangle_soquet(name: &str) -> Soquet {
        Soquet::new(Node::LeftDangle, Register::new(name, 1u64))
    }

    #[test]
    fn test_soquet_display() {
        let soq = dangle_soquet("q");
        assert_eq!(soq.to_string(), "LeftDangle.q");

        let soq = Soquet::with_idx(
            Node::LeftDangle,
            Register::new("xs", 1u64).with_shape([2, 2]),
            vec![1, 0],
        );
        assert_eq!(soq.to_string(), "LeftDangle.xs[1,0]");
    }

    #[test]
    fn test_group_len_and_iter() {
        let g: SoquetGroup = dangle_soquet("a").into();
        assert_eq!(g.len(), 1);
        assert_eq!(g.iter().count(), 1);

        let g: SoquetGroup = vec![dangle_soquet("a"), dangle_soquet("b")].into();
        assert_eq!(g.len(), 2);
        assert!(g.into_one().is_none());
    }

    #[test]
    fn test_map_take_one() {
        let mut map = SoquetMap::new().with("q", dangle_soquet("q"));
        let soq = map.take_one("q").unwrap();
        assert_eq!(soq.reg.name, "q");
        assert!(matches!(
            map.take_one("q"),
            Err(BuildError::MissingSoquets { .. })
        ));
    }

    #[test]
    fn test_map_take_one_rejects_array() {
        let mut map =
            SoquetMap::new().with("xs", vec![dangle_soquet("xs"), dangle_soquet("xs")]);
        assert!(matches!(
            map.take_one("xs"),
            Err(BuildError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_map_is_name_ordered() {
        let map = SoquetMap::new()
            .with("b", dangle_soquet("b"))
            .with("a", dangle_soquet("a"));
        let names: Vec<_> = map.names().collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
