//! The polymorphic operation interface.
//!
//! Every unit of computation in the IR is a value implementing [`Bloq`]:
//! atomic gates, reshaping bookkeeping, and whole composite graphs alike.
//! Each analysis protocol is an optional trait method whose default encodes
//! the "not provided" state, so the dispatch layer can distinguish a bloq
//! that supplies no answer from one that explicitly supplies an empty one.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::adjoint::Adjoint;
use crate::builder::BloqBuilder;
use crate::classical::ClassicalVals;
use crate::composite::CompositeBloq;
use crate::error::{DecomposeError, DecomposeResult, ProtocolResult};
use crate::register::Signature;
use crate::soquet::SoquetMap;
use crate::symbolic::SymInt;
use crate::tensor::Tensor;

/// Object-safe structural equality, hashing, and cloning for bloq trait
/// objects.
///
/// Blanket-implemented for every [`Bloq`] type that is `Clone`, `PartialEq`
/// and `Hash`; implementors never write this by hand. Equality must be
/// structural (two values built from equal constructor arguments compare
/// equal), which is what makes bloq values safe memoization keys.
pub trait DynBloq: Any {
    /// Compare against another type-erased value.
    fn dyn_eq(&self, other: &dyn Any) -> bool;

    /// Feed this value (including its type identity) into a hasher.
    fn dyn_hash(&self, state: &mut dyn Hasher);

    /// Upcast for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Clone `self` into a shared, type-erased handle.
    fn to_ref(&self) -> BloqRef;
}

impl<B> DynBloq for B
where
    B: Bloq + Clone + PartialEq + Hash,
{
    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<B>().is_some_and(|o| self == o)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<B>().hash(&mut state);
        self.hash(&mut state);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_ref(&self) -> BloqRef {
        BloqRef(Arc::new(self.clone()))
    }
}

/// The polymorphic unit of computation.
///
/// A bloq declares its boundary through [`Bloq::signature`] and may
/// specialize any of the five protocols. Every protocol falls back to the
/// decomposition when no specialization is provided; decomposition itself
/// has no further fallback, so a bloq either supplies
/// [`Bloq::build_composite`] or is an atomic leaf.
///
/// Bloq values are immutable and structurally comparable. Implementors
/// derive `Clone`, `PartialEq` and `Hash` (fields must avoid
/// non-hashable payloads such as floats) and get [`DynBloq`] for free.
pub trait Bloq: DynBloq + fmt::Debug + Send + Sync {
    /// The typed boundary of this operation.
    fn signature(&self) -> Signature;

    /// Short name used in diagnostics, call graphs and error messages.
    fn name(&self) -> String {
        let dbg = format!("{self:?}");
        dbg.split([' ', '(', '{'])
            .next()
            .unwrap_or("bloq")
            .to_string()
    }

    /// Tier-1 decomposition: wire this bloq's internals into `bb`.
    ///
    /// `regs` holds one soquet group per left-visible register; the
    /// returned map must bind every right-visible register. The default
    /// declares the bloq atomic.
    fn build_composite(
        &self,
        bb: &mut BloqBuilder,
        regs: SoquetMap,
    ) -> DecomposeResult<SoquetMap> {
        let _ = (bb, regs);
        Err(DecomposeError::Atomic { bloq: self.name() })
    }

    /// Decompose into a composite graph of simpler bloqs.
    ///
    /// Drives a fresh builder through [`Bloq::build_composite`];
    /// [`CompositeBloq`] overrides this to return itself.
    fn decompose(&self) -> DecomposeResult<CompositeBloq> {
        let (mut bb, regs) = BloqBuilder::from_signature(&self.signature());
        let out = self.build_composite(&mut bb, regs)?;
        Ok(bb.finalize(out)?)
    }

    /// The Hermitian-conjugate counterpart of this bloq.
    ///
    /// The default wraps `self` in the generic [`Adjoint`] meta-bloq;
    /// bloqs with a natural adjoint of their own kind override this.
    /// `Adjoint` itself overrides it to unwrap, so taking the adjoint
    /// twice always resolves back to the original value.
    fn adjoint(&self) -> BloqRef {
        Adjoint::new(self.to_ref()).to_ref()
    }

    /// Specialized dense tensor, if this bloq provides one.
    ///
    /// `None` is the "not provided" state: the tensor protocol then falls
    /// back to decomposition and network contraction.
    fn dense_tensor(&self) -> Option<ProtocolResult<Tensor>> {
        None
    }

    /// Specialized classical action, if this bloq provides one.
    ///
    /// Maps left-register values to right-register values. `None` is the
    /// "not provided" state: the classical protocol then falls back to
    /// decomposition. Input values arrive pre-validated against the
    /// signature.
    fn classical_action(&self, vals: &ClassicalVals) -> Option<ProtocolResult<ClassicalVals>> {
        let _ = vals;
        None
    }

    /// Immediate callees with multiplicities, if this bloq declares them.
    ///
    /// `None` means "count the decomposition's children". `Some(vec![])`
    /// marks the bloq as an explicit leaf; the call-graph engine will not
    /// decompose it even when a decomposition exists.
    fn callees(&self) -> Option<Vec<(BloqRef, SymInt)>> {
        None
    }
}

/// A shared, type-erased handle to an immutable bloq value.
///
/// Equality and hashing are structural and delegate to the underlying
/// value, so `BloqRef` works as a key in the call-graph visited set and
/// other memo tables.
#[derive(Clone)]
pub struct BloqRef(Arc<dyn Bloq>);

impl BloqRef {
    /// Wrap a bloq value.
    pub fn new<B: Bloq>(bloq: B) -> Self {
        BloqRef(Arc::new(bloq))
    }

    /// Downcast to a concrete bloq type.
    pub fn downcast_ref<B: Bloq>(&self) -> Option<&B> {
        self.0.as_any().downcast_ref()
    }

    /// Check whether the underlying value has type `B`.
    pub fn is<B: Bloq>(&self) -> bool {
        self.downcast_ref::<B>().is_some()
    }
}

impl std::ops::Deref for BloqRef {
    type Target = dyn Bloq;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl fmt::Debug for BloqRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl PartialEq for BloqRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(other.0.as_any())
    }
}

impl Eq for BloqRef {}

impl Hash for BloqRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.dyn_hash(state);
    }
}
