//! Alsvid operation-graph intermediate representation
//!
//! This crate provides the core data structures for describing, composing,
//! and analyzing quantum computations as graphs of reusable operations
//! ("bloqs"). It is the foundation the rest of the Alsvid stack builds on.
//!
//! # Overview
//!
//! A [`Bloq`] declares a typed boundary of [`Register`]s and may specialize
//! any of five cooperating protocols: decomposition, adjoint, dense tensor,
//! classical simulation, and call-graph resource counting. Every protocol
//! resolves the same way: a specialized implementation on the value wins,
//! otherwise the bloq's decomposition is interpreted node by node, and a
//! bloq with neither fails with a protocol-unsupported error. Composite
//! graphs are themselves bloqs, so operations compose recursively.
//!
//! # Core Components
//!
//! - **Registers**: [`Register`], [`Signature`], [`Side`] for typed,
//!   directional wire declarations
//! - **Wires**: [`Soquet`], [`Connection`] for addressable endpoints under
//!   a linear-usage discipline
//! - **Builder**: [`BloqBuilder`] for assembling graphs with eager wiring
//!   validation
//! - **Graphs**: [`CompositeBloq`], the immutable assembled DAG
//! - **Protocols**: [`Adjoint`], [`CallGraph`], [`Tensor`],
//!   [`call_classically`] and their dispatch helpers
//! - **Symbolics**: [`SymInt`] for widths and counts left free in a
//!   parameter
//!
//! # Example: Split and Rejoin a Register
//!
//! ```rust
//! use alsvid_ir::{BloqBuilder, ClassicalVals, Signature, SoquetMap, call_classically};
//!
//! let sig = Signature::build([("q", 4u64)]);
//! let (mut bb, mut regs) = BloqBuilder::from_signature(&sig);
//! let q = regs.take_one("q").unwrap();
//! let bits = bb.split(q).unwrap();
//! assert_eq!(bits.len(), 4);
//! let q = bb.join(bits).unwrap();
//! let cbloq = bb.finalize(SoquetMap::new().with("q", q)).unwrap();
//!
//! cbloq.verify_integrity().unwrap();
//! assert_eq!(cbloq.binsts().len(), 2);
//!
//! // The reshape is classically transparent.
//! let out = call_classically(&cbloq, ClassicalVals::new().with("q", 9u64)).unwrap();
//! assert_eq!(out.int("q").unwrap(), 9);
//! ```
//!
//! # Example: Resource Counts over a Symbolic Family
//!
//! ```rust
//! use alsvid_ir::{Bloq, BloqRef, DynBloq, Signature, SymInt};
//!
//! /// A gate family parameterized by a free width `n`.
//! #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! struct Ladder;
//!
//! #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! struct Rung;
//!
//! impl Bloq for Rung {
//!     fn signature(&self) -> Signature {
//!         Signature::build([("q", 1u64)])
//!     }
//!
//!     fn callees(&self) -> Option<Vec<(BloqRef, SymInt)>> {
//!         Some(vec![]) // explicit leaf
//!     }
//! }
//!
//! impl Bloq for Ladder {
//!     fn signature(&self) -> Signature {
//!         Signature::build([("q", SymInt::symbol("n"))])
//!     }
//!
//!     fn callees(&self) -> Option<Vec<(BloqRef, SymInt)>> {
//!         Some(vec![(Rung.to_ref(), SymInt::symbol("n") - SymInt::Const(1))])
//!     }
//! }
//!
//! let graph = Ladder.to_ref().call_graph().unwrap();
//! let sigma = graph.sigma().unwrap();
//! assert_eq!(sigma[&Rung.to_ref()], SymInt::symbol("n") - SymInt::Const(1));
//! ```

pub mod adjoint;
pub mod bloq;
pub mod bookkeeping;
pub mod builder;
pub mod call_graph;
pub mod classical;
pub mod composite;
pub mod error;
pub mod register;
pub mod soquet;
pub mod symbolic;
pub mod tensor;

pub use adjoint::Adjoint;
pub use bloq::{Bloq, BloqRef, DynBloq};
pub use bookkeeping::{Allocate, Free, Join, Partition, Split};
pub use builder::BloqBuilder;
pub use call_graph::{CallGraph, build_call_graph, build_call_graph_with, ignore_bookkeeping};
pub use classical::{ClassicalVal, ClassicalVals, call_classically};
pub use composite::CompositeBloq;
pub use error::{
    BuildError, BuildResult, DecomposeError, DecomposeResult, ProtocolError, ProtocolResult,
};
pub use register::{Register, Side, Signature};
pub use soquet::{BloqInstance, Connection, Node, Soquet, SoquetGroup, SoquetMap};
pub use symbolic::SymInt;
pub use tensor::{Tensor, cbloq_to_tensor, tensor_contract, tensor_from_classical};
