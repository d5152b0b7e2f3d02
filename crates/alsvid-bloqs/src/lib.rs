//! Primitive operation catalog for the Alsvid IR.
//!
//! A small set of atomic bloqs exercising every protocol of the core:
//! Clifford-layer gates ([`XGate`], [`CNot`]), the costed non-Clifford
//! primitive ([`TGate`]), state preparations and their adjoint effects
//! ([`ZeroState`], [`PlusState`], ...), and the AND gadgets used for
//! resource accounting ([`And`], [`MultiAnd`]).

pub mod gates;
pub mod logic;
pub mod states;

pub use gates::{CNot, TGate, XGate};
pub use logic::{And, MultiAnd};
pub use states::{PlusEffect, PlusState, ZeroEffect, ZeroState};
