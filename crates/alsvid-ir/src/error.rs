//! Error types for the operation-graph IR.

use thiserror::Error;

use crate::symbolic::SymInt;

/// Errors raised while wiring an operation graph.
///
/// Every variant is raised synchronously at the builder call that caused it
/// and names the offending soquet or register; there is no deferred
/// validation pass.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// A register name appears twice on the same boundary of a signature.
    #[error("register '{name}' is declared more than once on the same boundary")]
    DuplicateRegister {
        /// The duplicated register name.
        name: String,
    },

    /// Soquets were supplied for a name the target has no register for.
    #[error("{target} has no register named '{name}'")]
    UnknownRegister {
        /// The bloq (or boundary) that rejected the name.
        target: String,
        /// The unknown register name.
        name: String,
    },

    /// No soquets were supplied for a required register.
    #[error("no soquets bound for register '{name}'")]
    MissingSoquets {
        /// The register that was left unbound.
        name: String,
    },

    /// The number of soquets does not match the register's shape.
    #[error("register '{register}' expects {expected} soquet(s), got {got}")]
    ShapeMismatch {
        /// The register being bound.
        register: String,
        /// Number of elements declared by the register's shape.
        expected: usize,
        /// Number of soquets actually supplied.
        got: usize,
    },

    /// A supplied soquet's element bitsize differs from the register's.
    #[error(
        "register '{register}' has element bitsize {expected}, but soquet {soquet} carries {got} bit(s)"
    )]
    BitsizeMismatch {
        /// The register being bound.
        register: String,
        /// The offending soquet.
        soquet: String,
        /// The register's element bitsize.
        expected: SymInt,
        /// The soquet's element bitsize.
        got: SymInt,
    },

    /// A soquet was consumed twice, or does not belong to this builder.
    #[error("soquet {soquet} was already consumed or is not available in this builder")]
    UsedSoquet {
        /// The offending soquet.
        soquet: String,
    },

    /// A produced soquet was never consumed before finalize.
    #[error("soquet {soquet} was never consumed; bind it at finalize or feed it to another bloq")]
    UnconsumedSoquet {
        /// The dangling soquet.
        soquet: String,
    },

    /// A width that must be concrete is symbolic.
    #[error("cannot {context}: bitsize {bitsize} is symbolic")]
    SymbolicWidth {
        /// What was being attempted.
        context: String,
        /// The symbolic width.
        bitsize: SymInt,
    },

    /// Join was called with no soquets.
    #[error("join requires at least one soquet")]
    EmptyJoin,

    /// Partition registers do not cover the source register exactly.
    #[error("partition registers carry {parts} bit(s) total, but the source register carries {total}")]
    PartitionMismatch {
        /// Total bits of the flat source register.
        total: SymInt,
        /// Total bits covered by the named sub-registers.
        parts: SymInt,
    },

    /// Structural invariant violation detected in an assembled graph.
    #[error("invalid operation graph: {0}")]
    InvalidGraph(String),
}

/// Result type for graph-construction operations.
pub type BuildResult<T> = Result<T, BuildError>;

/// Errors raised when asking a bloq for its decomposition.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecomposeError {
    /// The bloq is a true leaf with no decomposition.
    ///
    /// Callers walking a graph down to its leaves must treat this as an
    /// expected terminal condition, not a failure.
    #[error("bloq '{bloq}' is atomic and has no decomposition")]
    Atomic {
        /// The atomic bloq.
        bloq: String,
    },

    /// The decomposition cannot be expanded with a symbolic parameter.
    #[error("bloq '{bloq}' cannot be decomposed while parameter {param} is symbolic")]
    Symbolic {
        /// The bloq whose decomposition was requested.
        bloq: String,
        /// The free parameter blocking expansion.
        param: SymInt,
    },

    /// The decomposition callback produced an invalid wiring.
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Result type for decomposition.
pub type DecomposeResult<T> = Result<T, DecomposeError>;

/// Errors raised by the tensor, classical, and call-graph protocols.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The bloq neither specializes the protocol nor decomposes.
    #[error("protocol '{protocol}' is unsupported for bloq '{bloq}': no specialized implementation and no decomposition")]
    Unsupported {
        /// The protocol that was requested.
        protocol: &'static str,
        /// The bloq it was requested on.
        bloq: String,
    },

    /// A concrete value is required but a free symbol remains.
    #[error("symbolic value {value} where a concrete value is required ({context})")]
    SymbolicValue {
        /// The symbolic expression.
        value: SymInt,
        /// What required a concrete value.
        context: String,
    },

    /// A register is too wide for dense evaluation.
    #[error("register '{register}' is {bits} bit(s) wide, beyond what dense evaluation supports")]
    TooWide {
        /// The register name.
        register: String,
        /// Its width in bits.
        bits: u64,
    },

    /// A classical value exceeds its register's range.
    #[error("classical value {value} does not fit in {bits} bit(s) for register '{register}'")]
    OutOfRange {
        /// The register name.
        register: String,
        /// The offending value.
        value: u64,
        /// The register's width in bits.
        bits: u64,
    },

    /// A classical value is missing for a left-boundary register.
    #[error("missing classical value for register '{register}'")]
    MissingValue {
        /// The register with no value.
        register: String,
    },

    /// A classical value was supplied for a name with no left register.
    #[error("unexpected classical value for '{register}'")]
    UnexpectedValue {
        /// The name with no matching register.
        register: String,
    },

    /// A classical value has the wrong number of elements.
    #[error("register '{register}' expects {expected} classical element(s), got {got}")]
    WrongShape {
        /// The register name.
        register: String,
        /// Elements declared by the register's shape.
        expected: usize,
        /// Elements supplied.
        got: usize,
    },

    /// A bloq's classical action rejected an input value.
    #[error("bloq '{bloq}' rejected classical value {value} for register '{register}': {reason}")]
    RejectedValue {
        /// The rejecting bloq.
        bloq: String,
        /// The register name.
        register: String,
        /// The rejected value.
        value: u64,
        /// Why the value was rejected.
        reason: String,
    },

    /// The call graph contains a cycle, so leaf totals are undefined.
    #[error("call graph contains a cycle; totals are undefined without a coarsening generalizer")]
    CyclicCallGraph,

    /// The generalizer erased the root of a call-graph query.
    #[error("the generalizer mapped the call-graph root '{bloq}' to nothing")]
    GeneralizedRoot {
        /// The erased root bloq.
        bloq: String,
    },

    /// A decomposition failure surfaced through a protocol fallback.
    #[error(transparent)]
    Decompose(#[from] DecomposeError),
}

/// Result type for protocol queries.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_offender() {
        let err = BuildError::UnconsumedSoquet {
            soquet: "CNot#2.target".to_string(),
        };
        assert!(err.to_string().contains("CNot#2.target"));

        let err = ProtocolError::Unsupported {
            protocol: "tensor",
            bloq: "Mystery".to_string(),
        };
        assert!(err.to_string().contains("tensor"));
        assert!(err.to_string().contains("Mystery"));
    }

    #[test]
    fn test_atomic_is_distinct_from_build_failure() {
        let atomic = DecomposeError::Atomic {
            bloq: "T".to_string(),
        };
        assert!(matches!(atomic, DecomposeError::Atomic { .. }));

        let build: DecomposeError = BuildError::EmptyJoin.into();
        assert!(matches!(build, DecomposeError::Build(_)));
    }
}
