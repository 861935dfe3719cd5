//! Error types for the reversible circuit engine.

use thiserror::Error;

use crate::allocator::ChunkId;

/// Errors that can occur while building or evaluating a reversible circuit.
///
/// Every variant aborts the build in progress. The allocator validates
/// before it mutates, so a failed alloc/free/partial-free leaves it untouched,
/// but the circuit as a whole must be discarded and rebuilt.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RevError {
    /// Released a chunk that is no longer tracked by the allocator.
    #[error("Double free on chunk {chunk}{}", format_name(.name))]
    DoubleFree {
        /// The chunk that was already released.
        chunk: ChunkId,
        /// Register name, if any.
        name: Option<String>,
    },

    /// Release through the wrong channel, or of the head sentinel.
    #[error("Invalid free of chunk {chunk}: {reason}")]
    InvalidFree {
        /// The chunk whose release was refused.
        chunk: ChunkId,
        /// Why the release was refused.
        reason: String,
    },

    /// Partial free larger than the chunk.
    #[error("Cannot partially free {requested} wires from chunk {chunk} of size {size}")]
    PartialFreeOverflow {
        /// The chunk being shrunk.
        chunk: ChunkId,
        /// Number of wires requested.
        requested: usize,
        /// Current size of the chunk.
        size: usize,
    },

    /// Concatenation of views over different registers.
    #[error("Cannot join views of chunk {left} and chunk {right}: views must share one register")]
    UnsupportedJoin {
        /// Register of the left operand.
        left: ChunkId,
        /// Register of the right operand.
        right: ChunkId,
    },

    /// A free marker observed an unexpected value during evaluation.
    #[error(
        "Cleanup assertion failed on {}: expected {expected}, found {found}",
        .name.as_deref().unwrap_or("<unnamed>")
    )]
    CleanupAssertionFailure {
        /// Register name, if any.
        name: Option<String>,
        /// Value the register should have returned to.
        expected: u64,
        /// Value observed by the simulator.
        found: u64,
    },

    /// A reversed region contained an unguarded allocate or free marker.
    #[error("Cannot reverse region: {marker} marker at gate {position} (pass allow_alloc_free to opt in)")]
    ReversalContractViolation {
        /// Name of the offending marker kind.
        marker: &'static str,
        /// Position of the marker in the gate log.
        position: usize,
    },

    /// Relative index outside of a view or chunk.
    #[error("Index {index} out of range for register of length {len}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Length of the indexed register.
        len: usize,
    },

    /// A slice expression that cannot be evaluated.
    #[error("Invalid slice: {0}")]
    InvalidSlice(String),

    /// A view refers to a register that has been released.
    #[error("View refers to released chunk {0}")]
    StaleView(ChunkId),

    /// A chunk id that was never issued by this allocator.
    #[error("Unknown chunk {0}")]
    UnknownChunk(ChunkId),

    /// Gate operand widths are incompatible.
    #[error("Gate '{gate}' operand width mismatch: {detail}")]
    OperandWidthMismatch {
        /// Name of the gate.
        gate: &'static str,
        /// Description of the mismatch.
        detail: String,
    },

    /// The same wire used twice where operands must be disjoint.
    #[error("Duplicate wire {wire} in gate '{gate}'")]
    DuplicateWire {
        /// Name of the gate.
        gate: &'static str,
        /// The repeated absolute address.
        wire: usize,
    },

    /// A value does not fit into the bits that should hold it.
    #[error("Value {value} does not fit into {width} bits")]
    ValueOverflow {
        /// The value (truncated to 64 bits when read from a wider register).
        value: u64,
        /// Number of available bits.
        width: usize,
    },

    /// The allocator's chunk list is inconsistent.
    #[error("Allocator invariant violated: {0}")]
    AllocatorInvariant(String),

    /// Gate log export failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[allow(clippy::ref_option)]
fn format_name(name: &Option<String>) -> String {
    match name {
        Some(name) => format!(" '{name}'"),
        None => String::new(),
    }
}

/// Result type for reversible circuit operations.
pub type RevResult<T> = Result<T, RevError>;
