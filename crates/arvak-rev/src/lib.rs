//! Arvak Reversible Circuit Engine
//!
//! This crate provides the machinery for building reversible classical
//! circuits over indexed bit registers: the building blocks of quantum
//! arithmetic oracles.
//!
//! # Overview
//!
//! Registers are index ranges in a growable, one-dimensional address space
//! managed by an [`Allocator`]. A [`Circuit`] owns the allocator and an
//! append-only gate log. Gates are emitted against [`View`]s, replayed by a
//! deterministic bit-vector simulator, and a recorded region of the log can
//! be replaced by its adjoint with [`Circuit::reverse`].
//!
//! # Core Components
//!
//! - **Allocator**: [`Allocator`], [`Chunk`] and [`ChunkId`] for register and
//!   ancilla lifetimes, with first-fit reuse and partial shrinking
//! - **Views**: [`View`] and [`Key`] for composable register slices
//! - **Gates**: [`Gate`] with its classical transition, cost and rendering
//! - **Circuit**: [`Circuit`] builder, simulator and reversal
//! - **Configuration**: [`CircuitConfig`], [`CostModel`] and [`IndexMode`]
//!
//! # Example: Uncomputing a Flip
//!
//! ```rust
//! use arvak_rev::{Circuit, RevResult};
//!
//! let mut circuit = Circuit::new("example");
//! let a = circuit.register(2, Some("a"), 0b01).unwrap();
//! let t = circuit.register(2, Some("t"), 0).unwrap();
//!
//! circuit.cx(&a, &t).unwrap();
//! assert_eq!(circuit.read_value(&t).unwrap(), 0b01);
//!
//! circuit
//!     .reverse(false, |c| -> RevResult<()> {
//!         c.cx(&a, &t)?;
//!         Ok(())
//!     })
//!     .unwrap();
//! assert_eq!(circuit.read_value(&t).unwrap(), 0);
//!
//! circuit.free(&t, 0).unwrap();
//! ```
//!
//! # Supported Gates
//!
//! | Gate | Cost (cnot, toffoli, non-Clifford) | Description |
//! |------|------------------------------------|-------------|
//! | `x` | (0, 0, 0) | Bit flip |
//! | `cx` | (1, 0, 0) | Controlled flip, broadcast from one control |
//! | `ccx` | (6, 1, 7) | Doubly-controlled flip (Toffoli) |
//! | `alloc` | (0, 0, 0) | Writes the initial value of a register |
//! | `free` | (0, 0, 0) | Asserts the final value and zeroes the wires |
//! | `barrier` | (0, 0, 0) | No effect |

pub mod allocator;
pub mod circuit;
pub mod config;
pub mod error;
pub mod gate;
pub mod state;
pub mod view;

pub use allocator::{Allocator, Chunk, ChunkId, OwnerToken};
pub use circuit::{Ancilla, Circuit, CircuitExport, Ownership};
pub use config::{CircuitConfig, CostModel, GateCost, IndexMode};
pub use error::{RevError, RevResult};
pub use gate::{Gate, GateKind};
pub use state::BitState;
pub use view::{Key, View};
