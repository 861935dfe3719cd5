//! Arvak Reversible Arithmetic
//!
//! Garbage-free classical arithmetic circuits built on [`arvak_rev`]:
//! in-place addition and subtraction, shift-and-add multiplication with an
//! optional fixed-precision mode, and restoring division.
//!
//! Every procedure takes the [`Circuit`](arvak_rev::Circuit) it emits into
//! by mutable reference. Scratch registers are obtained through
//! [`Circuit::ancilla_register`](arvak_rev::Circuit::ancilla_register):
//! callers may lend their own scratch, in which case the procedure emits no
//! allocation markers for it and leaves it allocated.
//!
//! # Example: Add, Then Undo
//!
//! ```rust
//! use arvak_arith::{add, subtract};
//! use arvak_rev::Circuit;
//!
//! let mut circuit = Circuit::new("example");
//! let a = circuit.register(4, Some("a"), 5).unwrap();
//! let b = circuit.register(5, Some("b"), 3).unwrap();
//!
//! add(&mut circuit, &a, &b, None).unwrap();
//! assert_eq!(circuit.read_value(&b).unwrap(), 8);
//!
//! subtract(&mut circuit, &a, &b, None).unwrap();
//! assert_eq!(circuit.read_value(&b).unwrap(), 3);
//! ```

pub mod adder;
pub mod copy;
pub mod divider;
pub mod error;
pub mod multiplier;

pub use adder::{add, subtract};
pub use copy::{controlled_copy, copy};
pub use divider::{Division, Divider, divide};
pub use error::{ArithError, ArithResult};
pub use multiplier::{Multiplier, multiply};
