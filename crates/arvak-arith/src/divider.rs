//! Restoring division.

use arvak_rev::{Circuit, View};
use tracing::debug;

use crate::adder::{add, subtract};
use crate::copy::{controlled_copy, copy};
use crate::error::{ArithError, ArithResult, require_nonempty};

/// Registers produced by a division.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Division {
    /// Remainder, `|a| + 1` bits.
    pub remainder: View,
    /// Quotient, `|a| - |b| + 1` bits.
    pub quotient: View,
}

/// Synthesizer for `a = quotient * b + remainder`.
///
/// Quotient bits are produced most significant first. For each one the next
/// dividend bit is shifted into the remainder, `b` is subtracted from the
/// active remainder window, the window's sign bit becomes the quotient bit,
/// and `b` is added back when the subtraction underflowed.
///
/// The result is exact when `b` is normalized, i.e. its top bit is set.
/// Otherwise `quotient * b + remainder == a` still holds but the remainder
/// may not be reduced below `b`. `a` and `b` are left unchanged and all
/// scratch returns to zero. When the copy register and the carry are both
/// lent, only the remainder and quotient allocations are marked.
#[derive(Debug, Clone)]
pub struct Divider<'a> {
    a: &'a View,
    b: &'a View,
    copy: Option<&'a View>,
    carry: Option<&'a View>,
}

impl<'a> Divider<'a> {
    /// Construct a divider of `a` by `b`.
    pub fn new(a: &'a View, b: &'a View) -> Self {
        Self {
            a,
            b,
            copy: None,
            carry: None,
        }
    }

    /// Lend a zeroed scratch register of at least `|a| + 1` bits.
    #[must_use]
    pub fn with_copy(mut self, copy: &'a View) -> Self {
        self.copy = Some(copy);
        self
    }

    /// Lend a zeroed carry bit for the inner additions and subtractions.
    #[must_use]
    pub fn with_carry(mut self, carry: &'a View) -> Self {
        self.carry = Some(carry);
        self
    }

    /// Emit the division and return the remainder and quotient registers.
    pub fn synthesize(&self, circuit: &mut Circuit) -> ArithResult<Division> {
        let (na, nb) = (self.a.len(), self.b.len());
        require_nonempty("divide", "b", nb)?;
        if na < nb {
            return Err(ArithError::WidthMismatch {
                op: "divide",
                detail: format!("dividend of {na} bits is narrower than divisor of {nb} bits"),
            });
        }
        let shift = na - nb;
        debug!(
            a_width = na,
            b_width = nb,
            "synthesizing restoring divider"
        );

        let remainder = circuit.register(na + 1, Some("remainder"), 0)?;
        let quotient = circuit.register(shift + 1, Some("quotient"), 0)?;

        let token = circuit.scope_token();
        let scratch = circuit.ancilla_register(na + 1, token, self.copy, Some("copy"), 0)?;
        let carry = circuit.ancilla_register(1, token, self.carry, Some("carry"), 0)?;
        let cp = scratch.view().slice(..na + 1)?;
        let c = carry.view().slice(..1)?;

        copy(circuit, &self.a.slice(shift..)?, &remainder.slice(shift..na)?)?;

        for i in 0..=shift {
            let t = shift - i;
            if i > 0 {
                let bit = self.a.at(t)?;
                let low = cp.at(0)?;
                circuit.cx(&bit, &low)?;
                add(circuit, &cp.slice(..na - t)?, &remainder.slice(t..)?, Some(&c))?;
                circuit.cx(&bit, &low)?;
            }

            let window = remainder.slice(t..na + 1 - i)?;
            let q = quotient.at(t)?;
            subtract(circuit, self.b, &window, Some(&c))?;
            circuit.cx(&remainder.at(na - i)?, &q)?;
            controlled_copy(circuit, &q, self.b, &cp)?;
            add(circuit, &cp.slice(..nb)?, &window, Some(&c))?;
            controlled_copy(circuit, &q, self.b, &cp)?;
            circuit.x(&q)?;
        }

        circuit.release_ancilla(&carry, token)?;
        circuit.release_ancilla(&scratch, token)?;
        Ok(Division {
            remainder,
            quotient,
        })
    }
}

/// Divide `a` by `b` into fresh remainder and quotient registers.
pub fn divide(circuit: &mut Circuit, a: &View, b: &View) -> ArithResult<Division> {
    Divider::new(a, b).synthesize(circuit)
}

#[cfg(test)]
mod tests {
    use arvak_rev::GateKind;

    use super::*;

    fn run(na: usize, nb: usize, x: u64, y: u64) -> (u64, u64) {
        let mut circuit = Circuit::new("div");
        let a = circuit.register(na, Some("a"), x).unwrap();
        let b = circuit.register(nb, Some("b"), y).unwrap();
        let division = divide(&mut circuit, &a, &b).unwrap();
        let values = circuit
            .read_values(&[&a, &b, &division.remainder, &division.quotient])
            .unwrap();
        assert_eq!(&values[..2], &[x, y]);
        (values[2], values[3])
    }

    #[test]
    fn test_divide_thirteen_by_four() {
        assert_eq!(run(4, 3, 13, 4), (1, 3));
    }

    #[test]
    fn test_divide_normalized_exhaustive() {
        for na in 1..=4 {
            for nb in 1..=na {
                for y in (1u64 << (nb - 1))..(1 << nb) {
                    for x in 0..(1u64 << na) {
                        let (r, q) = run(na, nb, x, y);
                        assert_eq!(q * y + r, x, "{x} / {y}");
                        assert!(r < y);
                    }
                }
            }
        }
    }

    #[test]
    fn test_divisor_not_normalized() {
        // 3 is not normalized in 3 bits: the identity holds but the
        // remainder is left unreduced.
        let (r, q) = run(4, 3, 13, 3);
        assert_eq!((r, q), (4, 3));
        assert_eq!(q * 3 + r, 13);
        assert!(r >= 3);
    }

    #[test]
    fn test_lent_scratch_stays_allocated() {
        let mut circuit = Circuit::new("div");
        let a = circuit.register(4, Some("a"), 13).unwrap();
        let b = circuit.register(3, Some("b"), 4).unwrap();
        let copy = circuit.register(6, Some("copy"), 0).unwrap();
        let carry = circuit.register(1, Some("carry"), 0).unwrap();

        let start = circuit.len();
        let division = Divider::new(&a, &b)
            .with_copy(&copy)
            .with_carry(&carry)
            .synthesize(&mut circuit)
            .unwrap();

        let markers: Vec<_> = circuit.gates()[start..]
            .iter()
            .filter(|g| g.is_marker())
            .map(|g| g.kind())
            .collect();
        assert_eq!(markers, vec![GateKind::Alloc, GateKind::Alloc]);
        assert_eq!(circuit.allocator().num_chunks(), 6);

        let values = circuit
            .read_values(&[&division.remainder, &division.quotient, &copy, &carry])
            .unwrap();
        assert_eq!(values, vec![1, 3, 0, 0]);
        circuit.free(&copy, 0).unwrap();
        circuit.free(&carry, 0).unwrap();
        circuit.simulate().unwrap();
    }

    #[test]
    fn test_lent_copy_too_narrow() {
        let mut circuit = Circuit::new("div");
        let a = circuit.register(4, Some("a"), 13).unwrap();
        let b = circuit.register(3, Some("b"), 4).unwrap();
        let copy = circuit.register(4, Some("copy"), 0).unwrap();
        assert!(
            Divider::new(&a, &b)
                .with_copy(&copy)
                .synthesize(&mut circuit)
                .is_err()
        );
    }

    #[test]
    fn test_register_widths() {
        let mut circuit = Circuit::new("div");
        let a = circuit.register(5, Some("a"), 0).unwrap();
        let b = circuit.register(2, Some("b"), 2).unwrap();
        let division = divide(&mut circuit, &a, &b).unwrap();
        assert_eq!(division.remainder.len(), 6);
        assert_eq!(division.quotient.len(), 4);
    }

    #[test]
    fn test_divisor_wider_than_dividend() {
        let mut circuit = Circuit::new("div");
        let a = circuit.register(2, Some("a"), 1).unwrap();
        let b = circuit.register(3, Some("b"), 4).unwrap();
        assert!(matches!(
            divide(&mut circuit, &a, &b),
            Err(ArithError::WidthMismatch { op: "divide", .. })
        ));
    }
}
