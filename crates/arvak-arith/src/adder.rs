//! Ripple-carry addition and subtraction.
//!
//! The adder is the Cuccaro construction: a forward pass of majority (MAJ)
//! blocks leaves each carry in the corresponding bit of `a`, and a backward
//! pass of un-majority (UMA) blocks writes the sum into `b` while restoring
//! `a` and the carry bit. Subtraction is the adjoint of addition.

use arvak_rev::{Circuit, View};
use tracing::debug;

use crate::error::{ArithError, ArithResult, require_nonempty};

/// Add `a` into `b` in place.
///
/// `b` is either as wide as `a` (addition mod `2^|a|`) or one bit wider, in
/// which case the carry-out lands in its top bit. `carry` lends a zeroed
/// scratch bit; without it one is allocated and released here.
pub fn add(circuit: &mut Circuit, a: &View, b: &View, carry: Option<&View>) -> ArithResult<()> {
    let n = a.len();
    require_nonempty("add", "a", n)?;
    let carry_out = carry_out("add", n, b.len())?;
    debug!(
        width = n,
        carry_out,
        borrowed_carry = carry.is_some(),
        "synthesizing ripple-carry adder"
    );

    let token = circuit.scope_token();
    let scratch = circuit.ancilla_register(1, token, carry, Some("carry"), 0)?;
    let c = scratch.view().at(0)?;

    maj(circuit, &a.at(0)?, &b.at(0)?, &c)?;
    for i in 1..n {
        maj(circuit, &a.at(i)?, &b.at(i)?, &a.at(i - 1)?)?;
    }
    if carry_out {
        circuit.cx(&a.at(n - 1)?, &b.at(n)?)?;
    }
    for i in (1..n).rev() {
        uma(circuit, &a.at(i)?, &b.at(i)?, &a.at(i - 1)?)?;
    }
    uma(circuit, &a.at(0)?, &b.at(0)?, &c)?;

    circuit.release_ancilla(&scratch, token)?;
    Ok(())
}

/// Subtract `a` from `b` in place, modulo `2^|b|`.
///
/// Built as the reversed adder. The carry bit is obtained outside of the
/// reversed region so that region contains no allocation markers.
pub fn subtract(
    circuit: &mut Circuit,
    a: &View,
    b: &View,
    carry: Option<&View>,
) -> ArithResult<()> {
    require_nonempty("subtract", "a", a.len())?;
    carry_out("subtract", a.len(), b.len())?;

    let token = circuit.scope_token();
    let scratch = circuit.ancilla_register(1, token, carry, Some("carry"), 0)?;
    let c = scratch.view().clone();
    circuit.reverse(false, |circuit| add(circuit, a, b, Some(&c)))?;
    circuit.release_ancilla(&scratch, token)?;
    Ok(())
}

/// Whether an `n`-bit addend into a `width`-bit accumulator has a carry-out.
fn carry_out(op: &'static str, n: usize, width: usize) -> ArithResult<bool> {
    if width == n {
        Ok(false)
    } else if width == n + 1 {
        Ok(true)
    } else {
        Err(ArithError::WidthMismatch {
            op,
            detail: format!("accumulator of {width} bits cannot take a {n}-bit addend"),
        })
    }
}

fn maj(circuit: &mut Circuit, a: &View, b: &View, c: &View) -> ArithResult<()> {
    circuit.cx(a, b)?.cx(a, c)?.ccx(c, b, a)?;
    Ok(())
}

fn uma(circuit: &mut Circuit, a: &View, b: &View, c: &View) -> ArithResult<()> {
    circuit.ccx(c, b, a)?.cx(a, c)?.cx(c, b)?;
    Ok(())
}
