//! Register copies.

use arvak_rev::{Circuit, View};

use crate::error::{ArithError, ArithResult, require_nonempty};

/// XOR `src` into `dst` elementwise.
///
/// Into a zeroed destination this is a copy; applied twice it cancels.
pub fn copy(circuit: &mut Circuit, src: &View, dst: &View) -> ArithResult<()> {
    require_nonempty("copy", "src", src.len())?;
    if src.len() != dst.len() {
        return Err(ArithError::WidthMismatch {
            op: "copy",
            detail: format!("cannot copy {} bits into {} bits", src.len(), dst.len()),
        });
    }
    circuit.cx(src, dst)?;
    Ok(())
}

/// XOR `src` into the low `|src|` bits of `dst` where `control` is set.
///
/// One Toffoli per source bit.
pub fn controlled_copy(
    circuit: &mut Circuit,
    control: &View,
    src: &View,
    dst: &View,
) -> ArithResult<()> {
    if control.len() != 1 {
        return Err(ArithError::WidthMismatch {
            op: "controlled_copy",
            detail: format!("control must be a single bit, got {}", control.len()),
        });
    }
    if dst.len() < src.len() {
        return Err(ArithError::WidthMismatch {
            op: "controlled_copy",
            detail: format!("cannot copy {} bits into {} bits", src.len(), dst.len()),
        });
    }
    for i in 0..src.len() {
        circuit.ccx(control, &src.at(i)?, &dst.at(i)?)?;
    }
    Ok(())
}
