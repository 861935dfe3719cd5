//! Classical bit-vector state used by the simulator.

use crate::error::{RevError, RevResult};

/// A classical assignment to every wire of the address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitState {
    bits: Vec<bool>,
}

impl BitState {
    /// All-zero state over `width` wires.
    pub fn zeros(width: usize) -> Self {
        Self {
            bits: vec![false; width],
        }
    }

    /// Number of wires.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Check if the state has no wires.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Value of one wire.
    pub fn get(&self, wire: usize) -> RevResult<bool> {
        self.bits.get(wire).copied().ok_or(RevError::IndexOutOfRange {
            index: wire,
            len: self.bits.len(),
        })
    }

    /// Overwrite one wire.
    pub fn set(&mut self, wire: usize, value: bool) -> RevResult<()> {
        let len = self.bits.len();
        let bit = self
            .bits
            .get_mut(wire)
            .ok_or(RevError::IndexOutOfRange { index: wire, len })?;
        *bit = value;
        Ok(())
    }

    /// XOR one wire with `value`.
    pub fn toggle(&mut self, wire: usize, value: bool) -> RevResult<()> {
        let current = self.get(wire)?;
        self.set(wire, current ^ value)
    }

    /// Values of several wires, in order.
    pub fn read(&self, wires: &[usize]) -> RevResult<Vec<bool>> {
        wires.iter().map(|&w| self.get(w)).collect()
    }

    /// Pack wires into an unsigned integer, first wire least significant.
    pub fn pack(&self, wires: &[usize]) -> RevResult<u64> {
        let mut value = 0u64;
        for (i, &wire) in wires.iter().enumerate() {
            if !self.get(wire)? {
                continue;
            }
            if i >= 64 {
                return Err(RevError::ValueOverflow {
                    value,
                    width: 64,
                });
            }
            value |= 1 << i;
        }
        Ok(value)
    }

    /// Write the little-endian expansion of `value` onto `wires`.
    pub fn write(&mut self, wires: &[usize], value: u64) -> RevResult<()> {
        check_fits(value, wires.len())?;
        for (i, &wire) in wires.iter().enumerate() {
            self.set(wire, i < 64 && (value >> i) & 1 == 1)?;
        }
        Ok(())
    }

    /// The raw bit vector.
    pub fn as_bits(&self) -> &[bool] {
        &self.bits
    }
}

/// Fail unless `value` fits into `width` bits.
pub(crate) fn check_fits(value: u64, width: usize) -> RevResult<()> {
    if width < 64 && value >> width != 0 {
        return Err(RevError::ValueOverflow { value, width });
    }
    Ok(())
}
