//! Shift-and-add multiplication.

use arvak_rev::{Circuit, View};
use tracing::debug;

use crate::adder::{add, subtract};
use crate::copy::controlled_copy;
use crate::error::{ArithError, ArithResult, require_nonempty};

/// Synthesizer for `product += a * b`.
///
/// For every bit `a[i]` the multiplier copies `b` into a scratch register
/// under control of `a[i]`, adds the scratch into the product at offset `i`
/// and clears the scratch with a second controlled copy. The product has
/// `|a| + |b| + 1` bits.
///
/// Every scratch register may be lent by the caller. When the product, the
/// copy register and the carry are all lent, the synthesized gates contain
/// no allocation markers and the whole multiplication can be uncomputed with
/// [`Circuit::reverse`].
///
/// # Example
///
/// ```rust
/// use arvak_arith::Multiplier;
/// use arvak_rev::Circuit;
///
/// let mut circuit = Circuit::new("mul");
/// let a = circuit.register(3, Some("a"), 5).unwrap();
/// let b = circuit.register(3, Some("b"), 6).unwrap();
///
/// let product = Multiplier::new(&a, &b).synthesize(&mut circuit).unwrap();
/// assert_eq!(circuit.read_value(&product).unwrap(), 30);
/// ```
#[derive(Debug, Clone)]
pub struct Multiplier<'a> {
    a: &'a View,
    b: &'a View,
    /// Number of retained high-order product bits; `None` keeps all.
    precision: Option<usize>,
    product: Option<&'a View>,
    copy: Option<&'a View>,
    carry: Option<&'a View>,
}

impl<'a> Multiplier<'a> {
    /// Construct a multiplier of `a` by `b`.
    pub fn new(a: &'a View, b: &'a View) -> Self {
        Self {
            a,
            b,
            precision: None,
            product: None,
            copy: None,
            carry: None,
        }
    }

    /// Keep only partial products of weight at least `2^(W - precision)`,
    /// where `W` is the product width.
    ///
    /// Dropped columns are first added and then removed by a compensating
    /// subtraction, so the low `W - precision` product bits end up zero.
    #[must_use]
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Accumulate into a caller-owned product register of width `W`.
    #[must_use]
    pub fn with_product(mut self, product: &'a View) -> Self {
        self.product = Some(product);
        self
    }

    /// Lend a zeroed scratch register of at least `|a| + |b|` bits.
    #[must_use]
    pub fn with_copy(mut self, copy: &'a View) -> Self {
        self.copy = Some(copy);
        self
    }

    /// Lend a zeroed carry bit for the inner additions.
    #[must_use]
    pub fn with_carry(mut self, carry: &'a View) -> Self {
        self.carry = Some(carry);
        self
    }

    /// Width of the product register.
    pub fn product_width(&self) -> usize {
        self.a.len() + self.b.len() + 1
    }

    fn validate(&self) -> ArithResult<()> {
        require_nonempty("multiply", "a", self.a.len())?;
        require_nonempty("multiply", "b", self.b.len())?;
        let width = self.product_width();

        if let Some(product) = self.product {
            if product.len() != width {
                return Err(ArithError::WidthMismatch {
                    op: "multiply",
                    detail: format!("product needs {width} bits, got {}", product.len()),
                });
            }
        }
        if let Some(precision) = self.precision {
            if precision == 0 || precision > width {
                return Err(ArithError::InvalidPrecision {
                    precision,
                    max: width,
                });
            }
        }
        Ok(())
    }

    /// Emit the multiplication and return the product register.
    ///
    /// A product allocated here is an ordinary register owned by the caller.
    pub fn synthesize(&self, circuit: &mut Circuit) -> ArithResult<View> {
        self.validate()?;
        let (na, nb) = (self.a.len(), self.b.len());
        let width = self.product_width();
        debug!(
            a_width = na,
            b_width = nb,
            precision = ?self.precision,
            "synthesizing shift-and-add multiplier"
        );

        let product = match self.product {
            Some(product) => product.clone(),
            None => circuit.register(width, Some("product"), 0)?,
        };

        let token = circuit.scope_token();
        let copy = circuit.ancilla_register(na + nb, token, self.copy, Some("copy"), 0)?;
        let carry = circuit.ancilla_register(1, token, self.carry, Some("carry"), 0)?;
        let cp = copy.view().slice(..na + nb)?;
        let c = carry.view().slice(..1)?;

        for i in 0..na {
            let control = self.a.at(i)?;
            controlled_copy(circuit, &control, self.b, &cp)?;
            add(circuit, &cp.slice(..na + nb - i)?, &product.slice(i..)?, Some(&c))?;
            controlled_copy(circuit, &control, self.b, &cp)?;
        }

        if let Some(precision) = self.precision {
            let cut = width - precision;
            for i in (0..na).rev() {
                let kept = nb.min(cut.saturating_sub(i));
                if kept == 0 {
                    continue;
                }
                let control = self.a.at(i)?;
                let low_b = self.b.slice(..kept)?;
                controlled_copy(circuit, &control, &low_b, &cp)?;
                subtract(
                    circuit,
                    &cp.slice(..na + nb - i)?,
                    &product.slice(i..width - 1)?,
                    Some(&c),
                )?;
                controlled_copy(circuit, &control, &low_b, &cp)?;
            }
        }

        circuit.release_ancilla(&carry, token)?;
        circuit.release_ancilla(&copy, token)?;
        Ok(product)
    }
}

/// Multiply `a` by `b` into a fresh product register.
pub fn multiply(circuit: &mut Circuit, a: &View, b: &View) -> ArithResult<View> {
    Multiplier::new(a, b).synthesize(circuit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_of(na: usize, nb: usize, x: u64, y: u64, precision: Option<usize>) -> u64 {
        let mut circuit = Circuit::new("mul");
        let a = circuit.register(na, Some("a"), x).unwrap();
        let b = circuit.register(nb, Some("b"), y).unwrap();
        let mut multiplier = Multiplier::new(&a, &b);
        if let Some(p) = precision {
            multiplier = multiplier.with_precision(p);
        }
        let product = multiplier.synthesize(&mut circuit).unwrap();
        let values = circuit.read_values(&[&a, &b, &product]).unwrap();
        assert_eq!(&values[..2], &[x, y]);
        values[2]
    }

    #[test]
    fn test_multiply_exhaustive_small() {
        for na in 1..=3 {
            for nb in 1..=3 {
                for x in 0..(1u64 << na) {
                    for y in 0..(1u64 << nb) {
                        assert_eq!(product_of(na, nb, x, y, None), x * y);
                    }
                }
            }
        }
    }

    #[test]
    fn test_fixed_precision_drops_low_columns() {
        // W = 7; precision 3 keeps columns of weight >= 2^4.
        let (na, nb, x, y) = (3, 3, 0b111, 0b111);
        let cut = 4;
        let expected: u64 = (0..na)
            .flat_map(|i| (0..nb).map(move |j| (i, j)))
            .filter(|&(i, j)| i + j >= cut)
            .map(|(i, j)| ((x >> i) & 1) * ((y >> j) & 1) << (i + j))
            .sum();
        let value = product_of(na, nb, x, y, Some(3));
        assert_eq!(value, expected);
        assert_eq!(value & 0b1111, 0);
    }

    #[test]
    fn test_full_precision_is_exact() {
        assert_eq!(product_of(3, 2, 7, 3, Some(6)), 21);
    }

    #[test]
    fn test_invalid_precision() {
        let mut circuit = Circuit::new("mul");
        let a = circuit.register(2, Some("a"), 1).unwrap();
        let b = circuit.register(2, Some("b"), 1).unwrap();
        for p in [0, 6] {
            assert!(matches!(
                Multiplier::new(&a, &b).with_precision(p).synthesize(&mut circuit),
                Err(ArithError::InvalidPrecision { .. })
            ));
        }
    }

    #[test]
    fn test_product_width_checked() {
        let mut circuit = Circuit::new("mul");
        let a = circuit.register(2, Some("a"), 1).unwrap();
        let b = circuit.register(2, Some("b"), 1).unwrap();
        let product = circuit.register(4, Some("p"), 0).unwrap();
        assert!(matches!(
            Multiplier::new(&a, &b).with_product(&product).synthesize(&mut circuit),
            Err(ArithError::WidthMismatch { .. })
        ));
    }
}
