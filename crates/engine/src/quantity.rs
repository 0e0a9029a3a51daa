//! Fixed-point stock quantities.
//!
//! Materials and products store `quantity` as an integer count of
//! `10^-quantity_scale` units: with `quantity_scale = 2`, a stored `150` is
//! 1.50 units. Item rows (`invoice_items`, `purchase_items`) use the scale of
//! the product or material they reference.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    EngineError, MoneyCents, ResultEngine,
    util::{div_round_half_away, format_fixed, parse_fixed, pow10},
};

/// Largest supported `quantity_scale`.
pub const MAX_QUANTITY_SCALE: u32 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quantity {
    raw: i64,
    scale: u32,
}

impl Quantity {
    /// Wrap a stored `(quantity, quantity_scale)` pair.
    pub fn new(raw: i64, scale: i32) -> ResultEngine<Self> {
        let scale = checked_scale(scale)?;
        Ok(Self { raw, scale })
    }

    /// Whole units, for scale-less stock.
    #[must_use]
    pub const fn units(units: i64) -> Self {
        Self {
            raw: units,
            scale: 0,
        }
    }

    /// Parse a decimal string at the given scale (`"1.5"` at scale 2 → 150).
    pub fn parse(input: &str, scale: i32) -> ResultEngine<Self> {
        let scale = checked_scale(scale)?;
        let raw = parse_fixed(input, scale).map_err(EngineError::InvalidQuantity)?;
        Ok(Self { raw, scale })
    }

    /// The stored integer.
    #[must_use]
    pub const fn raw(self) -> i64 {
        self.raw
    }

    #[must_use]
    pub const fn scale(self) -> i32 {
        self.scale as i32
    }

    /// Express the same amount at another scale.
    ///
    /// Reducing the scale fails when it would drop non-zero digits.
    pub fn rescale(self, scale: i32) -> ResultEngine<Self> {
        let target = checked_scale(scale)?;
        let too_large = || EngineError::InvalidQuantity("quantity too large".to_string());
        let raw = if target >= self.scale {
            let factor = pow10(target - self.scale).ok_or_else(too_large)?;
            self.raw.checked_mul(factor).ok_or_else(too_large)?
        } else {
            let factor = pow10(self.scale - target).ok_or_else(too_large)?;
            if self.raw % factor != 0 {
                return Err(EngineError::InvalidQuantity(format!(
                    "{self} cannot be represented with scale {target}"
                )));
            }
            self.raw / factor
        };
        Ok(Self { raw, scale: target })
    }

    /// `quantity × unit_price`, rounded half away from zero to whole cents.
    pub fn line_total(self, unit_price: MoneyCents) -> ResultEngine<MoneyCents> {
        let divisor = pow10(self.scale)
            .ok_or_else(|| EngineError::InvalidQuantity("scale too large".to_string()))?;
        let product = i128::from(self.raw) * i128::from(unit_price.cents());
        let cents = div_round_half_away(product, i128::from(divisor));
        i64::try_from(cents)
            .map(MoneyCents::new)
            .map_err(|_| EngineError::InvalidAmount("line total too large".to_string()))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_fixed(self.raw, self.scale))
    }
}

/// Line total in cents for a stored item quantity at `scale`.
pub fn line_total_cents(quantity: i64, scale: i32, unit_price_cents: i64) -> ResultEngine<i64> {
    Quantity::new(quantity, scale)?
        .line_total(MoneyCents::new(unit_price_cents))
        .map(MoneyCents::cents)
}

fn checked_scale(scale: i32) -> ResultEngine<u32> {
    u32::try_from(scale)
        .ok()
        .filter(|scale| *scale <= MAX_QUANTITY_SCALE)
        .ok_or_else(|| {
            EngineError::InvalidQuantity(format!(
                "quantity_scale must be between 0 and {MAX_QUANTITY_SCALE}, got {scale}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_use_the_scale() {
        let q = Quantity::parse("1.5", 2).unwrap();
        assert_eq!(q.raw(), 150);
        assert_eq!(q.to_string(), "1.50");
        assert!(Quantity::parse("1.555", 2).is_err());
    }

    #[test]
    fn scale_out_of_range_is_rejected() {
        assert!(Quantity::new(1, -1).is_err());
        assert!(Quantity::new(1, 7).is_err());
    }

    #[test]
    fn rescale_is_exact() {
        let q = Quantity::new(150, 2).unwrap();
        assert_eq!(q.rescale(3).unwrap().raw(), 1500);
        assert!(q.rescale(0).is_err());
        assert_eq!(Quantity::new(200, 2).unwrap().rescale(0).unwrap().raw(), 2);
    }

    #[test]
    fn line_total_rounds_to_cents() {
        assert_eq!(line_total_cents(2, 0, 500).unwrap(), 1000);
        assert_eq!(line_total_cents(150, 2, 500).unwrap(), 750);
        // 0.333 × 1.00 = 0.333 → 0.33
        assert_eq!(line_total_cents(333, 3, 100).unwrap(), 33);
        // 0.005 × 1.00 = 0.005 → 0.01
        assert_eq!(line_total_cents(5, 3, 100).unwrap(), 1);
    }
}
