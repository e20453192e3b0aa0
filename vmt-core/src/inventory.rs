// Exact-arithmetic inventories

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::types::Good;

/// All quantities are stored to this decimal scale; trade deltas and
/// harvest amounts are quantized to it as well.
pub const QUANTITY_SCALE: u32 = 2;

/// Round a raw value to the engine's quantity scale.
/// Midpoint-away-from-zero so `dB = price * dA` is reproducible across ports.
pub fn round_to_quantity(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(
        QUANTITY_SCALE,
        rust_decimal::RoundingStrategy::MidpointAwayFromZero,
    )
}

/// Holdings of the two goods. Quantities are exact decimals and must be
/// non-negative at every phase boundary; floats are never stored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Inventory {
    pub a: Decimal,
    pub b: Decimal,
}

impl Inventory {
    pub fn new(a: Decimal, b: Decimal) -> Self {
        Self { a, b }
    }

    pub fn get(&self, good: Good) -> Decimal {
        match good {
            Good::A => self.a,
            Good::B => self.b,
        }
    }

    pub fn add(&mut self, good: Good, amount: Decimal) {
        match good {
            Good::A => self.a += amount,
            Good::B => self.b += amount,
        }
    }

    /// Whether both deltas can be applied without going negative.
    pub fn can_apply(&self, da: Decimal, db: Decimal) -> bool {
        self.a + da >= Decimal::ZERO && self.b + db >= Decimal::ZERO
    }

    /// Apply signed deltas to both goods. Callers check `can_apply` first;
    /// a violation here is a contract bug upstream.
    pub fn apply(&mut self, da: Decimal, db: Decimal) {
        self.a += da;
        self.b += db;
    }

    pub fn is_non_negative(&self) -> bool {
        self.a >= Decimal::ZERO && self.b >= Decimal::ZERO
    }

    /// Float view for utility evaluation. Utility and surplus comparisons
    /// are the only floating-point consumers of inventory state.
    pub fn as_f64(&self) -> (f64, f64) {
        (
            self.a.to_f64().unwrap_or(0.0),
            self.b.to_f64().unwrap_or(0.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn apply_and_check() {
        let mut inv = Inventory::new(dec!(10), dec!(5));
        assert!(inv.can_apply(dec!(-10), dec!(3)));
        assert!(!inv.can_apply(dec!(-10.01), dec!(0)));

        inv.apply(dec!(-3), dec!(2.5));
        assert_eq!(inv.a, dec!(7));
        assert_eq!(inv.b, dec!(7.5));
        assert!(inv.is_non_negative());
    }

    #[test]
    fn rounding_is_midpoint_away_from_zero() {
        assert_eq!(round_to_quantity(dec!(1.005)), dec!(1.01));
        assert_eq!(round_to_quantity(dec!(1.004)), dec!(1.00));
        assert_eq!(round_to_quantity(dec!(2.675)), dec!(2.68));
    }
}
