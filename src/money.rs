//! Integral money values in copper, the smallest currency unit

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

pub const COPPER_PER_SILVER: i64 = 100;
pub const COPPER_PER_GOLD: i64 = 100 * COPPER_PER_SILVER;

/// A currency amount in copper. Stored integral so repeated scaling by
/// reagent quantities never drifts; the gold/silver/copper split exists
/// only in `Display`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(pub i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Unit price of a lot, rounded up so a partial copper never
    /// undercounts the cost of buying a single unit.
    pub fn per_unit(total: Money, quantity: u32) -> Money {
        debug_assert!(quantity > 0);
        Money((total.0 + quantity as i64 - 1) / quantity as i64)
    }

    pub fn times(self, quantity: u32) -> Money {
        Money(self.0 * quantity as i64)
    }

    fn gold(self) -> i64 {
        self.0 / COPPER_PER_GOLD
    }

    fn silver(self) -> i64 {
        (self.0 % COPPER_PER_GOLD) / COPPER_PER_SILVER
    }

    fn copper(self) -> i64 {
        self.0 % COPPER_PER_SILVER
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            return write!(f, "-{}", Money(-self.0));
        }
        let tiers = [
            (self.gold(), "g"),
            (self.silver(), "s"),
            (self.copper(), "c"),
        ];
        let mut first = true;
        for (value, unit) in tiers {
            if value == 0 {
                continue;
            }
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}{}", value, unit)?;
            first = false;
        }
        if first {
            write!(f, "0c")?;
        }
        Ok(())
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_decomposes_into_three_tiers() {
        assert_eq!(Money(6_479_000).to_string(), "647g, 90s");
        assert_eq!(Money(884).to_string(), "8s, 84c");
        assert_eq!(Money(50).to_string(), "50c");
        assert_eq!(Money(10_005).to_string(), "1g, 5c");
        assert_eq!(Money(10_000).to_string(), "1g");
    }

    #[test]
    fn display_zero_and_negative() {
        assert_eq!(Money::ZERO.to_string(), "0c");
        assert_eq!(Money(-884).to_string(), "-8s, 84c");
    }

    #[test]
    fn per_unit_rounds_up() {
        assert_eq!(Money::per_unit(Money(100), 3), Money(34));
        assert_eq!(Money::per_unit(Money(100), 4), Money(25));
        assert_eq!(Money::per_unit(Money(1), 2), Money(1));
    }

    #[test]
    fn arithmetic() {
        assert_eq!(Money(417).times(2), Money(834));
        assert_eq!(Money(50) + Money(834), Money(884));
        assert_eq!(Money(800) - Money(884), Money(-84));
        let total: Money = [Money(1), Money(2), Money(3)].into_iter().sum();
        assert_eq!(total, Money(6));
    }
}
