use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// A monetary budget with 4 decimal places precision.
///
/// Wrapper around `rust_decimal::Decimal` so budget arithmetic stays exact
/// and placement budgets can be compared without floating-point tolerance.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Budget(pub Decimal);

impl Budget {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Multiplies the budget by a weight, rounding to 4 decimal places.
    pub fn scaled(&self, weight: Decimal) -> Self {
        Self((self.0 * weight).round_dp(4))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Add for Budget {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Budget {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Budget {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Budget {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}
