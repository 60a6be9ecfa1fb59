use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};

use serde::{Deserialize, Serialize};
use sim_schema::FIXED_POINT_SCALE;

/// Fixed-point scalar with 6 decimal places of precision.
///
/// Every hazard, mitigation and cost quantity in the transition engine is
/// carried as a `Scalar` so that runs are bit-identical across platforms.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scalar(pub i64);

impl Scalar {
    pub const SCALE: i64 = FIXED_POINT_SCALE;

    pub fn from_f32(value: f32) -> Self {
        Self((value as f64 * Self::SCALE as f64).round() as i64)
    }

    pub fn from_f64(value: f64) -> Self {
        Self((value * Self::SCALE as f64).round() as i64)
    }

    pub fn from_u32(value: u32) -> Self {
        Self((value as i64) * Self::SCALE)
    }

    pub fn from_u64(value: u64) -> Self {
        Self((value as i64).saturating_mul(Self::SCALE))
    }

    pub fn to_f32(self) -> f32 {
        self.0 as f32 / Self::SCALE as f32
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn one() -> Self {
        Self(Self::SCALE)
    }

    pub fn raw(self) -> i64 {
        self.0
    }

    pub fn from_raw(value: i64) -> Self {
        Self(value)
    }

    pub fn clamp(self, min: Self, max: Self) -> Self {
        Ord::clamp(self, min, max)
    }

    /// Integer part, saturating at zero for negative values.
    pub fn floor_u32(self) -> u32 {
        if self.0 <= 0 {
            0
        } else {
            (self.0 / Self::SCALE).min(u32::MAX as i64) as u32
        }
    }

    /// Integer part rounded up, saturating at zero for negative values.
    pub fn ceil_u32(self) -> u32 {
        if self.0 <= 0 {
            0
        } else {
            ((self.0 + Self::SCALE - 1) / Self::SCALE).min(u32::MAX as i64) as u32
        }
    }

    /// Fractional remainder left after [`Scalar::floor_u32`].
    pub fn fract(self) -> Self {
        Self(self.0.rem_euclid(Self::SCALE))
    }
}

impl Add for Scalar {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Scalar {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Scalar {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Scalar {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Mul for Scalar {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self(((self.0 as i128 * rhs.0 as i128) / Self::SCALE as i128) as i64)
    }
}

impl Div for Scalar {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        if rhs.0 == 0 {
            return Self::zero();
        }
        Self(((self.0 as i128 * Self::SCALE as i128) / rhs.0 as i128) as i64)
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.to_f64())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.to_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplication_keeps_precision() {
        let a = Scalar::from_f32(0.5);
        let b = Scalar::from_u32(20);
        assert_eq!(a * b, Scalar::from_u32(10));
        assert_eq!(Scalar::from_u32(3) / Scalar::from_u32(4), Scalar::from_f64(0.75));
        assert_eq!(Scalar::one() / Scalar::zero(), Scalar::zero());
    }

    #[test]
    fn floor_and_fract_split_a_value() {
        let value = Scalar::from_f64(2.75);
        assert_eq!(value.floor_u32(), 2);
        assert_eq!(value.ceil_u32(), 3);
        assert_eq!(value.fract(), Scalar::from_f64(0.75));
        assert_eq!(Scalar::from_u32(4).ceil_u32(), 4);
        assert_eq!(Scalar::from_f64(-1.0).floor_u32(), 0);
    }
}
