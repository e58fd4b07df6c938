//! 2D Vector
//!
//! Plain floating-point vector math for world-space positions and
//! velocities. There is no determinism requirement on this layer (see
//! `DESIGN.md` for why the teacher's fixed-point `FixedVec2` was dropped);
//! ordinary `f64` is used throughout per the data model in `spec.md` §3.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Neg, Sub};

/// A 2D vector with `f64` components.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
}

impl Vec2 {
    /// The zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Construct a vector from components.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Componentwise addition.
    #[inline]
    pub fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }

    /// Componentwise subtraction.
    #[inline]
    pub fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }

    /// Scale by a scalar.
    #[inline]
    pub fn scale(self, scalar: f64) -> Self {
        Self::new(self.x * scalar, self.y * scalar)
    }

    /// Squared length (avoids a sqrt when only comparing magnitudes).
    #[inline]
    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Euclidean length.
    #[inline]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Squared distance to another point.
    #[inline]
    pub fn distance_squared(self, other: Self) -> f64 {
        self.sub(other).length_squared()
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Unit vector in the same direction, or `ZERO` if this vector is
    /// degenerate (zero length or non-finite).
    pub fn normalize(self) -> Self {
        let len = self.length();
        if !len.is_finite() || len <= f64::EPSILON {
            return Self::ZERO;
        }
        self.scale(1.0 / len)
    }

    /// Clamp this vector's magnitude to `max_len`, preserving direction.
    pub fn clamp_magnitude(self, max_len: f64) -> Self {
        let len_sq = self.length_squared();
        if len_sq <= max_len * max_len {
            return self;
        }
        self.normalize().scale(max_len)
    }

    /// `true` if both components are finite (not NaN/∞).
    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Zero any component whose magnitude is below `epsilon`.
    pub fn zero_below(self, epsilon: f64) -> Self {
        Self::new(
            if self.x.abs() < epsilon { 0.0 } else { self.x },
            if self.y.abs() < epsilon { 0.0 } else { self.y },
        )
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    #[inline]
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::add(self, rhs)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    #[inline]
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::sub(self, rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    #[inline]
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_preserves_direction() {
        let v = Vec2::new(3.0, 4.0);
        let n = v.normalize();
        assert!((n.length() - 1.0).abs() < 1e-9);
        assert!((n.x - 0.6).abs() < 1e-9);
        assert!((n.y - 0.8).abs() < 1e-9);
    }

    #[test]
    fn normalize_zero_is_zero() {
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
    }

    #[test]
    fn clamp_magnitude_shrinks_long_vectors_only() {
        let short = Vec2::new(1.0, 0.0);
        assert_eq!(short.clamp_magnitude(5.0), short);

        let long = Vec2::new(10.0, 0.0);
        let clamped = long.clamp_magnitude(5.0);
        assert!((clamped.length() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn zero_below_epsilon() {
        let v = Vec2::new(0.0001, 3.0);
        let z = v.zero_below(0.01);
        assert_eq!(z.x, 0.0);
        assert_eq!(z.y, 3.0);
    }
}
