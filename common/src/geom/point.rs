use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point<T> {
    pub x: T,
    pub y: T,
}

/// Board coordinates in nanometres.
pub type IPoint = Point<i64>;

impl<T> Point<T> {
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl<T: Add<Output = T>> Add for Point<T> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl<T: Sub<Output = T>> Sub for Point<T> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl<T: Neg<Output = T>> Neg for Point<T> {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl<T: Mul<Output = T> + Copy> Mul<T> for Point<T> {
    type Output = Self;
    fn mul(self, k: T) -> Self {
        Self::new(self.x * k, self.y * k)
    }
}

impl Point<i64> {
    #[inline]
    pub fn dot(&self, other: IPoint) -> i128 {
        self.x as i128 * other.x as i128 + self.y as i128 * other.y as i128
    }

    #[inline]
    pub fn cross(&self, other: IPoint) -> i128 {
        self.x as i128 * other.y as i128 - self.y as i128 * other.x as i128
    }

    #[inline]
    pub fn squared_length(&self) -> i128 {
        self.dot(*self)
    }

    pub fn length(&self) -> f64 {
        (self.squared_length() as f64).sqrt()
    }

    pub fn distance(&self, other: IPoint) -> f64 {
        (*self - other).length()
    }

    /// Vector with the same direction and the given length.
    pub fn resize(&self, new_length: i64) -> IPoint {
        let len = self.length();
        if len == 0.0 {
            return IPoint::new(0, 0);
        }
        let k = new_length as f64 / len;
        IPoint::new(
            (self.x as f64 * k).round() as i64,
            (self.y as f64 * k).round() as i64,
        )
    }

    /// Counter-clockwise perpendicular.
    pub fn perpendicular(&self) -> IPoint {
        IPoint::new(-self.y, self.x)
    }

    pub fn to_f64(&self) -> Point<f64> {
        Point::new(self.x as f64, self.y as f64)
    }

    /// Rotates around `center` by `degrees` (counter-clockwise, y up).
    pub fn rotate(&self, center: IPoint, degrees: f64) -> IPoint {
        let (s, c) = degrees.to_radians().sin_cos();
        let d = (*self - center).to_f64();
        IPoint::new(
            center.x + (d.x * c - d.y * s).round() as i64,
            center.y + (d.x * s + d.y * c).round() as i64,
        )
    }
}

impl Point<f64> {
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn round(&self) -> IPoint {
        IPoint::new(self.x.round() as i64, self.y.round() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_keeps_direction() {
        let v = IPoint::new(3000, 4000).resize(10);
        assert_eq!(v, IPoint::new(6, 8));
    }

    #[test]
    fn rotate_quarter_turn() {
        let p = IPoint::new(100, 0).rotate(IPoint::new(0, 0), 90.0);
        assert_eq!(p, IPoint::new(0, 100));
    }
}
