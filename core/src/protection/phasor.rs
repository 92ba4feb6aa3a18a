use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// Rectangular phasor: the complex carrier for relay measurements.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Phasor {
    pub re: f64,
    pub im: f64,
}

impl Phasor {
    pub fn new(re: f64, im: f64) -> Self {
        Phasor { re, im }
    }

    pub fn from_polar(magnitude: f64, angle_rad: f64) -> Self {
        Phasor {
            re: magnitude * angle_rad.cos(),
            im: magnitude * angle_rad.sin(),
        }
    }

    pub fn magnitude(self) -> f64 {
        (self.re * self.re + self.im * self.im).sqrt()
    }

    pub fn angle(self) -> f64 {
        self.im.atan2(self.re)
    }
}

impl Add for Phasor {
    type Output = Phasor;

    fn add(self, rhs: Phasor) -> Phasor {
        Phasor::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Sub for Phasor {
    type Output = Phasor;

    fn sub(self, rhs: Phasor) -> Phasor {
        Phasor::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul<f64> for Phasor {
    type Output = Phasor;

    fn mul(self, rhs: f64) -> Phasor {
        Phasor::new(self.re * rhs, self.im * rhs)
    }
}

impl Div for Phasor {
    type Output = Phasor;

    /// Complex division; a zero divisor yields non-finite components the
    /// caller screens out with its current threshold.
    fn div(self, rhs: Phasor) -> Phasor {
        let denom = rhs.re * rhs.re + rhs.im * rhs.im;
        Phasor::new(
            (self.re * rhs.re + self.im * rhs.im) / denom,
            (self.im * rhs.re - self.re * rhs.im) / denom,
        )
    }
}

impl fmt::Display for Phasor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}∠{:.1}°", self.magnitude(), self.angle().to_degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnitude_and_angle() {
        let p = Phasor::new(3.0, 4.0);
        assert!((p.magnitude() - 5.0).abs() < 1e-12);
        let q = Phasor::new(0.0, 1.0);
        assert!((q.angle() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_polar_roundtrip() {
        let p = Phasor::from_polar(10.0, 0.5);
        assert!((p.magnitude() - 10.0).abs() < 1e-9);
        assert!((p.angle() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_division() {
        // 100∠0 / 20∠0 = 5∠0
        let z = Phasor::new(100.0, 0.0) / Phasor::new(20.0, 0.0);
        assert!((z.re - 5.0).abs() < 1e-12);
        assert!(z.im.abs() < 1e-12);

        // (1 + i) / i = 1 - i
        let z = Phasor::new(1.0, 1.0) / Phasor::new(0.0, 1.0);
        assert!((z.re - 1.0).abs() < 1e-12);
        assert!((z.im + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_arithmetic() {
        let a = Phasor::new(1.0, 2.0);
        let b = Phasor::new(3.0, -1.0);
        assert_eq!(a + b, Phasor::new(4.0, 1.0));
        assert_eq!(a - b, Phasor::new(-2.0, 3.0));
        assert_eq!(a * 2.0, Phasor::new(2.0, 4.0));
    }
}
