//! Exact rational numbers and rational reconstruction
//!
//! [`reconstruct`] turns a residue `a mod m` back into the unique fraction
//! `n/d` with `|n|, d <= sqrt(m/2)` and `n ≡ a·d (mod m)`, when one exists.

use num_bigint::BigInt;
use num_integer::{Integer, Roots};
use num_traits::{One, Signed, Zero};
use std::fmt;
use std::ops::{Add, Mul};
use std::str::FromStr;

/// Exact rational number in lowest terms with a positive denominator
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rational {
    numerator: BigInt,
    denominator: BigInt,
}

impl Rational {
    /// Create a rational from numerator and denominator, reduced to lowest terms
    ///
    /// # Panics
    ///
    /// Panics if `den` is zero.
    pub fn new(num: BigInt, den: BigInt) -> Self {
        assert!(!den.is_zero(), "rational with zero denominator");
        let mut r = Self {
            numerator: num,
            denominator: den,
        };
        r.reduce();
        r
    }

    /// Create a rational from an integer
    pub fn from_int<T: Into<BigInt>>(n: T) -> Self {
        Self {
            numerator: n.into(),
            denominator: BigInt::one(),
        }
    }

    pub fn numerator(&self) -> &BigInt {
        &self.numerator
    }

    pub fn denominator(&self) -> &BigInt {
        &self.denominator
    }

    pub fn is_integer(&self) -> bool {
        self.denominator.is_one()
    }

    /// Reduce to lowest terms
    fn reduce(&mut self) {
        if self.numerator.is_zero() {
            self.denominator = BigInt::one();
            return;
        }

        let g = self.numerator.gcd(&self.denominator);
        self.numerator = &self.numerator / &g;
        self.denominator = &self.denominator / &g;

        // Ensure denominator is positive
        if self.denominator.is_negative() {
            self.numerator = -&self.numerator;
            self.denominator = -&self.denominator;
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_integer() {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{}/{}", self.numerator, self.denominator)
        }
    }
}

/// Error parsing a `"n"` or `"n/d"` literal
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid rational literal: {0:?}")]
pub struct ParseRationalError(String);

impl FromStr for Rational {
    type Err = ParseRationalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseRationalError(s.to_string());
        let (num, den) = match s.trim().split_once('/') {
            Some((n, d)) => (n.trim(), d.trim()),
            None => (s.trim(), "1"),
        };
        let num: BigInt = num.parse().map_err(|_| err())?;
        let den: BigInt = den.parse().map_err(|_| err())?;
        if den.is_zero() {
            return Err(err());
        }
        Ok(Self::new(num, den))
    }
}

impl From<i64> for Rational {
    fn from(n: i64) -> Self {
        Self::from_int(n)
    }
}

impl From<BigInt> for Rational {
    fn from(n: BigInt) -> Self {
        Self::from_int(n)
    }
}

impl Add for &Rational {
    type Output = Rational;

    fn add(self, other: Self) -> Rational {
        let num = &self.numerator * &other.denominator + &other.numerator * &self.denominator;
        let den = &self.denominator * &other.denominator;
        Rational::new(num, den)
    }
}

impl Mul for &Rational {
    type Output = Rational;

    fn mul(self, other: Self) -> Rational {
        let num = &self.numerator * &other.numerator;
        let den = &self.denominator * &other.denominator;
        Rational::new(num, den)
    }
}

/// Symmetric representative of `a mod m` in `(-m/2, m/2]`
pub fn symmetric(a: &BigInt, m: &BigInt) -> BigInt {
    let r = a.mod_floor(m);
    let half: BigInt = m >> 1;
    if r > half { r - m } else { r }
}

/// Classic rational reconstruction of `a mod m`
///
/// Runs the extended Euclidean algorithm on `(m, a)` and stops at the first
/// remainder below `sqrt(m/2)`. Returns `None` if the cofactor exceeds the same
/// bound or shares a factor with `m`.
pub fn reconstruct(a: &BigInt, m: &BigInt) -> Option<Rational> {
    if m <= &BigInt::one() {
        return None;
    }
    let half: BigInt = m >> 1;
    let bound: BigInt = half.sqrt();

    let (mut r0, mut r1) = (m.clone(), a.mod_floor(m));
    let (mut t0, mut t1) = (BigInt::zero(), BigInt::one());
    while r1 > bound {
        let q = &r0 / &r1;
        let r2 = &r0 - &q * &r1;
        let t2 = &t0 - &q * &t1;
        r0 = std::mem::replace(&mut r1, r2);
        t0 = std::mem::replace(&mut t1, t2);
    }

    if t1.is_zero() || t1.abs() > bound || !t1.gcd(m).is_one() {
        return None;
    }
    Some(Rational::new(r1, t1))
}
