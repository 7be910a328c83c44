//! Prime field arithmetic
//!
//! `PrimeField` is the ring handed to an [`Iteration`](crate::iteration::Iteration):
//! arithmetic modulo a single word-sized prime. Products are formed in `u128`,
//! so any prime below 2^62 is safe.

use crate::error::ReconstructionError;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive};

/// Largest modulus accepted by [`PrimeField::new`]
pub const MAX_MODULUS: u64 = 1 << 62;

/// Arithmetic modulo a prime `p`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimeField {
    p: u64,
}

impl PrimeField {
    /// Build the field Z/pZ
    ///
    /// Rejects `p < 3` and `p >= 2^62`. Primality itself is not re-checked here;
    /// prime sources only ever produce primes.
    pub fn new(p: u64) -> Result<Self, ReconstructionError> {
        if p < 3 || p >= MAX_MODULUS {
            return Err(ReconstructionError::InvalidModulus(p));
        }
        Ok(Self { p })
    }

    /// Field characteristic
    #[inline]
    pub fn modulus(&self) -> u64 {
        self.p
    }

    #[inline]
    pub fn add(&self, a: u64, b: u64) -> u64 {
        let s = a + b;
        if s >= self.p { s - self.p } else { s }
    }

    #[inline]
    pub fn sub(&self, a: u64, b: u64) -> u64 {
        if a >= b { a - b } else { self.p - b + a }
    }

    #[inline]
    pub fn neg(&self, a: u64) -> u64 {
        if a == 0 { 0 } else { self.p - a }
    }

    #[inline]
    pub fn mul(&self, a: u64, b: u64) -> u64 {
        ((a as u128 * b as u128) % self.p as u128) as u64
    }

    /// `base^exp mod p` by square-and-multiply
    pub fn pow(&self, base: u64, mut exp: u64) -> u64 {
        let mut result = 1u64;
        let mut base = base % self.p;
        while exp > 0 {
            if exp & 1 == 1 {
                result = self.mul(result, base);
            }
            base = self.mul(base, base);
            exp >>= 1;
        }
        result
    }

    /// Multiplicative inverse, `None` for zero
    pub fn inv(&self, a: u64) -> Option<u64> {
        let a = a % self.p;
        if a == 0 {
            return None;
        }
        // Extended Euclid on i128 (p < 2^62 keeps every intermediate in range)
        let (mut old_r, mut r) = (a as i128, self.p as i128);
        let (mut old_s, mut s) = (1i128, 0i128);
        while r != 0 {
            let q = old_r / r;
            (old_r, r) = (r, old_r - q * r);
            (old_s, s) = (s, old_s - q * s);
        }
        if old_r != 1 {
            return None;
        }
        Some(old_s.rem_euclid(self.p as i128) as u64)
    }

    /// `a / b`, `None` when `b ≡ 0`
    pub fn div(&self, a: u64, b: u64) -> Option<u64> {
        self.inv(b).map(|b_inv| self.mul(a, b_inv))
    }

    /// Image of a signed machine integer
    pub fn reduce_i64(&self, n: i64) -> u64 {
        (n as i128).rem_euclid(self.p as i128) as u64
    }

    /// Image of an arbitrary-precision integer
    pub fn reduce_bigint(&self, n: &BigInt) -> u64 {
        let m = BigInt::from(self.p);
        let r = n.mod_floor(&m);
        // mod_floor with a positive modulus is always in [0, p)
        r.to_u64().unwrap_or(0)
    }

    /// Image of `num / den`, `None` when `p` divides the denominator
    pub fn reduce_fraction(&self, num: &BigInt, den: &BigInt) -> Option<u64> {
        let d = self.reduce_bigint(&den.abs());
        let n = self.reduce_bigint(num);
        let q = self.div(n, d)?;
        Some(if den.is_negative() { self.neg(q) } else { q })
    }
}
