//! Arbitrary-precision helpers shared by the RSA and Fiat-Shamir code.

use std::iter;

use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};
use rsa::BigUint;

use crate::Error;

pub trait ToBytesPadded {
    /// Returns the byte representation of `self` in big-endian byte order,
    /// left-padding the number with zeroes to the specified length.
    ///
    /// If `len` is less than or equal to the length of the byte representation
    /// of `self`, no padding will be added.
    fn to_bytes_be_padded(&self, len: usize) -> Vec<u8>;
}

impl ToBytesPadded for BigUint {
    fn to_bytes_be_padded(&self, len: usize) -> Vec<u8> {
        let v = if self.is_zero() {
            Vec::new()
        } else {
            self.to_bytes_be()
        };
        if len > v.len() {
            iter::repeat(0)
                .take(len - v.len())
                .chain(v.into_iter())
                .collect()
        } else {
            v
        }
    }
}

/// Number of significant bits, `0` for zero.
pub fn bit_size(num: &BigUint) -> usize {
    num.bits()
}

/// Number of bytes needed to hold `num`; zero still takes one byte.
pub fn byte_size(num: &BigUint) -> usize {
    if num.is_zero() {
        return 1;
    }
    ceil_div(bit_size(num), 8)
}

pub fn ceil_div(num: usize, div: usize) -> usize {
    let (quanta, rem) = (num / div, num % div);
    if rem != 0 {
        quanta + 1
    } else {
        quanta
    }
}

/// Bezout coefficient: unsigned magnitude plus a sign bit, since `BigUint`
/// cannot go negative.
#[derive(Clone, Debug)]
struct Coeff {
    mag: BigUint,
    neg: bool,
}

impl Coeff {
    fn new(mag: BigUint) -> Self {
        Coeff { mag, neg: false }
    }

    // self - q * other
    fn sub_mul(&self, q: &BigUint, other: &Coeff) -> Coeff {
        let qo = q * &other.mag;
        if self.neg == other.neg {
            if self.mag >= qo {
                Coeff {
                    mag: &self.mag - &qo,
                    neg: self.neg,
                }
            } else {
                Coeff {
                    mag: qo - &self.mag,
                    neg: !self.neg,
                }
            }
        } else {
            Coeff {
                mag: &self.mag + &qo,
                neg: self.neg,
            }
        }
    }

    /// Representative in `[0, m)`; a zero modulus leaves the magnitude untouched.
    fn reduce(&self, m: &BigUint) -> BigUint {
        if m.is_zero() {
            return self.mag.clone();
        }
        let r = &self.mag % m;
        if self.neg && !r.is_zero() {
            m - &r
        } else {
            r
        }
    }
}

/// Extended Euclidean algorithm.
///
/// Returns `(g, x, y)` with `g = gcd(a, b)` and `a*x + b*y ≡ g`, where the
/// coefficients are brought back into `[0, b)` and `[0, a)` respectively.
/// When `g == 1`, `x` is the inverse of `a` modulo `b` and `y` the inverse of
/// `b` modulo `a`.
pub fn extended_gcd(a: &BigUint, b: &BigUint) -> (BigUint, BigUint, BigUint) {
    let (mut r, mut new_r) = (a.clone(), b.clone());
    let (mut x, mut new_x) = (Coeff::new(BigUint::one()), Coeff::new(BigUint::zero()));
    let (mut y, mut new_y) = (Coeff::new(BigUint::zero()), Coeff::new(BigUint::one()));

    while !new_r.is_zero() {
        let quotient = &r / &new_r;

        let next_r = &r % &new_r;
        r = new_r;
        new_r = next_r;

        let next_x = x.sub_mul(&quotient, &new_x);
        x = new_x;
        new_x = next_x;

        let next_y = y.sub_mul(&quotient, &new_y);
        y = new_y;
        new_y = next_y;
    }

    (r, x.reduce(b), y.reduce(a))
}

/// Modular inverse of `a` modulo `n`, or `None` when they share a factor.
pub fn mod_inverse(a: &BigUint, n: &BigUint) -> Option<BigUint> {
    if n.is_zero() {
        return None;
    }
    let (divider, inv, _) = extended_gcd(a, n);
    if !divider.is_one() {
        return None;
    }
    Some(inv % n)
}

/// Chinese Remainder reconstruction: the unique `x < ∏ m_i` with `x ≡ a_i (mod m_i)`.
///
/// The moduli must be pairwise coprime.
pub fn crt(remainders: &[BigUint], moduli: &[BigUint]) -> Result<BigUint, Error> {
    if remainders.len() != moduli.len() || moduli.is_empty() {
        return Err(Error::InvalidInput);
    }
    if moduli.iter().any(|m| m.is_zero()) {
        return Err(Error::InvalidInput);
    }
    let m = moduli.iter().fold(BigUint::one(), |acc, m_i| acc * m_i);

    let mut x = BigUint::zero();
    for (a_i, m_i) in remainders.iter().zip(moduli) {
        let big_m = &m / m_i;
        let inv = mod_inverse(&big_m, m_i).ok_or(Error::InvalidInput)?;
        x = (x + a_i * &big_m * inv) % &m;
    }
    Ok(x)
}

/// Uniform integer with exactly `nbits` significant bits (top bit forced).
pub fn random_bits<R: CryptoRng + RngCore + ?Sized>(rng: &mut R, nbits: usize) -> BigUint {
    if nbits == 0 {
        return BigUint::zero();
    }
    let value = random_below_bits(rng, nbits);
    value | (BigUint::one() << (nbits - 1))
}

/// Uniform integer in `[0, 2^nbits)`.
fn random_below_bits<R: CryptoRng + RngCore + ?Sized>(rng: &mut R, nbits: usize) -> BigUint {
    let byte_len = ceil_div(nbits, 8);
    let mut bytes = vec![0u8; byte_len];
    rng.fill_bytes(&mut bytes);
    let excess = byte_len * 8 - nbits;
    if excess > 0 {
        bytes[0] &= 0xff >> excess;
    }
    BigUint::from_bytes_be(&bytes)
}

/// Uniform integer in the inclusive range `[min, max]`, by rejection sampling.
pub fn random_range<R: CryptoRng + RngCore + ?Sized>(
    rng: &mut R,
    min: &BigUint,
    max: &BigUint,
) -> Result<BigUint, Error> {
    if min > max {
        return Err(Error::InvalidInput);
    }
    let width = max - min;
    if width.is_zero() {
        return Ok(min.clone());
    }
    let nbits = bit_size(&width);
    loop {
        let candidate = random_below_bits(rng, nbits);
        if candidate <= width {
            return Ok(&candidate + min);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(v: u64) -> BigUint {
        BigUint::from(v)
    }

    #[test]
    fn test_extended_gcd() {
        let (g, x, y) = extended_gcd(&big(240), &big(46));
        assert_eq!(g, big(2));
        // 240 * (-9) + 46 * 47 = 2
        assert_eq!(x, big(46 - 9));
        assert_eq!(y, big(47));
    }

    #[test]
    fn test_mod_inverse() {
        assert_eq!(mod_inverse(&big(17), &big(3120)), Some(big(2753)));
        assert_eq!(mod_inverse(&big(53), &big(61)), Some(big(38)));
        assert_eq!(mod_inverse(&big(6), &big(9)), None);
        assert_eq!(mod_inverse(&big(3), &big(0)), None);
    }

    #[test]
    fn test_crt() {
        let x = crt(&[big(2), big(3), big(2)], &[big(3), big(5), big(7)]).unwrap();
        assert_eq!(x, big(23));
        assert_eq!(crt(&[big(1)], &[big(4), big(6)]), Err(Error::InvalidInput));
        assert_eq!(crt(&[big(1), big(1)], &[big(4), big(6)]), Err(Error::InvalidInput));
    }

    #[test]
    fn test_sizes() {
        assert_eq!(byte_size(&big(0)), 1);
        assert_eq!(byte_size(&big(255)), 1);
        assert_eq!(byte_size(&big(256)), 2);
        assert_eq!(bit_size(&big(3233)), 12);
        assert_eq!(ceil_div(17, 8), 3);
    }

    #[test]
    fn test_padding() {
        assert_eq!(big(0x0102).to_bytes_be_padded(4), vec![0, 0, 1, 2]);
        assert_eq!(big(0).to_bytes_be_padded(2), vec![0, 0]);
        assert_eq!(big(0x010203).to_bytes_be_padded(2), vec![1, 2, 3]);
    }

    #[test]
    fn test_random_range() {
        let mut rng = rand::thread_rng();
        let (min, max) = (big(1000), big(1010));
        for _ in 0..200 {
            let v = random_range(&mut rng, &min, &max).unwrap();
            assert!(v >= min && v <= max);
        }
        assert_eq!(random_range(&mut rng, &max, &min), Err(Error::InvalidInput));
        for bits in 1..70 {
            assert_eq!(random_bits(&mut rng, bits).bits(), bits);
        }
    }
}
