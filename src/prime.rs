//! Primality testing and random prime generation.
//!
//! Integers below 2^32 are decided exactly with a 6k±1 wheel. Anything larger goes
//! through trial division by the first hundred primes, then Miller-Rabin with the
//! twelve fixed bases 2..37 (exact for every n < 3.18e23, so for all of u64), then
//! [`MILLER_RABIN_ROUNDS`] random bases. For an adversarially chosen composite each
//! random round lets it through with probability at most 1/4, so the residual
//! false-positive probability is below 4^-20; for random candidates it is far lower.

use log::{debug, trace};
use num_integer::Integer;
use num_traits::{One, PrimInt, ToPrimitive, Zero};
use rand::{CryptoRng, Rng, RngCore};
use rsa::BigUint;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bigmath::random_range;
use crate::Error;

/// Candidates drawn by [`generate_prime`] before giving up.
pub const PRIME_SEARCH_ATTEMPTS: usize = 100;

/// Target sizes tried by [`generate_prime_pair`] and [`random_prime`] before giving up.
pub const PAIR_SEARCH_ATTEMPTS: usize = 1000;

/// Candidates drawn by [`generate_coprime`] before giving up.
pub const COPRIME_SEARCH_ATTEMPTS: usize = 1000;

/// Random Miller-Rabin bases tried after the fixed ones.
pub const MILLER_RABIN_ROUNDS: usize = 20;

/// Small primes for trial division
const SMALL_PRIMES: [u32; 100] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
    101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191, 193,
    197, 199, 211, 223, 227, 229, 233, 239, 241, 251, 257, 263, 269, 271, 277, 281, 283, 293, 307,
    311, 313, 317, 331, 337, 347, 349, 353, 359, 367, 373, 379, 383, 389, 397, 401, 409, 419, 421,
    431, 433, 439, 443, 449, 457, 461, 463, 467, 479, 487, 491, 499, 503, 509, 521, 523, 541,
];

const FIXED_BASES: [u32; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Bit-length window for the product of a prime pair.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, new)]
pub struct PrimePairOptions {
    /// Smallest admissible bit length of `p * q`
    pub min_bits: usize,
    /// Largest admissible bit length of `p * q`
    pub max_bits: usize,
    /// Target sizes to try before reporting the window as infeasible
    pub max_attempts: usize,
}

impl Default for PrimePairOptions {
    fn default() -> Self {
        PrimePairOptions {
            min_bits: 512,
            max_bits: 1024,
            max_attempts: PAIR_SEARCH_ATTEMPTS,
        }
    }
}

/// Deterministic 6k±1 wheel. Exact for every value of `T`, but runs in O(√n),
/// so it is only meant for machine-sized integers.
///
/// Zero, one and negative numbers are not prime.
pub fn is_prime_wheel<T: PrimInt>(n: T) -> bool {
    let two = T::one() + T::one();
    let three = two + T::one();
    if n <= T::one() {
        return false;
    }
    if n <= three {
        return true;
    }
    if n % two == T::zero() || n % three == T::zero() {
        return false;
    }
    let six = three + three;
    let mut i = two + three;
    while i <= n / i {
        if n % i == T::zero() || n % (i + two) == T::zero() {
            return false;
        }
        i = i + six;
    }
    true
}

/// Quick trial division check
fn passes_trial_division(n: &BigUint) -> bool {
    for &p in &SMALL_PRIMES[1..] {
        // Skip 2, we already know n is odd
        let p = BigUint::from(p);
        if n == &p {
            return true;
        }
        if (n % &p).is_zero() {
            return false;
        }
    }
    true
}

/// One Miller-Rabin round; `true` means `a` proves `n` composite.
fn is_witness(a: &BigUint, d: &BigUint, r: usize, n: &BigUint, n_minus_1: &BigUint) -> bool {
    let two = BigUint::from(2u32);
    let mut x = a.modpow(d, n);
    if x.is_one() || &x == n_minus_1 {
        return false;
    }
    for _ in 1..r {
        x = x.modpow(&two, n);
        if &x == n_minus_1 {
            return false;
        }
        if x.is_one() {
            return true;
        }
    }
    true
}

/// Probabilistic primality test with `rounds` random bases on top of the fixed ones.
pub fn is_probable_prime<R: CryptoRng + RngCore + ?Sized>(
    rng: &mut R,
    n: &BigUint,
    rounds: usize,
) -> bool {
    if n.bits() <= 32 {
        return match n.to_u64() {
            Some(v) => is_prime_wheel(v),
            None => false,
        };
    }
    if n.is_even() || !passes_trial_division(n) {
        return false;
    }

    // Write n-1 as 2^r * d where d is odd
    let one = BigUint::one();
    let n_minus_1 = n - &one;
    let mut d = n_minus_1.clone();
    let mut r = 0usize;
    while d.is_even() {
        d = d >> 1usize;
        r += 1;
    }

    for &base in FIXED_BASES.iter() {
        if is_witness(&BigUint::from(base), &d, r, n, &n_minus_1) {
            return false;
        }
    }

    let two = BigUint::from(2u32);
    let n_minus_2 = n - &two;
    for _ in 0..rounds {
        let a = match random_range(rng, &two, &n_minus_2) {
            Ok(a) => a,
            Err(_) => return false,
        };
        if is_witness(&a, &d, r, n, &n_minus_1) {
            return false;
        }
    }
    true
}

/// Primality test used for key material, with [`MILLER_RABIN_ROUNDS`] random rounds.
pub fn is_prime(n: &BigUint) -> bool {
    is_probable_prime(&mut rand::thread_rng(), n, MILLER_RABIN_ROUNDS)
}

/// Draw random candidates from `[min, max]` until one is prime.
///
/// Draws other than 2 are rounded up to the next odd number.
///
/// Gives up with [`Error::NotFound`] after [`PRIME_SEARCH_ATTEMPTS`] candidates.
pub fn generate_prime<R: CryptoRng + RngCore + ?Sized>(
    rng: &mut R,
    min: &BigUint,
    max: &BigUint,
) -> Result<BigUint, Error> {
    if min > max || max < &BigUint::from(2u32) {
        return Err(Error::InvalidInput);
    }
    let two = BigUint::from(2u32);
    for _ in 0..PRIME_SEARCH_ATTEMPTS {
        let num = random_range(rng, min, max)?;
        let num = if num == two { num } else { num | BigUint::one() };
        if &num > max {
            continue;
        }
        if is_probable_prime(rng, &num, MILLER_RABIN_ROUNDS) {
            return Ok(num);
        }
    }
    Err(Error::NotFound)
}

/// Random prime with exactly `bits` significant bits.
pub fn random_prime<R: CryptoRng + RngCore + ?Sized>(
    rng: &mut R,
    bits: usize,
) -> Result<BigUint, Error> {
    if bits < 2 {
        return Err(Error::InvalidInput);
    }
    let one = BigUint::one();
    let min = &one << (bits - 1);
    let max = (&one << bits) - &one;
    for _ in 0..PAIR_SEARCH_ATTEMPTS {
        match generate_prime(rng, &min, &max) {
            Ok(p) => return Ok(p),
            Err(Error::NotFound) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(Error::NotFound)
}

/// Two distinct primes whose product has a bit length inside the window of `options`.
///
/// Each attempt picks a target size for the product, splits it between `p` and
/// `q`, then narrows the range of `q` so that `p * q` lands on the target.
/// Running out of attempts means the window cannot be met and is reported as
/// [`Error::ConfigurationExhausted`].
pub fn generate_prime_pair<R: CryptoRng + RngCore + ?Sized>(
    rng: &mut R,
    options: &PrimePairOptions,
) -> Result<(BigUint, BigUint), Error> {
    if options.min_bits < 4 || options.min_bits > options.max_bits {
        return Err(Error::InvalidInput);
    }
    let one = BigUint::one();

    for attempt in 0..options.max_attempts {
        let target_bits = rng.gen_range(options.min_bits..=options.max_bits);
        let p_bits = target_bits / 2;
        let q_bits = target_bits - p_bits;

        let p_min = &one << (p_bits - 1);
        let p_max = (&one << p_bits) - &one;
        let p = match generate_prime(rng, &p_min, &p_max) {
            Ok(p) => p,
            Err(Error::NotFound) => {
                trace!("attempt {}: no {}-bit prime for p", attempt, p_bits);
                continue;
            }
            Err(e) => return Err(e),
        };

        let min_n = &one << (target_bits - 1);
        let max_n = (&one << target_bits) - &one;
        let q_min = (&one << (q_bits - 1)).max((&min_n + &p - &one) / &p);
        let q_max = ((&one << q_bits) - &one).min(&max_n / &p);
        if q_min > q_max {
            trace!("attempt {}: empty range for q", attempt);
            continue;
        }

        let q = match generate_prime(rng, &q_min, &q_max) {
            Ok(q) => q,
            Err(Error::NotFound) => {
                trace!("attempt {}: no prime for q in range", attempt);
                continue;
            }
            Err(e) => return Err(e),
        };
        if p == q {
            continue;
        }

        let n_bits = (&p * &q).bits();
        if (options.min_bits..=options.max_bits).contains(&n_bits) {
            debug!(
                "prime pair found after {} attempts, modulus of {} bits",
                attempt + 1,
                n_bits
            );
            return Ok((p, q));
        }
    }
    Err(Error::ConfigurationExhausted)
}

pub fn are_relatively_prime(a: &BigUint, b: &BigUint) -> bool {
    a.gcd(b).is_one()
}

/// Random value in `[2, n-1]` coprime with `n`.
pub fn generate_coprime<R: CryptoRng + RngCore + ?Sized>(
    rng: &mut R,
    n: &BigUint,
) -> Result<BigUint, Error> {
    if n.is_zero() {
        return Err(Error::InvalidInput);
    }
    let two = BigUint::from(2u32);
    if n <= &two {
        return Ok(BigUint::one());
    }
    let upper = n - &BigUint::one();
    for _ in 0..COPRIME_SEARCH_ATTEMPTS {
        let m = random_range(rng, &two, &upper)?;
        if are_relatively_prime(n, &m) {
            return Ok(m);
        }
    }
    Err(Error::NotFound)
}
