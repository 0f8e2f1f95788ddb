//! Fiat-Shamir signatures.
//!
//! The private key is a set of `t` values `s_i` coprime with a modulus `n`
//! whose factorization is discarded; the public key holds `v_i = s_i^-2 mod n`.
//!
//! To sign, the signer commits to `t` random squares `x_i = r_i^2 mod n`,
//! derives a `t × k` binary challenge `b` by hashing the message together with
//! the commitments, and answers with `y_i = r_i · ∏ s_j^b_ij mod n`. A verifier
//! rebuilds `x_i` as `y_i^2 · ∏ v_j^b_ij mod n` and accepts iff hashing gives
//! back the same challenge.
//!
//! The challenge width `k` is drawn by the signer and travels implicitly as the
//! row width of `b`.

use std::cmp;
use std::convert::TryFrom;

use derive_more::{From, Into};
use hmac_sha256::Hash as Sha256;
use log::debug;
use num_traits::One;
use rand::{CryptoRng, Rng, RngCore};
use rsa::pkcs1::der::pem::{self, LineEnding};
use rsa::BigUint;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bigmath::{byte_size, ceil_div, mod_inverse, random_range, ToBytesPadded};
use crate::framing::{FrameReader, FrameWriter};
use crate::mgf1::mgf1;
use crate::prime::{generate_coprime, generate_prime_pair, PrimePairOptions};
use crate::Error;

/// Lower bound for the number of challenge bits per commitment.
pub const MIN_CHALLENGE_WIDTH: usize = 7;

pub const PUBLIC_KEY_PEM_LABEL: &str = "FIAT SHAMIR PUBLIC KEY";
pub const PRIVATE_KEY_PEM_LABEL: &str = "FIAT SHAMIR PRIVATE KEY";

/// Key generation options
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, new)]
pub struct FiatShamirOptions {
    /// Number of secret values (`t`)
    pub secrets: usize,
    /// Size window for the modulus
    pub prime_pair: PrimePairOptions,
}

impl Default for FiatShamirOptions {
    fn default() -> Self {
        FiatShamirOptions {
            secrets: 8,
            prime_pair: PrimePairOptions::default(),
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct FiatShamirPublicKey {
    n: BigUint,
    v: Vec<BigUint>,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct FiatShamirPrivateKey {
    n: BigUint,
    s: Vec<BigUint>,
}

#[derive(Clone, Debug, Eq, PartialEq, From, Into, new)]
pub struct FiatShamirKeyPair {
    pub pk: FiatShamirPublicKey,
    pub sk: FiatShamirPrivateKey,
}

/// A signature: the challenge matrix and one response per commitment
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, new)]
pub struct FiatShamirSignature {
    pub b: Vec<Vec<bool>>,
    pub y: Vec<BigUint>,
}

impl std::fmt::Debug for FiatShamirPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiatShamirPrivateKey")
            .field("n", &self.n)
            .field("t", &self.s.len())
            .finish_non_exhaustive()
    }
}

/// Hashes the message and the commitments into a `t × k` challenge.
///
/// Commitments are written at the byte width of `n` so that signer and
/// verifier hash identical bytes. Bits are taken most significant first; when
/// `t·k` exceeds the 256 bits of one SHA-256 digest, the digest seeds MGF1 for
/// the remainder.
fn challenge(message: &[u8], commitments: &[BigUint], n: &BigUint, k: usize) -> Vec<Vec<bool>> {
    let width = byte_size(n);
    let mut h = Sha256::new();
    h.update(message);
    for x in commitments {
        h.update(&x.to_bytes_be_padded(width));
    }
    let digest = h.finalize();

    let t = commitments.len();
    let needed = ceil_div(t * k, 8);
    let mut bytes = digest.to_vec();
    if needed > bytes.len() {
        let extra = mgf1(&digest, needed - bytes.len(), &mut Sha256::new());
        bytes.extend_from_slice(&extra);
    }

    let bit = |i: usize| (bytes[i / 8] >> (7 - i % 8)) & 1 == 1;
    (0..t)
        .map(|i| (0..k).map(|j| bit(i * k + j)).collect())
        .collect()
}

impl FiatShamirPublicKey {
    pub fn n(&self) -> &BigUint {
        &self.n
    }

    pub fn v(&self) -> &[BigUint] {
        &self.v
    }

    /// Number of secret values
    pub fn t(&self) -> usize {
        self.v.len()
    }

    /// Checks `signature` over `message`.
    pub fn verify(&self, signature: &FiatShamirSignature, message: impl AsRef<[u8]>) -> bool {
        let t = self.t();
        let b = &signature.b;
        let y = &signature.y;
        if t == 0 || b.len() != t || y.len() != t {
            return false;
        }
        let k = b[0].len();
        if b.iter().any(|row| row.len() != k) {
            return false;
        }
        if k < cmp::min(MIN_CHALLENGE_WIDTH, t) || k > t {
            return false;
        }

        let z: Vec<BigUint> = b
            .iter()
            .zip(y)
            .map(|(row, y_i)| {
                row.iter()
                    .zip(&self.v)
                    .filter(|(bit, _)| **bit)
                    .fold(y_i * y_i % &self.n, |acc, (_, v_j)| acc * v_j % &self.n)
            })
            .collect();

        challenge(message.as_ref(), &z, &self.n, k) == *b
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        encode_values(&self.n, &self.v)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (n, v) = decode_values(bytes)?;
        Ok(FiatShamirPublicKey { n, v })
    }

    pub fn to_pem(&self) -> Result<String, Error> {
        pem::encode_string(PUBLIC_KEY_PEM_LABEL, LineEnding::LF, &self.to_bytes()?)
            .map_err(|_| Error::EncodingError)
    }

    pub fn from_pem(pem: &str) -> Result<Self, Error> {
        Self::from_bytes(&decode_pem(pem, PUBLIC_KEY_PEM_LABEL)?)
    }
}

impl FiatShamirPrivateKey {
    pub fn n(&self) -> &BigUint {
        &self.n
    }

    pub fn s(&self) -> &[BigUint] {
        &self.s
    }

    pub fn t(&self) -> usize {
        self.s.len()
    }

    /// The public values `v_i = s_i^-2 mod n`.
    pub fn public_key(&self) -> Result<FiatShamirPublicKey, Error> {
        let v = self
            .s
            .iter()
            .map(|s_i| mod_inverse(&(s_i * s_i % &self.n), &self.n).ok_or(Error::InvalidKey))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FiatShamirPublicKey {
            n: self.n.clone(),
            v,
        })
    }

    /// Signs `message`, drawing the challenge width from `[7, t]`.
    pub fn sign<R: CryptoRng + RngCore + ?Sized>(
        &self,
        rng: &mut R,
        message: impl AsRef<[u8]>,
    ) -> Result<FiatShamirSignature, Error> {
        let t = self.t();
        if t == 0 {
            return Err(Error::InvalidKey);
        }
        let k = rng.gen_range(cmp::min(MIN_CHALLENGE_WIDTH, t)..=t);

        let one = BigUint::one();
        let upper = &self.n - &one;
        let r = (0..t)
            .map(|_| random_range(rng, &one, &upper))
            .collect::<Result<Vec<_>, _>>()?;
        let x: Vec<BigUint> = r.iter().map(|r_i| r_i * r_i % &self.n).collect();

        let b = challenge(message.as_ref(), &x, &self.n, k);
        let y = b
            .iter()
            .zip(r)
            .map(|(row, r_i)| {
                row.iter()
                    .zip(&self.s)
                    .filter(|(bit, _)| **bit)
                    .fold(r_i, |acc, (_, s_j)| acc * s_j % &self.n)
            })
            .collect();
        Ok(FiatShamirSignature { b, y })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        encode_values(&self.n, &self.s)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (n, s) = decode_values(bytes)?;
        Ok(FiatShamirPrivateKey { n, s })
    }

    pub fn to_pem(&self) -> Result<String, Error> {
        pem::encode_string(PRIVATE_KEY_PEM_LABEL, LineEnding::LF, &self.to_bytes()?)
            .map_err(|_| Error::EncodingError)
    }

    pub fn from_pem(pem: &str) -> Result<Self, Error> {
        Self::from_bytes(&decode_pem(pem, PRIVATE_KEY_PEM_LABEL)?)
    }
}

impl FiatShamirKeyPair {
    /// Generate a new key pair with `options.secrets` secret values
    pub fn generate<R: CryptoRng + RngCore + ?Sized>(
        rng: &mut R,
        options: &FiatShamirOptions,
    ) -> Result<FiatShamirKeyPair, Error> {
        if options.secrets == 0 {
            return Err(Error::InvalidInput);
        }
        let (p, q) = generate_prime_pair(rng, &options.prime_pair)?;
        let n = p * q;
        let s = (0..options.secrets)
            .map(|_| generate_coprime(rng, &n))
            .collect::<Result<Vec<_>, _>>()?;
        let sk = FiatShamirPrivateKey { n, s };
        let pk = sk.public_key()?;
        debug!(
            "generated Fiat-Shamir key: {}-bit modulus, t = {}",
            pk.n.bits(),
            pk.t()
        );
        Ok(FiatShamirKeyPair { pk, sk })
    }
}

/// Key pair with `t` secrets over a modulus of 512 to 1024 bits.
pub fn generate_keypair<R: CryptoRng + RngCore + ?Sized>(
    rng: &mut R,
    t: usize,
) -> Result<FiatShamirKeyPair, Error> {
    FiatShamirKeyPair::generate(rng, &FiatShamirOptions::new(t, PrimePairOptions::default()))
}

impl FiatShamirSignature {
    /// `u32 t ‖ u32 k ‖ packed bits ‖ t × (u32 len ‖ y_i)`, bits row-major, most significant first.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let t = self.b.len();
        let k = self.b.first().map_or(0, Vec::len);
        if self.y.len() != t || self.b.iter().any(|row| row.len() != k) {
            return Err(Error::EncodingError);
        }
        let mut packed = vec![0u8; ceil_div(t * k, 8)];
        for (i, bit) in self.b.iter().flatten().enumerate() {
            if *bit {
                packed[i / 8] |= 0x80 >> (i % 8);
            }
        }

        let t = u32::try_from(t).map_err(|_| Error::EncodingError)?;
        let k = u32::try_from(k).map_err(|_| Error::EncodingError)?;
        let mut w = FrameWriter::new();
        w.put_u32(t).put_u32(k).put_raw(&packed);
        for y_i in &self.y {
            w.put_biguint(y_i)?;
        }
        Ok(w.into_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut r = FrameReader::new(bytes);
        let t = r.get_u32()? as usize;
        let k = r.get_u32()? as usize;
        if k == 0 || k > t {
            return Err(Error::UnsupportedFormat);
        }
        let bit_count = t.checked_mul(k).ok_or(Error::UnsupportedFormat)?;
        let packed = r.get_raw(ceil_div(bit_count, 8))?;
        // each y_i takes at least its 4-byte length
        if t > r.remaining() / 4 {
            return Err(Error::UnsupportedFormat);
        }
        let b = (0..t)
            .map(|i| {
                (0..k)
                    .map(|j| {
                        let idx = i * k + j;
                        packed[idx / 8] & (0x80 >> (idx % 8)) != 0
                    })
                    .collect()
            })
            .collect();
        let y = (0..t)
            .map(|_| r.get_biguint())
            .collect::<Result<Vec<_>, _>>()?;
        r.finish()?;
        Ok(FiatShamirSignature { b, y })
    }
}

fn encode_values(n: &BigUint, values: &[BigUint]) -> Result<Vec<u8>, Error> {
    let mut w = FrameWriter::new();
    w.put_biguint(n)?;
    w.put_u32(u32::try_from(values.len()).map_err(|_| Error::EncodingError)?);
    for value in values {
        w.put_biguint(value)?;
    }
    Ok(w.into_bytes())
}

fn decode_values(bytes: &[u8]) -> Result<(BigUint, Vec<BigUint>), Error> {
    let mut r = FrameReader::new(bytes);
    let n = r.get_biguint()?;
    let t = r.get_u32()? as usize;
    // each value takes at least its 4-byte length
    if t > bytes.len() / 4 {
        return Err(Error::UnsupportedFormat);
    }
    let values = (0..t)
        .map(|_| r.get_biguint())
        .collect::<Result<Vec<_>, _>>()?;
    r.finish()?;
    if n <= BigUint::one() || values.iter().any(|value| value >= &n) {
        return Err(Error::InvalidKey);
    }
    Ok((n, values))
}

fn decode_pem(pem: &str, expected_label: &str) -> Result<Vec<u8>, Error> {
    let (label, bytes) = pem::decode_vec(pem.as_bytes()).map_err(|_| Error::UnsupportedFormat)?;
    if label != expected_label {
        return Err(Error::UnsupportedFormat);
    }
    Ok(bytes)
}
