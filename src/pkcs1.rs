//! PKCS#1 v1.5 encryption and signatures.
//!
//! Encryption blocks are `00 02 <non-zero random bytes> 00 <message>` and
//! signature blocks are `00 01 <FF bytes> 00 <DigestInfo prefix> <digest>`,
//! both exactly as long as the modulus. Both need at least eight bytes of
//! padding.

use std::fmt::{self, Display};
use std::io::{self, Read};
use std::str::FromStr;

use derive_more::*;
use digest::DynDigest;
use hmac_sha256::Hash as Sha256;
use hmac_sha512::sha384::Hash as Sha384;
use hmac_sha512::Hash as Sha512;
use log::trace;
use rand::{CryptoRng, RngCore};
use rsa::BigUint;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq, ConstantTimeLess};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bigmath::ToBytesPadded;
use crate::key::{PrivateKey, PublicKey};
use crate::Error;

/// Bytes of framing around the payload: two marker bytes, eight padding bytes, one separator.
const PADDING_OVERHEAD: usize = 11;

/// Smallest index the zero separator may occupy in an encryption block.
const MIN_SEPARATOR_INDEX: u64 = 10;

const READ_BLOCK_SIZE: usize = 1024;

/// Hash functions that can be named in a signature
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum HashAlgorithm {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Sha3_256,
    Sha3_384,
    Sha3_512,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 8] = [
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
        HashAlgorithm::Sha3_256,
        HashAlgorithm::Sha3_384,
        HashAlgorithm::Sha3_512,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha224 => "SHA-224",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha384 => "SHA-384",
            HashAlgorithm::Sha512 => "SHA-512",
            HashAlgorithm::Sha3_256 => "SHA3-256",
            HashAlgorithm::Sha3_384 => "SHA3-384",
            HashAlgorithm::Sha3_512 => "SHA3-512",
        }
    }

    /// DER encoding of the `DigestInfo` header that precedes the digest.
    pub fn digest_info_prefix(&self) -> &'static [u8] {
        match self {
            HashAlgorithm::Sha1 => &[
                0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a, 0x05, 0x00, 0x04,
                0x14,
            ],
            HashAlgorithm::Sha224 => &[
                0x30, 0x2d, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
                0x04, 0x05, 0x00, 0x04, 0x1c,
            ],
            HashAlgorithm::Sha256 => &[
                0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
                0x01, 0x05, 0x00, 0x04, 0x20,
            ],
            HashAlgorithm::Sha384 => &[
                0x30, 0x41, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
                0x02, 0x05, 0x00, 0x04, 0x30,
            ],
            HashAlgorithm::Sha512 => &[
                0x30, 0x51, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
                0x03, 0x05, 0x00, 0x04, 0x40,
            ],
            HashAlgorithm::Sha3_256 => &[
                0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
                0x08, 0x05, 0x00, 0x04, 0x20,
            ],
            HashAlgorithm::Sha3_384 => &[
                0x30, 0x41, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
                0x09, 0x05, 0x00, 0x04, 0x30,
            ],
            HashAlgorithm::Sha3_512 => &[
                0x30, 0x51, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
                0x0a, 0x05, 0x00, 0x04, 0x40,
            ],
        }
    }

    fn hasher(&self) -> Box<dyn DynDigest> {
        match self {
            HashAlgorithm::Sha1 => Box::new(sha1::Sha1::default()),
            HashAlgorithm::Sha224 => Box::new(sha2::Sha224::default()),
            HashAlgorithm::Sha256 => Box::new(Sha256::new()),
            HashAlgorithm::Sha384 => Box::new(Sha384::new()),
            HashAlgorithm::Sha512 => Box::new(Sha512::new()),
            HashAlgorithm::Sha3_256 => Box::new(sha3::Sha3_256::default()),
            HashAlgorithm::Sha3_384 => Box::new(sha3::Sha3_384::default()),
            HashAlgorithm::Sha3_512 => Box::new(sha3::Sha3_512::default()),
        }
    }

    /// Digest length in bytes
    pub fn output_size(&self) -> usize {
        self.hasher().output_size()
    }

    pub fn digest(&self, data: impl AsRef<[u8]>) -> Vec<u8> {
        let mut hasher = self.hasher();
        hasher.update(data.as_ref());
        hasher.finalize().to_vec()
    }

    /// Hashes everything `reader` yields, one kilobyte at a time.
    pub fn digest_reader<R: Read>(&self, mut reader: R) -> Result<Vec<u8>, Error> {
        let mut hasher = self.hasher();
        let mut block = [0u8; READ_BLOCK_SIZE];
        loop {
            let read = match reader.read(&mut block) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return Err(Error::InvalidInput),
            };
            hasher.update(&block[..read]);
        }
        Ok(hasher.finalize().to_vec())
    }
}

impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        HashAlgorithm::ALL
            .iter()
            .copied()
            .find(|hash| hash.name() == name)
            .ok_or(Error::UnsupportedHash)
    }
}

/// A PKCS#1 v1.5 signature, as long as the signer's modulus
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, AsRef, Deref, From, Into, new)]
pub struct Signature(pub Vec<u8>);

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

/// Hash `message` with the named algorithm.
pub fn compute_hash(message: impl AsRef<[u8]>, hash: HashAlgorithm) -> Vec<u8> {
    hash.digest(message)
}

fn check_length(len: usize, target_len: usize) -> Result<(), Error> {
    let max = target_len.saturating_sub(PADDING_OVERHEAD);
    if target_len < PADDING_OVERHEAD || len > max {
        return Err(Error::MessageTooLong { len, max });
    }
    Ok(())
}

/// `00 02 <random non-zero bytes> 00 <message>`, `target_len` bytes long.
pub fn pad_for_encryption<R: CryptoRng + RngCore + ?Sized>(
    rng: &mut R,
    message: &[u8],
    target_len: usize,
) -> Result<Vec<u8>, Error> {
    check_length(message.len(), target_len)?;
    let padding_len = target_len - message.len() - 3;

    let mut padding = Vec::with_capacity(padding_len);
    let mut chunk = vec![0u8; padding_len + 5];
    while padding.len() < padding_len {
        rng.fill_bytes(&mut chunk);
        let needed = padding_len - padding.len();
        padding.extend(chunk.iter().copied().filter(|&b| b != 0).take(needed));
    }

    let mut block = Vec::with_capacity(target_len);
    block.extend_from_slice(&[0x00, 0x02]);
    block.extend_from_slice(&padding);
    block.push(0x00);
    block.extend_from_slice(message);
    Ok(block)
}

/// `00 01 FF .. FF 00 <message>`, `target_len` bytes long.
pub fn pad_for_signing(message: &[u8], target_len: usize) -> Result<Vec<u8>, Error> {
    check_length(message.len(), target_len)?;
    let padding_len = target_len - message.len() - 3;

    let mut block = Vec::with_capacity(target_len);
    block.extend_from_slice(&[0x00, 0x01]);
    block.resize(2 + padding_len, 0xff);
    block.push(0x00);
    block.extend_from_slice(message);
    Ok(block)
}

/// Strips encryption padding without branching on which check failed.
fn unpad_encryption(block: &[u8]) -> Result<Vec<u8>, Error> {
    if block.len() < PADDING_OVERHEAD {
        return Err(Error::DecryptionFailed);
    }
    let marker_ok = block[..2].ct_eq(&[0x00, 0x02][..]);

    let mut found = Choice::from(0);
    let mut separator = 0u64;
    for (i, b) in block.iter().enumerate().skip(2) {
        let is_zero = b.ct_eq(&0);
        separator.conditional_assign(&(i as u64), is_zero & !found);
        found |= is_zero;
    }

    let valid = marker_ok & found & !separator.ct_lt(&MIN_SEPARATOR_INDEX);
    if !bool::from(valid) {
        return Err(Error::DecryptionFailed);
    }
    Ok(block[separator as usize + 1..].to_vec())
}

/// Encrypts `message` for the holder of `pk`.
pub fn encrypt<R: CryptoRng + RngCore + ?Sized>(
    rng: &mut R,
    message: &[u8],
    pk: &PublicKey,
) -> Result<Vec<u8>, Error> {
    let k = pk.size();
    let padded = pad_for_encryption(rng, message, k)?;
    let m = BigUint::from_bytes_be(&padded);
    let c = pk.encrypt_int(&m);
    Ok(c.to_bytes_be_padded(k))
}

/// Decrypts a ciphertext produced by [`encrypt`].
///
/// Every failure, whatever its cause, is reported as [`Error::DecryptionFailed`].
pub fn decrypt<R: CryptoRng + RngCore + ?Sized>(
    rng: &mut R,
    ciphertext: &[u8],
    sk: &PrivateKey,
) -> Result<Vec<u8>, Error> {
    let k = sk.size();
    if ciphertext.len() > k {
        return Err(Error::DecryptionFailed);
    }
    let c = BigUint::from_bytes_be(ciphertext);
    let m = sk
        .decrypt_with_crt(rng, &c)
        .map_err(|_| Error::DecryptionFailed)?;
    unpad_encryption(&m.to_bytes_be_padded(k))
}

/// Signs `message` hashed with `hash`.
pub fn sign<R: CryptoRng + RngCore + ?Sized>(
    rng: &mut R,
    message: impl AsRef<[u8]>,
    sk: &PrivateKey,
    hash: HashAlgorithm,
) -> Result<Signature, Error> {
    let digest = hash.digest(message);
    sign_hash(rng, &digest, sk, hash)
}

/// Signs a digest already computed with `hash`.
pub fn sign_hash<R: CryptoRng + RngCore + ?Sized>(
    rng: &mut R,
    digest: &[u8],
    sk: &PrivateKey,
    hash: HashAlgorithm,
) -> Result<Signature, Error> {
    if digest.len() != hash.output_size() {
        return Err(Error::InvalidInput);
    }
    let k = sk.size();
    let mut payload = hash.digest_info_prefix().to_vec();
    payload.extend_from_slice(digest);
    let padded = pad_for_signing(&payload, k)?;

    trace!("signing {} digest with a {}-byte key", hash, k);
    let m = BigUint::from_bytes_be(&padded);
    let s = sk.decrypt_with_crt(rng, &m)?;
    Ok(Signature(s.to_bytes_be_padded(k)))
}

/// Recovers the signature block, or fails if `signature` cannot be one for `pk`.
fn open_signature(signature: &[u8], pk: &PublicKey) -> Result<Vec<u8>, Error> {
    let k = pk.size();
    if signature.len() != k {
        return Err(Error::VerificationFailed);
    }
    let s = BigUint::from_bytes_be(signature);
    if &s >= pk.n() {
        return Err(Error::VerificationFailed);
    }
    Ok(pk.encrypt_int(&s).to_bytes_be_padded(k))
}

fn hash_from_block(block: &[u8]) -> Result<HashAlgorithm, Error> {
    if block.len() < PADDING_OVERHEAD || block[..2] != [0x00, 0x01] {
        return Err(Error::VerificationFailed);
    }
    let separator = block[2..]
        .iter()
        .position(|&b| b == 0x00)
        .ok_or(Error::VerificationFailed)?
        + 2;
    let payload = &block[separator + 1..];
    HashAlgorithm::ALL
        .iter()
        .copied()
        .find(|hash| payload.starts_with(hash.digest_info_prefix()))
        .ok_or(Error::VerificationFailed)
}

/// Verifies `signature` over `message` and returns the hash it was made with.
pub fn verify(
    message: impl AsRef<[u8]>,
    signature: &[u8],
    pk: &PublicKey,
) -> Result<HashAlgorithm, Error> {
    let block = open_signature(signature, pk)?;
    let hash = hash_from_block(&block)?;

    let mut payload = hash.digest_info_prefix().to_vec();
    payload.extend_from_slice(&hash.digest(message));
    let expected = pad_for_signing(&payload, pk.size()).map_err(|_| Error::VerificationFailed)?;

    if !bool::from(expected.ct_eq(&block)) {
        return Err(Error::VerificationFailed);
    }
    Ok(hash)
}

/// Which hash `signature` names, without checking it against any message.
pub fn find_signature_hash(signature: &[u8], pk: &PublicKey) -> Result<HashAlgorithm, Error> {
    let block = open_signature(signature, pk)?;
    hash_from_block(&block)
}
