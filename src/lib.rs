//! Signatures over document fingerprints.
//!
//! Three independent schemes sign an opaque byte string (a "fingerprint" of
//! some document):
//!
//! * RSA with PKCS#1 v1.5 padding, using a blinded CRT private-key operation,
//! * Fiat-Shamir signatures built on square roots modulo a composite,
//! * historical per-byte "textbook" RSA, kept for reading old signatures.
//!
//! ```rust
//! use fingerprint_signatures::{
//!     pkcs1, FiatShamirKeyPair, FiatShamirOptions, HashAlgorithm, KeyGenOptions, KeyPair,
//! };
//!
//! let mut rng = rand::thread_rng();
//! let fingerprint = b"report.pdf|2048|2024-05-01T10:00:00Z";
//!
//! // RSA: sign with the private key, verify with the public key.
//! // Verification reports which hash the signer used.
//! let kp = KeyPair::generate(&mut rng, 1024, &KeyGenOptions::default())?;
//! let sig = pkcs1::sign(&mut rng, fingerprint, &kp.sk, HashAlgorithm::Sha256)?;
//! assert_eq!(pkcs1::verify(fingerprint, &sig, &kp.pk)?, HashAlgorithm::Sha256);
//!
//! // Fiat-Shamir
//! let fs = FiatShamirKeyPair::generate(&mut rng, &FiatShamirOptions::default())?;
//! let sig = fs.sk.sign(&mut rng, fingerprint)?;
//! assert!(fs.pk.verify(&sig, fingerprint));
//! # Ok::<(), fingerprint_signatures::Error>(())
//! ```
//!
//! The [`signer`] module puts all three behind common [`Signer`] and
//! [`Verifier`] traits and bundles signatures with the signer's identity.

#[macro_use]
extern crate derive_new;

use std::fmt::{self, Display};

pub mod bigmath;
pub mod fiat_shamir;
pub mod framing;
pub mod key;
pub mod keystore;
pub mod mgf1;
pub mod pkcs1;
pub mod prime;
pub mod signer;
pub mod textbook;

pub use fiat_shamir::{
    FiatShamirKeyPair, FiatShamirOptions, FiatShamirPrivateKey, FiatShamirPublicKey,
    FiatShamirSignature,
};
pub use key::{KeyGenOptions, KeyPair, PrivateKey, PublicKey};
pub use keystore::{Decoder, Encoder, KeyMaterial};
pub use pkcs1::{HashAlgorithm, Signature};
pub use prime::PrimePairOptions;
pub use signer::{Scheme, SignatureArtifact, Signer, Verifier, VerifyStatus};
pub use textbook::{TextbookSigner, TextbookVerifier};

pub mod reexports {
    pub use {digest, rand, rsa};
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Error {
    InvalidInput,
    NotFound,
    MessageTooLong { len: usize, max: usize },
    DecryptionFailed,
    VerificationFailed,
    UnsupportedHash,
    UnsupportedFormat,
    ConfigurationExhausted,
    EncodingError,
    InvalidKey,
    WrongPassphrase,
    InternalError,
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput => write!(f, "Invalid input"),
            Error::NotFound => write!(f, "No suitable value found"),
            Error::MessageTooLong { len, max } => write!(
                f,
                "Message too long: {} bytes, at most {} fit in the block",
                len, max
            ),
            Error::DecryptionFailed => write!(f, "Decryption failed"),
            Error::VerificationFailed => write!(f, "Verification failed"),
            Error::UnsupportedHash => write!(f, "Unsupported hash function"),
            Error::UnsupportedFormat => write!(f, "Unsupported format"),
            Error::ConfigurationExhausted => {
                write!(f, "Key generation is infeasible with these parameters")
            }
            Error::EncodingError => write!(f, "Encoding error"),
            Error::InvalidKey => write!(f, "Invalid key"),
            Error::WrongPassphrase => write!(f, "Wrong passphrase"),
            Error::InternalError => write!(f, "Internal Error"),
        }
    }
}
