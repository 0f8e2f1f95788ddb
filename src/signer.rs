//! A common face for the signature schemes.
//!
//! Each scheme signs a fingerprint into opaque bytes and checks them again.
//! A [`SignatureArtifact`] bundles those bytes with the signer's identity and,
//! optionally, the signer's public key, in a length-prefixed binary form.

use std::convert::TryFrom;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::fiat_shamir::{FiatShamirPrivateKey, FiatShamirPublicKey, FiatShamirSignature};
use crate::framing::{FrameReader, FrameWriter};
use crate::key::{PrivateKey, PublicKey};
use crate::pkcs1::{self, HashAlgorithm};
use crate::Error;

const ARTIFACT_MAGIC: &[u8; 4] = b"FPSG";
const ARTIFACT_VERSION: u8 = 1;

/// Signature scheme tag
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Scheme {
    Pkcs1Rsa = 1,
    FiatShamir = 2,
    TextbookRsa = 3,
}

impl TryFrom<u8> for Scheme {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(Scheme::Pkcs1Rsa),
            2 => Ok(Scheme::FiatShamir),
            3 => Ok(Scheme::TextbookRsa),
            _ => Err(Error::UnsupportedFormat),
        }
    }
}

pub trait Signer {
    fn scheme(&self) -> Scheme;

    /// Signs `fingerprint`, returning the scheme's signature bytes.
    fn sign(&self, fingerprint: &[u8]) -> Result<Vec<u8>, Error>;

    /// Public key to ship along with signatures, for schemes that can.
    fn public_key_bytes(&self) -> Result<Option<Vec<u8>>, Error> {
        Ok(None)
    }
}

pub trait Verifier {
    fn scheme(&self) -> Scheme;

    fn verify(&self, fingerprint: &[u8], signature: &[u8]) -> bool;
}

/// RSA signer with PKCS#1 v1.5 padding
#[derive(Clone, Debug, new)]
pub struct Pkcs1Signer {
    key: PrivateKey,
    hash: HashAlgorithm,
}

impl Signer for Pkcs1Signer {
    fn scheme(&self) -> Scheme {
        Scheme::Pkcs1Rsa
    }

    fn sign(&self, fingerprint: &[u8]) -> Result<Vec<u8>, Error> {
        let mut rng = rand::thread_rng();
        let sig = pkcs1::sign(&mut rng, fingerprint, &self.key, self.hash)?;
        Ok(sig.into())
    }

    fn public_key_bytes(&self) -> Result<Option<Vec<u8>>, Error> {
        self.key.public_key().to_pkcs1_der().map(Some)
    }
}

impl Verifier for PublicKey {
    fn scheme(&self) -> Scheme {
        Scheme::Pkcs1Rsa
    }

    fn verify(&self, fingerprint: &[u8], signature: &[u8]) -> bool {
        pkcs1::verify(fingerprint, signature, self).is_ok()
    }
}

impl Signer for FiatShamirPrivateKey {
    fn scheme(&self) -> Scheme {
        Scheme::FiatShamir
    }

    fn sign(&self, fingerprint: &[u8]) -> Result<Vec<u8>, Error> {
        let mut rng = rand::thread_rng();
        FiatShamirPrivateKey::sign(self, &mut rng, fingerprint)?.to_bytes()
    }
}

impl Verifier for FiatShamirPublicKey {
    fn scheme(&self) -> Scheme {
        Scheme::FiatShamir
    }

    fn verify(&self, fingerprint: &[u8], signature: &[u8]) -> bool {
        match FiatShamirSignature::from_bytes(signature) {
            Ok(sig) => FiatShamirPublicKey::verify(self, &sig, fingerprint),
            Err(_) => false,
        }
    }
}

/// Outcome of checking a signed document
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, new)]
pub struct VerifyStatus {
    pub valid: bool,
    /// Identity label carried by the artifact
    pub identity: String,
}

/// A signature together with who made it
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, new)]
pub struct SignatureArtifact {
    pub identity: String,
    pub scheme: Scheme,
    pub signature: Vec<u8>,
    pub public_key: Option<Vec<u8>>,
}

impl SignatureArtifact {
    /// `"FPSG" ‖ version ‖ scheme ‖ identity ‖ signature ‖ has_key [‖ key]`,
    /// with every variable-length field prefixed by its `u32` length.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut w = FrameWriter::new();
        w.put_raw(ARTIFACT_MAGIC)
            .put_u8(ARTIFACT_VERSION)
            .put_u8(self.scheme as u8);
        w.put_bytes(self.identity.as_bytes())?;
        w.put_bytes(&self.signature)?;
        match &self.public_key {
            Some(pk) => {
                w.put_u8(1);
                w.put_bytes(pk)?;
            }
            None => {
                w.put_u8(0);
            }
        }
        Ok(w.into_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut r = FrameReader::new(bytes);
        if r.get_raw(ARTIFACT_MAGIC.len())? != ARTIFACT_MAGIC {
            return Err(Error::UnsupportedFormat);
        }
        if r.get_u8()? != ARTIFACT_VERSION {
            return Err(Error::UnsupportedFormat);
        }
        let scheme = Scheme::try_from(r.get_u8()?)?;
        let identity = String::from_utf8(r.get_bytes()?.to_vec())
            .map_err(|_| Error::UnsupportedFormat)?;
        let signature = r.get_bytes()?.to_vec();
        let public_key = match r.get_u8()? {
            0 => None,
            1 => Some(r.get_bytes()?.to_vec()),
            _ => return Err(Error::UnsupportedFormat),
        };
        r.finish()?;
        Ok(SignatureArtifact {
            identity,
            scheme,
            signature,
            public_key,
        })
    }
}

/// Signs `fingerprint` on behalf of `identity`.
pub fn sign_document<S: Signer + ?Sized>(
    signer: &S,
    identity: &str,
    fingerprint: &[u8],
    include_public_key: bool,
) -> Result<SignatureArtifact, Error> {
    let signature = signer.sign(fingerprint)?;
    let public_key = if include_public_key {
        signer.public_key_bytes()?
    } else {
        None
    };
    Ok(SignatureArtifact {
        identity: identity.to_owned(),
        scheme: signer.scheme(),
        signature,
        public_key,
    })
}

/// Checks an artifact against `fingerprint` with a known verifier.
///
/// An artifact made with a different scheme than the verifier's is invalid.
pub fn verify_document<V: Verifier + ?Sized>(
    verifier: &V,
    fingerprint: &[u8],
    artifact: &SignatureArtifact,
) -> VerifyStatus {
    let valid =
        artifact.scheme == verifier.scheme() && verifier.verify(fingerprint, &artifact.signature);
    VerifyStatus::new(valid, artifact.identity.clone())
}

/// Checks an RSA artifact against the public key it carries.
///
/// This only proves that the holder of that key signed; callers still have to
/// decide whether they trust the key.
pub fn verify_with_embedded_key(
    fingerprint: &[u8],
    artifact: &SignatureArtifact,
) -> Result<VerifyStatus, Error> {
    let der = artifact.public_key.as_ref().ok_or(Error::InvalidInput)?;
    match artifact.scheme {
        Scheme::Pkcs1Rsa => {
            let pk = PublicKey::from_pkcs1_der(der)?;
            Ok(verify_document(&pk, fingerprint, artifact))
        }
        Scheme::TextbookRsa => {
            let pk = crate::textbook::TextbookVerifier::new(PublicKey::from_pkcs1_der(der)?);
            Ok(verify_document(&pk, fingerprint, artifact))
        }
        Scheme::FiatShamir => Err(Error::UnsupportedFormat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{KeyGenOptions, KeyPair};

    #[test]
    fn test_artifact_encoding() {
        let artifact = SignatureArtifact::new(
            "Jane Roe <jroe@example.com>".to_string(),
            Scheme::Pkcs1Rsa,
            vec![0x2d, 0x2d, 0x7c, 0x00],
            Some(vec![1, 2, 3]),
        );
        let bytes = artifact.to_bytes().unwrap();
        assert_eq!(&bytes[..6], b"FPSG\x01\x01");
        assert_eq!(SignatureArtifact::from_bytes(&bytes).unwrap(), artifact);

        let bare = SignatureArtifact::new(String::new(), Scheme::FiatShamir, vec![], None);
        let bytes = bare.to_bytes().unwrap();
        assert_eq!(SignatureArtifact::from_bytes(&bytes).unwrap(), bare);
    }

    #[test]
    fn test_artifact_rejects_garbage() {
        let artifact =
            SignatureArtifact::new("id".to_string(), Scheme::TextbookRsa, vec![9; 8], None);
        let mut bytes = artifact.to_bytes().unwrap();

        assert_eq!(
            SignatureArtifact::from_bytes(&bytes[..bytes.len() - 2]).unwrap_err(),
            Error::UnsupportedFormat
        );
        bytes[5] = 9;
        assert_eq!(
            SignatureArtifact::from_bytes(&bytes).unwrap_err(),
            Error::UnsupportedFormat
        );
        assert_eq!(
            SignatureArtifact::from_bytes(b"PEM?").unwrap_err(),
            Error::UnsupportedFormat
        );
    }

    #[test]
    fn test_scheme_mismatch_is_invalid() {
        let mut rng = rand::thread_rng();
        let kp = KeyPair::generate(&mut rng, 512, &KeyGenOptions::default()).unwrap();
        let signer = Pkcs1Signer::new(kp.sk.clone(), HashAlgorithm::Sha256);
        let mut artifact = sign_document(&signer, "alice", b"doc", true).unwrap();
        assert_eq!(
            verify_document(&kp.pk, b"doc", &artifact),
            VerifyStatus::new(true, "alice".to_string())
        );
        assert!(verify_with_embedded_key(b"doc", &artifact).unwrap().valid);

        artifact.scheme = Scheme::TextbookRsa;
        assert!(!verify_document(&kp.pk, b"doc", &artifact).valid);
    }
}
