//! Key persistence.
//!
//! Keys are saved as bytes through [`KeyMaterial`]. Private keys are usually
//! stored encrypted: [`seal`] puts [`SEAL_MARKER`] in front of the key bytes
//! and hands the result to an external [`Encoder`] (a symmetric cipher keyed
//! by a passphrase, say). [`unseal`] decodes and looks for the marker before
//! trusting what came out, so a wrong passphrase is reported as such instead
//! of surfacing as a garbled key.

use log::debug;

use crate::fiat_shamir::{FiatShamirPrivateKey, FiatShamirPublicKey};
use crate::key::{PrivateKey, PublicKey};
use crate::Error;

pub const SEAL_MARKER: &[u8] = b"-----FINGERPRINT-SIGNATURES PRIVATE KEY-----\n";

pub trait Encoder {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, Error>;
}

pub trait Decoder {
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, Error>;
}

/// Passes bytes through unchanged, for keys stored in the clear.
#[derive(Clone, Copy, Debug, Default)]
pub struct Plain;

impl Encoder for Plain {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(data.to_vec())
    }
}

impl Decoder for Plain {
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(data.to_vec())
    }
}

/// A key that can be saved to and loaded from bytes
pub trait KeyMaterial: Sized {
    fn save(&self) -> Result<Vec<u8>, Error>;

    fn load(bytes: &[u8]) -> Result<Self, Error>;
}

impl KeyMaterial for PublicKey {
    fn save(&self) -> Result<Vec<u8>, Error> {
        self.to_pkcs1_der()
    }

    fn load(bytes: &[u8]) -> Result<Self, Error> {
        PublicKey::from_pkcs1_der(bytes)
    }
}

impl KeyMaterial for PrivateKey {
    fn save(&self) -> Result<Vec<u8>, Error> {
        self.to_pkcs1_der()
    }

    fn load(bytes: &[u8]) -> Result<Self, Error> {
        PrivateKey::from_pkcs1_der(bytes)
    }
}

impl KeyMaterial for FiatShamirPublicKey {
    fn save(&self) -> Result<Vec<u8>, Error> {
        self.to_bytes()
    }

    fn load(bytes: &[u8]) -> Result<Self, Error> {
        FiatShamirPublicKey::from_bytes(bytes)
    }
}

impl KeyMaterial for FiatShamirPrivateKey {
    fn save(&self) -> Result<Vec<u8>, Error> {
        self.to_bytes()
    }

    fn load(bytes: &[u8]) -> Result<Self, Error> {
        FiatShamirPrivateKey::from_bytes(bytes)
    }
}

/// Encodes `key` behind the seal marker.
pub fn seal<K: KeyMaterial, E: Encoder + ?Sized>(key: &K, encoder: &E) -> Result<Vec<u8>, Error> {
    let mut data = SEAL_MARKER.to_vec();
    data.extend_from_slice(&key.save()?);
    encoder.encode(&data)
}

/// Decodes and loads a key written by [`seal`].
///
/// Fails with [`Error::WrongPassphrase`] when the decoded bytes do not start
/// with the seal marker, or when the decoder itself rejects the input.
pub fn unseal<K: KeyMaterial, D: Decoder + ?Sized>(sealed: &[u8], decoder: &D) -> Result<K, Error> {
    let data = decoder.decode(sealed).map_err(|_| Error::WrongPassphrase)?;
    if !data.starts_with(SEAL_MARKER) {
        debug!("seal marker missing after decoding");
        return Err(Error::WrongPassphrase);
    }
    K::load(&data[SEAL_MARKER.len()..])
}
