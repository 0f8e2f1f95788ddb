//! Unpadded per-byte RSA signatures.
//!
//! Every byte `m_i` of the fingerprint is signed on its own as `m_i^d mod n`
//! and written as a block as wide as the modulus. This is the signature format
//! of the first generation of the signing tool; it is malleable and only
//! reachable through [`Signer`] and [`Verifier`] so that old signatures can
//! still be checked.

use derive_more::{From, Into};
use num_traits::ToPrimitive;
use rsa::BigUint;

use crate::bigmath::ToBytesPadded;
use crate::key::{PrivateKey, PublicKey};
use crate::signer::{Scheme, Signer, Verifier};
use crate::Error;

#[derive(Clone, Debug, Eq, PartialEq, From, Into, new)]
pub struct TextbookSigner(PrivateKey);

#[derive(Clone, Debug, Eq, PartialEq, From, Into, new)]
pub struct TextbookVerifier(PublicKey);

// every byte value must be representable below n
fn check_modulus(n: &BigUint) -> Result<(), Error> {
    if n <= &BigUint::from(255u32) {
        return Err(Error::InvalidKey);
    }
    Ok(())
}

impl Signer for TextbookSigner {
    fn scheme(&self) -> Scheme {
        Scheme::TextbookRsa
    }

    fn sign(&self, fingerprint: &[u8]) -> Result<Vec<u8>, Error> {
        let sk = &self.0;
        check_modulus(sk.n())?;
        let k = sk.size();
        let mut out = Vec::with_capacity(fingerprint.len() * k);
        for &byte in fingerprint {
            let s = sk.direct_exponentiate(&BigUint::from(byte));
            out.extend_from_slice(&s.to_bytes_be_padded(k));
        }
        Ok(out)
    }

    fn public_key_bytes(&self) -> Result<Option<Vec<u8>>, Error> {
        self.0.public_key().to_pkcs1_der().map(Some)
    }
}

impl Verifier for TextbookVerifier {
    fn scheme(&self) -> Scheme {
        Scheme::TextbookRsa
    }

    fn verify(&self, fingerprint: &[u8], signature: &[u8]) -> bool {
        let pk = &self.0;
        if check_modulus(pk.n()).is_err() {
            return false;
        }
        let k = pk.size();
        if signature.len() != fingerprint.len() * k {
            return false;
        }
        signature
            .chunks(k)
            .zip(fingerprint)
            .all(|(block, &byte)| {
                let s = BigUint::from_bytes_be(block);
                &s < pk.n() && pk.encrypt_int(&s).to_u8() == Some(byte)
            })
    }
}
