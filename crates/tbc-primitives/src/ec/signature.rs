//! ECDSA signature with DER serialization and RFC6979 deterministic nonces.
//!
//! Signatures produced here are always low-S (BIP-0062), so the same key
//! and digest yield byte-identical DER output.

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};

use crate::ec::private_key::PrivateKey;
use crate::ec::public_key::PublicKey;
use crate::PrimitivesError;

/// An ECDSA signature over secp256k1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    inner: k256::ecdsa::Signature,
}

impl Signature {
    /// Sign a 32-byte digest.
    ///
    /// The nonce is derived per RFC6979 and the S component is normalized
    /// to the lower half of the curve order.
    ///
    /// # Arguments
    /// * `hash` - The digest to sign.
    /// * `priv_key` - The signing key.
    ///
    /// # Returns
    /// `Ok(Signature)`, or `InvalidSignature` if the backend rejects the input.
    pub fn sign(hash: &[u8; 32], priv_key: &PrivateKey) -> Result<Self, PrimitivesError> {
        let sig: k256::ecdsa::Signature = priv_key.signing_key().sign_prehash(hash)?;
        let inner = sig.normalize_s().unwrap_or(sig);
        Ok(Signature { inner })
    }

    /// Verify this signature against a digest and public key.
    pub fn verify(&self, hash: &[u8; 32], pub_key: &PublicKey) -> bool {
        pub_key
            .verifying_key()
            .verify_prehash(hash, &self.inner)
            .is_ok()
    }

    /// Parse a strict DER-encoded signature.
    ///
    /// # Returns
    /// `Ok(Signature)`, or `InvalidSignature` for malformed encodings and
    /// out-of-range components.
    pub fn from_der(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        let inner = k256::ecdsa::Signature::from_der(bytes)?;
        Ok(Signature { inner })
    }

    /// Serialize as DER: `0x30 <len> 0x02 <r_len> <r> 0x02 <s_len> <s>`.
    pub fn to_der(&self) -> Vec<u8> {
        self.inner.to_der().as_bytes().to_vec()
    }

    /// Return `r || s` as 64 big-endian bytes.
    pub fn to_compact(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out.copy_from_slice(&self.inner.to_bytes());
        out
    }

    /// Whether S lies in the lower half of the curve order.
    pub fn is_low_s(&self) -> bool {
        self.inner.normalize_s().is_none()
    }
}
