//! Hash functions used by the transaction format.
//!
//! SHA-256d identifies transactions and signs preimages; Hash160 turns a
//! compressed public key into the 20-byte hash locked by P2PKH outputs.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Compute SHA-256 of the input data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute double SHA-256, `SHA-256(SHA-256(data))`.
///
/// This is the hash behind transaction IDs and signature digests.
///
/// # Arguments
/// * `data` - Byte slice to hash.
///
/// # Returns
/// A 32-byte digest in internal (not display) byte order.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Compute RIPEMD-160 of the input data.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    let mut output = [0u8; 20];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Compute Hash160: `RIPEMD-160(SHA-256(data))`.
///
/// # Arguments
/// * `data` - Usually a SEC1-encoded public key.
///
/// # Returns
/// The 20-byte public key hash.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}
