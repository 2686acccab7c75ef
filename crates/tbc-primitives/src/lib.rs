/// TBC transaction SDK - Cryptographic primitives and byte codecs.
///
/// This crate provides the foundational building blocks used by the
/// script and transaction crates:
/// - Hash functions (SHA-256, SHA-256d, RIPEMD-160, Hash160)
/// - Chain hash type for transaction identifiers
/// - Variable-length integers and little-endian byte reader/writer
/// - Base58 / Base58Check encoding
/// - secp256k1 private keys, public keys and ECDSA signatures

pub mod hash;
pub mod chainhash;
pub mod util;
pub mod base58;
pub mod ec;

mod error;
pub use error::PrimitivesError;
