//! Chain hash type for transaction identification.
//!
//! A `Hash` stores 32 bytes in internal (little-endian) order and renders
//! them byte-reversed, which is how transaction IDs are exchanged as text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::hash::sha256d;
use crate::PrimitivesError;

/// Size of a Hash in bytes.
pub const HASH_SIZE: usize = 32;

/// Length of a display-order hex hash (64 characters).
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// A 32-byte hash used as a transaction identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    /// Create a Hash from bytes already in internal order.
    pub const fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }

    /// Create a Hash from an internal-order byte slice.
    ///
    /// # Arguments
    /// * `bytes` - A slice that must be exactly 32 bytes.
    ///
    /// # Returns
    /// `Ok(Hash)` if the slice is 32 bytes, or `InvalidHash` otherwise.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        let arr: [u8; HASH_SIZE] = bytes.try_into().map_err(|_| {
            PrimitivesError::InvalidHash(format!(
                "invalid hash length of {}, want {}",
                bytes.len(),
                HASH_SIZE
            ))
        })?;
        Ok(Hash(arr))
    }

    /// Parse a display-order (byte-reversed) hex string.
    ///
    /// Unlike block explorers this parser is strict: the string must be
    /// exactly 64 hex characters. Upper- and lowercase digits are accepted.
    ///
    /// # Arguments
    /// * `hex_str` - The txid as it is usually printed.
    ///
    /// # Returns
    /// `Ok(Hash)` in internal order, `InvalidHex` for bad digits, or
    /// `InvalidHash` for a wrong length.
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        if hex_str.len() != HASH_HEX_SIZE {
            return Err(PrimitivesError::InvalidHash(format!(
                "expected {} hex characters, got {}",
                HASH_HEX_SIZE,
                hex_str.len()
            )));
        }
        let mut bytes = [0u8; HASH_SIZE];
        hex::decode_to_slice(hex_str, &mut bytes)?;
        bytes.reverse();
        Ok(Hash(bytes))
    }

    /// Access the internal byte array.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Return the hash bytes in display order.
    pub fn to_display_bytes(&self) -> [u8; HASH_SIZE] {
        let mut reversed = self.0;
        reversed.reverse();
        reversed
    }
}

impl From<[u8; HASH_SIZE]> for Hash {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }
}

/// Display the hash as byte-reversed hex.
impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_display_bytes()))
    }
}

impl FromStr for Hash {
    type Err = PrimitivesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_hex(s)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Compute double SHA-256 of the input and return it as a Hash.
pub fn double_hash_h(data: &[u8]) -> Hash {
    Hash(sha256d(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXID: &str = "11b476ad8e0a48fcd40807a111a050af51114877e09283bfa7f3505081a1819d";

    #[test]
    fn test_from_hex_reverses_bytes() {
        let hash = Hash::from_hex(TXID).unwrap();
        assert_eq!(hash.as_bytes()[0], 0x9d);
        assert_eq!(hash.as_bytes()[31], 0x11);
        assert_eq!(hash.to_string(), TXID);
    }

    #[test]
    fn test_from_hex_accepts_uppercase() {
        let upper = TXID.to_uppercase();
        let hash = Hash::from_hex(&upper).unwrap();
        assert_eq!(hash.to_string(), TXID);
    }

    #[test]
    fn test_from_hex_rejects_wrong_length() {
        assert!(matches!(
            Hash::from_hex(&TXID[..62]),
            Err(PrimitivesError::InvalidHash(_))
        ));
        assert!(matches!(Hash::from_hex(""), Err(PrimitivesError::InvalidHash(_))));
    }

    #[test]
    fn test_from_hex_rejects_bad_digit() {
        let bad = format!("zz{}", &TXID[2..]);
        assert!(matches!(Hash::from_hex(&bad), Err(PrimitivesError::InvalidHex(_))));
    }

    #[test]
    fn test_from_bytes_length() {
        assert!(Hash::from_bytes(&[0u8; 31]).is_err());
        assert!(Hash::from_bytes(&[0u8; 32]).is_ok());
    }

    #[test]
    fn test_serde_roundtrip() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            txid: Hash,
        }

        let w = Wrapper { txid: Hash::from_hex(TXID).unwrap() };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, format!(r#"{{"txid":"{}"}}"#, TXID));

        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.txid, w.txid);
    }
}
