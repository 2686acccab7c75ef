/// P2PKH address codec.
///
/// An address is the Base58Check encoding of a version byte followed by a
/// 20-byte public key hash. Only the mainnet and testnet P2PKH versions are
/// recognised.

use std::fmt;
use std::str::FromStr;

use tbc_primitives::base58;
use tbc_primitives::ec::PublicKey;
use tbc_primitives::PrimitivesError;

use crate::{Script, ScriptError};

/// Mainnet P2PKH address version byte.
const MAINNET_P2PKH: u8 = 0x00;
/// Testnet P2PKH address version byte.
const TESTNET_P2PKH: u8 = 0x6f;

/// Decoded payload length: version byte plus hash.
const ADDRESS_PAYLOAD_LEN: usize = 21;

/// Network an address belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Network {
    /// Version 0x00, addresses start with `1`.
    Mainnet,
    /// Version 0x6f, addresses start with `m` or `n`.
    Testnet,
}

impl Network {
    fn version(self) -> u8 {
        match self {
            Network::Mainnet => MAINNET_P2PKH,
            Network::Testnet => TESTNET_P2PKH,
        }
    }
}

/// A P2PKH address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    /// The 20-byte RIPEMD-160(SHA-256(pubkey)) hash.
    pub public_key_hash: [u8; 20],
    pub network: Network,
}

impl Address {
    /// Parse a Base58Check address string.
    ///
    /// # Arguments
    /// * `addr` - The address text.
    ///
    /// # Returns
    /// The decoded `Address`, `InvalidAddress` for bad characters, checksum
    /// or length, or `UnsupportedAddressVersion` for other version bytes.
    pub fn from_string(addr: &str) -> Result<Self, ScriptError> {
        let payload = base58::check_decode(addr).map_err(|e| match e {
            PrimitivesError::ChecksumMismatch => {
                ScriptError::InvalidAddress(format!("checksum mismatch for '{}'", addr))
            }
            other => ScriptError::InvalidAddress(format!("'{}': {}", addr, other)),
        })?;

        if payload.len() != ADDRESS_PAYLOAD_LEN {
            return Err(ScriptError::InvalidAddress(format!(
                "'{}' decodes to {} bytes, want {}",
                addr,
                payload.len(),
                ADDRESS_PAYLOAD_LEN
            )));
        }

        let network = match payload[0] {
            MAINNET_P2PKH => Network::Mainnet,
            TESTNET_P2PKH => Network::Testnet,
            other => return Err(ScriptError::UnsupportedAddressVersion(other)),
        };

        let mut public_key_hash = [0u8; 20];
        public_key_hash.copy_from_slice(&payload[1..]);
        Ok(Address { public_key_hash, network })
    }

    pub fn from_public_key_hash(hash: &[u8; 20], network: Network) -> Self {
        Address { public_key_hash: *hash, network }
    }

    /// Address of a compressed public key.
    pub fn from_public_key(pub_key: &PublicKey, network: Network) -> Self {
        Self::from_public_key_hash(&pub_key.hash160(), network)
    }

    /// The P2PKH locking script paying to this address.
    pub fn locking_script(&self) -> Script {
        Script::p2pkh(&self.public_key_hash)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = Vec::with_capacity(ADDRESS_PAYLOAD_LEN);
        payload.push(self.network.version());
        payload.extend_from_slice(&self.public_key_hash);
        f.write_str(&base58::check_encode(&payload))
    }
}

impl FromStr for Address {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_string(s)
    }
}
