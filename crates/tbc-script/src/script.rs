/// Script type - a sequence of opcodes and data pushes.
///
/// Locking scripts guard outputs and unlocking scripts spend them. `Script`
/// wraps the raw bytes and provides construction of the supported
/// templates, classification, and hex/ASM codecs.

use std::fmt;

use crate::chunk::{decode_script, encode_push_datas, push_data_prefix, ScriptChunk};
use crate::opcodes::*;
use crate::ScriptError;

/// Largest data-carrier locking script accepted, in bytes.
pub const MAX_DATA_CARRIER_SCRIPT_SIZE: usize = 100_000;

/// Length of a standard P2PKH locking script.
pub const P2PKH_SCRIPT_LEN: usize = 25;

/// Estimated length of a P2PKH unlocking script:
/// a 72-byte signature push (DER plus sighash byte) and a 33-byte
/// compressed key push, each with a one-byte length prefix.
pub const P2PKH_UNLOCKING_SCRIPT_LEN: usize = 1 + 72 + 1 + 33;

/// The locking-script patterns this crate knows how to size and unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptType {
    /// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`, optionally
    /// followed by an `OP_RETURN` data trailer.
    PayToPubKeyHash,
    /// `OP_FALSE OP_RETURN ...` or `OP_RETURN ...`; provably unspendable.
    DataCarrier,
    Unknown,
}

impl ScriptType {
    /// Estimated unlocking-script length for spending an output of this type.
    ///
    /// `None` for types that cannot be spent by a known template.
    pub fn estimated_unlocking_len(&self) -> Option<usize> {
        match self {
            ScriptType::PayToPubKeyHash => Some(P2PKH_UNLOCKING_SCRIPT_LEN),
            ScriptType::DataCarrier | ScriptType::Unknown => None,
        }
    }

    /// Node-style type name, as reported in `scriptPubKey.type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptType::PayToPubKeyHash => "pubkeyhash",
            ScriptType::DataCarrier => "nulldata",
            ScriptType::Unknown => "nonstandard",
        }
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A script, represented as a byte vector newtype.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new() -> Self {
        Script(Vec::new())
    }

    /// Create a script from a hex string (either case).
    pub fn from_hex(hex_str: &str) -> Result<Self, ScriptError> {
        Ok(Script(hex::decode(hex_str)?))
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Script(bytes.to_vec())
    }

    /// Create a script from a space-separated ASM string.
    ///
    /// Opcode names are emitted directly, `0` and `-1` map to `OP_0` and
    /// `OP_1NEGATE`, and any other token is pushed as hex data.
    ///
    /// # Returns
    /// The script, or `InvalidOpcodeData` for a token that is neither.
    pub fn from_asm(asm: &str) -> Result<Self, ScriptError> {
        let mut script = Script::new();
        for token in asm.split_whitespace() {
            let op = match token {
                "0" => Some(OP_0),
                "-1" => Some(OP_1NEGATE),
                _ => string_to_opcode(token),
            };
            match op {
                Some(op) => script.0.push(op),
                None => {
                    let data = hex::decode(token)
                        .map_err(|_| ScriptError::InvalidOpcodeData(token.to_string()))?;
                    script.append_push_data(&data)?;
                }
            }
        }
        Ok(script)
    }

    /// Build a P2PKH locking script paying to `pub_key_hash`.
    pub fn p2pkh(pub_key_hash: &[u8; 20]) -> Self {
        let mut b = Vec::with_capacity(P2PKH_SCRIPT_LEN);
        b.extend_from_slice(&[OP_DUP, OP_HASH160, OP_DATA_20]);
        b.extend_from_slice(pub_key_hash);
        b.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        Script(b)
    }

    /// Build an `OP_FALSE OP_RETURN <payload>` data-carrier script.
    ///
    /// # Returns
    /// The script, or `PayloadTooLarge` when it would exceed
    /// [`MAX_DATA_CARRIER_SCRIPT_SIZE`].
    pub fn data_carrier(payload: &[u8]) -> Result<Self, ScriptError> {
        Self::data_carrier_parts(&[payload])
    }

    /// Build an `OP_FALSE OP_RETURN <part> <part> ...` data-carrier script.
    pub fn data_carrier_parts(parts: &[&[u8]]) -> Result<Self, ScriptError> {
        let size = 2 + parts
            .iter()
            .map(|p| push_data_prefix(p.len()).map(|prefix| prefix.len() + p.len()))
            .sum::<Result<usize, _>>()?;
        if size > MAX_DATA_CARRIER_SCRIPT_SIZE {
            return Err(ScriptError::PayloadTooLarge {
                size,
                max: MAX_DATA_CARRIER_SCRIPT_SIZE,
            });
        }
        let mut b = Vec::with_capacity(size);
        b.extend_from_slice(&[OP_FALSE, OP_RETURN]);
        b.extend_from_slice(&encode_push_datas(parts)?);
        Ok(Script(b))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Render the script as ASM.
    ///
    /// # Returns
    /// Space-separated tokens, or an empty string if the script does not
    /// parse.
    pub fn to_asm(&self) -> String {
        match self.chunks() {
            Ok(chunks) => chunks
                .iter()
                .map(ScriptChunk::to_asm_string)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
            Err(_) => String::new(),
        }
    }

    pub fn to_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check for the exact 25-byte P2PKH template.
    pub fn is_p2pkh(&self) -> bool {
        let b = &self.0;
        b.len() == P2PKH_SCRIPT_LEN && Self::has_p2pkh_prefix(b)
    }

    /// Check for `OP_RETURN ...` or `OP_FALSE OP_RETURN ...`.
    pub fn is_data(&self) -> bool {
        let b = &self.0;
        (!b.is_empty() && b[0] == OP_RETURN)
            || (b.len() > 1 && b[0] == OP_FALSE && b[1] == OP_RETURN)
    }

    /// Classify the script into one of the supported [`ScriptType`]s.
    pub fn script_type(&self) -> ScriptType {
        let b = &self.0;
        if self.is_data() {
            ScriptType::DataCarrier
        } else if self.is_p2pkh()
            || (b.len() > P2PKH_SCRIPT_LEN
                && Self::has_p2pkh_prefix(b)
                && b[P2PKH_SCRIPT_LEN] == OP_RETURN)
        {
            ScriptType::PayToPubKeyHash
        } else {
            ScriptType::Unknown
        }
    }

    /// Extract the 20-byte hash from a P2PKH script (with or without a
    /// data trailer).
    ///
    /// # Returns
    /// The hash, or `NotP2PKH`.
    pub fn public_key_hash(&self) -> Result<[u8; 20], ScriptError> {
        if self.script_type() != ScriptType::PayToPubKeyHash {
            return Err(ScriptError::NotP2PKH);
        }
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&self.0[3..23]);
        Ok(hash)
    }

    /// Parse the script into chunks.
    pub fn chunks(&self) -> Result<Vec<ScriptChunk>, ScriptError> {
        decode_script(&self.0)
    }

    /// Append `data` with its minimal push prefix.
    pub fn append_push_data(&mut self, data: &[u8]) -> Result<(), ScriptError> {
        let prefix = push_data_prefix(data.len())?;
        self.0.extend_from_slice(&prefix);
        self.0.extend_from_slice(data);
        Ok(())
    }

    /// Append raw opcodes.
    ///
    /// # Returns
    /// `InvalidOpcodeType` if any opcode is a push-data opcode, since those
    /// must carry their payload.
    pub fn append_opcodes(&mut self, opcodes: &[u8]) -> Result<(), ScriptError> {
        if let Some(&op) = opcodes
            .iter()
            .find(|&&op| (OP_DATA_1..=OP_PUSHDATA4).contains(&op))
        {
            return Err(ScriptError::InvalidOpcodeType(opcode_to_string(op)));
        }
        self.0.extend_from_slice(opcodes);
        Ok(())
    }

    fn has_p2pkh_prefix(b: &[u8]) -> bool {
        b.len() >= P2PKH_SCRIPT_LEN
            && b[0] == OP_DUP
            && b[1] == OP_HASH160
            && b[2] == OP_DATA_20
            && b[23] == OP_EQUALVERIFY
            && b[24] == OP_CHECKSIG
    }
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Script(bytes)
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl serde::Serialize for Script {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Script {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Script::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
