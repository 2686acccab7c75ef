//! Script chunk parsing and encoding.
//!
//! A script chunk is either an opcode or a data push with its associated
//! bytes. This module decodes raw script bytes into chunks and encodes push
//! data with the minimal OP_PUSHDATA prefix.

use tbc_primitives::util::ByteReader;

use crate::opcodes::*;
use crate::ScriptError;

/// A single parsed element of a script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptChunk {
    /// The opcode byte. For direct pushes (1-75 bytes) this is the length.
    pub op: u8,
    /// The pushed bytes, if this chunk is a push operation.
    pub data: Option<Vec<u8>>,
}

impl ScriptChunk {
    /// Render this chunk as an ASM token.
    ///
    /// Pushes render as hex, `OP_0` as `0` and `OP_1NEGATE` as `-1`; every
    /// other opcode uses its canonical name.
    pub fn to_asm_string(&self) -> String {
        match (&self.data, self.op) {
            (Some(data), _) => hex::encode(data),
            (None, OP_0) => "0".to_string(),
            (None, OP_1NEGATE) => "-1".to_string(),
            (None, op) => opcode_to_string(op),
        }
    }

    /// Whether this chunk pushes data onto the stack.
    pub fn is_push(&self) -> bool {
        self.data.is_some()
    }
}

/// Decode raw script bytes into chunks.
///
/// # Arguments
/// * `bytes` - The raw script bytes.
///
/// # Returns
/// The parsed chunks, or `DataTooSmall` if a push runs past the end.
pub fn decode_script(bytes: &[u8]) -> Result<Vec<ScriptChunk>, ScriptError> {
    let mut reader = ByteReader::new(bytes);
    let mut chunks = Vec::new();

    while reader.remaining() > 0 {
        let op = reader.read_u8().map_err(|_| ScriptError::DataTooSmall)?;
        let length = match op {
            OP_DATA_1..=OP_DATA_75 => Some(op as usize),
            OP_PUSHDATA1 => Some(reader.read_u8().map_err(|_| ScriptError::DataTooSmall)? as usize),
            OP_PUSHDATA2 => {
                Some(reader.read_u16_le().map_err(|_| ScriptError::DataTooSmall)? as usize)
            }
            OP_PUSHDATA4 => {
                Some(reader.read_u32_le().map_err(|_| ScriptError::DataTooSmall)? as usize)
            }
            _ => None,
        };
        let data = match length {
            Some(n) => Some(
                reader
                    .read_bytes(n)
                    .map_err(|_| ScriptError::DataTooSmall)?
                    .to_vec(),
            ),
            None => None,
        };
        chunks.push(ScriptChunk { op, data });
    }

    Ok(chunks)
}

/// Compute the minimal push prefix for a payload of `data_len` bytes.
///
/// # Returns
/// The prefix bytes, or `DataTooBig` above `u32::MAX`.
pub fn push_data_prefix(data_len: usize) -> Result<Vec<u8>, ScriptError> {
    let prefix = if data_len <= OP_DATA_75 as usize {
        vec![data_len as u8]
    } else if data_len <= u8::MAX as usize {
        vec![OP_PUSHDATA1, data_len as u8]
    } else if data_len <= u16::MAX as usize {
        let mut buf = vec![OP_PUSHDATA2];
        buf.extend_from_slice(&(data_len as u16).to_le_bytes());
        buf
    } else if data_len <= u32::MAX as usize {
        let mut buf = vec![OP_PUSHDATA4];
        buf.extend_from_slice(&(data_len as u32).to_le_bytes());
        buf
    } else {
        return Err(ScriptError::DataTooBig);
    };
    Ok(prefix)
}

/// Encode several payloads as consecutive pushes.
pub fn encode_push_datas(parts: &[&[u8]]) -> Result<Vec<u8>, ScriptError> {
    let mut result = Vec::new();
    for part in parts {
        result.extend_from_slice(&push_data_prefix(part.len())?);
        result.extend_from_slice(part);
    }
    Ok(result)
}
