//! Transaction output: a value and the script locking it.

use tbc_primitives::util::{ByteReader, ByteWriter, VarInt};
use tbc_script::Script;

use crate::TransactionError;

/// A single output of a transaction.
///
/// # Wire format
///
/// | Field          | Size         |
/// |----------------|--------------|
/// | satoshis       | 8 bytes (LE) |
/// | script length  | VarInt       |
/// | locking_script | variable     |
///
/// `change` marks the output the change algorithm owns. It is never
/// serialized and equality ignores it.
#[derive(Clone, Debug, Default)]
pub struct TransactionOutput {
    pub satoshis: u64,
    pub locking_script: Script,
    pub change: bool,
}

impl TransactionOutput {
    pub fn new(satoshis: u64, locking_script: Script) -> Self {
        TransactionOutput { satoshis, locking_script, change: false }
    }

    /// An output marked as change.
    pub fn new_change(satoshis: u64, locking_script: Script) -> Self {
        TransactionOutput { satoshis, locking_script, change: true }
    }

    /// Whether the locking script is a data carrier.
    pub fn is_data(&self) -> bool {
        self.locking_script.is_data()
    }

    /// Serialized size: value, script length prefix and script.
    pub fn size(&self) -> usize {
        let len = self.locking_script.len();
        8 + VarInt::from(len).length() + len
    }

    /// Decode one output from `reader`.
    pub fn read_from(reader: &mut ByteReader) -> Result<Self, TransactionError> {
        let satoshis = reader.read_u64_le()?;
        let script_len = reader.read_varint()?.value();
        let script_len = usize::try_from(script_len).map_err(|_| {
            TransactionError::TruncatedData(format!("locking script of {} bytes", script_len))
        })?;
        let locking_script = Script::from_bytes(reader.read_bytes(script_len)?);
        Ok(TransactionOutput::new(satoshis, locking_script))
    }

    /// Append the wire encoding of this output to `writer`.
    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.write_u64_le(self.satoshis);
        writer.write_var_bytes(self.locking_script.to_bytes());
    }

    /// Wire encoding of this output. Also the per-output input to the
    /// signature hash.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(self.size());
        self.write_to(&mut writer);
        writer.into_bytes()
    }
}

impl PartialEq for TransactionOutput {
    fn eq(&self, other: &Self) -> bool {
        self.satoshis == other.satoshis && self.locking_script == other.locking_script
    }
}

impl Eq for TransactionOutput {}
