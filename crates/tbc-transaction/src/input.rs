//! Transaction input spending a previous output.
//!
//! An input names the outpoint it spends, carries the unlocking script once
//! signed, and optionally remembers the output being spent so that fees can
//! be estimated and signature hashes computed.

use tbc_primitives::chainhash::Hash;
use tbc_primitives::util::{ByteReader, ByteWriter};
use tbc_script::Script;

use crate::output::TransactionOutput;
use crate::utxo::Utxo;
use crate::TransactionError;

/// Sequence number of a final input (no relative lock).
pub const DEFAULT_SEQUENCE_NUMBER: u32 = 0xFFFF_FFFF;

/// Sequence number that keeps an input non-final so `lock_time` is enforced.
pub const LOCKTIME_ENABLED_SEQUENCE_NUMBER: u32 = DEFAULT_SEQUENCE_NUMBER - 1;

/// Smallest encodable input: outpoint, empty script length and sequence.
pub(crate) const MIN_INPUT_SIZE: usize = 32 + 4 + 1 + 4;

/// A single input of a transaction.
///
/// # Wire format
///
/// | Field               | Size          |
/// |---------------------|---------------|
/// | source_txid         | 32 bytes      |
/// | source_tx_out_index | 4 bytes (LE)  |
/// | script length       | VarInt        |
/// | unlocking_script    | variable      |
/// | sequence_number     | 4 bytes (LE)  |
///
/// `source_output` is local bookkeeping and never serialized; equality
/// ignores it.
#[derive(Clone, Debug)]
pub struct TransactionInput {
    /// Id of the transaction being spent, internal byte order.
    pub source_txid: [u8; 32],

    pub source_tx_out_index: u32,

    /// Empty until the input is signed.
    pub unlocking_script: Script,

    pub sequence_number: u32,

    /// Value and locking script of the output being spent.
    pub source_output: Option<TransactionOutput>,

    /// Set when a lock time moved this input off the final sequence.
    pub(crate) lock_time_sequence: bool,
}

impl TransactionInput {
    /// Input spending `source_txid:vout` with no unlocking script yet.
    pub fn new(source_txid: Hash, vout: u32) -> Self {
        TransactionInput {
            source_txid: *source_txid.as_bytes(),
            source_tx_out_index: vout,
            unlocking_script: Script::new(),
            sequence_number: DEFAULT_SEQUENCE_NUMBER,
            source_output: None,
            lock_time_sequence: false,
        }
    }

    /// Input spending `utxo`, remembering its value and locking script.
    pub fn from_utxo(utxo: &Utxo) -> Self {
        TransactionInput {
            source_output: Some(TransactionOutput::new(
                utxo.satoshis,
                utxo.locking_script.clone(),
            )),
            ..Self::new(utxo.txid, utxo.vout)
        }
    }

    /// The spent transaction id.
    pub fn source_txid_hash(&self) -> Hash {
        Hash::new(self.source_txid)
    }

    /// Display-order hex of the spent transaction id.
    pub fn source_txid_hex(&self) -> String {
        self.source_txid_hash().to_string()
    }

    /// Whether this input spends `txid:vout`.
    pub fn spends(&self, txid: &[u8; 32], vout: u32) -> bool {
        &self.source_txid == txid && self.source_tx_out_index == vout
    }

    /// Whether an unlocking script has been set.
    pub fn is_signed(&self) -> bool {
        !self.unlocking_script.is_empty()
    }

    /// Satoshis of the spent output, if known.
    pub fn source_satoshis(&self) -> Option<u64> {
        self.source_output.as_ref().map(|o| o.satoshis)
    }

    /// Locking script of the spent output, if known.
    pub fn source_locking_script(&self) -> Option<&Script> {
        self.source_output.as_ref().map(|o| &o.locking_script)
    }

    /// Decode one input from `reader`.
    ///
    /// # Returns
    /// The input, `TruncatedData` if the buffer ends early, or
    /// `MalformedVarInt` for a non-minimal script length.
    pub fn read_from(reader: &mut ByteReader) -> Result<Self, TransactionError> {
        let source_txid = reader.read_array::<32>()?;
        let source_tx_out_index = reader.read_u32_le()?;
        let script_len = reader.read_varint()?.value();
        let script_len = usize::try_from(script_len).map_err(|_| {
            TransactionError::TruncatedData(format!("unlocking script of {} bytes", script_len))
        })?;
        let unlocking_script = Script::from_bytes(reader.read_bytes(script_len)?);
        let sequence_number = reader.read_u32_le()?;

        Ok(TransactionInput {
            source_txid,
            source_tx_out_index,
            unlocking_script,
            sequence_number,
            source_output: None,
            lock_time_sequence: false,
        })
    }

    /// Append the wire encoding of this input to `writer`.
    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.write_bytes(&self.source_txid);
        writer.write_u32_le(self.source_tx_out_index);
        writer.write_var_bytes(self.unlocking_script.to_bytes());
        writer.write_u32_le(self.sequence_number);
    }

    /// Wire encoding of this input.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(MIN_INPUT_SIZE + self.unlocking_script.len());
        self.write_to(&mut writer);
        writer.into_bytes()
    }
}

impl PartialEq for TransactionInput {
    fn eq(&self, other: &Self) -> bool {
        self.source_txid == other.source_txid
            && self.source_tx_out_index == other.source_tx_out_index
            && self.unlocking_script == other.unlocking_script
            && self.sequence_number == other.sequence_number
    }
}

impl Eq for TransactionInput {}
