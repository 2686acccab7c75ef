//! The transaction aggregate.
//!
//! A [`Transaction`] is built up in place: inputs from previous outputs,
//! payment and data outputs, then at most one change output sized against a
//! [`FeeQuote`]. Signing fills the unlocking scripts, after which the
//! transaction is frozen and can only be serialized.

use std::collections::HashSet;
use std::fmt;

use tbc_primitives::chainhash::Hash;
use tbc_primitives::hash::sha256d;
use tbc_primitives::util::{ByteReader, ByteWriter, VarInt};
use tbc_script::{Address, Script};
use tracing::{debug, warn};

use crate::fees::FeeQuote;
use crate::input::{
    TransactionInput, DEFAULT_SEQUENCE_NUMBER, LOCKTIME_ENABLED_SEQUENCE_NUMBER, MIN_INPUT_SIZE,
};
use crate::output::TransactionOutput;
use crate::sighash;
use crate::utxo::Utxo;
use crate::TransactionError;

/// Total money supply in satoshis. No value or sum may exceed it.
pub const MAX_SATOSHIS: u64 = 21_000_000 * 100_000_000;

/// Lock times below this are block heights, at or above it Unix timestamps.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Smallest encodable output: value and empty script length.
const MIN_OUTPUT_SIZE: usize = 8 + 1;

/// Where a transaction is in its build, fund, sign, serialize lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxState {
    /// Inputs and outputs may be added freely.
    Building,
    /// Change has been computed. Any further modification demotes the
    /// transaction back to `Building`.
    Funded,
    /// Every input carries an unlocking script. The transaction is frozen.
    Signed,
    /// `finalize` has handed out the final bytes.
    Serialized,
}

/// Interpretation of a transaction's lock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockTime {
    BlockHeight(u32),
    Timestamp(u32),
}

impl LockTime {
    /// The raw `nLockTime` field value.
    pub fn to_u32(self) -> u32 {
        match self {
            LockTime::BlockHeight(v) | LockTime::Timestamp(v) => v,
        }
    }
}

impl From<u32> for LockTime {
    fn from(value: u32) -> Self {
        if value < LOCKTIME_THRESHOLD {
            LockTime::BlockHeight(value)
        } else {
            LockTime::Timestamp(value)
        }
    }
}

/// A transaction under construction or parsed from the wire.
///
/// # Wire format
///
/// | Field        | Size          |
/// |--------------|---------------|
/// | version      | 4 bytes (LE)  |
/// | input count  | VarInt        |
/// | inputs       | variable      |
/// | output count | VarInt        |
/// | outputs      | variable      |
/// | lock_time    | 4 bytes (LE)  |
///
/// Equality compares the wire fields only.
#[derive(Clone, Debug)]
pub struct Transaction {
    pub(crate) version: u32,
    pub(crate) inputs: Vec<TransactionInput>,
    pub(crate) outputs: Vec<TransactionOutput>,
    pub(crate) lock_time: u32,
    pub(crate) state: TxState,
    pub(crate) change_index: Option<usize>,
}

impl Transaction {
    /// Empty version 1 transaction with lock time 0.
    pub fn new() -> Self {
        Transaction {
            version: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
            state: TxState::Building,
            change_index: None,
        }
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn lock_time(&self) -> u32 {
        self.lock_time
    }

    pub fn inputs(&self) -> &[TransactionInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TransactionOutput] {
        &self.outputs
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// Index of the change output, if one was allocated.
    pub fn change_index(&self) -> Option<usize> {
        self.change_index
    }

    pub fn change_output(&self) -> Option<&TransactionOutput> {
        self.change_index.and_then(|i| self.outputs.get(i))
    }

    /// Whether any output is a data carrier.
    pub fn has_data_outputs(&self) -> bool {
        self.outputs.iter().any(TransactionOutput::is_data)
    }

    /// Whether every input carries an unlocking script.
    pub fn is_fully_signed(&self) -> bool {
        !self.inputs.is_empty() && self.inputs.iter().all(TransactionInput::is_signed)
    }

    // -----------------------------------------------------------------
    // State
    // -----------------------------------------------------------------

    /// Fail if the transaction is signed or serialized.
    pub(crate) fn ensure_mutable(&self) -> Result<(), TransactionError> {
        match self.state {
            TxState::Signed | TxState::Serialized => Err(TransactionError::TransactionFinalized),
            TxState::Building | TxState::Funded => Ok(()),
        }
    }

    /// Record a modification; a funded transaction needs its change redone.
    fn mark_modified(&mut self) {
        if self.state == TxState::Funded {
            debug!(change_index = ?self.change_index, "transaction modified after funding");
            self.state = TxState::Building;
        }
    }

    /// Hand out the final bytes and freeze the transaction for good.
    ///
    /// Calling it again returns the same bytes.
    ///
    /// # Returns
    /// The serialized transaction, or `InvalidState` unless every input is
    /// signed.
    pub fn finalize(&mut self) -> Result<Vec<u8>, TransactionError> {
        match self.state {
            TxState::Signed | TxState::Serialized => {
                self.state = TxState::Serialized;
                Ok(self.to_bytes())
            }
            TxState::Building | TxState::Funded => Err(TransactionError::InvalidState(
                "transaction is not fully signed".to_string(),
            )),
        }
    }

    // -----------------------------------------------------------------
    // Version and lock time
    // -----------------------------------------------------------------

    pub fn set_version(&mut self, version: u32) -> Result<(), TransactionError> {
        self.ensure_mutable()?;
        self.version = version;
        self.mark_modified();
        Ok(())
    }

    /// Set the raw lock time.
    ///
    /// A non-zero lock time is only enforced while some input is non-final,
    /// so final inputs are moved to sequence `0xFFFFFFFE`. Clearing the lock
    /// time moves those inputs back; sequences set by the caller or parsed
    /// from the wire are left alone.
    pub fn set_lock_time(&mut self, lock_time: u32) -> Result<(), TransactionError> {
        self.ensure_mutable()?;
        self.lock_time = lock_time;
        for input in &mut self.inputs {
            if lock_time != 0 {
                if input.sequence_number == DEFAULT_SEQUENCE_NUMBER {
                    input.sequence_number = LOCKTIME_ENABLED_SEQUENCE_NUMBER;
                    input.lock_time_sequence = true;
                }
            } else if input.lock_time_sequence {
                if input.sequence_number == LOCKTIME_ENABLED_SEQUENCE_NUMBER {
                    input.sequence_number = DEFAULT_SEQUENCE_NUMBER;
                }
                input.lock_time_sequence = false;
            }
        }
        self.mark_modified();
        Ok(())
    }

    /// Lock until the chain reaches `height`.
    ///
    /// # Returns
    /// `InvalidLockTime` if `height` is in the timestamp range.
    pub fn lock_until_block_height(&mut self, height: u32) -> Result<(), TransactionError> {
        if height >= LOCKTIME_THRESHOLD {
            return Err(TransactionError::InvalidLockTime(format!(
                "block height {} must be below {}",
                height, LOCKTIME_THRESHOLD
            )));
        }
        self.set_lock_time(height)
    }

    /// Lock until the Unix time `timestamp`.
    ///
    /// # Returns
    /// `InvalidLockTime` if `timestamp` is in the block height range.
    pub fn lock_until_unix_time(&mut self, timestamp: u32) -> Result<(), TransactionError> {
        if timestamp < LOCKTIME_THRESHOLD {
            return Err(TransactionError::InvalidLockTime(format!(
                "timestamp {} must be at least {}",
                timestamp, LOCKTIME_THRESHOLD
            )));
        }
        self.set_lock_time(timestamp)
    }

    pub fn lock(&self) -> LockTime {
        LockTime::from(self.lock_time)
    }

    // -----------------------------------------------------------------
    // Inputs
    // -----------------------------------------------------------------

    /// Append an input.
    ///
    /// # Returns
    /// `DuplicateInput` if the outpoint is already spent here,
    /// `AmountOverflow` if its known value exceeds the money supply, or
    /// `TransactionFinalized` once signed.
    pub fn add_input(&mut self, input: TransactionInput) -> Result<(), TransactionError> {
        self.ensure_mutable()?;
        self.check_new_input(&input)?;
        self.push_input(input);
        self.mark_modified();
        Ok(())
    }

    /// Spend output `vout` of `prev_txid_hex`, locked by
    /// `locking_script_hex` and worth `satoshis`.
    ///
    /// # Arguments
    /// * `prev_txid_hex` - Display-order txid, exactly 64 hex characters.
    /// * `vout` - Index of the output being spent.
    /// * `locking_script_hex` - Locking script of the output being spent.
    /// * `satoshis` - Value of the output being spent.
    ///
    /// # Returns
    /// `InvalidHex`, `DuplicateInput`, `AmountOverflow`, or
    /// `TransactionFinalized` on failure.
    pub fn from(
        &mut self,
        prev_txid_hex: &str,
        vout: u32,
        locking_script_hex: &str,
        satoshis: u64,
    ) -> Result<(), TransactionError> {
        let utxo = Utxo::from_hex(prev_txid_hex, vout, locking_script_hex, satoshis)?;
        self.add_input(TransactionInput::from_utxo(&utxo))
    }

    /// Spend every UTXO in `utxos`. Either all are added or none.
    pub fn from_utxos(&mut self, utxos: &[Utxo]) -> Result<(), TransactionError> {
        self.ensure_mutable()?;
        let mut seen = HashSet::with_capacity(utxos.len());
        let inputs = utxos
            .iter()
            .map(|utxo| {
                let input = TransactionInput::from_utxo(utxo);
                self.check_new_input(&input)?;
                if !seen.insert((utxo.txid, utxo.vout)) {
                    return Err(duplicate_input(&input));
                }
                Ok(input)
            })
            .collect::<Result<Vec<_>, TransactionError>>()?;

        for input in inputs {
            self.push_input(input);
        }
        self.mark_modified();
        Ok(())
    }

    /// Attach the spent output to input `index`, e.g. on a parsed
    /// transaction before signing it.
    ///
    /// # Returns
    /// `InvalidState` if the input already knows its spent output, or
    /// `TransactionFinalized` once signed.
    pub fn set_input_source_output(
        &mut self,
        index: usize,
        output: TransactionOutput,
    ) -> Result<(), TransactionError> {
        self.ensure_mutable()?;
        check_amount(output.satoshis)?;
        let count = self.inputs.len();
        let input = self
            .inputs
            .get_mut(index)
            .ok_or(TransactionError::InputIndexOutOfRange { index, count })?;
        if input.source_output.is_some() {
            return Err(TransactionError::InvalidState(format!(
                "input {} already has its spent output",
                index
            )));
        }
        input.source_output = Some(output);
        self.mark_modified();
        Ok(())
    }

    fn check_new_input(&self, input: &TransactionInput) -> Result<(), TransactionError> {
        if let Some(satoshis) = input.source_satoshis() {
            check_amount(satoshis)?;
        }
        if self
            .inputs
            .iter()
            .any(|i| i.spends(&input.source_txid, input.source_tx_out_index))
        {
            return Err(duplicate_input(input));
        }
        Ok(())
    }

    fn push_input(&mut self, mut input: TransactionInput) {
        if self.lock_time != 0 && input.sequence_number == DEFAULT_SEQUENCE_NUMBER {
            input.sequence_number = LOCKTIME_ENABLED_SEQUENCE_NUMBER;
            input.lock_time_sequence = true;
        }
        self.inputs.push(input);
    }

    // -----------------------------------------------------------------
    // Outputs
    // -----------------------------------------------------------------

    /// Append an output as is. Zero values are allowed here.
    pub fn add_output(&mut self, output: TransactionOutput) -> Result<(), TransactionError> {
        self.ensure_mutable()?;
        check_amount(output.satoshis)?;
        self.outputs.push(TransactionOutput { change: false, ..output });
        self.mark_modified();
        Ok(())
    }

    /// Pay `satoshis` to a Base58Check P2PKH address.
    ///
    /// # Returns
    /// `InvalidAddress`, `NonPositiveAmount`, `AmountOverflow`, or
    /// `TransactionFinalized` on failure.
    pub fn pay_to_address(&mut self, address: &str, satoshis: u64) -> Result<(), TransactionError> {
        let address = Address::from_string(address)?;
        self.pay_to_script(address.locking_script(), satoshis)
    }

    /// Pay `satoshis` to a prebuilt locking script.
    pub fn pay_to_script(&mut self, script: Script, satoshis: u64) -> Result<(), TransactionError> {
        if satoshis == 0 {
            return Err(TransactionError::NonPositiveAmount);
        }
        self.add_output(TransactionOutput::new(satoshis, script))
    }

    /// Add a zero-value `OP_FALSE OP_RETURN <data>` output.
    ///
    /// # Returns
    /// `PayloadTooLarge` when the script would exceed the data-carrier
    /// ceiling.
    pub fn add_op_return_output(&mut self, data: &[u8]) -> Result<(), TransactionError> {
        self.ensure_mutable()?;
        let script = Script::data_carrier(data)?;
        self.add_output(TransactionOutput::new(0, script))
    }

    /// Add a zero-value data output with one push per part.
    pub fn add_op_return_parts_output(&mut self, parts: &[&[u8]]) -> Result<(), TransactionError> {
        self.ensure_mutable()?;
        let script = Script::data_carrier_parts(parts)?;
        self.add_output(TransactionOutput::new(0, script))
    }

    // -----------------------------------------------------------------
    // Totals and change
    // -----------------------------------------------------------------

    /// Sum of the values of the outputs being spent.
    ///
    /// # Returns
    /// The sum, `MissingSourceOutput` for an input with no known value, or
    /// `AmountOverflow` past [`MAX_SATOSHIS`].
    pub fn total_input_satoshis(&self) -> Result<u64, TransactionError> {
        let mut total = 0u64;
        for (index, input) in self.inputs.iter().enumerate() {
            let satoshis = input
                .source_satoshis()
                .ok_or(TransactionError::MissingSourceOutput { index })?;
            total = add_amounts(total, satoshis)?;
        }
        Ok(total)
    }

    /// Sum of all output values, change included.
    pub fn total_output_satoshis(&self) -> Result<u64, TransactionError> {
        self.outputs
            .iter()
            .try_fold(0u64, |total, o| add_amounts(total, o.satoshis))
    }

    /// Fail with `InsufficientFunds` when the outputs spend more than the
    /// inputs. Inputs with an unknown spent output skip the check.
    pub(crate) fn ensure_inputs_cover_outputs(&self) -> Result<(), TransactionError> {
        if self.inputs.iter().any(|i| i.source_output.is_none()) {
            return Ok(());
        }
        let inputs = self.total_input_satoshis()?;
        let outputs = self.total_output_satoshis()?;
        if outputs > inputs {
            return Err(TransactionError::InsufficientFunds { inputs, outputs });
        }
        Ok(())
    }

    /// Output total excluding the change output.
    fn committed_output_satoshis(&self) -> Result<u64, TransactionError> {
        self.outputs
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != self.change_index)
            .try_fold(0u64, |total, (_, o)| add_amounts(total, o.satoshis))
    }

    /// [`Transaction::change`] paying to a Base58Check address.
    pub fn change_to_address(
        &mut self,
        address: &str,
        quote: &FeeQuote,
    ) -> Result<(), TransactionError> {
        let address = Address::from_string(address)?;
        self.change(address.locking_script(), quote)
    }

    /// Send whatever the inputs leave after outputs and fee to `script`.
    ///
    /// The fee is estimated with the change output in place. When the
    /// leftover does not cover that fee plus the quote's dust limit, no
    /// change output is kept and the surplus goes to the fee. Calling this
    /// again replaces the existing change output at the same index.
    ///
    /// # Returns
    /// `InsufficientFunds` when outputs already use up the inputs,
    /// `TransactionFinalized` once signed, or any fee estimation error.
    pub fn change(&mut self, script: Script, quote: &FeeQuote) -> Result<(), TransactionError> {
        self.ensure_mutable()?;

        let inputs = self.total_input_satoshis()?;
        let outputs = self.committed_output_satoshis()?;
        let available = match inputs.checked_sub(outputs) {
            Some(available) if available > 0 => available,
            _ => return Err(TransactionError::InsufficientFunds { inputs, outputs }),
        };

        let previous = self.change_index.map(|i| (i, self.outputs[i].clone()));
        let index = match self.change_index {
            Some(i) => {
                self.outputs[i] = TransactionOutput::new_change(0, script);
                i
            }
            None => {
                self.outputs.push(TransactionOutput::new_change(0, script));
                self.outputs.len() - 1
            }
        };

        let fee = match self.estimate_fee(quote) {
            Ok(fee) => fee,
            Err(e) => {
                match previous {
                    Some((i, output)) => self.outputs[i] = output,
                    None => {
                        self.outputs.remove(index);
                    }
                }
                return Err(e);
            }
        };

        match available.checked_sub(fee) {
            Some(change) if change >= quote.dust_limit() && change > 0 => {
                self.outputs[index].satoshis = change;
                self.change_index = Some(index);
                debug!(index, change, fee, "change output set");
            }
            _ => {
                self.outputs.remove(index);
                self.change_index = None;
                warn!(
                    available,
                    fee,
                    dust_limit = quote.dust_limit(),
                    "leftover too small for change, adding it to the fee"
                );
            }
        }

        self.state = TxState::Funded;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------

    /// Parse a hex-encoded transaction (either case).
    pub fn from_hex(hex_str: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(hex_str).map_err(|e| TransactionError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Parse a complete transaction.
    ///
    /// # Returns
    /// The transaction, or `TruncatedData`, `MalformedVarInt`, or
    /// `TrailingData` when `bytes` is not exactly one transaction.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut reader = ByteReader::new(bytes);
        let tx = Self::read_from(&mut reader)?;
        match reader.remaining() {
            0 => Ok(tx),
            n => Err(TransactionError::TrailingData(n)),
        }
    }

    /// Read one transaction from `reader`, leaving any following bytes.
    ///
    /// The result is `Signed` when every input carries an unlocking script
    /// and `Building` otherwise.
    pub fn read_from(reader: &mut ByteReader) -> Result<Self, TransactionError> {
        let version = reader.read_u32_le()?;

        let input_count = reader.read_varint()?.value();
        let mut inputs = Vec::with_capacity(bounded_capacity(input_count, reader, MIN_INPUT_SIZE));
        for _ in 0..input_count {
            inputs.push(TransactionInput::read_from(reader)?);
        }

        let output_count = reader.read_varint()?.value();
        let mut outputs =
            Vec::with_capacity(bounded_capacity(output_count, reader, MIN_OUTPUT_SIZE));
        for _ in 0..output_count {
            outputs.push(TransactionOutput::read_from(reader)?);
        }

        let lock_time = reader.read_u32_le()?;

        let mut tx = Transaction {
            version,
            inputs,
            outputs,
            lock_time,
            state: TxState::Building,
            change_index: None,
        };
        if tx.is_fully_signed() {
            tx.state = TxState::Signed;
        }
        Ok(tx)
    }

    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.write_u32_le(self.version);
        writer.write_varint(VarInt::from(self.inputs.len()));
        for input in &self.inputs {
            input.write_to(writer);
        }
        writer.write_varint(VarInt::from(self.outputs.len()));
        for output in &self.outputs {
            output.write_to(writer);
        }
        writer.write_u32_le(self.lock_time);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(256);
        self.write_to(&mut writer);
        writer.into_bytes()
    }

    /// Lowercase hex of [`Transaction::to_bytes`].
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        self.to_bytes().len()
    }

    /// Double-SHA256 of the serialization, internal byte order.
    pub fn tx_id(&self) -> [u8; 32] {
        sha256d(&self.to_bytes())
    }

    /// Transaction id as usually displayed (byte-reversed hex).
    pub fn tx_id_hex(&self) -> String {
        Hash::new(self.tx_id()).to_string()
    }

    // -----------------------------------------------------------------
    // Signature hash
    // -----------------------------------------------------------------

    /// Signature hash of input `input_index` against its spent output.
    ///
    /// # Returns
    /// The digest, `InputIndexOutOfRange`, or `MissingSourceOutput`.
    pub fn calc_input_signature_hash(
        &self,
        input_index: usize,
        sighash_flag: u32,
    ) -> Result<[u8; 32], TransactionError> {
        let input = self
            .inputs
            .get(input_index)
            .ok_or(TransactionError::InputIndexOutOfRange {
                index: input_index,
                count: self.inputs.len(),
            })?;
        let source = input
            .source_output
            .as_ref()
            .ok_or(TransactionError::MissingSourceOutput { index: input_index })?;

        sighash::signature_hash(
            self,
            input_index,
            source.locking_script.to_bytes(),
            sighash_flag,
            source.satoshis,
        )
    }
}

fn check_amount(satoshis: u64) -> Result<(), TransactionError> {
    if satoshis > MAX_SATOSHIS {
        return Err(TransactionError::AmountOverflow);
    }
    Ok(())
}

fn add_amounts(total: u64, satoshis: u64) -> Result<u64, TransactionError> {
    total
        .checked_add(satoshis)
        .filter(|sum| *sum <= MAX_SATOSHIS)
        .ok_or(TransactionError::AmountOverflow)
}

fn duplicate_input(input: &TransactionInput) -> TransactionError {
    TransactionError::DuplicateInput {
        txid: input.source_txid_hex(),
        vout: input.source_tx_out_index,
    }
}

/// Preallocation for `count` items of at least `min_size` bytes, bounded
/// by what the reader can still hold.
fn bounded_capacity(count: u64, reader: &ByteReader, min_size: usize) -> usize {
    let max = reader.remaining() / min_size;
    usize::try_from(count).map_or(max, |count| count.min(max))
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.inputs == other.inputs
            && self.outputs == other.outputs
            && self.lock_time == other.lock_time
    }
}

impl Eq for Transaction {}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
