//! Fee model: size estimation and fee computation against a [`FeeQuote`].
//!
//! Sizes are estimated from the transaction as it currently stands. Signed
//! inputs contribute their real unlocking script; unsigned inputs contribute
//! the estimate for the script type they spend. Bytes of data-carrier
//! outputs are priced with the `Data` rate, everything else with the
//! `Standard` rate, each category rounded up separately.

use std::fmt;

use serde::{Deserialize, Serialize};
use tbc_primitives::util::VarInt;

use crate::transaction::Transaction;
use crate::TransactionError;

/// Version and lock time.
const FIXED_HEADER_SIZE: usize = 4 + 4;
/// Outpoint and sequence number.
const INPUT_FIXED_SIZE: usize = 32 + 4 + 4;

/// Default standard and data rate: 5 satoshis per 10 bytes.
const DEFAULT_FEE_UNIT: FeeUnit = FeeUnit { satoshis: 5, bytes: 10 };

/// Default minimum value for a change output.
pub const DEFAULT_DUST_LIMIT: u64 = 1;

/// Category of transaction bytes a rate applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeType {
    Standard,
    Data,
}

impl fmt::Display for FeeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeType::Standard => f.write_str("standard"),
            FeeType::Data => f.write_str("data"),
        }
    }
}

/// A rate of `satoshis` per `bytes` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeUnit {
    pub satoshis: u64,
    pub bytes: u64,
}

impl FeeUnit {
    pub const fn new(satoshis: u64, bytes: u64) -> Self {
        FeeUnit { satoshis, bytes }
    }

    /// Fee for `size` bytes, rounded up.
    ///
    /// # Returns
    /// `ceil(size * satoshis / bytes)`, `InvalidFeeQuote` for a zero byte
    /// count, or `AmountOverflow` when the fee does not fit in a u64.
    pub fn fee_for(&self, size: usize) -> Result<u64, TransactionError> {
        if self.bytes == 0 {
            return Err(TransactionError::InvalidFeeQuote(
                "fee unit byte count must be greater than zero".to_string(),
            ));
        }
        let numerator = size as u128 * self.satoshis as u128;
        let fee = numerator.div_ceil(self.bytes as u128);
        u64::try_from(fee).map_err(|_| TransactionError::AmountOverflow)
    }
}

/// Rates used to price a transaction, plus the smallest change output worth
/// creating.
///
/// ```json
/// {"standard": {"satoshis": 5, "bytes": 10},
///  "data": {"satoshis": 5, "bytes": 10},
///  "dustLimit": 1}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeQuote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    standard: Option<FeeUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<FeeUnit>,
    #[serde(default = "default_dust_limit")]
    dust_limit: u64,
}

fn default_dust_limit() -> u64 {
    DEFAULT_DUST_LIMIT
}

impl Default for FeeQuote {
    fn default() -> Self {
        FeeQuote {
            standard: Some(DEFAULT_FEE_UNIT),
            data: Some(DEFAULT_FEE_UNIT),
            dust_limit: DEFAULT_DUST_LIMIT,
        }
    }
}

impl FeeQuote {
    /// Quote with the default rates (5 satoshis per 10 bytes for both fee
    /// types) and dust limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Quote with no rates set; add them with [`FeeQuote::with_fee`].
    pub fn empty() -> Self {
        FeeQuote { standard: None, data: None, dust_limit: DEFAULT_DUST_LIMIT }
    }

    /// Parse a quote from JSON. Missing rates stay unset, a missing dust
    /// limit takes the default.
    ///
    /// # Returns
    /// The quote, or `InvalidFeeQuote` for malformed JSON or a rate with a
    /// zero byte count.
    pub fn from_json(json: &str) -> Result<Self, TransactionError> {
        let quote: FeeQuote = serde_json::from_str(json)
            .map_err(|e| TransactionError::InvalidFeeQuote(e.to_string()))?;
        for unit in [quote.standard, quote.data].into_iter().flatten() {
            if unit.bytes == 0 {
                return Err(TransactionError::InvalidFeeQuote(
                    "fee unit byte count must be greater than zero".to_string(),
                ));
            }
        }
        Ok(quote)
    }

    /// Replace the rate for `fee_type`.
    pub fn with_fee(mut self, fee_type: FeeType, unit: FeeUnit) -> Self {
        match fee_type {
            FeeType::Standard => self.standard = Some(unit),
            FeeType::Data => self.data = Some(unit),
        }
        self
    }

    pub fn with_dust_limit(mut self, dust_limit: u64) -> Self {
        self.dust_limit = dust_limit;
        self
    }

    /// Rate for `fee_type`.
    ///
    /// # Returns
    /// The rate, or `MissingFeeType` if the quote does not carry one.
    pub fn fee(&self, fee_type: FeeType) -> Result<FeeUnit, TransactionError> {
        let unit = match fee_type {
            FeeType::Standard => self.standard,
            FeeType::Data => self.data,
        };
        unit.ok_or(TransactionError::MissingFeeType(fee_type))
    }

    pub fn dust_limit(&self) -> u64 {
        self.dust_limit
    }

    fn fee_for(&self, fee_type: FeeType, size: usize) -> Result<u64, TransactionError> {
        if size == 0 {
            return Ok(0);
        }
        self.fee(fee_type)?.fee_for(size)
    }
}

/// Estimated serialized size split by fee category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxSize {
    pub total_bytes: usize,
    pub total_std_bytes: usize,
    pub total_data_bytes: usize,
}

/// Fee owed per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxFees {
    pub std_fee_paid: u64,
    pub data_fee_paid: u64,
    pub total_fee_paid: u64,
}

impl Transaction {
    /// Estimated size in bytes once every input is signed.
    pub fn estimate_size(&self) -> Result<usize, TransactionError> {
        Ok(self.estimate_size_with_types()?.total_bytes)
    }

    /// Estimated size split into standard and data bytes.
    ///
    /// # Returns
    /// The size, `MissingSourceOutput` for an unsigned input whose spent
    /// output is unknown, or `UnknownScriptType` when the spent script has
    /// no unlocking size estimate.
    pub fn estimate_size_with_types(&self) -> Result<TxSize, TransactionError> {
        let mut total = FIXED_HEADER_SIZE
            + VarInt::from(self.inputs.len()).length()
            + VarInt::from(self.outputs.len()).length();

        for (index, input) in self.inputs.iter().enumerate() {
            let script_len = if input.is_signed() {
                input.unlocking_script.len()
            } else {
                let spent = input
                    .source_locking_script()
                    .ok_or(TransactionError::MissingSourceOutput { index })?;
                spent
                    .script_type()
                    .estimated_unlocking_len()
                    .ok_or(TransactionError::UnknownScriptType { index })?
            };
            total += INPUT_FIXED_SIZE + VarInt::from(script_len).length() + script_len;
        }

        let mut data = 0;
        for output in &self.outputs {
            total += output.size();
            if output.is_data() {
                data += output.locking_script.len();
            }
        }

        Ok(TxSize {
            total_bytes: total,
            total_std_bytes: total - data,
            total_data_bytes: data,
        })
    }

    /// Fee the quote requires for the transaction as it stands.
    pub fn estimate_fee(&self, quote: &FeeQuote) -> Result<u64, TransactionError> {
        Ok(self.estimate_fees_paid(quote)?.total_fee_paid)
    }

    /// Per-category breakdown of [`Transaction::estimate_fee`].
    pub fn estimate_fees_paid(&self, quote: &FeeQuote) -> Result<TxFees, TransactionError> {
        let size = self.estimate_size_with_types()?;
        let std_fee_paid = quote.fee_for(FeeType::Standard, size.total_std_bytes)?;
        let data_fee_paid = quote.fee_for(FeeType::Data, size.total_data_bytes)?;
        let total_fee_paid = std_fee_paid
            .checked_add(data_fee_paid)
            .ok_or(TransactionError::AmountOverflow)?;
        Ok(TxFees { std_fee_paid, data_fee_paid, total_fee_paid })
    }

    /// Whether the inputs cover the outputs plus the quoted fee.
    ///
    /// Returns `false`, not an error, when outputs exceed inputs.
    pub fn estimate_is_fee_paid_enough(&self, quote: &FeeQuote) -> Result<bool, TransactionError> {
        let total_in = self.total_input_satoshis()?;
        let total_out = self.total_output_satoshis()?;
        let fee = self.estimate_fee(quote)?;
        Ok(total_in.checked_sub(total_out).map_or(false, |paid| paid >= fee))
    }

    /// Fee actually paid: inputs minus outputs.
    ///
    /// # Returns
    /// The fee, or `InsufficientFunds` when outputs exceed inputs.
    pub fn fee_paid(&self) -> Result<u64, TransactionError> {
        let inputs = self.total_input_satoshis()?;
        let outputs = self.total_output_satoshis()?;
        inputs
            .checked_sub(outputs)
            .ok_or(TransactionError::InsufficientFunds { inputs, outputs })
    }
}
