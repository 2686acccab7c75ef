use std::fmt;

use tbc_primitives::PrimitivesError;
use tbc_script::ScriptError;

use crate::fees::FeeType;

/// Broad category of a [`TransactionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed caller input: hex, addresses, scripts, amounts, indices.
    Validation,
    /// Value sums out of range or not covering outputs.
    Arithmetic,
    /// Operation not allowed in the transaction's current state.
    State,
    /// Key lookup or signing failure.
    Key,
    /// Wire-format decoding failure.
    Format,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Arithmetic => "arithmetic",
            ErrorKind::State => "state",
            ErrorKind::Key => "key",
            ErrorKind::Format => "format",
        };
        f.write_str(name)
    }
}

/// Error types for transaction operations.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid script: {0}")]
    InvalidScript(String),

    /// The outpoint is already spent by an input of this transaction.
    #[error("duplicate input {txid}:{vout}")]
    DuplicateInput { txid: String, vout: u32 },

    #[error("output amount must be greater than zero")]
    NonPositiveAmount,

    #[error("payload too large: script of {size} bytes exceeds {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// An unsigned input spends a script whose unlocking size is unknown.
    #[error("input {index}: unknown previous locking script type")]
    UnknownScriptType { index: usize },

    /// An input spends a script no built-in template can unlock.
    #[error("input {index}: unsupported previous locking script type")]
    UnsupportedScriptType { index: usize },

    #[error("input {index}: previous output (value and locking script) not set")]
    MissingSourceOutput { index: usize },

    #[error("input index {index} out of range (tx has {count} inputs)")]
    InputIndexOutOfRange { index: usize, count: usize },

    #[error("invalid lock time: {0}")]
    InvalidLockTime(String),

    #[error("invalid fee quote: {0}")]
    InvalidFeeQuote(String),

    #[error("fee quote has no {0} fee")]
    MissingFeeType(FeeType),

    /// A value or a running sum exceeds the maximum money supply.
    #[error("amount overflow: value exceeds the maximum supply")]
    AmountOverflow,

    #[error("insufficient funds: inputs {inputs}, outputs {outputs}")]
    InsufficientFunds { inputs: u64, outputs: u64 },

    /// The transaction is signed; changing it would invalidate signatures.
    #[error("transaction is finalized and can no longer be modified")]
    TransactionFinalized,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("input {index}: no key for public key hash {public_key_hash}")]
    KeyNotFound { index: usize, public_key_hash: String },

    #[error("signing error: {0}")]
    Signing(String),

    #[error("truncated data: {0}")]
    TruncatedData(String),

    #[error("malformed varint: {0}")]
    MalformedVarInt(String),

    #[error("{0} trailing bytes after transaction")]
    TrailingData(usize),
}

impl TransactionError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        use TransactionError::*;
        match self {
            InvalidHex(_)
            | InvalidAddress(_)
            | InvalidScript(_)
            | DuplicateInput { .. }
            | NonPositiveAmount
            | PayloadTooLarge { .. }
            | UnknownScriptType { .. }
            | UnsupportedScriptType { .. }
            | MissingSourceOutput { .. }
            | InputIndexOutOfRange { .. }
            | InvalidLockTime(_)
            | InvalidFeeQuote(_)
            | MissingFeeType(_) => ErrorKind::Validation,
            AmountOverflow | InsufficientFunds { .. } => ErrorKind::Arithmetic,
            TransactionFinalized | InvalidState(_) => ErrorKind::State,
            KeyNotFound { .. } | Signing(_) => ErrorKind::Key,
            TruncatedData(_) | MalformedVarInt(_) | TrailingData(_) => ErrorKind::Format,
        }
    }
}

impl From<ScriptError> for TransactionError {
    fn from(e: ScriptError) -> Self {
        match e {
            ScriptError::PayloadTooLarge { size, max } => {
                TransactionError::PayloadTooLarge { size, max }
            }
            ScriptError::InvalidAddress(_) | ScriptError::UnsupportedAddressVersion(_) => {
                TransactionError::InvalidAddress(e.to_string())
            }
            ScriptError::InvalidHex(_) => TransactionError::InvalidHex(e.to_string()),
            ScriptError::Primitives(inner) => inner.into(),
            other => TransactionError::InvalidScript(other.to_string()),
        }
    }
}

impl From<PrimitivesError> for TransactionError {
    fn from(e: PrimitivesError) -> Self {
        match e {
            PrimitivesError::InvalidHex(_) | PrimitivesError::InvalidHash(_) => {
                TransactionError::InvalidHex(e.to_string())
            }
            PrimitivesError::UnexpectedEof { .. } => TransactionError::TruncatedData(e.to_string()),
            PrimitivesError::NonCanonicalVarInt { .. } => {
                TransactionError::MalformedVarInt(e.to_string())
            }
            other => TransactionError::Signing(other.to_string()),
        }
    }
}
