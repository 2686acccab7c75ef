/// TBC transaction SDK - Transaction assembly, funding and signing.
///
/// Builds a transaction from previous outputs, adds payment and data
/// outputs, sizes a change output against a fee quote, signs the inputs and
/// serializes the result in the wire format.

pub mod transaction;
pub mod input;
pub mod output;
pub mod utxo;
pub mod fees;
pub mod sighash;
pub mod template;
pub mod unlocker;
mod json;

mod error;
pub use error::{ErrorKind, TransactionError};
pub use fees::{FeeQuote, FeeType, FeeUnit, TxFees, TxSize};
pub use input::TransactionInput;
pub use output::TransactionOutput;
pub use transaction::{LockTime, Transaction, TxState, LOCKTIME_THRESHOLD, MAX_SATOSHIS};
pub use unlocker::{KeyProvider, KeyStore};
pub use utxo::Utxo;

#[cfg(test)]
mod tests;
