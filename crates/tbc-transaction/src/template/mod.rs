//! Unlocking script templates.
//!
//! A template knows how to produce the unlocking script for one kind of
//! locking script. [`p2pkh`] is the built-in template used by
//! [`Transaction::fill_all_inputs`]; callers can plug their own in through
//! [`Transaction::fill_input`].

pub mod p2pkh;

use tbc_script::Script;

use crate::transaction::Transaction;
use crate::TransactionError;

/// Produces the unlocking script for a transaction input.
pub trait UnlockingScriptTemplate {
    /// Compute the unlocking script for `input_index`.
    ///
    /// Implementations hash the transaction as it currently stands, so all
    /// outputs must be in place before signing.
    fn sign(&self, tx: &Transaction, input_index: usize) -> Result<Script, TransactionError>;
}
