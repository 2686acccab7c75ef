//! Unspent transaction outputs handed over by a UTXO source.

use serde::{Deserialize, Serialize};
use tbc_primitives::chainhash::Hash;
use tbc_script::Script;

use crate::TransactionError;

/// An unspent output available for funding.
///
/// Serializes as `{"txid": "<display hex>", "vout": n,
/// "lockingScript": "<hex>", "satoshis": n}`; `script` is accepted as an
/// alias of `lockingScript` on input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub txid: Hash,
    pub vout: u32,
    #[serde(alias = "script")]
    pub locking_script: Script,
    pub satoshis: u64,
}

impl Utxo {
    /// Build a UTXO from its textual fields.
    ///
    /// # Arguments
    /// * `txid_hex` - Display-order transaction id, exactly 64 hex characters.
    /// * `vout` - Output index within that transaction.
    /// * `locking_script_hex` - The output's locking script.
    /// * `satoshis` - The output's value.
    ///
    /// # Returns
    /// The UTXO, or `InvalidHex` if either hex field is malformed.
    pub fn from_hex(
        txid_hex: &str,
        vout: u32,
        locking_script_hex: &str,
        satoshis: u64,
    ) -> Result<Self, TransactionError> {
        Ok(Utxo {
            txid: Hash::from_hex(txid_hex)?,
            vout,
            locking_script: Script::from_hex(locking_script_hex)?,
            satoshis,
        })
    }
}
