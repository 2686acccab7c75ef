//! Node-style JSON rendering of a transaction.

use serde_json::{json, Value};

use crate::transaction::Transaction;

impl Transaction {
    /// Render the transaction the way a node's `decoderawtransaction`
    /// does: `txid`, `hex`, `version`, `locktime`, `vin` and `vout`.
    pub fn to_json(&self) -> Value {
        let vin: Vec<Value> = self
            .inputs
            .iter()
            .map(|input| {
                json!({
                    "txid": input.source_txid_hex(),
                    "vout": input.source_tx_out_index,
                    "scriptSig": {
                        "asm": input.unlocking_script.to_asm(),
                        "hex": input.unlocking_script.to_hex(),
                    },
                    "sequence": input.sequence_number,
                })
            })
            .collect();

        let vout: Vec<Value> = self
            .outputs
            .iter()
            .enumerate()
            .map(|(n, output)| {
                json!({
                    "satoshis": output.satoshis,
                    "n": n,
                    "scriptPubKey": {
                        "asm": output.locking_script.to_asm(),
                        "hex": output.locking_script.to_hex(),
                        "type": output.locking_script.script_type().as_str(),
                    },
                })
            })
            .collect();

        json!({
            "txid": self.tx_id_hex(),
            "hex": self.to_hex(),
            "version": self.version,
            "locktime": self.lock_time,
            "vin": vin,
            "vout": vout,
        })
    }
}
