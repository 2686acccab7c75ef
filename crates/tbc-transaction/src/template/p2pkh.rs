//! Pay-to-public-key-hash template.
//!
//! Locking: `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`.
//! Unlocking: `<DER signature || sighash byte> <compressed pubkey>`.

use tbc_primitives::ec::PrivateKey;
use tbc_script::{Address, Script};

use crate::sighash::SIGHASH_ALL_FORKID;
use crate::template::UnlockingScriptTemplate;
use crate::transaction::Transaction;
use crate::TransactionError;

/// P2PKH locking script paying to `address`.
pub fn lock(address: &Address) -> Script {
    address.locking_script()
}

/// Signing template for `private_key`, using `SIGHASH_ALL_FORKID` unless
/// another flag is given.
pub fn unlock(private_key: PrivateKey, sighash_flag: Option<u32>) -> P2PKH {
    P2PKH {
        private_key,
        sighash_flag: sighash_flag.unwrap_or(SIGHASH_ALL_FORKID),
    }
}

/// P2PKH unlocking template.
#[derive(Debug, Clone)]
pub struct P2PKH {
    private_key: PrivateKey,
    sighash_flag: u32,
}

impl P2PKH {
    pub fn sighash_flag(&self) -> u32 {
        self.sighash_flag
    }
}

impl UnlockingScriptTemplate for P2PKH {
    /// Sign `input_index` with RFC6979 deterministic low-S ECDSA.
    ///
    /// # Returns
    /// The unlocking script, `InputIndexOutOfRange`, or
    /// `MissingSourceOutput` when the spent output is unknown.
    fn sign(&self, tx: &Transaction, input_index: usize) -> Result<Script, TransactionError> {
        let sig_hash = tx.calc_input_signature_hash(input_index, self.sighash_flag)?;
        let signature = self.private_key.sign(&sig_hash)?;

        let der = signature.to_der();
        let mut sig_buf = Vec::with_capacity(der.len() + 1);
        sig_buf.extend_from_slice(&der);
        sig_buf.push(self.sighash_flag as u8);

        let mut script = Script::new();
        script.append_push_data(&sig_buf)?;
        script.append_push_data(&self.private_key.pub_key().to_compressed())?;
        Ok(script)
    }
}
