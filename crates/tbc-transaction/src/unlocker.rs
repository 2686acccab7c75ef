//! Signing orchestration.
//!
//! [`Transaction::fill_all_inputs`] walks the unsigned inputs, picks the key
//! for each spent P2PKH script from a [`KeyProvider`] and writes the
//! unlocking scripts. Other script kinds go through
//! [`Transaction::fill_input`] with a caller-supplied template.

use std::collections::HashMap;

use tbc_primitives::ec::PrivateKey;
use tbc_script::ScriptType;
use tracing::debug;

use crate::template::p2pkh;
use crate::template::UnlockingScriptTemplate;
use crate::transaction::{Transaction, TxState};
use crate::TransactionError;

/// Source of signing keys, looked up by the public key hash a P2PKH script
/// locks to.
pub trait KeyProvider {
    fn lookup(&self, public_key_hash: &[u8; 20]) -> Option<PrivateKey>;
}

/// A single key provides itself for its own hash.
impl KeyProvider for PrivateKey {
    fn lookup(&self, public_key_hash: &[u8; 20]) -> Option<PrivateKey> {
        (self.pub_key().hash160() == *public_key_hash).then(|| self.clone())
    }
}

impl<T: KeyProvider + ?Sized> KeyProvider for &T {
    fn lookup(&self, public_key_hash: &[u8; 20]) -> Option<PrivateKey> {
        (**self).lookup(public_key_hash)
    }
}

/// In-memory keys indexed by public key hash.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    keys: HashMap<[u8; 20], PrivateKey>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the keys of the given WIF strings.
    pub fn from_wifs<'a>(wifs: impl IntoIterator<Item = &'a str>) -> Result<Self, TransactionError> {
        let mut store = Self::new();
        for wif in wifs {
            store.insert(PrivateKey::from_wif(wif)?);
        }
        Ok(store)
    }

    pub fn insert(&mut self, key: PrivateKey) {
        self.keys.insert(key.pub_key().hash160(), key);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<PrivateKey> for KeyStore {
    fn from_iter<I: IntoIterator<Item = PrivateKey>>(iter: I) -> Self {
        let mut store = KeyStore::new();
        for key in iter {
            store.insert(key);
        }
        store
    }
}

impl KeyProvider for KeyStore {
    fn lookup(&self, public_key_hash: &[u8; 20]) -> Option<PrivateKey> {
        self.keys.get(public_key_hash).cloned()
    }
}

impl Transaction {
    /// Sign every input that has no unlocking script yet.
    ///
    /// Each spent script must be P2PKH (a data trailer after the template
    /// is allowed) and `keys` must hold the key it locks to. All scripts
    /// are computed first and written only if every input succeeded, so
    /// on error the transaction is unchanged.
    ///
    /// # Returns
    /// `MissingSourceOutput`, `UnsupportedScriptType` or `KeyNotFound` for
    /// the first input that cannot be signed, `InsufficientFunds` when the
    /// outputs exceed the inputs, `InvalidState` for a transaction without
    /// inputs, or `TransactionFinalized` once serialized.
    pub fn fill_all_inputs<K: KeyProvider + ?Sized>(
        &mut self,
        keys: &K,
    ) -> Result<(), TransactionError> {
        match self.state {
            TxState::Serialized => return Err(TransactionError::TransactionFinalized),
            TxState::Signed => return Ok(()),
            TxState::Building | TxState::Funded => {}
        }
        if self.inputs.is_empty() {
            return Err(TransactionError::InvalidState(
                "transaction has no inputs to sign".to_string(),
            ));
        }
        self.ensure_inputs_cover_outputs()?;

        let mut scripts = Vec::new();
        for (index, input) in self.inputs.iter().enumerate() {
            if input.is_signed() {
                continue;
            }
            let spent = input
                .source_locking_script()
                .ok_or(TransactionError::MissingSourceOutput { index })?;
            if spent.script_type() != ScriptType::PayToPubKeyHash {
                return Err(TransactionError::UnsupportedScriptType { index });
            }
            let public_key_hash = spent.public_key_hash()?;
            let key = keys.lookup(&public_key_hash).ok_or_else(|| {
                TransactionError::KeyNotFound {
                    index,
                    public_key_hash: hex::encode(public_key_hash),
                }
            })?;

            let script = p2pkh::unlock(key, None).sign(self, index)?;
            scripts.push((index, script));
        }

        let signed = scripts.len();
        for (index, script) in scripts {
            self.inputs[index].unlocking_script = script;
        }
        self.state = TxState::Signed;
        debug!(signed, inputs = self.inputs.len(), txid = %self.tx_id_hex(), "inputs signed");
        Ok(())
    }

    /// Sign input `index` with `template`.
    ///
    /// The transaction becomes `Signed` once this fills the last unsigned
    /// input.
    pub fn fill_input(
        &mut self,
        index: usize,
        template: &dyn UnlockingScriptTemplate,
    ) -> Result<(), TransactionError> {
        self.ensure_mutable()?;
        if index >= self.inputs.len() {
            return Err(TransactionError::InputIndexOutOfRange { index, count: self.inputs.len() });
        }
        self.ensure_inputs_cover_outputs()?;

        let script = template.sign(self, index)?;
        self.inputs[index].unlocking_script = script;
        if self.is_fully_signed() {
            self.state = TxState::Signed;
            debug!(index, txid = %self.tx_id_hex(), "last input signed");
        }
        Ok(())
    }
}
