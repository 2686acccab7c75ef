#![deny(missing_docs)]

//! TBC transaction SDK.
//!
//! Re-exports the workspace crates for single-crate usage.

pub use tbc_primitives as primitives;
pub use tbc_script as script;
pub use tbc_transaction as transaction;

pub use tbc_primitives::ec::PrivateKey;
pub use tbc_script::{Address, Network, Script};
pub use tbc_transaction::{
    FeeQuote, FeeType, FeeUnit, KeyProvider, KeyStore, Transaction, TransactionError, Utxo,
};
