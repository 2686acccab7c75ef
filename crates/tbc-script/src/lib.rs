/// TBC transaction SDK - Script construction, classification and addresses.
///
/// Provides the `Script` type, opcode definitions, chunk parsing, the
/// `ScriptType` classifier used by fee estimation and signing, and the
/// Base58Check P2PKH address codec.

pub mod script;
pub mod opcodes;
pub mod chunk;
pub mod address;

mod error;
pub use error::ScriptError;
pub use script::{Script, ScriptType, MAX_DATA_CARRIER_SCRIPT_SIZE};
pub use address::{Address, Network};
pub use chunk::ScriptChunk;
