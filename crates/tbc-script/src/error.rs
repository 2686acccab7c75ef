/// Error types for script operations.
///
/// Covers parsing errors, push-data encoding, address validation and the
/// data-carrier size ceiling.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Generic invalid script error.
    #[error("invalid script: {0}")]
    InvalidScript(String),

    /// Invalid opcode data encountered during ASM parsing.
    #[error("invalid opcode data: {0}")]
    InvalidOpcodeData(String),

    /// Attempted to append a push-data opcode without its data.
    #[error("use append_push_data for push data opcodes: {0}")]
    InvalidOpcodeType(String),

    /// Invalid address string.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Address version byte is neither mainnet nor testnet P2PKH.
    #[error("unsupported address version 0x{0:02x}")]
    UnsupportedAddressVersion(u8),

    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Script is not a P2PKH script.
    #[error("not a P2PKH script")]
    NotP2PKH,

    /// Not enough data in script to complete a push operation.
    #[error("push data runs past the end of the script")]
    DataTooSmall,

    /// Push data exceeds the four-byte length prefix.
    #[error("data too big")]
    DataTooBig,

    /// A data-carrier script would exceed the protocol ceiling.
    #[error("payload too large: script of {size} bytes exceeds {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error(transparent)]
    Primitives(#[from] tbc_primitives::PrimitivesError),
}
