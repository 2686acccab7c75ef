//! Tests for the tbc-transaction crate.
//!
//! Covers parsing and serialization of known transactions, input and output
//! validation, fee estimation, change allocation, the signing lifecycle and
//! lock times. Signed vectors are byte-exact against independent
//! deterministic signers.

use tbc_primitives::chainhash::Hash;
use tbc_primitives::ec::{PrivateKey, PublicKey, Signature};
use tbc_script::Script;

use crate::fees::{FeeQuote, FeeType, FeeUnit};
use crate::input::{TransactionInput, DEFAULT_SEQUENCE_NUMBER, LOCKTIME_ENABLED_SEQUENCE_NUMBER};
use crate::output::TransactionOutput;
use crate::sighash::SIGHASH_ALL_FORKID;
use crate::template::p2pkh;
use crate::transaction::{LockTime, Transaction, TxState, LOCKTIME_THRESHOLD, MAX_SATOSHIS};
use crate::unlocker::KeyStore;
use crate::utxo::Utxo;
use crate::{ErrorKind, TransactionError};

// -----------------------------------------------------------------------
// Vectors
// -----------------------------------------------------------------------

/// A signed transaction whose first output (1500 sat, P2PKH with a
/// "hello" data trailer) funds the demo transactions below.
const SOURCE_RAW_TX: &str = "010000000138c7c61c14ffb063c3bb2664041a3e29ea6ea0412a0c18ff725ba4e9e12afae2030000006a47304402203e9ab8e4c14addf3b4741540b556cfb0e0efb67dc1a7b5ce84c3ac56b3fd447802203c9f49f7bd893ebd7060176dfc36bcaff9d2c443d9a0dd6cd2d59b372c024d20412102798913bc057b344de675dac34faafe3dc2f312c758cd9068209f810877306d66ffffffff02dc050000000000002076a914eb0bd5edba389198e73f8efabddfc61666969ff788ac6a0568656c6c6faa0d0000000000001976a914eb0bd5edba389198e73f8efabddfc61666969ff788ac00000000";

/// Three inputs with sequence 0xfffffffe, version 2, lock time 103.
const MULTI_INPUT_TX_HEX: &str = "0200000003a9bc457fdc6a54d99300fb137b23714d860c350a9d19ff0f571e694a419ff3a0010000006b48304502210086c83beb2b2663e4709a583d261d75be538aedcafa7766bd983e5c8db2f8b2fc02201a88b178624ab0ad1748b37c875f885930166237c88f5af78ee4e61d337f935f412103e8be830d98bb3b007a0343ee5c36daa48796ae8bb57946b1e87378ad6e8a090dfeffffff0092bb9a47e27bf64fc98f557c530c04d9ac25e2f2a8b600e92a0b1ae7c89c20010000006b483045022100f06b3db1c0a11af348401f9cebe10ae2659d6e766a9dcd9e3a04690ba10a160f02203f7fbd7dfcfc70863aface1a306fcc91bbadf6bc884c21a55ef0d32bd6b088c8412103e8be830d98bb3b007a0343ee5c36daa48796ae8bb57946b1e87378ad6e8a090dfeffffff9d0d4554fa692420a0830ca614b6c60f1bf8eaaa21afca4aa8c99fb052d9f398000000006b483045022100d920f2290548e92a6235f8b2513b7f693a64a0d3fa699f81a034f4b4608ff82f0220767d7d98025aff3c7bd5f2a66aab6a824f5990392e6489aae1e1ae3472d8dffb412103e8be830d98bb3b007a0343ee5c36daa48796ae8bb57946b1e87378ad6e8a090dfeffffff02807c814a000000001976a9143a6bf34ebfcf30e8541bbb33a7882845e5a29cb488ac76b0e60e000000001976a914bd492b67f90cb85918494767ebb23102c4f06b7088ac67000000";

const DEMO_TXID: &str = "11b476ad8e0a48fcd40807a111a050af51114877e09283bfa7f3505081a1819d";
const DEMO_PREV_SCRIPT: &str =
    "76a914eb0bd5edba389198e73f8efabddfc61666969ff788ac6a0568656c6c6f";
const DEMO_ADDRESS: &str = "1NRoySJ9Lvby6DuE2UQYnyT67AASwNZxGb";
const DEMO_WIF: &str = "KznvCNc6Yf4iztSThoMH6oHWzH9EgjfodKxmeuUGPq5DEX5maspS";

/// Demo funded with the default quote (fee 113, change 387), unsigned.
const DEMO_UNSIGNED_DEFAULT: &str = "01000000019d81a1815050f3a7bf8392e077481151af50a011a10708d4fc480a8ead76b4110000000000ffffffff02e8030000000000001976a914eb0bd5edba389198e73f8efabddfc61666969ff788ac83010000000000001976a914eb0bd5edba389198e73f8efabddfc61666969ff788ac00000000";

/// Demo funded with the default quote, signed.
const DEMO_SIGNED_DEFAULT: &str = "01000000019d81a1815050f3a7bf8392e077481151af50a011a10708d4fc480a8ead76b411000000006b48304502210087a0f472b06c78a4882b3fa0ec8b7567bb4676074282a6bd8cab960c675ad20902200e488f897601fc7162a9a888c6cab1f5a2f0ec03cc4ac43552dd11b14a669681412102798913bc057b344de675dac34faafe3dc2f312c758cd9068209f810877306d66ffffffff02e8030000000000001976a914eb0bd5edba389198e73f8efabddfc61666969ff788ac83010000000000001976a914eb0bd5edba389198e73f8efabddfc61666969ff788ac00000000";
const DEMO_TXID_DEFAULT: &str = "598a43a2eb4e57dcf50cd2fdc2442a23ed8aaa0fb8da4694ef78375a9692060c";

/// Demo funded at 150 sat per 226 bytes (fee 150, change 350), signed.
const DEMO_SIGNED_150: &str = "01000000019d81a1815050f3a7bf8392e077481151af50a011a10708d4fc480a8ead76b411000000006b483045022100e373c9b81d1f7617f5575225491b002c04c16cc72feabb20c4df63c7849ce999022075ee60c4873de1deac3cdf8d8666988fb1a1f6b423a8f8971778c665d8c18711412102798913bc057b344de675dac34faafe3dc2f312c758cd9068209f810877306d66ffffffff02e8030000000000001976a914eb0bd5edba389198e73f8efabddfc61666969ff788ac5e010000000000001976a914eb0bd5edba389198e73f8efabddfc61666969ff788ac00000000";
const DEMO_TXID_150: &str = "ace9edb0ceb9af13f44a55ce76801dd550e7c68521947b1eaab30adbf548e9ae";

fn quote_150() -> FeeQuote {
    FeeQuote::new()
        .with_fee(FeeType::Standard, FeeUnit::new(150, 226))
        .with_fee(FeeType::Data, FeeUnit::new(150, 226))
}

fn demo_inputs_and_payment() -> Transaction {
    let mut tx = Transaction::new();
    tx.from(DEMO_TXID, 0, DEMO_PREV_SCRIPT, 1500).unwrap();
    tx.pay_to_address(DEMO_ADDRESS, 1000).unwrap();
    tx
}

fn demo_tx(quote: &FeeQuote) -> Transaction {
    let mut tx = demo_inputs_and_payment();
    tx.change_to_address(DEMO_ADDRESS, quote).unwrap();
    tx
}

fn demo_key() -> PrivateKey {
    PrivateKey::from_wif(DEMO_WIF).unwrap()
}

/// Check the P2PKH signature on input `index` against its sighash.
fn assert_input_signature_valid(tx: &Transaction, index: usize) {
    let chunks = tx.inputs[index].unlocking_script.chunks().unwrap();
    assert_eq!(chunks.len(), 2);
    let sig_push = chunks[0].data.as_ref().unwrap();
    let (sig_der, flag) = sig_push.split_at(sig_push.len() - 1);
    assert_eq!(flag, &[SIGHASH_ALL_FORKID as u8]);

    let signature = Signature::from_der(sig_der).unwrap();
    let pub_key = PublicKey::from_bytes(chunks[1].data.as_ref().unwrap()).unwrap();
    let hash = tx.calc_input_signature_hash(index, SIGHASH_ALL_FORKID).unwrap();
    assert!(pub_key.verify(&hash, &signature), "input {} signature must verify", index);
    assert!(signature.is_low_s());
}

// -----------------------------------------------------------------------
// Parsing and serialization
// -----------------------------------------------------------------------

#[test]
fn test_from_hex_roundtrip() {
    let tx = Transaction::from_hex(SOURCE_RAW_TX).unwrap();
    assert_eq!(tx.version(), 1);
    assert_eq!(tx.input_count(), 1);
    assert_eq!(tx.output_count(), 2);
    assert_eq!(tx.lock_time(), 0);
    assert_eq!(tx.to_hex(), SOURCE_RAW_TX);
    assert_eq!(tx.to_string(), SOURCE_RAW_TX);
    assert_eq!(tx.size(), SOURCE_RAW_TX.len() / 2);
}

#[test]
fn test_source_tx_fields() {
    let tx = Transaction::from_hex(SOURCE_RAW_TX).unwrap();
    assert_eq!(tx.tx_id_hex(), DEMO_TXID);
    assert_eq!(tx.outputs[0].satoshis, 1500);
    assert_eq!(tx.outputs[0].locking_script.to_hex(), DEMO_PREV_SCRIPT);
    assert_eq!(tx.outputs[1].satoshis, 3498);
    assert_eq!(tx.inputs[0].sequence_number, DEFAULT_SEQUENCE_NUMBER);
    assert_eq!(tx.inputs[0].source_tx_out_index, 3);
    assert_eq!(
        tx.inputs[0].source_txid_hex(),
        "e2fa2ae1e9a45b72ff180c2a41a06eea293e1a046426bbc363b0ff141cc6c738"
    );
    assert!(!tx.has_data_outputs());
}

#[test]
fn test_multi_input_roundtrip() {
    let tx = Transaction::from_hex(MULTI_INPUT_TX_HEX).unwrap();
    assert_eq!(tx.version(), 2);
    assert_eq!(tx.input_count(), 3);
    assert_eq!(tx.output_count(), 2);
    assert_eq!(tx.lock_time(), 0x67);
    assert_eq!(tx.lock(), LockTime::BlockHeight(103));
    for input in tx.inputs() {
        assert_eq!(input.sequence_number, LOCKTIME_ENABLED_SEQUENCE_NUMBER);
    }
    assert_eq!(tx.to_hex(), MULTI_INPUT_TX_HEX);
}

#[test]
fn test_parsed_state() {
    let signed = Transaction::from_hex(SOURCE_RAW_TX).unwrap();
    assert_eq!(signed.state(), TxState::Signed);

    let unsigned = Transaction::from_hex(DEMO_UNSIGNED_DEFAULT).unwrap();
    assert_eq!(unsigned.state(), TxState::Building);
    assert!(unsigned.inputs[0].source_output.is_none());
    assert!(unsigned.change_index().is_none());
}

#[test]
fn test_parsed_signed_tx_is_frozen() {
    let mut tx = Transaction::from_hex(SOURCE_RAW_TX).unwrap();
    let err = tx.pay_to_address(DEMO_ADDRESS, 1).unwrap_err();
    assert!(matches!(err, TransactionError::TransactionFinalized));
    assert_eq!(err.kind(), ErrorKind::State);
}

#[test]
fn test_uppercase_hex_accepted() {
    let tx = Transaction::from_hex(&SOURCE_RAW_TX.to_uppercase()).unwrap();
    assert_eq!(tx.to_hex(), SOURCE_RAW_TX);
}

#[test]
fn test_trailing_bytes_error() {
    let extended = format!("{}deadbeef", SOURCE_RAW_TX);
    let err = Transaction::from_hex(&extended).unwrap_err();
    assert!(matches!(err, TransactionError::TrailingData(4)));
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_invalid_hex_error() {
    assert!(matches!(
        Transaction::from_hex("not_valid_hex"),
        Err(TransactionError::InvalidHex(_))
    ));
    assert!(matches!(
        Transaction::from_hex("010"),
        Err(TransactionError::InvalidHex(_))
    ));
}

#[test]
fn test_truncated_errors() {
    assert!(matches!(
        Transaction::from_bytes(&[]),
        Err(TransactionError::TruncatedData(_))
    ));
    let bytes = hex::decode(SOURCE_RAW_TX).unwrap();
    assert!(matches!(
        Transaction::from_bytes(&bytes[..bytes.len() / 2]),
        Err(TransactionError::TruncatedData(_))
    ));
    assert!(matches!(
        Transaction::from_bytes(&bytes[..bytes.len() - 1]),
        Err(TransactionError::TruncatedData(_))
    ));
    // Claims u64::MAX inputs with nothing behind the count.
    assert!(matches!(
        Transaction::from_hex("01000000ffffffffffffffffff"),
        Err(TransactionError::TruncatedData(_))
    ));
}

#[test]
fn test_non_minimal_varint_rejected() {
    // Input count 1 encoded with the 0xfd prefix.
    let hex_str = format!("01000000fd0100{}", &DEMO_UNSIGNED_DEFAULT[10..]);
    let err = Transaction::from_hex(&hex_str).unwrap_err();
    assert!(matches!(err, TransactionError::MalformedVarInt(_)));
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_empty_transaction_serialization() {
    let tx = Transaction::new();
    assert_eq!(tx.to_hex(), "01000000000000000000");
    assert_eq!(tx.size(), 10);

    let parsed = Transaction::from_bytes(&tx.to_bytes()).unwrap();
    assert_eq!(parsed, tx);
    assert_eq!(parsed.state(), TxState::Building);
}

#[test]
fn test_tx_id_is_reversed_hash() {
    let tx = Transaction::from_hex(MULTI_INPUT_TX_HEX).unwrap();
    let mut reversed = tx.tx_id();
    reversed.reverse();
    assert_eq!(hex::encode(reversed), tx.tx_id_hex());
}

#[test]
fn test_roundtrip_with_data_and_change() {
    let mut tx = demo_inputs_and_payment();
    tx.add_op_return_parts_output(&[b"tbc", b"memo"]).unwrap();
    tx.change_to_address(DEMO_ADDRESS, &FeeQuote::default()).unwrap();
    assert!(tx.has_data_outputs());

    let parsed = Transaction::from_bytes(&tx.to_bytes()).unwrap();
    assert_eq!(parsed, tx);
    assert_eq!(parsed.to_bytes(), tx.to_bytes());
    assert_eq!(parsed.tx_id(), tx.tx_id());
}

// -----------------------------------------------------------------------
// Inputs
// -----------------------------------------------------------------------

#[test]
fn test_from_records_source_output() {
    let tx = demo_inputs_and_payment();
    let input = &tx.inputs()[0];
    assert_eq!(input.source_txid_hex(), DEMO_TXID);
    assert_eq!(input.source_satoshis(), Some(1500));
    assert_eq!(input.source_locking_script().unwrap().to_hex(), DEMO_PREV_SCRIPT);
    assert_eq!(tx.total_input_satoshis().unwrap(), 1500);
}

#[test]
fn test_from_rejects_duplicates() {
    let mut tx = demo_inputs_and_payment();
    let err = tx.from(DEMO_TXID, 0, DEMO_PREV_SCRIPT, 1500).unwrap_err();
    assert!(matches!(err, TransactionError::DuplicateInput { vout: 0, .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(tx.input_count(), 1);

    // Same txid, other vout is fine.
    tx.from(DEMO_TXID, 1, DEMO_PREV_SCRIPT, 1).unwrap();
    assert_eq!(tx.input_count(), 2);
}

#[test]
fn test_from_rejects_bad_hex() {
    let mut tx = Transaction::new();
    assert!(matches!(
        tx.from(&DEMO_TXID[2..], 0, DEMO_PREV_SCRIPT, 1),
        Err(TransactionError::InvalidHex(_))
    ));
    assert!(matches!(
        tx.from(DEMO_TXID, 0, "76a9zz", 1),
        Err(TransactionError::InvalidHex(_))
    ));
    assert_eq!(tx.input_count(), 0);
}

#[test]
fn test_from_utxos_is_all_or_nothing() {
    let a = Utxo::from_hex(DEMO_TXID, 0, DEMO_PREV_SCRIPT, 1500).unwrap();
    let b = Utxo { vout: 1, ..a.clone() };

    let mut tx = Transaction::new();
    let err = tx.from_utxos(&[a.clone(), b.clone(), a.clone()]).unwrap_err();
    assert!(matches!(err, TransactionError::DuplicateInput { .. }));
    assert_eq!(tx.input_count(), 0);

    tx.from_utxos(&[a.clone(), b]).unwrap();
    assert_eq!(tx.input_count(), 2);
    assert_eq!(tx.total_input_satoshis().unwrap(), 3000);

    assert!(matches!(
        tx.from_utxos(&[a]),
        Err(TransactionError::DuplicateInput { .. })
    ));
    assert_eq!(tx.input_count(), 2);
}

#[test]
fn test_input_amount_overflow() {
    let mut tx = Transaction::new();
    assert!(matches!(
        tx.from(DEMO_TXID, 0, DEMO_PREV_SCRIPT, MAX_SATOSHIS + 1),
        Err(TransactionError::AmountOverflow)
    ));

    tx.from(DEMO_TXID, 0, DEMO_PREV_SCRIPT, MAX_SATOSHIS).unwrap();
    tx.from(DEMO_TXID, 1, DEMO_PREV_SCRIPT, 1).unwrap();
    let err = tx.total_input_satoshis().unwrap_err();
    assert!(matches!(err, TransactionError::AmountOverflow));
    assert_eq!(err.kind(), ErrorKind::Arithmetic);
}

#[test]
fn test_total_input_requires_source_output() {
    let mut tx = Transaction::new();
    tx.add_input(TransactionInput::new(Hash::from_hex(DEMO_TXID).unwrap(), 0)).unwrap();
    assert!(matches!(
        tx.total_input_satoshis(),
        Err(TransactionError::MissingSourceOutput { index: 0 })
    ));
}

// -----------------------------------------------------------------------
// Outputs
// -----------------------------------------------------------------------

#[test]
fn test_pay_to_address() {
    let tx = demo_inputs_and_payment();
    assert_eq!(tx.output_count(), 1);
    assert_eq!(tx.outputs[0].satoshis, 1000);
    assert_eq!(
        tx.outputs[0].locking_script.to_hex(),
        "76a914eb0bd5edba389198e73f8efabddfc61666969ff788ac"
    );
    assert!(!tx.outputs[0].change);
}

#[test]
fn test_pay_to_address_errors() {
    let mut tx = Transaction::new();
    for bad in ["", "1NRoySJ9Lvby6DuE2UQYnyT67AASwNZxGc", "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy"] {
        let err = tx.pay_to_address(bad, 1).unwrap_err();
        assert!(matches!(err, TransactionError::InvalidAddress(_)), "{}: {:?}", bad, err);
    }
    assert!(matches!(
        tx.pay_to_address(DEMO_ADDRESS, 0),
        Err(TransactionError::NonPositiveAmount)
    ));
    assert!(matches!(
        tx.pay_to_address(DEMO_ADDRESS, MAX_SATOSHIS + 1),
        Err(TransactionError::AmountOverflow)
    ));
    assert_eq!(tx.output_count(), 0);
}

#[test]
fn test_pay_to_testnet_address() {
    let mut tx = Transaction::new();
    tx.pay_to_address("mtdruWYVEV1wz5yL7GvpBj4MgifCB7yhPd", 10).unwrap();
    assert_eq!(
        tx.outputs[0].locking_script.to_hex(),
        "76a9148fe80c75c9560e8b56ed64ea3c26e18d2c52211b88ac"
    );
}

#[test]
fn test_op_return_outputs() {
    let mut tx = Transaction::new();
    tx.add_op_return_output(b"hello").unwrap();
    tx.add_op_return_parts_output(&[b"a", b"bc"]).unwrap();
    assert_eq!(tx.outputs[0].satoshis, 0);
    assert_eq!(tx.outputs[0].locking_script.to_hex(), "006a0568656c6c6f");
    assert_eq!(tx.outputs[1].locking_script.to_hex(), "006a0161026263");
    assert!(tx.has_data_outputs());
}

#[test]
fn test_op_return_payload_ceiling() {
    let mut tx = Transaction::new();
    let err = tx.add_op_return_output(&vec![0u8; 100_000]).unwrap_err();
    assert!(matches!(err, TransactionError::PayloadTooLarge { max: 100_000, .. }));
    assert_eq!(tx.output_count(), 0);

    // 2 opcode bytes + 5 prefix bytes + payload lands exactly on the ceiling.
    tx.add_op_return_output(&vec![0u8; 100_000 - 7]).unwrap();
    assert_eq!(tx.outputs[0].locking_script.len(), 100_000);
}

// -----------------------------------------------------------------------
// Fees
// -----------------------------------------------------------------------

#[test]
fn test_estimate_size_of_demo() {
    let mut tx = demo_inputs_and_payment();
    tx.pay_to_address(DEMO_ADDRESS, 1).unwrap();
    // Header 10, one P2PKH input 148, two P2PKH outputs 34 each.
    assert_eq!(tx.estimate_size().unwrap(), 226);
    let size = tx.estimate_size_with_types().unwrap();
    assert_eq!(size.total_data_bytes, 0);
    assert_eq!(size.total_std_bytes, 226);
}

#[test]
fn test_estimate_size_matches_signed_size() {
    let mut tx = demo_tx(&FeeQuote::default());
    let estimated = tx.estimate_size().unwrap();
    tx.fill_all_inputs(&demo_key()).unwrap();
    assert_eq!(tx.size(), estimated);
    assert_eq!(tx.estimate_size().unwrap(), tx.size());
}

#[test]
fn test_estimate_size_with_data() {
    let mut tx = demo_inputs_and_payment();
    tx.add_op_return_output(b"hello").unwrap();
    let size = tx.estimate_size_with_types().unwrap();
    assert_eq!(size.total_data_bytes, 8);
    assert_eq!(size.total_bytes, 10 + 148 + 34 + 17);
    assert_eq!(size.total_std_bytes, size.total_bytes - 8);

    let quote = FeeQuote::new()
        .with_fee(FeeType::Standard, FeeUnit::new(1, 1))
        .with_fee(FeeType::Data, FeeUnit::new(1, 4));
    let fees = tx.estimate_fees_paid(&quote).unwrap();
    assert_eq!(fees.std_fee_paid, size.total_std_bytes as u64);
    assert_eq!(fees.data_fee_paid, 2);
    assert_eq!(fees.total_fee_paid, fees.std_fee_paid + 2);
}

#[test]
fn test_estimate_unknown_script_type() {
    let mut tx = Transaction::new();
    tx.from(DEMO_TXID, 0, "51", 1000).unwrap();
    let err = tx.estimate_size().unwrap_err();
    assert!(matches!(err, TransactionError::UnknownScriptType { index: 0 }));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_estimate_missing_source_output() {
    let tx = Transaction::from_hex(DEMO_UNSIGNED_DEFAULT).unwrap();
    assert!(matches!(
        tx.estimate_fee(&FeeQuote::default()),
        Err(TransactionError::MissingSourceOutput { index: 0 })
    ));
}

#[test]
fn test_missing_fee_type() {
    let mut tx = demo_inputs_and_payment();
    let standard_only = FeeQuote::empty().with_fee(FeeType::Standard, FeeUnit::new(1, 1));
    assert_eq!(tx.estimate_fee(&standard_only).unwrap(), 192);

    tx.add_op_return_output(b"x").unwrap();
    assert!(matches!(
        tx.estimate_fee(&standard_only),
        Err(TransactionError::MissingFeeType(FeeType::Data))
    ));
}

#[test]
fn test_fee_paid_enough() {
    let tx = demo_tx(&FeeQuote::default());
    assert!(tx.estimate_is_fee_paid_enough(&FeeQuote::default()).unwrap());
    assert!(!tx.estimate_is_fee_paid_enough(&quote_150()).unwrap());

    let mut over = Transaction::new();
    over.from(DEMO_TXID, 0, DEMO_PREV_SCRIPT, 10).unwrap();
    over.pay_to_address(DEMO_ADDRESS, 20).unwrap();
    assert!(!over.estimate_is_fee_paid_enough(&FeeQuote::default()).unwrap());
    assert!(matches!(
        over.fee_paid(),
        Err(TransactionError::InsufficientFunds { inputs: 10, outputs: 20 })
    ));
}

// -----------------------------------------------------------------------
// Change
// -----------------------------------------------------------------------

#[test]
fn test_change_default_quote() {
    let tx = demo_tx(&FeeQuote::default());
    assert_eq!(tx.output_count(), 2);
    assert_eq!(tx.change_index(), Some(1));
    let change = tx.change_output().unwrap();
    assert!(change.change);
    assert_eq!(change.satoshis, 387);
    assert_eq!(tx.fee_paid().unwrap(), 113);
    assert_eq!(tx.state(), TxState::Funded);
    assert_eq!(tx.to_hex(), DEMO_UNSIGNED_DEFAULT);
}

#[test]
fn test_change_end_to_end_fee_150() {
    let tx = demo_tx(&quote_150());
    assert_eq!(tx.output_count(), 2);
    assert_eq!(tx.outputs[1].satoshis, 350);
    assert_eq!(tx.total_output_satoshis().unwrap(), 1350);
    assert_eq!(tx.total_input_satoshis().unwrap(), 1500);
    assert_eq!(tx.estimate_fee(&quote_150()).unwrap(), 150);
}

#[test]
fn test_change_balance_holds() {
    for quote in [FeeQuote::default(), quote_150(), FeeQuote::new().with_dust_limit(0)] {
        let tx = demo_tx(&quote);
        let fee = tx.estimate_fees_paid(&quote).unwrap().total_fee_paid;
        let change = tx.change_output().unwrap().satoshis;
        assert_eq!(
            tx.total_input_satoshis().unwrap() - tx.total_output_satoshis().unwrap(),
            fee
        );
        assert_eq!(1500 - 1000 - fee, change);
        assert_eq!(tx.fee_paid().unwrap(), fee);
    }
}

#[test]
fn test_change_dropped_when_fee_eats_it() {
    let quote = FeeQuote::new().with_fee(FeeType::Standard, FeeUnit::new(500, 226));
    let tx = demo_tx(&quote);
    assert_eq!(tx.output_count(), 1);
    assert!(tx.change_index().is_none());
    assert_eq!(tx.fee_paid().unwrap(), 500);
    assert_eq!(tx.state(), TxState::Funded);

    let quote = FeeQuote::new().with_fee(FeeType::Standard, FeeUnit::new(600, 226));
    let tx = demo_tx(&quote);
    assert_eq!(tx.output_count(), 1);
    assert_eq!(tx.fee_paid().unwrap(), 500);
}

#[test]
fn test_change_below_dust_limit_dropped() {
    let tx = demo_tx(&FeeQuote::default().with_dust_limit(388));
    assert_eq!(tx.output_count(), 1);
    assert_eq!(tx.fee_paid().unwrap(), 500);

    let tx = demo_tx(&FeeQuote::default().with_dust_limit(387));
    assert_eq!(tx.change_output().unwrap().satoshis, 387);
}

#[test]
fn test_change_is_idempotent() {
    let quote = FeeQuote::default();
    let mut tx = demo_tx(&quote);
    let first = tx.clone();
    tx.change_to_address(DEMO_ADDRESS, &quote).unwrap();
    assert_eq!(tx, first);
    assert_eq!(tx.change_index(), first.change_index());
    assert_eq!(tx.output_count(), 2);
}

#[test]
fn test_change_replaced_in_place() {
    let quote = FeeQuote::default();
    let mut tx = demo_tx(&quote);
    tx.change_to_address("mtdruWYVEV1wz5yL7GvpBj4MgifCB7yhPd", &quote).unwrap();
    assert_eq!(tx.output_count(), 2);
    assert_eq!(tx.change_index(), Some(1));
    assert_eq!(
        tx.outputs[1].locking_script.to_hex(),
        "76a9148fe80c75c9560e8b56ed64ea3c26e18d2c52211b88ac"
    );
    assert_eq!(tx.outputs[1].satoshis, 387);
}

#[test]
fn test_change_recomputed_after_new_output() {
    let quote = FeeQuote::default();
    let mut tx = demo_tx(&quote);
    tx.pay_to_address(DEMO_ADDRESS, 100).unwrap();
    assert_eq!(tx.state(), TxState::Building);
    assert_eq!(tx.change_index(), Some(1));

    tx.change_to_address(DEMO_ADDRESS, &quote).unwrap();
    assert_eq!(tx.state(), TxState::Funded);
    assert_eq!(tx.output_count(), 3);
    assert_eq!(tx.change_index(), Some(1));
    // 260 bytes at 5/10 is 130.
    assert_eq!(tx.fee_paid().unwrap(), 130);
    assert_eq!(tx.outputs[1].satoshis, 1500 - 1000 - 100 - 130);
}

#[test]
fn test_change_insufficient_funds() {
    let mut tx = Transaction::new();
    tx.from(DEMO_TXID, 0, DEMO_PREV_SCRIPT, 1000).unwrap();
    tx.pay_to_address(DEMO_ADDRESS, 1000).unwrap();
    let err = tx.change_to_address(DEMO_ADDRESS, &FeeQuote::default()).unwrap_err();
    assert!(matches!(err, TransactionError::InsufficientFunds { inputs: 1000, outputs: 1000 }));
    assert_eq!(err.kind(), ErrorKind::Arithmetic);
    assert_eq!(tx.output_count(), 1);
    assert_eq!(tx.state(), TxState::Building);

    tx.pay_to_address(DEMO_ADDRESS, 1).unwrap();
    assert!(matches!(
        tx.change_to_address(DEMO_ADDRESS, &FeeQuote::default()),
        Err(TransactionError::InsufficientFunds { .. })
    ));
}

#[test]
fn test_change_failure_leaves_outputs() {
    let mut tx = Transaction::new();
    tx.from(DEMO_TXID, 0, "51", 1000).unwrap();
    tx.pay_to_address(DEMO_ADDRESS, 10).unwrap();
    assert!(matches!(
        tx.change_to_address(DEMO_ADDRESS, &FeeQuote::default()),
        Err(TransactionError::UnknownScriptType { index: 0 })
    ));
    assert_eq!(tx.output_count(), 1);
    assert!(tx.change_index().is_none());
}

#[test]
fn test_change_bad_address() {
    let mut tx = demo_inputs_and_payment();
    assert!(matches!(
        tx.change_to_address("nope", &FeeQuote::default()),
        Err(TransactionError::InvalidAddress(_))
    ));
    assert_eq!(tx.output_count(), 1);
}

// -----------------------------------------------------------------------
// Signing and lifecycle
// -----------------------------------------------------------------------

#[test]
fn test_sign_demo_default_quote() {
    let mut tx = demo_tx(&FeeQuote::default());
    tx.fill_all_inputs(&demo_key()).unwrap();
    assert_eq!(tx.state(), TxState::Signed);
    assert_eq!(tx.inputs[0].unlocking_script.len(), 107);
    assert_eq!(tx.to_hex(), DEMO_SIGNED_DEFAULT);
    assert_eq!(tx.tx_id_hex(), DEMO_TXID_DEFAULT);
    assert_input_signature_valid(&tx, 0);
}

#[test]
fn test_sign_demo_fee_150() {
    let mut tx = demo_tx(&quote_150());
    tx.fill_all_inputs(&KeyStore::from_wifs([DEMO_WIF]).unwrap()).unwrap();
    assert_eq!(tx.size(), 226);
    assert_eq!(tx.to_hex(), DEMO_SIGNED_150);
    assert_eq!(tx.tx_id_hex(), DEMO_TXID_150);
    assert_eq!(tx.fee_paid().unwrap(), 150);
}

#[test]
fn test_p2pkh_sign_exact_match() {
    let unsigned = "010000000193a35408b6068499e0d5abd799d3e827d9bfe70c9b75ebe209c91d25072326510000000000ffffffff02404b4c00000000001976a91404ff367be719efa79d76e4416ffb072cd53b208888acde94a905000000001976a91404d03f746652cfcb6cb55119ab473a045137d26588ac00000000";
    let expected = "010000000193a35408b6068499e0d5abd799d3e827d9bfe70c9b75ebe209c91d2507232651000000006b483045022100c1d77036dc6cd1f3fa1214b0688391ab7f7a16cd31ea4e5a1f7a415ef167df820220751aced6d24649fa235132f1e6969e163b9400f80043a72879237dab4a1190ad412103b8b40a84123121d260f5c109bc5a46ec819c2e4002e5ba08638783bfb4e01435ffffffff02404b4c00000000001976a91404ff367be719efa79d76e4416ffb072cd53b208888acde94a905000000001976a91404d03f746652cfcb6cb55119ab473a045137d26588ac00000000";
    let key = PrivateKey::from_wif("cNGwGSc7KRrTmdLUZ54fiSXWbhLNDc2Eg5zNucgQxyQCzuQ5YRDq").unwrap();
    let spent = TransactionOutput::new(
        100_000_000,
        Script::from_hex("76a914c0a3c167a28cabb9fbb495affa0761e6e74ac60d88ac").unwrap(),
    );

    let mut tx = Transaction::from_hex(unsigned).unwrap();
    tx.set_input_source_output(0, spent.clone()).unwrap();
    tx.fill_all_inputs(&key).unwrap();
    assert_eq!(tx.to_hex(), expected);

    // Same result through an explicit template.
    let mut tx = Transaction::from_hex(unsigned).unwrap();
    tx.set_input_source_output(0, spent).unwrap();
    tx.fill_input(0, &p2pkh::unlock(key, None)).unwrap();
    assert_eq!(tx.state(), TxState::Signed);
    assert_eq!(tx.to_hex(), expected);
}

#[test]
fn test_sign_multiple_inputs() {
    let key = demo_key();
    let other = PrivateKey::from_hex(
        "0000000000000000000000000000000000000000000000000000000000000001",
    )
    .unwrap();
    let other_script = Script::p2pkh(&other.pub_key().hash160());

    let mut tx = Transaction::new();
    tx.from(DEMO_TXID, 0, DEMO_PREV_SCRIPT, 1500).unwrap();
    tx.from(DEMO_TXID, 1, &other_script.to_hex(), 3498).unwrap();
    tx.pay_to_address(DEMO_ADDRESS, 4000).unwrap();
    tx.add_op_return_output(b"memo").unwrap();
    tx.change_to_address(DEMO_ADDRESS, &FeeQuote::default()).unwrap();

    let keys: KeyStore = vec![key, other].into_iter().collect();
    tx.fill_all_inputs(&keys).unwrap();
    assert_input_signature_valid(&tx, 0);
    assert_input_signature_valid(&tx, 1);
    assert_eq!(tx.size(), tx.estimate_size().unwrap());

    let reparsed = Transaction::from_bytes(&tx.to_bytes()).unwrap();
    assert_eq!(reparsed.state(), TxState::Signed);
    assert_eq!(reparsed, tx);
}

#[test]
fn test_signing_is_deterministic() {
    let mut a = demo_tx(&FeeQuote::default());
    let mut b = demo_tx(&FeeQuote::default());
    a.fill_all_inputs(&demo_key()).unwrap();
    b.fill_all_inputs(&demo_key()).unwrap();
    assert_eq!(a.to_bytes(), b.to_bytes());
    assert_eq!(a.tx_id(), b.tx_id());
}

#[test]
fn test_key_not_found_is_atomic() {
    let other = PrivateKey::new();
    let other_script = Script::p2pkh(&other.pub_key().hash160());

    let mut tx = Transaction::new();
    tx.from(DEMO_TXID, 0, DEMO_PREV_SCRIPT, 1500).unwrap();
    tx.from(DEMO_TXID, 1, &other_script.to_hex(), 1500).unwrap();
    tx.pay_to_address(DEMO_ADDRESS, 2000).unwrap();

    let err = tx.fill_all_inputs(&demo_key()).unwrap_err();
    match &err {
        TransactionError::KeyNotFound { index, public_key_hash } => {
            assert_eq!(*index, 1);
            assert_eq!(*public_key_hash, hex::encode(other.pub_key().hash160()));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(err.kind(), ErrorKind::Key);
    assert!(tx.inputs().iter().all(|i| !i.is_signed()));
    assert_eq!(tx.state(), TxState::Building);
}

#[test]
fn test_unsupported_script_type() {
    let mut tx = Transaction::new();
    tx.from(DEMO_TXID, 0, "006a0568656c6c6f", 1500).unwrap();
    assert!(matches!(
        tx.fill_all_inputs(&demo_key()),
        Err(TransactionError::UnsupportedScriptType { index: 0 })
    ));
}

#[test]
fn test_fill_all_inputs_needs_source_output() {
    let mut tx = Transaction::from_hex(DEMO_UNSIGNED_DEFAULT).unwrap();
    assert!(matches!(
        tx.fill_all_inputs(&demo_key()),
        Err(TransactionError::MissingSourceOutput { index: 0 })
    ));
}

#[test]
fn test_fill_input_out_of_range() {
    let mut tx = demo_tx(&FeeQuote::default());
    assert!(matches!(
        tx.fill_input(3, &p2pkh::unlock(demo_key(), None)),
        Err(TransactionError::InputIndexOutOfRange { index: 3, count: 1 })
    ));
}

#[test]
fn test_signed_transaction_is_frozen() {
    let quote = FeeQuote::default();
    let mut tx = demo_tx(&quote);
    tx.fill_all_inputs(&demo_key()).unwrap();
    let signed = tx.to_bytes();

    let finalized = |r: Result<(), TransactionError>| {
        matches!(r, Err(TransactionError::TransactionFinalized))
    };
    assert!(finalized(tx.pay_to_address(DEMO_ADDRESS, 1)));
    assert!(finalized(tx.add_op_return_output(b"late")));
    assert!(finalized(tx.from(DEMO_TXID, 5, DEMO_PREV_SCRIPT, 1)));
    assert!(finalized(tx.change_to_address(DEMO_ADDRESS, &quote)));
    assert!(finalized(tx.set_lock_time(10)));
    assert!(finalized(tx.set_version(2)));
    assert!(finalized(tx.fill_input(0, &p2pkh::unlock(demo_key(), None))));
    assert_eq!(tx.to_bytes(), signed);

    // Signing again is a no-op.
    tx.fill_all_inputs(&demo_key()).unwrap();
    assert_eq!(tx.to_bytes(), signed);
}

#[test]
fn test_spent_output_is_fixed_once_known() {
    let spent = TransactionOutput::new(1500, Script::from_hex(DEMO_PREV_SCRIPT).unwrap());

    let mut tx = Transaction::from_hex(DEMO_UNSIGNED_DEFAULT).unwrap();
    tx.set_input_source_output(0, spent.clone()).unwrap();
    let err = tx
        .set_input_source_output(0, TransactionOutput::new(9_999_999, spent.locking_script.clone()))
        .unwrap_err();
    assert!(matches!(err, TransactionError::InvalidState(_)));
    assert_eq!(tx.total_input_satoshis().unwrap(), 1500);

    tx.fill_all_inputs(&demo_key()).unwrap();
    assert_eq!(tx.to_hex(), DEMO_SIGNED_DEFAULT);

    // A signed transaction cannot swap what it claims to spend.
    let mut tx = demo_tx(&FeeQuote::default());
    tx.fill_all_inputs(&demo_key()).unwrap();
    assert!(matches!(
        tx.set_input_source_output(0, TransactionOutput::new(9_999_999, spent.locking_script)),
        Err(TransactionError::TransactionFinalized)
    ));
    assert_eq!(tx.state(), TxState::Signed);
    assert_eq!(tx.total_input_satoshis().unwrap(), 1500);
    assert_eq!(tx.fee_paid().unwrap(), 113);
}

#[test]
fn test_signing_rejects_outputs_above_inputs() {
    let mut tx = Transaction::new();
    tx.from(DEMO_TXID, 0, DEMO_PREV_SCRIPT, 1500).unwrap();
    tx.pay_to_address(DEMO_ADDRESS, 5000).unwrap();

    let err = tx.fill_all_inputs(&demo_key()).unwrap_err();
    assert!(matches!(
        err,
        TransactionError::InsufficientFunds { inputs: 1500, outputs: 5000 }
    ));
    assert_eq!(err.kind(), ErrorKind::Arithmetic);
    assert!(matches!(
        tx.fill_input(0, &p2pkh::unlock(demo_key(), None)),
        Err(TransactionError::InsufficientFunds { .. })
    ));
    assert!(!tx.inputs[0].is_signed());
    assert_eq!(tx.state(), TxState::Building);
}

#[test]
fn test_finalize() {
    let mut tx = demo_tx(&FeeQuote::default());
    let err = tx.finalize().unwrap_err();
    assert!(matches!(err, TransactionError::InvalidState(_)));
    assert_eq!(tx.state(), TxState::Funded);

    tx.fill_all_inputs(&demo_key()).unwrap();
    let bytes = tx.finalize().unwrap();
    assert_eq!(hex::encode(&bytes), DEMO_SIGNED_DEFAULT);
    assert_eq!(tx.state(), TxState::Serialized);
    assert_eq!(tx.finalize().unwrap(), bytes);
    assert!(matches!(
        tx.fill_all_inputs(&demo_key()),
        Err(TransactionError::TransactionFinalized)
    ));
}

#[test]
fn test_funded_demotes_on_modification() {
    let mut tx = demo_tx(&FeeQuote::default());
    assert_eq!(tx.state(), TxState::Funded);
    tx.add_op_return_output(b"x").unwrap();
    assert_eq!(tx.state(), TxState::Building);

    let mut tx = demo_tx(&FeeQuote::default());
    tx.from(DEMO_TXID, 1, DEMO_PREV_SCRIPT, 10).unwrap();
    assert_eq!(tx.state(), TxState::Building);
}

// -----------------------------------------------------------------------
// Lock time and version
// -----------------------------------------------------------------------

#[test]
fn test_lock_time_boundary() {
    assert_eq!(LockTime::from(LOCKTIME_THRESHOLD), LockTime::Timestamp(500_000_000));
    assert_eq!(LockTime::from(LOCKTIME_THRESHOLD - 1), LockTime::BlockHeight(499_999_999));

    let mut tx = Transaction::new();
    tx.set_lock_time(500_000_000).unwrap();
    assert_eq!(tx.lock(), LockTime::Timestamp(500_000_000));
    tx.set_lock_time(499_999_999).unwrap();
    assert_eq!(tx.lock(), LockTime::BlockHeight(499_999_999));
    assert_eq!(tx.lock().to_u32(), 499_999_999);
}

#[test]
fn test_lock_helpers_validate_range() {
    let mut tx = demo_inputs_and_payment();
    assert!(matches!(
        tx.lock_until_block_height(LOCKTIME_THRESHOLD),
        Err(TransactionError::InvalidLockTime(_))
    ));
    assert!(matches!(
        tx.lock_until_unix_time(LOCKTIME_THRESHOLD - 1),
        Err(TransactionError::InvalidLockTime(_))
    ));
    assert_eq!(tx.lock_time(), 0);
    assert_eq!(tx.inputs[0].sequence_number, DEFAULT_SEQUENCE_NUMBER);

    tx.lock_until_block_height(840_000).unwrap();
    assert_eq!(tx.lock(), LockTime::BlockHeight(840_000));
    tx.lock_until_unix_time(1_700_000_000).unwrap();
    assert_eq!(tx.lock(), LockTime::Timestamp(1_700_000_000));
}

#[test]
fn test_lock_time_makes_inputs_non_final() {
    let mut tx = demo_inputs_and_payment();
    tx.lock_until_block_height(840_000).unwrap();
    assert_eq!(tx.inputs[0].sequence_number, LOCKTIME_ENABLED_SEQUENCE_NUMBER);

    tx.from(DEMO_TXID, 1, DEMO_PREV_SCRIPT, 10).unwrap();
    assert_eq!(tx.inputs[1].sequence_number, LOCKTIME_ENABLED_SEQUENCE_NUMBER);

    let hex_str = tx.to_hex();
    assert!(hex_str.ends_with("40d10c00"));
    let parsed = Transaction::from_hex(&hex_str).unwrap();
    assert_eq!(parsed.lock(), LockTime::BlockHeight(840_000));
}

#[test]
fn test_clearing_lock_time_restores_final_sequences() {
    let mut tx = demo_inputs_and_payment();
    let mut pinned = TransactionInput::new(Hash::from_hex(DEMO_TXID).unwrap(), 2);
    pinned.sequence_number = LOCKTIME_ENABLED_SEQUENCE_NUMBER;
    tx.add_input(pinned).unwrap();

    tx.set_lock_time(840_000).unwrap();
    tx.from(DEMO_TXID, 1, DEMO_PREV_SCRIPT, 10).unwrap();
    assert!(tx
        .inputs()
        .iter()
        .all(|i| i.sequence_number == LOCKTIME_ENABLED_SEQUENCE_NUMBER));

    tx.set_lock_time(0).unwrap();
    assert_eq!(tx.inputs[0].sequence_number, DEFAULT_SEQUENCE_NUMBER);
    assert_eq!(tx.inputs[1].sequence_number, LOCKTIME_ENABLED_SEQUENCE_NUMBER);
    assert_eq!(tx.inputs[2].sequence_number, DEFAULT_SEQUENCE_NUMBER);

    // Round trip through a lock and back leaves the bytes as they were.
    let before = tx.to_bytes();
    tx.set_lock_time(7).unwrap();
    tx.set_lock_time(0).unwrap();
    assert_eq!(tx.to_bytes(), before);
}

#[test]
fn test_set_version() {
    let mut tx = Transaction::new();
    tx.set_version(2).unwrap();
    assert_eq!(tx.version(), 2);
    assert!(tx.to_hex().starts_with("02000000"));
}

// -----------------------------------------------------------------------
// Concurrency
// -----------------------------------------------------------------------

#[test]
fn test_signed_transaction_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Transaction>();

    let mut tx = demo_tx(&FeeQuote::default());
    tx.fill_all_inputs(&demo_key()).unwrap();
    let tx = &tx;
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4).map(|_| s.spawn(move || tx.tx_id_hex())).collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), DEMO_TXID_DEFAULT);
        }
    });
}
