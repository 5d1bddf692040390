use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use bitcoin::absolute::LockTime;
use bitcoin::consensus::serialize;
use bitcoin::script::{PushBytesBuf, ScriptBuf};
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, Transaction, TxIn, TxOut, Txid, Witness};

use crate::address::{address_to_script, derive_input, DerivedInput};
use crate::error::BtcError;
use crate::fee::{estimate_fee, estimate_virtual_size, FeeEstimate, MAX_PAYLOAD_SIZE, MAX_STANDARD_TX_WEIGHT};
use crate::network::{BtcNetwork, NetworkParams};
use crate::psbt::{InputMetadata, PartiallySignedTransaction, SIGHASH_TYPE};
use crate::standard::{check_transaction_sanity, check_transaction_standard, LOCK_TIME_THRESHOLD};
use crate::units::TIME_LOCK_MAXIMUM;
use crate::utxo::{Input, Output};

/// Inputs added to a transaction that all spend from one address.
#[derive(Debug, Clone, Default)]
pub struct InputSet {
    pub address: Option<String>,
    pub script_pubkey: Option<ScriptBuf>,
    pub total: u64,
    pub derived: Vec<DerivedInput>,
}

/// Append one input, returning how it was classified and derived.
pub fn add_input(tx: &mut Transaction, input: &Input, params: &NetworkParams) -> Result<DerivedInput, BtcError> {
    if input.satoshi == 0 {
        return Err(BtcError::InvalidInput(format!(
            "input {}:{} has zero value",
            input.transaction_hash, input.index
        )));
    }
    let txid = Txid::from_str(&input.transaction_hash).map_err(|e| {
        BtcError::InvalidInput(format!("invalid transaction hash {}: {e}", input.transaction_hash))
    })?;
    let derived = derive_input(&input.script, input.route_backup, input.sequence, params)?;
    tx.input.push(TxIn {
        previous_output: OutPoint::new(txid, input.index),
        script_sig: ScriptBuf::new(),
        sequence: derived.sequence,
        witness: Witness::default(),
    });
    Ok(derived)
}

/// Append all inputs, requiring them to share one spend address.
pub fn add_inputs(tx: &mut Transaction, inputs: &[Input], params: &NetworkParams) -> Result<InputSet, BtcError> {
    let mut set = InputSet::default();
    for input in inputs {
        let derived = add_input(tx, input, params)?;
        match &set.address {
            None => {
                set.address = Some(derived.address.clone());
                set.script_pubkey = Some(derived.script_pubkey.clone());
            }
            Some(address) if *address != derived.address => {
                log::warn!("input address {} differs from {address}", derived.address);
                return Err(BtcError::MixedInputAddress {
                    expected: address.clone(),
                    found: derived.address,
                });
            }
            Some(_) => {}
        }
        set.total = set
            .total
            .checked_add(input.satoshi)
            .ok_or_else(|| BtcError::InvalidInput("input total overflows".into()))?;
        set.derived.push(derived);
    }
    Ok(set)
}

/// Append a payment to `address`.
pub fn add_output(tx: &mut Transaction, address: &str, satoshi: u64, params: &NetworkParams) -> Result<(), BtcError> {
    let script_pubkey = address_to_script(address, params)?;
    tx.output.push(TxOut {
        value: Amount::from_sat(satoshi),
        script_pubkey,
    });
    Ok(())
}

fn add_outputs(tx: &mut Transaction, outputs: &[Output], params: &NetworkParams) -> Result<u64, BtcError> {
    let mut total: u64 = 0;
    for out in outputs {
        add_output(tx, &out.address, out.satoshi, params)?;
        total = total
            .checked_add(out.satoshi)
            .ok_or_else(|| BtcError::InvalidInput("output total overflows".into()))?;
    }
    Ok(total)
}

fn empty_transaction() -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: Vec::new(),
        output: Vec::new(),
    }
}

fn check_payload(payload: &[u8]) -> Result<(), BtcError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(BtcError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(())
}

fn change_address(set: &InputSet) -> Result<&str, BtcError> {
    set.address
        .as_deref()
        .ok_or_else(|| BtcError::TransactionBuildError("change without inputs".into()))
}

/// Check that `fee_inputs` can pay for the transaction spending
/// `main_inputs` to `outputs` at `fee_rate` sat/vbyte.
///
/// Fee inputs count toward the size estimate. Any non-zero change is
/// budgeted as an extra output.
pub fn estimate_transaction_fee(
    main_inputs: &[Input],
    fee_inputs: &[Input],
    outputs: &[Output],
    fee_rate: u64,
    payload: &[u8],
    network: BtcNetwork,
) -> Result<FeeEstimate, BtcError> {
    check_payload(payload)?;
    let params = network.params();
    let mut tx = empty_transaction();

    let main = add_inputs(&mut tx, main_inputs, params)?;
    let fee = add_inputs(&mut tx, fee_inputs, params)?;

    let output_total = add_outputs(&mut tx, outputs, params)?;
    if output_total > main.total {
        return Err(BtcError::InsufficientMain {
            input: main.total,
            output: output_total,
        });
    }
    let change = main.total - output_total;
    if change > 0 {
        add_output(&mut tx, change_address(&main)?, change, params)?;
    }

    let virtual_size = estimate_virtual_size(tx.input.len(), tx.output.len(), payload.len());
    let required = estimate_fee(virtual_size, fee_rate);
    log::debug!(
        "{network} fee estimate: {} inputs {} outputs {virtual_size} vbytes at {fee_rate} = {required}",
        tx.input.len(),
        tx.output.len()
    );
    if required > fee.total {
        return Err(BtcError::InsufficientFee {
            required,
            available: fee.total,
        });
    }
    Ok(FeeEstimate {
        virtual_size,
        fee: required,
        available: fee.total,
    })
}

/// Assemble the unsigned transaction spending `main_inputs` to `outputs`
/// and wrap it in a PSBT ready for signing.
///
/// Change above the chain's dust threshold returns to the common input
/// address. A non-empty `payload` is attached as a zero-value OP_RETURN.
pub fn build_partially_signed_transaction(
    main_inputs: &[Input],
    outputs: &[Output],
    payload: &[u8],
    network: BtcNetwork,
) -> Result<PartiallySignedTransaction, BtcError> {
    check_payload(payload)?;
    let params = network.params();
    let mut tx = empty_transaction();

    let main = add_inputs(&mut tx, main_inputs, params)?;
    let output_total = add_outputs(&mut tx, outputs, params)?;
    if output_total > main.total {
        return Err(BtcError::InsufficientMain {
            input: main.total,
            output: output_total,
        });
    }
    let change = main.total - output_total;
    if change > params.dust_threshold {
        add_output(&mut tx, change_address(&main)?, change, params)?;
    }

    let estimate = estimate_virtual_size(tx.input.len(), tx.output.len(), payload.len());
    if !payload.is_empty() {
        let push = PushBytesBuf::try_from(payload.to_vec()).map_err(|e| {
            BtcError::TransactionBuildError(format!("payload {}: {e}", hex::encode(payload)))
        })?;
        tx.output.push(TxOut {
            value: Amount::ZERO,
            script_pubkey: ScriptBuf::new_op_return(push),
        });
    }

    let actual = serialize(&tx).len();
    if actual > estimate {
        return Err(BtcError::EstimationExceeded { actual, estimate });
    }
    if estimate * 4 > MAX_STANDARD_TX_WEIGHT {
        return Err(BtcError::WeightExceeded {
            weight: estimate * 4,
            max: MAX_STANDARD_TX_WEIGHT,
        });
    }

    check_transaction_sanity(&tx)?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    check_transaction_standard(&tx, LOCK_TIME_THRESHOLD, (now + TIME_LOCK_MAXIMUM).as_secs())?;

    let script_pubkey = main
        .script_pubkey
        .ok_or_else(|| BtcError::TransactionBuildError("no main inputs".into()))?;
    let mut psbt = PartiallySignedTransaction::new(tx)?;
    for ((meta, input), derived) in psbt.inputs.iter_mut().zip(main_inputs).zip(&main.derived) {
        *meta = InputMetadata {
            witness_utxo: Some(TxOut {
                value: Amount::from_sat(input.satoshi),
                script_pubkey: script_pubkey.clone(),
            }),
            witness_script: Some(derived.witness_script.clone()),
            sighash_type: Some(SIGHASH_TYPE.to_u32()),
            ..InputMetadata::default()
        };
    }
    psbt.check_sanity()?;

    log::debug!(
        "{network} transaction {} built: {} inputs {} outputs change {change} estimate {estimate}",
        psbt.hash(),
        psbt.unsigned_tx.input.len(),
        psbt.unsigned_tx.output.len()
    );
    Ok(psbt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::BITCOIN;
    use bitcoin::Sequence;

    const WITNESS_SCRIPT_HEX: &str = "210208134c3bb3263598db7f28cb631b34f81d34bfdf3cee163da7c41b6434e92fadac7c2103e17978200e8961fc87358898db7b0d5686aa4f14935d418de9b533d14922a4b3ac937c8292632103c8f64e27a2f3ae961a57184841df19e7d8708ddbc998f0c5abc7197ead70931fad02b001b29268935287";
    const SINGLE_KEY_HEX: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const DESTINATION: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

    fn txid(n: u32) -> String {
        format!("{n:064x}")
    }

    fn multisig_input(n: u32, satoshi: u64) -> Input {
        Input::new(txid(n), 0, satoshi, hex::decode(WITNESS_SCRIPT_HEX).unwrap())
    }

    fn single_key_input(n: u32, satoshi: u64) -> Input {
        Input::new(txid(n), 1, satoshi, hex::decode(SINGLE_KEY_HEX).unwrap())
    }

    fn multisig_address() -> String {
        let script = hex::decode(WITNESS_SCRIPT_HEX).unwrap();
        derive_input(&script, false, 0, &BITCOIN).unwrap().address
    }

    #[test]
    fn build_with_change_and_payload() {
        let psbt = build_partially_signed_transaction(
            &[multisig_input(1, 100_000)],
            &[Output::new(DESTINATION, 10_000)],
            &[0xab; 16],
            BtcNetwork::Bitcoin,
        )
        .unwrap();

        let tx = &psbt.unsigned_tx;
        assert_eq!(tx.version, Version::TWO);
        assert_eq!(tx.output.len(), 3);
        assert_eq!(tx.output[0].value.to_sat(), 10_000);
        assert_eq!(tx.output[1].value.to_sat(), 90_000);
        assert!(tx.output[1].script_pubkey.is_p2wsh());
        assert!(tx.output[2].script_pubkey.is_op_return());
        assert_eq!(tx.output[2].value, Amount::ZERO);
        assert_eq!(tx.input[0].sequence, Sequence::MAX);
    }

    #[test]
    fn psbt_inputs_declare_common_address() {
        let psbt = build_partially_signed_transaction(
            &[multisig_input(1, 60_000), multisig_input(2, 40_000)],
            &[Output::new(DESTINATION, 10_000)],
            &[],
            BtcNetwork::Bitcoin,
        )
        .unwrap();
        assert_eq!(psbt.input_count(), 2);
        for (meta, value) in psbt.inputs.iter().zip([60_000u64, 40_000]) {
            let utxo = meta.witness_utxo.as_ref().unwrap();
            assert_eq!(utxo.value.to_sat(), value);
            assert_eq!(
                hex::encode(utxo.script_pubkey.as_bytes()),
                "00204a8f0888cc30695a20c71ae0d119f4c09743c0d03a7db52774d06c49a52d081a"
            );
            assert_eq!(meta.sighash_type, Some(0x81));
            assert_eq!(
                hex::encode(meta.witness_script.as_ref().unwrap().as_bytes()),
                WITNESS_SCRIPT_HEX
            );
        }
        assert_eq!(psbt.fee(), Some(0));
        let raw = psbt.marshal().unwrap();
        assert_eq!(PartiallySignedTransaction::parse(&raw).unwrap(), psbt);
    }

    #[test]
    fn change_equals_inputs_minus_outputs() {
        let psbt = build_partially_signed_transaction(
            &[multisig_input(1, 123_456)],
            &[Output::new(DESTINATION, 23_456), Output::new(multisig_address(), 50_000)],
            &[],
            BtcNetwork::Bitcoin,
        )
        .unwrap();
        let outputs = &psbt.unsigned_tx.output;
        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[2].value.to_sat(), 123_456 - 23_456 - 50_000);
    }

    #[test]
    fn dust_change_is_absorbed() {
        let psbt = build_partially_signed_transaction(
            &[multisig_input(1, 100_000)],
            &[Output::new(DESTINATION, 99_000)],
            &[],
            BtcNetwork::Bitcoin,
        )
        .unwrap();
        assert_eq!(psbt.unsigned_tx.output.len(), 1);
        assert_eq!(psbt.fee(), Some(1_000));
    }

    #[test]
    fn litecoin_dust_threshold_is_higher() {
        let script = hex::decode(WITNESS_SCRIPT_HEX).unwrap();
        let destination = derive_input(&script, false, 0, BtcNetwork::Litecoin.params())
            .unwrap()
            .address;
        let psbt = build_partially_signed_transaction(
            &[multisig_input(1, 100_000)],
            &[Output::new(destination, 95_000)],
            &[],
            BtcNetwork::Litecoin,
        )
        .unwrap();
        assert_eq!(psbt.unsigned_tx.output.len(), 1);
    }

    #[test]
    fn empty_outputs_send_everything_to_change() {
        let psbt = build_partially_signed_transaction(
            &[multisig_input(1, 100_000)],
            &[],
            &[],
            BtcNetwork::Bitcoin,
        )
        .unwrap();
        assert_eq!(psbt.unsigned_tx.output.len(), 1);
        assert_eq!(psbt.unsigned_tx.output[0].value.to_sat(), 100_000);
    }

    #[test]
    fn observer_route_keeps_sequence() {
        let input = multisig_input(1, 100_000).with_backup_route(4_320);
        let psbt = build_partially_signed_transaction(
            &[input],
            &[Output::new(DESTINATION, 10_000)],
            &[],
            BtcNetwork::Bitcoin,
        )
        .unwrap();
        assert_eq!(psbt.unsigned_tx.input[0].sequence, Sequence(4_320));
    }

    #[test]
    fn insufficient_main_reports_both_totals() {
        let err = build_partially_signed_transaction(
            &[multisig_input(1, 100_000)],
            &[Output::new(DESTINATION, 200_000)],
            &[],
            BtcNetwork::Bitcoin,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BtcError::InsufficientMain {
                input: 100_000,
                output: 200_000
            }
        ));
        assert!(err.is_insufficient_input());
    }

    #[test]
    fn no_inputs_is_insufficient() {
        let err = build_partially_signed_transaction(
            &[],
            &[Output::new(DESTINATION, 1)],
            &[],
            BtcNetwork::Bitcoin,
        )
        .unwrap_err();
        assert!(matches!(err, BtcError::InsufficientMain { input: 0, output: 1 }));
    }

    #[test]
    fn mixed_input_addresses_are_rejected() {
        let err = build_partially_signed_transaction(
            &[multisig_input(1, 100_000), single_key_input(2, 100_000)],
            &[Output::new(DESTINATION, 10_000)],
            &[],
            BtcNetwork::Bitcoin,
        )
        .unwrap_err();
        assert!(matches!(err, BtcError::MixedInputAddress { .. }));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let err = build_partially_signed_transaction(
            &[multisig_input(1, 100_000)],
            &[Output::new(DESTINATION, 10_000)],
            &[0; 65],
            BtcNetwork::Bitcoin,
        )
        .unwrap_err();
        assert!(matches!(err, BtcError::PayloadTooLarge { len: 65, max: 64 }));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let mut bad_hash = multisig_input(1, 100_000);
        bad_hash.transaction_hash = "xyz".into();
        let zero = multisig_input(2, 0);
        let short_script = Input::new(txid(3), 0, 1_000, vec![0x51; 40]);
        for input in [bad_hash, zero, short_script] {
            assert!(build_partially_signed_transaction(
                &[input],
                &[Output::new(DESTINATION, 10)],
                &[],
                BtcNetwork::Bitcoin,
            )
            .is_err());
        }
    }

    #[test]
    fn bad_destination_is_rejected() {
        let err = build_partially_signed_transaction(
            &[multisig_input(1, 100_000)],
            &[Output::new("ltc1qw508d6qejxtdg4y5r3zarvary0c5xw7kgmn4n9", 10_000)],
            &[],
            BtcNetwork::Bitcoin,
        )
        .unwrap_err();
        assert!(matches!(err, BtcError::InvalidAddress(_)));
    }

    #[test]
    fn serialized_size_above_estimate_is_rejected() {
        let outputs: Vec<Output> = (0..6).map(|_| Output::new(multisig_address(), 10_000)).collect();
        let err = build_partially_signed_transaction(
            &[multisig_input(1, 1_000_000)],
            &outputs,
            &[],
            BtcNetwork::Bitcoin,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BtcError::EstimationExceeded {
                actual: 352,
                estimate: 341
            }
        ));
    }

    #[test]
    fn weight_ceiling_is_enforced() {
        let inputs: Vec<Input> = (1..=1_000).map(|n| multisig_input(n, 1_000)).collect();
        let err = build_partially_signed_transaction(
            &inputs,
            &[Output::new(DESTINATION, 10_000)],
            &[],
            BtcNetwork::Bitcoin,
        )
        .unwrap_err();
        assert!(matches!(err, BtcError::WeightExceeded { max: 300_000, .. }));
    }

    #[test]
    fn fee_inputs_cover_estimate() {
        let estimate = estimate_transaction_fee(
            &[multisig_input(1, 100_000)],
            &[single_key_input(2, 5_000)],
            &[Output::new(DESTINATION, 10_000)],
            10,
            &[],
            BtcNetwork::Bitcoin,
        )
        .unwrap();
        // 2 inputs, destination and change: (40 + 600 + 384) / 4
        assert_eq!(estimate.virtual_size, 256);
        assert_eq!(estimate.fee, 2_560);
        assert_eq!(estimate.available, 5_000);
    }

    #[test]
    fn fee_shortfall_is_required_minus_available() {
        let err = estimate_transaction_fee(
            &[multisig_input(1, 100_000)],
            &[single_key_input(2, 1_000)],
            &[Output::new(DESTINATION, 10_000)],
            10,
            &[],
            BtcNetwork::Bitcoin,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BtcError::InsufficientFee {
                required: 2_560,
                available: 1_000
            }
        ));
        assert_eq!(err.shortfall(), 1_560);
    }

    #[test]
    fn fee_estimate_counts_payload() {
        let estimate = estimate_transaction_fee(
            &[multisig_input(1, 100_000)],
            &[single_key_input(2, 10_000)],
            &[Output::new(DESTINATION, 100_000)],
            1,
            &[7; 20],
            BtcNetwork::Bitcoin,
        )
        .unwrap();
        // no change: (40 + 600 + 256) / 4 + 20
        assert_eq!(estimate.virtual_size, 244);
    }

    #[test]
    fn fee_estimate_checks_main_funds_first() {
        let err = estimate_transaction_fee(
            &[multisig_input(1, 100)],
            &[single_key_input(2, 1_000_000)],
            &[Output::new(DESTINATION, 10_000)],
            1,
            &[],
            BtcNetwork::Bitcoin,
        )
        .unwrap_err();
        assert!(matches!(err, BtcError::InsufficientMain { .. }));
    }
}
