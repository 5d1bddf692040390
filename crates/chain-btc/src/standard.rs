//! Consensus sanity and relay standardness checks applied to every
//! assembled transaction before it is wrapped in a PSBT.

use std::collections::HashSet;

use bitcoin::opcodes::all::{OP_PUSHNUM_1, OP_PUSHNUM_16, OP_PUSHNUM_NEG1};
use bitcoin::script::{Instruction, Script};
use bitcoin::{OutPoint, Transaction, TxOut};

use crate::error::BtcError;

pub const MAX_SATOSHI: u64 = 21_000_000 * 100_000_000;

/// Largest non-witness serialization accepted by consensus.
pub const MAX_TRANSACTION_SIZE: usize = 1_000_000;

/// Relay policy weight limit.
pub const MAX_RELAY_TX_WEIGHT: u64 = 400_000;

/// Locktimes below this are block heights, above are unix timestamps.
pub const LOCK_TIME_THRESHOLD: u32 = 500_000_000;

/// Largest standard OP_RETURN script, opcode and pushes included.
pub const MAX_NULL_DATA_SCRIPT_SIZE: usize = 83;

const MAX_SCRIPT_SIG_SIZE: usize = 1_650;
const MAX_TX_VERSION: i32 = 2;

/// Context-free consensus checks.
pub fn check_transaction_sanity(tx: &Transaction) -> Result<(), BtcError> {
    if tx.input.is_empty() {
        return Err(BtcError::Sanity("transaction has no inputs".into()));
    }
    if tx.output.is_empty() {
        return Err(BtcError::Sanity("transaction has no outputs".into()));
    }

    let size = tx.base_size();
    if size > MAX_TRANSACTION_SIZE {
        return Err(BtcError::Sanity(format!(
            "serialized transaction is too big: {size} > {MAX_TRANSACTION_SIZE}"
        )));
    }

    let mut total: u64 = 0;
    for (i, out) in tx.output.iter().enumerate() {
        let value = out.value.to_sat();
        if value > MAX_SATOSHI {
            return Err(BtcError::Sanity(format!(
                "output {i} value {value} exceeds max {MAX_SATOSHI}"
            )));
        }
        total = total
            .checked_add(value)
            .filter(|t| *t <= MAX_SATOSHI)
            .ok_or_else(|| BtcError::Sanity("total output value exceeds max".into()))?;
    }

    let mut seen = HashSet::with_capacity(tx.input.len());
    for input in &tx.input {
        if !seen.insert(input.previous_output) {
            return Err(BtcError::Sanity(format!(
                "duplicate input {}",
                input.previous_output
            )));
        }
    }

    if tx.is_coinbase() {
        let len = tx.input[0].script_sig.len();
        if !(2..=100).contains(&len) {
            return Err(BtcError::Sanity(format!(
                "coinbase script length {len} out of range"
            )));
        }
    } else if tx.input.iter().any(|i| i.previous_output == OutPoint::null()) {
        return Err(BtcError::Sanity("input references a null outpoint".into()));
    }

    Ok(())
}

/// Relay policy checks.
///
/// `block_height` and `median_time_past` define finality of the locktime.
pub fn check_transaction_standard(
    tx: &Transaction,
    block_height: u32,
    median_time_past: u64,
) -> Result<(), BtcError> {
    let version = tx.version.0;
    if !(1..=MAX_TX_VERSION).contains(&version) {
        return Err(BtcError::NonStandard(format!(
            "transaction version {version} is not in the valid range of 1-{MAX_TX_VERSION}"
        )));
    }

    if !is_finalized(tx, block_height, median_time_past) {
        return Err(BtcError::NonStandard("transaction is not finalized".into()));
    }

    let weight = tx.weight().to_wu();
    if weight > MAX_RELAY_TX_WEIGHT {
        return Err(BtcError::NonStandard(format!(
            "weight of transaction {weight} is larger than max allowed weight of {MAX_RELAY_TX_WEIGHT}"
        )));
    }

    for (i, input) in tx.input.iter().enumerate() {
        let len = input.script_sig.len();
        if len > MAX_SCRIPT_SIG_SIZE {
            return Err(BtcError::NonStandard(format!(
                "input {i} signature script size {len} is larger than max allowed size {MAX_SCRIPT_SIG_SIZE}"
            )));
        }
        if !is_push_only(&input.script_sig) {
            return Err(BtcError::NonStandard(format!(
                "input {i} signature script is not push only"
            )));
        }
    }

    let mut null_data = 0;
    for (i, out) in tx.output.iter().enumerate() {
        let script = out.script_pubkey.as_script();
        if is_null_data(script) {
            null_data += 1;
            continue;
        }
        if !is_standard_script(script) {
            return Err(BtcError::NonStandard(format!(
                "output {i} has non-standard script {}",
                hex::encode(script.as_bytes())
            )));
        }
        if is_dust(out) {
            return Err(BtcError::NonStandard(format!(
                "output {i} payment of {} is dust",
                out.value.to_sat()
            )));
        }
    }
    if null_data > 1 {
        return Err(BtcError::NonStandard(
            "more than one transaction output in a nulldata script".into(),
        ));
    }

    Ok(())
}

fn is_finalized(tx: &Transaction, block_height: u32, median_time_past: u64) -> bool {
    let lock_time = tx.lock_time.to_consensus_u32();
    if lock_time == 0 {
        return true;
    }
    let threshold = if lock_time < LOCK_TIME_THRESHOLD {
        block_height as u64
    } else {
        median_time_past
    };
    if (lock_time as u64) < threshold {
        return true;
    }
    tx.input.iter().all(|i| i.sequence.is_final())
}

/// Relay dust rule at the default 1000 sat/kB minimum relay fee: the value
/// must cover three times the cost of creating and later spending the output.
pub fn dust_limit(out: &TxOut) -> u64 {
    let mut spend_size = bitcoin::consensus::serialize(out).len() + 41;
    if out.script_pubkey.is_witness_program() {
        spend_size += 107 / 4;
    } else {
        spend_size += 107;
    }
    3 * spend_size as u64
}

fn is_dust(out: &TxOut) -> bool {
    out.value.to_sat() < dust_limit(out)
}

fn is_standard_script(script: &Script) -> bool {
    script.is_p2pkh()
        || script.is_p2sh()
        || script.is_p2wpkh()
        || script.is_p2wsh()
        || script.is_p2tr()
}

fn is_null_data(script: &Script) -> bool {
    if !script.is_op_return() || script.len() > MAX_NULL_DATA_SCRIPT_SIZE {
        return false;
    }
    let tail = Script::from_bytes(&script.as_bytes()[1..]);
    is_push_only(tail)
}

fn is_push_only(script: &Script) -> bool {
    script.instructions().all(|ins| match ins {
        Ok(Instruction::PushBytes(_)) => true,
        Ok(Instruction::Op(op)) => {
            let code = op.to_u8();
            code == OP_PUSHNUM_NEG1.to_u8()
                || (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8()).contains(&code)
        }
        Err(_) => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::hashes::Hash;
    use bitcoin::script::{PushBytesBuf, ScriptBuf};
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, Sequence, TxIn, Txid, WPubkeyHash, Witness};

    fn input(n: u8) -> TxIn {
        TxIn {
            previous_output: OutPoint::new(Txid::from_byte_array([n; 32]), 0),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::default(),
        }
    }

    fn p2wpkh(value: u64) -> TxOut {
        TxOut {
            value: Amount::from_sat(value),
            script_pubkey: ScriptBuf::new_p2wpkh(&WPubkeyHash::from_byte_array([7; 20])),
        }
    }

    fn op_return(data: &[u8]) -> TxOut {
        let push = PushBytesBuf::try_from(data.to_vec()).unwrap();
        TxOut {
            value: Amount::ZERO,
            script_pubkey: ScriptBuf::new_op_return(push),
        }
    }

    fn tx(inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: inputs,
            output: outputs,
        }
    }

    fn check(tx: &Transaction) -> Result<(), BtcError> {
        check_transaction_sanity(tx)?;
        check_transaction_standard(tx, LOCK_TIME_THRESHOLD, 2_000_000_000)
    }

    #[test]
    fn plain_transfer_passes() {
        let t = tx(vec![input(1)], vec![p2wpkh(10_000), op_return(&[1; 16])]);
        check(&t).unwrap();
    }

    #[test]
    fn empty_inputs_or_outputs_fail_sanity() {
        assert!(matches!(
            check_transaction_sanity(&tx(vec![], vec![p2wpkh(10_000)])),
            Err(BtcError::Sanity(_))
        ));
        assert!(matches!(
            check_transaction_sanity(&tx(vec![input(1)], vec![])),
            Err(BtcError::Sanity(_))
        ));
    }

    #[test]
    fn duplicate_inputs_fail_sanity() {
        let t = tx(vec![input(1), input(1)], vec![p2wpkh(10_000)]);
        let err = check_transaction_sanity(&t).unwrap_err();
        assert!(err.to_string().contains("duplicate input"));
    }

    #[test]
    fn excessive_value_fails_sanity() {
        let t = tx(vec![input(1)], vec![p2wpkh(MAX_SATOSHI), p2wpkh(1)]);
        assert!(check_transaction_sanity(&t).is_err());
    }

    #[test]
    fn dust_output_is_not_standard() {
        assert_eq!(dust_limit(&p2wpkh(0)), 294);
        let t = tx(vec![input(1)], vec![p2wpkh(293)]);
        assert!(matches!(check(&t), Err(BtcError::NonStandard(_))));
        let t = tx(vec![input(1)], vec![p2wpkh(294)]);
        check(&t).unwrap();
    }

    #[test]
    fn p2pkh_dust_limit() {
        let out = TxOut {
            value: Amount::ZERO,
            script_pubkey: ScriptBuf::new_p2pkh(&bitcoin::PubkeyHash::from_byte_array([1; 20])),
        };
        assert_eq!(dust_limit(&out), 546);
    }

    #[test]
    fn two_null_data_outputs_are_not_standard() {
        let t = tx(
            vec![input(1)],
            vec![p2wpkh(10_000), op_return(b"a"), op_return(b"b")],
        );
        let err = check(&t).unwrap_err();
        assert!(err.to_string().contains("nulldata"));
    }

    #[test]
    fn oversized_null_data_is_not_standard() {
        let t = tx(vec![input(1)], vec![p2wpkh(10_000), op_return(&[0; 81])]);
        assert!(matches!(check(&t), Err(BtcError::NonStandard(_))));
    }

    #[test]
    fn version_three_is_not_standard() {
        let mut t = tx(vec![input(1)], vec![p2wpkh(10_000)]);
        t.version = Version(3);
        assert!(matches!(check(&t), Err(BtcError::NonStandard(_))));
    }

    #[test]
    fn future_time_lock_is_not_final() {
        let mut t = tx(vec![input(1)], vec![p2wpkh(10_000)]);
        t.lock_time = LockTime::from_consensus(2_100_000_000);
        t.input[0].sequence = Sequence(10);
        assert!(check(&t).is_err());

        t.input[0].sequence = Sequence::MAX;
        check(&t).unwrap();
    }
}
