pub mod error;
pub mod types;

use chain_btc::{address, message, signer, transaction, Input, Output};
use error::SafeError;
use safe_operation::{propose, Operation};
use types::{
    parse_uuid, BuiltTransaction, Chain, FeeEstimateData, InputData, OperationData, OutputData,
};

uniffi::setup_scaffolding!();

// ─── Transactions ────────────────────────────────────────────────────
// UniFFI passes owned String/Vec<u8> across FFI, so every exported
// function takes owned arguments.

/// Build the unsigned PSBT spending `inputs` to `outputs`, with `payload`
/// attached as OP_RETURN when non-empty.
#[uniffi::export]
pub fn build_transaction(
    chain: Chain,
    inputs: Vec<InputData>,
    outputs: Vec<OutputData>,
    payload: Vec<u8>,
) -> Result<BuiltTransaction, SafeError> {
    let network = chain.btc_network()?;
    let inputs: Vec<Input> = inputs.into_iter().map(Input::from).collect();
    let outputs: Vec<Output> = outputs.into_iter().map(Output::from).collect();

    let psbt = transaction::build_partially_signed_transaction(&inputs, &outputs, &payload, network)?;
    Ok(BuiltTransaction {
        hash: psbt.hash(),
        raw: psbt.to_hex()?,
        fee: psbt.fee().unwrap_or_default(),
        input_count: psbt.input_count() as u32,
    })
}

/// Check that `fee_inputs` cover the network fee at `fee_rate` sat/vbyte.
#[uniffi::export]
pub fn estimate_transaction_fee(
    chain: Chain,
    main_inputs: Vec<InputData>,
    fee_inputs: Vec<InputData>,
    outputs: Vec<OutputData>,
    fee_rate: u64,
    payload: Vec<u8>,
) -> Result<FeeEstimateData, SafeError> {
    let network = chain.btc_network()?;
    let main: Vec<Input> = main_inputs.into_iter().map(Input::from).collect();
    let fee: Vec<Input> = fee_inputs.into_iter().map(Input::from).collect();
    let outputs: Vec<Output> = outputs.into_iter().map(Output::from).collect();

    let estimate =
        transaction::estimate_transaction_fee(&main, &fee, &outputs, fee_rate, &payload, network)?;
    Ok(FeeEstimateData {
        virtual_size: estimate.virtual_size as u64,
        fee: estimate.fee,
        available: estimate.available,
    })
}

/// Sign every input of a hex or base64url PSBT; returns the packet as hex.
#[uniffi::export]
pub fn sign_safe_transaction(
    chain: Chain,
    raw: String,
    private_key: String,
) -> Result<String, SafeError> {
    let network = chain.btc_network()?;
    Ok(signer::sign_transaction(&raw, &private_key, network)?)
}

#[uniffi::export]
pub fn check_transaction_partially_signed_by(raw: String, public_key: String) -> bool {
    signer::check_transaction_partially_signed_by(&raw, &public_key)
}

/// Decode `address` into the script it pays to.
#[uniffi::export]
pub fn parse_address_script(chain: Chain, address: String) -> Result<Vec<u8>, SafeError> {
    let network = chain.btc_network()?;
    Ok(address::parse_address(&address, network)?.into_bytes())
}

// ─── Messages ────────────────────────────────────────────────────────

#[uniffi::export]
pub fn sign_safe_message(
    chain: Chain,
    message: String,
    private_key: String,
) -> Result<String, SafeError> {
    let network = chain.btc_network()?;
    Ok(message::sign_message(&message, &private_key, network)?)
}

/// Whether `signature` is a valid signature of `message` by `public_key`.
/// A malformed public key is an error rather than `false`.
#[uniffi::export]
pub fn verify_safe_message(
    chain: Chain,
    public_key: String,
    message: String,
    signature: String,
) -> Result<bool, SafeError> {
    let network = chain.btc_network()?;
    signer::parse_public_key(&public_key)?;
    Ok(message::verify_message(&public_key, &message, &signature, network).is_ok())
}

/// Owner approval of a proposed account at `address`.
#[uniffi::export]
pub fn approve_safe_account(
    chain: Chain,
    account_id: String,
    address: String,
    private_key: String,
) -> Result<String, SafeError> {
    let msg = message::approve_account_message(&account_id, &address);
    sign_safe_message(chain, msg, private_key)
}

#[uniffi::export]
pub fn approve_safe_transaction(
    chain: Chain,
    transaction_id: String,
    transaction_hash: String,
    private_key: String,
) -> Result<String, SafeError> {
    let msg = message::approve_transaction_message(&transaction_id, &transaction_hash);
    sign_safe_message(chain, msg, private_key)
}

#[uniffi::export]
pub fn revoke_safe_transaction(
    chain: Chain,
    transaction_id: String,
    transaction_hash: String,
    private_key: String,
) -> Result<String, SafeError> {
    let msg = message::revoke_transaction_message(&transaction_id, &transaction_hash);
    sign_safe_message(chain, msg, private_key)
}

// ─── Operations ──────────────────────────────────────────────────────

/// Encode an operation as a base64url memo.
#[uniffi::export]
pub fn encode_operation(operation: OperationData) -> Result<String, SafeError> {
    let op = Operation::try_from(operation)?;
    Ok(op.encode_base64()?)
}

#[uniffi::export]
pub fn decode_operation(memo: String) -> Result<OperationData, SafeError> {
    Ok(Operation::decode_base64(&memo)?.into())
}

#[uniffi::export]
pub fn propose_safe_account(
    id: String,
    public_key: String,
    owners: Vec<String>,
    threshold: u8,
    chain: Chain,
    time_lock: u16,
) -> Result<OperationData, SafeError> {
    let op = propose::propose_account(
        parse_uuid(&id)?,
        &public_key,
        owners.as_slice(),
        threshold,
        chain.safe_chain(),
        time_lock,
    )?;
    Ok(op.into())
}

#[uniffi::export]
pub fn propose_safe_transaction(
    id: String,
    public_key: String,
    typ: u8,
    head: String,
    destination: String,
    chain: Chain,
) -> Result<OperationData, SafeError> {
    let op = propose::propose_transaction(
        parse_uuid(&id)?,
        &public_key,
        typ,
        &head,
        &destination,
        chain.safe_chain(),
    )?;
    Ok(op.into())
}

/// Memo routing a transfer to the Mixin app `app_id`.
#[uniffi::export]
pub fn encode_safe_mixin_extra(app_id: String, memo: String) -> Result<String, SafeError> {
    Ok(safe_operation::encode_mixin_extra(&app_id, &memo)?)
}
