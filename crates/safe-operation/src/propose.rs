//! Builders for the operations a client sends to open accounts and move funds.

use uuid::Uuid;

use crate::codec::Operation;
use crate::codes::{SafeAction, SafeChain};
use crate::error::OperationError;

/// Ask the custody network to open a multisig account.
///
/// Extra layout: `timelock (u16 BE) | threshold | owner count | owner ids`.
pub fn propose_account<S: AsRef<str>>(
    id: Uuid,
    public_key: &str,
    owners: &[S],
    threshold: u8,
    chain: SafeChain,
    time_lock: u16,
) -> Result<Operation, OperationError> {
    let kind = chain.action_code(SafeAction::ProposeAccount)?;
    let count = u8::try_from(owners.len()).map_err(|_| OperationError::TooManyOwners {
        count: owners.len(),
        max: u8::MAX as usize,
    })?;

    let mut extra = Vec::with_capacity(4 + owners.len() * 16);
    extra.extend_from_slice(&time_lock.to_be_bytes());
    extra.push(threshold);
    extra.push(count);
    for owner in owners {
        let owner = owner.as_ref();
        let uid = Uuid::parse_str(owner).map_err(|_| OperationError::InvalidUuid(owner.into()))?;
        extra.extend_from_slice(uid.as_bytes());
    }
    log::debug!(
        "propose account {id} on chain {} with {} owners, threshold {threshold}",
        chain.code(),
        owners.len()
    );

    Ok(Operation {
        id,
        kind,
        curve: chain.curve(),
        public: public_key.to_ascii_lowercase(),
        extra,
    })
}

/// Ask the account holder's safe to pay `destination`.
///
/// `head` names the request this transaction follows; an unparsable id
/// encodes as the nil uuid.
pub fn propose_transaction(
    id: Uuid,
    public_key: &str,
    typ: u8,
    head: &str,
    destination: &str,
    chain: SafeChain,
) -> Result<Operation, OperationError> {
    propose_with_tail(id, public_key, typ, head, destination.as_bytes(), chain)
}

/// Like [`propose_transaction`] but for a batch identified by `hash`.
pub fn propose_batch_transaction(
    id: Uuid,
    public_key: &str,
    typ: u8,
    head: &str,
    hash: &[u8],
    chain: SafeChain,
) -> Result<Operation, OperationError> {
    propose_with_tail(id, public_key, typ, head, hash, chain)
}

fn propose_with_tail(
    id: Uuid,
    public_key: &str,
    typ: u8,
    head: &str,
    tail: &[u8],
    chain: SafeChain,
) -> Result<Operation, OperationError> {
    let kind = chain.action_code(SafeAction::ProposeTransaction)?;
    let head = Uuid::parse_str(head).unwrap_or(Uuid::nil());

    let mut extra = Vec::with_capacity(17 + tail.len());
    extra.push(typ);
    extra.extend_from_slice(head.as_bytes());
    extra.extend_from_slice(tail);
    log::debug!("propose transaction {id} type {typ} after {head}");

    Ok(Operation {
        id,
        kind,
        curve: chain.curve(),
        public: public_key.to_ascii_lowercase(),
        extra,
    })
}
