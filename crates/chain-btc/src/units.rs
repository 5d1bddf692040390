use std::time::Duration;

use bitcoin::{Amount, Denomination};

use crate::error::BtcError;
use crate::network::{BtcNetwork, BITCOIN};

/// Shortest relative time lock on the observer recovery route.
pub const TIME_LOCK_MINIMUM: Duration = Duration::from_secs(60 * 60);

/// Longest relative time lock on the observer recovery route.
pub const TIME_LOCK_MAXIMUM: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Largest relative lock expressible in block units.
pub const MAX_SEQUENCE_BLOCKS: u32 = 0xffff;

/// Confirmations needed before a regular output is spendable.
pub const TRANSACTION_CONFIRMATIONS: u64 = 1;

/// Parse a decimal coin amount such as `"0.0015"` into satoshis.
pub fn parse_satoshi(amount: &str) -> Result<u64, BtcError> {
    Amount::from_str_in(amount.trim(), Denomination::Bitcoin)
        .map(Amount::to_sat)
        .map_err(|e| BtcError::InvalidInput(format!("invalid amount {amount}: {e}")))
}

/// Convert a relative time lock into a block-count sequence for the chain.
pub fn parse_sequence(lock: Duration, network: BtcNetwork) -> Result<u32, BtcError> {
    if lock < TIME_LOCK_MINIMUM || lock > TIME_LOCK_MAXIMUM {
        return Err(BtcError::InvalidInput(format!(
            "invalid lock {}s, expected between {}s and {}s",
            lock.as_secs(),
            TIME_LOCK_MINIMUM.as_secs(),
            TIME_LOCK_MAXIMUM.as_secs()
        )));
    }
    let blocks = lock.as_secs() / network.params().block_time.as_secs();
    Ok(blocks.min(MAX_SEQUENCE_BLOCKS as u64) as u32)
}

/// Whether an output with `confirmations` is final enough to spend.
pub fn check_finalization(confirmations: u64, coinbase: bool) -> bool {
    if confirmations >= BITCOIN.coinbase_maturity {
        return true;
    }
    !coinbase && confirmations >= TRANSACTION_CONFIRMATIONS
}
