use serde::{Deserialize, Serialize};

/// An output being spent by a custody transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    /// Previous transaction hash in display (big-endian) hex.
    pub transaction_hash: String,
    /// Output index within the previous transaction.
    pub index: u32,
    /// Value in satoshis.
    pub satoshi: u64,
    /// Compressed public key or multisig witness script.
    #[serde(with = "hex::serde")]
    pub script: Vec<u8>,
    /// Relative lock for the observer recovery route; ignored otherwise.
    pub sequence: u32,
    /// Spend through the time-locked observer branch.
    pub route_backup: bool,
}

impl Input {
    pub fn new(transaction_hash: impl Into<String>, index: u32, satoshi: u64, script: Vec<u8>) -> Self {
        Self {
            transaction_hash: transaction_hash.into(),
            index,
            satoshi,
            script,
            sequence: u32::MAX,
            route_backup: false,
        }
    }

    /// Mark this input for the observer recovery route with the given sequence.
    pub fn with_backup_route(mut self, sequence: u32) -> Self {
        self.route_backup = true;
        self.sequence = sequence;
        self
    }
}

/// A transaction output, either a payment destination or an output observed
/// on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub address: String,
    pub satoshi: u64,
    /// Confirmation height; `u64::MAX` while still in the mempool.
    #[serde(default)]
    pub height: u64,
    /// Block or mempool timestamp in unix seconds.
    #[serde(default)]
    pub time: Option<u64>,
    #[serde(default)]
    pub coinbase: bool,
}

impl Output {
    /// A payment destination.
    pub fn new(address: impl Into<String>, satoshi: u64) -> Self {
        Self {
            address: address.into(),
            satoshi,
            height: 0,
            time: None,
            coinbase: false,
        }
    }
}
