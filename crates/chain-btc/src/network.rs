use std::time::Duration;

use crate::error::BtcError;

/// Safe chain identifier for Bitcoin.
pub const CHAIN_BITCOIN: u8 = 1;

/// Safe chain identifier for Litecoin.
pub const CHAIN_LITECOIN: u8 = 5;

/// Immutable per-chain parameters consulted at the start of every
/// chain-specific operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub chain_id: u8,
    pub name: &'static str,
    /// Base58 version byte of pay-to-pubkey-hash addresses.
    pub pubkey_hash_prefix: u8,
    /// Base58 version byte of pay-to-script-hash addresses.
    pub script_hash_prefix: u8,
    /// Human readable part of segwit addresses.
    pub bech32_hrp: &'static str,
    pub protocol_version: u32,
    /// Change at or below this value is absorbed as fee.
    pub dust_threshold: u64,
    pub block_time: Duration,
    /// Prefix hashed in front of signed plain-text messages.
    pub message_prefix: &'static str,
    pub coinbase_maturity: u64,
}

/// Bitcoin mainnet.
pub const BITCOIN: NetworkParams = NetworkParams {
    chain_id: CHAIN_BITCOIN,
    name: "bitcoin",
    pubkey_hash_prefix: 0x00,
    script_hash_prefix: 0x05,
    bech32_hrp: "bc",
    protocol_version: 70016,
    dust_threshold: 1_000,
    block_time: Duration::from_secs(600),
    message_prefix: "Bitcoin Signed Message:\n",
    coinbase_maturity: 100,
};

/// Litecoin mainnet.
pub const LITECOIN: NetworkParams = NetworkParams {
    chain_id: CHAIN_LITECOIN,
    name: "litecoin",
    pubkey_hash_prefix: 0x30,
    script_hash_prefix: 0x32,
    bech32_hrp: "ltc",
    protocol_version: 70015,
    dust_threshold: 10_000,
    block_time: Duration::from_secs(150),
    message_prefix: "Litecoin Signed Message:\n",
    coinbase_maturity: 100,
};

/// Look up the parameters of a chain by its Safe chain identifier.
pub fn network_params(chain_id: u8) -> Result<&'static NetworkParams, BtcError> {
    BtcNetwork::from_chain_id(chain_id).map(BtcNetwork::params)
}

/// Supported Bitcoin-family networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BtcNetwork {
    Bitcoin,
    Litecoin,
}

impl BtcNetwork {
    pub fn from_chain_id(chain_id: u8) -> Result<Self, BtcError> {
        match chain_id {
            CHAIN_BITCOIN => Ok(BtcNetwork::Bitcoin),
            CHAIN_LITECOIN => Ok(BtcNetwork::Litecoin),
            other => Err(BtcError::UnsupportedChain(other)),
        }
    }

    pub fn chain_id(self) -> u8 {
        self.params().chain_id
    }

    pub fn params(self) -> &'static NetworkParams {
        match self {
            BtcNetwork::Bitcoin => &BITCOIN,
            BtcNetwork::Litecoin => &LITECOIN,
        }
    }
}

impl std::fmt::Display for BtcNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.params().name)
    }
}
