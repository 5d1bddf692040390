use chain_btc::{BtcNetwork, Input, Output};
use safe_operation::{Operation, SafeChain};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SafeError;

/// Chains a Safe account can live on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, uniffi::Enum)]
pub enum Chain {
    Bitcoin,
    Ethereum,
    Mvm,
    Litecoin,
    Polygon,
}

impl Chain {
    pub fn display_name(&self) -> &'static str {
        match self {
            Chain::Bitcoin => "Bitcoin",
            Chain::Ethereum => "Ethereum",
            Chain::Mvm => "Mixin Virtual Machine",
            Chain::Litecoin => "Litecoin",
            Chain::Polygon => "Polygon",
        }
    }

    /// Native token symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Chain::Bitcoin => "BTC",
            Chain::Ethereum | Chain::Mvm => "ETH",
            Chain::Litecoin => "LTC",
            Chain::Polygon => "MATIC",
        }
    }

    pub fn safe_chain(&self) -> SafeChain {
        match self {
            Chain::Bitcoin => SafeChain::Bitcoin,
            Chain::Ethereum => SafeChain::Ethereum,
            Chain::Mvm => SafeChain::Mvm,
            Chain::Litecoin => SafeChain::Litecoin,
            Chain::Polygon => SafeChain::Polygon,
        }
    }

    /// Bitcoin-family network for transaction and message work.
    pub fn btc_network(&self) -> Result<BtcNetwork, SafeError> {
        match self {
            Chain::Bitcoin => Ok(BtcNetwork::Bitcoin),
            Chain::Litecoin => Ok(BtcNetwork::Litecoin),
            other => Err(SafeError::UnsupportedChain {
                reason: other.display_name().into(),
            }),
        }
    }
}

/// Unspent output supplied by the host app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct InputData {
    pub transaction_hash: String,
    pub index: u32,
    pub satoshi: u64,
    /// Public key (33 bytes) or multisig witness script.
    pub script: Vec<u8>,
    pub sequence: u32,
    pub route_backup: bool,
}

impl From<InputData> for Input {
    fn from(data: InputData) -> Self {
        Input {
            transaction_hash: data.transaction_hash,
            index: data.index,
            satoshi: data.satoshi,
            script: data.script,
            sequence: data.sequence,
            route_backup: data.route_backup,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct OutputData {
    pub address: String,
    pub satoshi: u64,
}

impl From<OutputData> for Output {
    fn from(data: OutputData) -> Self {
        Output::new(data.address, data.satoshi)
    }
}

/// Unsigned transaction ready to hand to the signers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct BuiltTransaction {
    pub hash: String,
    /// PSBT as lowercase hex.
    pub raw: String,
    pub fee: u64,
    pub input_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct FeeEstimateData {
    pub virtual_size: u64,
    pub fee: u64,
    pub available: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct OperationData {
    pub id: String,
    pub kind: u8,
    pub curve: u8,
    pub public: String,
    pub extra: Vec<u8>,
}

impl From<Operation> for OperationData {
    fn from(op: Operation) -> Self {
        OperationData {
            id: op.id.to_string(),
            kind: op.kind,
            curve: op.curve,
            public: op.public,
            extra: op.extra,
        }
    }
}

impl TryFrom<OperationData> for Operation {
    type Error = SafeError;

    fn try_from(data: OperationData) -> Result<Self, Self::Error> {
        Ok(Operation {
            id: parse_uuid(&data.id)?,
            kind: data.kind,
            curve: data.curve,
            public: data.public,
            extra: data.extra,
        })
    }
}

pub(crate) fn parse_uuid(id: &str) -> Result<Uuid, SafeError> {
    Uuid::parse_str(id).map_err(|_| SafeError::InvalidOperation {
        reason: format!("invalid uuid {id}"),
    })
}
