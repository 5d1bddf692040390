//! JSON-RPC gateway to a Bitcoin or Litecoin node.
//!
//! The HTTP transport is supplied by the host through [`RpcTransport`]; this
//! module owns the request envelope, response decoding and the validation of
//! chain data before it is trusted as a spendable [`Output`].

use std::sync::atomic::{AtomicU64, Ordering};

use bitcoin::consensus::deserialize;
use bitcoin::{Amount, Transaction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::address::encode_witness_address;
use crate::error::BtcError;
use crate::network::BtcNetwork;
use crate::utxo::Output;

pub const SCRIPT_TYPE_WITNESS_KEY_HASH: &str = "witness_v0_keyhash";
pub const SCRIPT_TYPE_WITNESS_SCRIPT_HASH: &str = "witness_v0_scripthash";

/// Lowest fee rate ever returned by [`RpcClient::estimate_smart_fee`], in
/// sat/vbyte.
pub const MIN_FEE_RATE: u64 = 10;

/// Where and for which chain a client talks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    pub endpoint: String,
    pub network: BtcNetwork,
}

impl RpcConfig {
    pub fn new(endpoint: impl Into<String>, network: BtcNetwork) -> Self {
        Self {
            endpoint: endpoint.into(),
            network,
        }
    }
}

/// Posts a JSON body to an endpoint and returns the response body.
pub trait RpcTransport: Send + Sync {
    fn post(&self, endpoint: &str, body: &str) -> Result<String, BtcError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcScriptPubKey {
    #[serde(default)]
    pub hex: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub address: String,
    #[serde(rename = "addresses", default, skip_serializing_if = "Vec::is_empty")]
    pub legacy_addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcInput {
    #[serde(default)]
    pub coinbase: String,
    #[serde(default)]
    pub txid: String,
    #[serde(default)]
    pub vout: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcOutput {
    pub value: f64,
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: RpcScriptPubKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcTransaction {
    pub txid: String,
    #[serde(default)]
    pub vin: Vec<RpcInput>,
    #[serde(default)]
    pub vout: Vec<RpcOutput>,
    #[serde(default)]
    pub blockhash: String,
    #[serde(default)]
    pub hex: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcBlock {
    pub hash: String,
    pub height: u64,
    #[serde(default)]
    pub tx: Vec<String>,
    #[serde(default)]
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcBlockWithTransactions {
    pub hash: String,
    pub height: u64,
    #[serde(default)]
    pub tx: Vec<RpcTransaction>,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Value,
}

/// Client for one node endpoint.
pub struct RpcClient<T> {
    config: RpcConfig,
    transport: T,
    next_id: AtomicU64,
}

impl<T: RpcTransport> RpcClient<T> {
    pub fn new(config: RpcConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Issue one JSON-RPC 2.0 call and return its `result`.
    pub fn call(&self, method: &str, params: Value) -> Result<Value, BtcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        })
        .to_string();
        let rpc_error = |detail: String| {
            BtcError::Rpc(format!(
                "{} {method}({params}) => {detail}",
                self.config.endpoint
            ))
        };

        let raw = self
            .transport
            .post(&self.config.endpoint, &body)
            .map_err(|e| rpc_error(e.to_string()))?;
        let response: RpcResponse =
            serde_json::from_str(&raw).map_err(|e| rpc_error(format!("{e} ({raw})")))?;
        if !response.error.is_null() {
            return Err(rpc_error(response.error.to_string()));
        }
        Ok(response.result)
    }

    fn call_as<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R, BtcError> {
        let result = self.call(method, params)?;
        serde_json::from_value(result)
            .map_err(|e| BtcError::Rpc(format!("{method} returned unexpected result: {e}")))
    }

    pub fn get_transaction(&self, hash: &str) -> Result<RpcTransaction, BtcError> {
        let mut tx: RpcTransaction = self.call_as("getrawtransaction", json!([hash, 1]))?;
        self.fix_legacy_addresses(&mut tx);
        Ok(tx)
    }

    /// Fetch every mempool transaction, skipping those that vanish between
    /// listing and lookup.
    pub fn get_raw_mempool(&self) -> Result<Vec<RpcTransaction>, BtcError> {
        let ids: Vec<String> = self.call_as("getrawmempool", json!([]))?;
        let mut transactions = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_transaction(&id) {
                Ok(tx) => transactions.push(tx),
                Err(e) => log::warn!("mempool transaction {id} skipped: {e}"),
            }
        }
        Ok(transactions)
    }

    pub fn get_block(&self, hash: &str) -> Result<RpcBlock, BtcError> {
        self.call_as("getblock", json!([hash, 1]))
    }

    pub fn get_block_with_transactions(&self, hash: &str) -> Result<RpcBlockWithTransactions, BtcError> {
        let mut block: RpcBlockWithTransactions = self.call_as("getblock", json!([hash, 2]))?;
        for tx in &mut block.tx {
            self.fix_legacy_addresses(tx);
            tx.blockhash = hash.to_string();
        }
        Ok(block)
    }

    pub fn get_block_hash(&self, height: u64) -> Result<String, BtcError> {
        self.call_as("getblockhash", json!([height]))
    }

    pub fn get_block_height(&self) -> Result<u64, BtcError> {
        #[derive(Deserialize)]
        struct Info {
            blocks: u64,
        }
        let info: Info = self.call_as("getblockchaininfo", json!([]))?;
        Ok(info.blocks)
    }

    /// Next-block fee rate in sat/vbyte with a 10% margin, never below
    /// [`MIN_FEE_RATE`].
    pub fn estimate_smart_fee(&self) -> Result<u64, BtcError> {
        #[derive(Deserialize)]
        struct Fee {
            #[serde(default)]
            feerate: f64,
        }
        let fee: Fee = self.call_as("estimatesmartfee", json!([1]))?;
        if fee.feerate <= 0.0 || !fee.feerate.is_finite() {
            return Err(BtcError::Rpc(format!("estimatesmartfee returned {}", fee.feerate)));
        }
        let rate = (fee.feerate * 1.1 * 100_000_000.0 / 1024.0) as u64;
        Ok(rate.max(MIN_FEE_RATE))
    }

    pub fn send_raw_transaction(&self, raw: &str) -> Result<String, BtcError> {
        self.call_as("sendrawtransaction", json!([raw]))
    }

    /// Address that funded the first input, or the coinbase data.
    pub fn get_transaction_sender(&self, tx: &RpcTransaction) -> Result<String, BtcError> {
        let first = tx
            .vin
            .first()
            .ok_or_else(|| BtcError::Rpc(format!("transaction {} has no inputs", tx.txid)))?;
        if !first.coinbase.is_empty() {
            return Ok(first.coinbase.clone());
        }
        let prev = self.get_transaction(&first.txid)?;
        prev.vout
            .get(first.vout as usize)
            .map(|o| o.script_pub_key.address.clone())
            .ok_or_else(|| BtcError::Rpc(format!("{}:{} not found", first.txid, first.vout)))
    }

    /// Look up a witness output and check the node's decoded view against
    /// the raw transaction. Returns `None` when the output is missing, not a
    /// v0 witness output, or inconsistent.
    pub fn transaction_output(
        &self,
        hash: &str,
        index: u32,
    ) -> Result<Option<(RpcTransaction, Output)>, BtcError> {
        let tx = self.get_transaction(hash)?;
        let Some(out) = tx.vout.get(index as usize) else {
            return Ok(None);
        };
        let kind = out.script_pub_key.kind.as_str();
        if kind != SCRIPT_TYPE_WITNESS_SCRIPT_HASH && kind != SCRIPT_TYPE_WITNESS_KEY_HASH {
            return Ok(None);
        }
        if out.script_pub_key.address.is_empty() {
            return Ok(None);
        }
        let Ok(amount) = Amount::from_btc(out.value) else {
            return Ok(None);
        };

        let mut output = Output::new(out.script_pub_key.address.clone(), amount.to_sat());
        output.coinbase = tx.vin.first().is_some_and(|i| !i.coinbase.is_empty());
        if tx.blockhash.is_empty() {
            output.height = u64::MAX;
        } else {
            let block = self.get_block(&tx.blockhash)?;
            output.height = block.height;
            output.time = Some(block.time);
        }

        let raw = hex::decode(&tx.hex)
            .map_err(|e| BtcError::Rpc(format!("transaction {hash} hex: {e}")))?;
        let raw: Transaction = deserialize(&raw)
            .map_err(|e| BtcError::Rpc(format!("transaction {hash} decode: {e}")))?;
        if raw.compute_txid().to_string() != hash || raw.output.len() != tx.vout.len() {
            return Ok(None);
        }
        let raw_out = &raw.output[index as usize];
        if raw_out.value.to_sat() != output.satoshi {
            return Ok(None);
        }
        let script = raw_out.script_pubkey.as_bytes();
        if !(raw_out.script_pubkey.is_p2wpkh() || raw_out.script_pubkey.is_p2wsh()) {
            return Ok(None);
        }
        let address = encode_witness_address(0, &script[2..], self.config.network.params())?;
        if address != output.address {
            return Ok(None);
        }
        Ok(Some((tx, output)))
    }

    /// Older Litecoin nodes report addresses only in the legacy list.
    fn fix_legacy_addresses(&self, tx: &mut RpcTransaction) {
        if self.config.network != BtcNetwork::Litecoin {
            return;
        }
        for out in &mut tx.vout {
            if let [address] = out.script_pub_key.legacy_addresses.as_slice() {
                out.script_pub_key.address = address.clone();
            }
        }
    }
}
