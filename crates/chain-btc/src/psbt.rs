//! BIP174 partially signed transaction packets.
//!
//! The packet is kept as an owned composition of the unsigned transaction and
//! per-input metadata. Fields the custody flow does not interpret are carried
//! through as raw key/value pairs so that re-serialization is byte identical.
//!
//! Map entries are framed with the consensus varstr codec. The maps are not
//! held in a [`bitcoin::psbt::Psbt`]: custody peers store partial signatures
//! as bare DER without a sighash byte, which that type refuses to parse.
//! [`PartiallySignedTransaction::to_psbt`] converts whenever the packet fits.

use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bitcoin::consensus::{deserialize, serialize, Decodable};
use bitcoin::hashes::Hash;
use bitcoin::psbt::Psbt;
use bitcoin::script::ScriptBuf;
use bitcoin::secp256k1::PublicKey;
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{Transaction, TxOut};

use crate::error::BtcError;

pub const PSBT_MAGIC: [u8; 5] = [0x70, 0x73, 0x62, 0x74, 0xff];

/// Sighash flag committed to by every custody signature.
pub const SIGHASH_TYPE: EcdsaSighashType = EcdsaSighashType::AllPlusAnyoneCanPay;

const GLOBAL_UNSIGNED_TX: u8 = 0x00;
const IN_WITNESS_UTXO: u8 = 0x01;
const IN_PARTIAL_SIG: u8 = 0x02;
const IN_SIGHASH_TYPE: u8 = 0x03;
const IN_WITNESS_SCRIPT: u8 = 0x05;

type RawMap = BTreeMap<Vec<u8>, Vec<u8>>;

/// Metadata attached to one transaction input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputMetadata {
    /// Output being spent: value and locking script.
    pub witness_utxo: Option<TxOut>,
    pub witness_script: Option<ScriptBuf>,
    pub sighash_type: Option<u32>,
    /// Serialized public key to signature, DER with an optional sighash byte.
    pub partial_sigs: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Entries carried through untouched, keyed by full key.
    pub unknown: RawMap,
}

/// A BIP174 packet over one unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartiallySignedTransaction {
    pub unsigned_tx: Transaction,
    /// Global entries other than the unsigned transaction.
    pub global: RawMap,
    pub inputs: Vec<InputMetadata>,
    pub outputs: Vec<RawMap>,
}

impl PartiallySignedTransaction {
    /// Wrap an unsigned transaction with empty metadata.
    pub fn new(unsigned_tx: Transaction) -> Result<Self, BtcError> {
        check_unsigned(&unsigned_tx)?;
        Ok(Self {
            inputs: vec![InputMetadata::default(); unsigned_tx.input.len()],
            outputs: vec![RawMap::new(); unsigned_tx.output.len()],
            global: RawMap::new(),
            unsigned_tx,
        })
    }

    /// Txid of the unsigned transaction in display hex.
    pub fn hash(&self) -> String {
        self.unsigned_tx.compute_txid().to_string()
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Fee paid by the transaction, known only when every input declares the
    /// output it spends.
    pub fn fee(&self) -> Option<u64> {
        let mut input: u64 = 0;
        for meta in &self.inputs {
            input = input.checked_add(meta.witness_utxo.as_ref()?.value.to_sat())?;
        }
        let output = self
            .unsigned_tx
            .output
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.value.to_sat()))?;
        input.checked_sub(output)
    }

    pub fn partial_signature(&self, index: usize, public_key: &[u8]) -> Option<&[u8]> {
        self.inputs
            .get(index)?
            .partial_sigs
            .get(public_key)
            .map(Vec::as_slice)
    }

    /// Record a signature for an input, replacing any earlier one by the
    /// same key.
    pub fn insert_partial_signature(
        &mut self,
        index: usize,
        public_key: Vec<u8>,
        signature: Vec<u8>,
    ) -> Result<(), BtcError> {
        let meta = self
            .inputs
            .get_mut(index)
            .ok_or_else(|| BtcError::Psbt(format!("input {index} out of range")))?;
        meta.partial_sigs.insert(public_key, signature);
        Ok(())
    }

    /// Structural consistency of the packet.
    pub fn check_sanity(&self) -> Result<(), BtcError> {
        check_unsigned(&self.unsigned_tx)?;
        if self.inputs.len() != self.unsigned_tx.input.len() {
            return Err(BtcError::Psbt(format!(
                "{} input maps for {} inputs",
                self.inputs.len(),
                self.unsigned_tx.input.len()
            )));
        }
        if self.outputs.len() != self.unsigned_tx.output.len() {
            return Err(BtcError::Psbt(format!(
                "{} output maps for {} outputs",
                self.outputs.len(),
                self.unsigned_tx.output.len()
            )));
        }
        for (i, meta) in self.inputs.iter().enumerate() {
            if meta.witness_utxo.is_none() && meta.witness_script.is_some() {
                return Err(BtcError::Psbt(format!(
                    "input {i} has a witness script without a witness utxo"
                )));
            }
        }
        Ok(())
    }

    /// BIP143 digest of input `index` under [`SIGHASH_TYPE`].
    pub fn sighash(&self, index: usize) -> Result<[u8; 32], BtcError> {
        let meta = self
            .inputs
            .get(index)
            .ok_or_else(|| BtcError::Psbt(format!("input {index} out of range")))?;
        let utxo = meta
            .witness_utxo
            .as_ref()
            .ok_or_else(|| BtcError::Psbt(format!("input {index} missing witness utxo")))?;
        let script = meta
            .witness_script
            .as_ref()
            .ok_or_else(|| BtcError::Psbt(format!("input {index} missing witness script")))?;

        let mut cache = SighashCache::new(&self.unsigned_tx);
        let hash = if script.is_p2wpkh() {
            cache
                .p2wpkh_signature_hash(index, script, utxo.value, SIGHASH_TYPE)
                .map_err(|e| BtcError::SigningError(format!("p2wpkh sighash of input {index}: {e}")))?
        } else {
            cache
                .p2wsh_signature_hash(index, script, utxo.value, SIGHASH_TYPE)
                .map_err(|e| BtcError::SigningError(format!("p2wsh sighash of input {index}: {e}")))?
        };
        Ok(hash.to_byte_array())
    }

    /// BIP174 serialization. Entries within each map are ordered by key.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = PSBT_MAGIC.to_vec();

        let mut global = self.global.clone();
        global.insert(vec![GLOBAL_UNSIGNED_TX], serialize(&self.unsigned_tx));
        write_map(&global, &mut out);

        for meta in &self.inputs {
            write_map(&meta.to_raw(), &mut out);
        }
        for map in &self.outputs {
            write_map(map, &mut out);
        }
        out
    }

    /// Serialize and parse the bytes back, failing if the result differs.
    pub fn marshal(&self) -> Result<Vec<u8>, BtcError> {
        let raw = self.serialize();
        let reparsed = Self::parse(&raw)
            .map_err(|e| BtcError::PsbtRoundTrip(format!("serialized packet does not parse: {e}")))?;
        if reparsed.serialize() != raw {
            log::warn!("psbt {} does not reserialize identically", self.hash());
            return Err(BtcError::PsbtRoundTrip(format!(
                "packet {} reserializes differently",
                self.hash()
            )));
        }
        Ok(raw)
    }

    pub fn to_hex(&self) -> Result<String, BtcError> {
        self.marshal().map(hex::encode)
    }

    /// URL-safe unpadded base64 of the marshaled packet.
    pub fn to_base64(&self) -> Result<String, BtcError> {
        self.marshal().map(|raw| URL_SAFE_NO_PAD.encode(raw))
    }

    /// Parse raw BIP174 bytes.
    pub fn parse(raw: &[u8]) -> Result<Self, BtcError> {
        let mut r = raw
            .strip_prefix(&PSBT_MAGIC[..])
            .ok_or_else(|| BtcError::Psbt("missing psbt magic".into()))?;

        let mut global = read_map(&mut r)?;
        let tx_bytes = global
            .remove(&[GLOBAL_UNSIGNED_TX][..])
            .ok_or_else(|| BtcError::Psbt("missing unsigned transaction".into()))?;
        let unsigned_tx: Transaction = deserialize(&tx_bytes)
            .map_err(|e| BtcError::Psbt(format!("invalid unsigned transaction: {e}")))?;
        check_unsigned(&unsigned_tx)?;

        let mut inputs = Vec::with_capacity(unsigned_tx.input.len());
        for i in 0..unsigned_tx.input.len() {
            let map = read_map(&mut r)?;
            inputs.push(InputMetadata::from_raw(i, map)?);
        }
        let mut outputs = Vec::with_capacity(unsigned_tx.output.len());
        for _ in 0..unsigned_tx.output.len() {
            outputs.push(read_map(&mut r)?);
        }
        if !r.is_empty() {
            return Err(BtcError::Psbt(format!(
                "{} trailing bytes after packet",
                r.len()
            )));
        }

        Ok(Self {
            unsigned_tx,
            global,
            inputs,
            outputs,
        })
    }

    /// Parse a packet given as raw bytes, hex, or URL-safe unpadded base64,
    /// in that order of preference.
    pub fn decode(data: &[u8]) -> Result<Self, BtcError> {
        if data.starts_with(&PSBT_MAGIC) {
            return Self::parse(data);
        }
        let text = std::str::from_utf8(data)
            .map_err(|_| BtcError::Psbt("packet is neither binary nor text".into()))?
            .trim();
        if let Ok(raw) = hex::decode(text) {
            return Self::parse(&raw);
        }
        let raw = URL_SAFE_NO_PAD
            .decode(text)
            .map_err(|e| BtcError::Psbt(format!("packet is neither hex nor base64: {e}")))?;
        Self::parse(&raw)
    }

    /// The packet as a rust-bitcoin [`Psbt`]. Fails while any partial
    /// signature is bare DER.
    pub fn to_psbt(&self) -> Result<Psbt, BtcError> {
        Psbt::deserialize(&self.marshal()?)
            .map_err(|e| BtcError::Psbt(format!("packet {} is not a bitcoin psbt: {e}", self.hash())))
    }

    pub fn from_psbt(psbt: &Psbt) -> Result<Self, BtcError> {
        Self::parse(&psbt.serialize())
    }
}

impl InputMetadata {
    fn from_raw(index: usize, map: RawMap) -> Result<Self, BtcError> {
        let mut meta = InputMetadata::default();
        for (key, value) in map {
            match (key[0], key.len()) {
                (IN_WITNESS_UTXO, 1) => {
                    let utxo: TxOut = deserialize(&value).map_err(|e| {
                        BtcError::Psbt(format!("input {index} invalid witness utxo: {e}"))
                    })?;
                    meta.witness_utxo = Some(utxo);
                }
                (IN_PARTIAL_SIG, _) => {
                    let public_key = &key[1..];
                    PublicKey::from_slice(public_key).map_err(|e| {
                        BtcError::Psbt(format!("input {index} invalid partial sig key: {e}"))
                    })?;
                    if value.is_empty() {
                        return Err(BtcError::Psbt(format!(
                            "input {index} empty partial signature"
                        )));
                    }
                    meta.partial_sigs.insert(public_key.to_vec(), value);
                }
                (IN_SIGHASH_TYPE, 1) => {
                    let bytes: [u8; 4] = value.as_slice().try_into().map_err(|_| {
                        BtcError::Psbt(format!("input {index} sighash type is {} bytes", value.len()))
                    })?;
                    meta.sighash_type = Some(u32::from_le_bytes(bytes));
                }
                (IN_WITNESS_SCRIPT, 1) => {
                    meta.witness_script = Some(ScriptBuf::from_bytes(value));
                }
                (IN_WITNESS_UTXO | IN_SIGHASH_TYPE | IN_WITNESS_SCRIPT, _) => {
                    return Err(BtcError::Psbt(format!(
                        "input {index} key type {:#04x} carries key data",
                        key[0]
                    )));
                }
                _ => {
                    meta.unknown.insert(key, value);
                }
            }
        }
        Ok(meta)
    }

    fn to_raw(&self) -> RawMap {
        let mut map = self.unknown.clone();
        if let Some(utxo) = &self.witness_utxo {
            map.insert(vec![IN_WITNESS_UTXO], serialize(utxo));
        }
        for (public_key, signature) in &self.partial_sigs {
            let mut key = Vec::with_capacity(public_key.len() + 1);
            key.push(IN_PARTIAL_SIG);
            key.extend_from_slice(public_key);
            map.insert(key, signature.clone());
        }
        if let Some(sighash) = self.sighash_type {
            map.insert(vec![IN_SIGHASH_TYPE], sighash.to_le_bytes().to_vec());
        }
        if let Some(script) = &self.witness_script {
            map.insert(vec![IN_WITNESS_SCRIPT], script.to_bytes());
        }
        map
    }
}

fn check_unsigned(tx: &Transaction) -> Result<(), BtcError> {
    for (i, input) in tx.input.iter().enumerate() {
        if !input.script_sig.is_empty() || !input.witness.is_empty() {
            return Err(BtcError::Psbt(format!(
                "unsigned transaction input {i} carries a signature script or witness"
            )));
        }
    }
    Ok(())
}

fn read_map(r: &mut &[u8]) -> Result<RawMap, BtcError> {
    let mut map = RawMap::new();
    loop {
        let key = read_var_bytes(r)?;
        if key.is_empty() {
            return Ok(map);
        }
        let value = read_var_bytes(r)?;
        if map.contains_key(&key) {
            return Err(BtcError::Psbt(format!("duplicate key {}", hex::encode(&key))));
        }
        map.insert(key, value);
    }
}

fn read_var_bytes(r: &mut &[u8]) -> Result<Vec<u8>, BtcError> {
    Vec::<u8>::consensus_decode(r).map_err(|e| BtcError::Psbt(format!("invalid map entry: {e}")))
}

fn write_map(map: &RawMap, out: &mut Vec<u8>) {
    for (key, value) in map {
        out.extend(serialize(key));
        out.extend(serialize(value));
    }
    out.push(0x00);
}
