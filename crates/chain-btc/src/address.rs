use bech32::{segwit, Fe32, Hrp};
use bitcoin::hashes::Hash;
use bitcoin::script::ScriptBuf;
use bitcoin::{
    PubkeyHash, ScriptHash, Sequence, WPubkeyHash, WScriptHash, WitnessProgram, WitnessVersion,
};

use crate::error::BtcError;
use crate::network::{BtcNetwork, NetworkParams};
use crate::script::{classify_script, InputRole};

/// Everything the assembler needs to spend one classified input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedInput {
    pub role: InputRole,
    /// Address of the output being spent.
    pub address: String,
    /// Locking script of the output being spent.
    pub script_pubkey: ScriptBuf,
    /// Script committed to by the witness sighash.
    pub witness_script: ScriptBuf,
    pub sequence: Sequence,
}

/// Classify an input script and derive its address, spend script and
/// sequence under the given network.
pub fn derive_input(
    script: &[u8],
    route_backup: bool,
    sequence: u32,
    params: &NetworkParams,
) -> Result<DerivedInput, BtcError> {
    let role = classify_script(script, route_backup)?;
    let derived = match role {
        InputRole::SingleKeySigner => {
            let hash = WPubkeyHash::hash(script);
            let script_pubkey = ScriptBuf::new_p2wpkh(&hash);
            DerivedInput {
                role,
                address: encode_witness_address(0, hash.as_byte_array(), params)?,
                witness_script: script_pubkey.clone(),
                script_pubkey,
                sequence: Sequence::MAX,
            }
        }
        InputRole::MultisigHolderSigner | InputRole::MultisigObserverSigner => {
            let hash = WScriptHash::hash(script);
            let sequence = match role {
                InputRole::MultisigObserverSigner => Sequence(sequence),
                _ => Sequence::MAX,
            };
            DerivedInput {
                role,
                address: encode_witness_address(0, hash.as_byte_array(), params)?,
                script_pubkey: ScriptBuf::new_p2wsh(&hash),
                witness_script: ScriptBuf::from_bytes(script.to_vec()),
                sequence,
            }
        }
    };
    if derived.sequence.0 == 0 {
        return Err(BtcError::InvalidSequence(sequence));
    }
    Ok(derived)
}

/// Encode a segwit witness program as a bech32/bech32m address.
pub fn encode_witness_address(
    version: u8,
    program: &[u8],
    params: &NetworkParams,
) -> Result<String, BtcError> {
    let hrp = Hrp::parse(params.bech32_hrp)
        .map_err(|e| BtcError::InvalidAddress(format!("bad hrp {}: {e}", params.bech32_hrp)))?;
    let version = Fe32::try_from(version)
        .map_err(|e| BtcError::InvalidAddress(format!("bad witness version {version}: {e}")))?;
    segwit::encode(hrp, version, program)
        .map_err(|e| BtcError::InvalidAddress(format!("failed to encode witness address: {e}")))
}

/// Encode a 20-byte hash as a base58check address with the given version byte.
pub fn encode_base58_address(prefix: u8, hash: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(prefix);
    payload.extend_from_slice(hash);
    bs58::encode(payload).with_check().into_string()
}

/// Decode a destination address under the chain's parameters and return the
/// script paying to it.
///
/// Supports P2PKH, P2SH, P2WPKH, P2WSH and P2TR.
pub fn address_to_script(address: &str, params: &NetworkParams) -> Result<ScriptBuf, BtcError> {
    match decode_address(address)? {
        DecodedAddress::Segwit {
            hrp,
            version,
            program,
        } => {
            if hrp != params.bech32_hrp {
                return Err(BtcError::InvalidAddress(format!(
                    "{address} is not a {} address",
                    params.name
                )));
            }
            witness_program_script(version, &program)
        }
        DecodedAddress::Base58 { prefix, hash } => {
            if prefix == params.pubkey_hash_prefix {
                Ok(ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(hash)))
            } else if prefix == params.script_hash_prefix {
                Ok(ScriptBuf::new_p2sh(&ScriptHash::from_byte_array(hash)))
            } else {
                Err(BtcError::InvalidAddress(format!(
                    "{address} has unknown version byte {prefix:#04x} for {}",
                    params.name
                )))
            }
        }
    }
}

/// Verify an address for a chain and return its spend script.
pub fn parse_address(address: &str, network: BtcNetwork) -> Result<ScriptBuf, BtcError> {
    address_to_script(address, network.params())
        .map_err(|e| BtcError::InvalidAddress(format!("{} address {address}: {e}", network)))
}

/// Validate an address string for the given network.
///
/// Returns `true` if the address is valid for the specified network,
/// `false` if it is well formed but belongs to a different network.
pub fn validate_address(address: &str, network: BtcNetwork) -> Result<bool, BtcError> {
    let params = network.params();
    Ok(match decode_address(address)? {
        DecodedAddress::Segwit { hrp, .. } => hrp == params.bech32_hrp,
        DecodedAddress::Base58 { prefix, .. } => {
            prefix == params.pubkey_hash_prefix || prefix == params.script_hash_prefix
        }
    })
}

enum DecodedAddress {
    Segwit {
        hrp: String,
        version: u8,
        program: Vec<u8>,
    },
    Base58 {
        prefix: u8,
        hash: [u8; 20],
    },
}

fn decode_address(address: &str) -> Result<DecodedAddress, BtcError> {
    if let Ok((hrp, version, program)) = segwit::decode(address) {
        return Ok(DecodedAddress::Segwit {
            hrp: hrp.to_lowercase(),
            version: version.to_u8(),
            program,
        });
    }

    let payload = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|e| BtcError::InvalidAddress(format!("failed to parse address {address}: {e}")))?;
    let (prefix, hash) = payload
        .split_first()
        .ok_or_else(|| BtcError::InvalidAddress(format!("empty address payload {address}")))?;
    let hash: [u8; 20] = hash.try_into().map_err(|_| {
        BtcError::InvalidAddress(format!(
            "{address} carries {} hash bytes, expected 20",
            hash.len()
        ))
    })?;
    Ok(DecodedAddress::Base58 {
        prefix: *prefix,
        hash,
    })
}

/// Spend script for a version 0 or taproot witness program.
fn witness_program_script(version: u8, program: &[u8]) -> Result<ScriptBuf, BtcError> {
    let len = program.len();
    let unsupported =
        || BtcError::InvalidAddress(format!("unsupported witness program v{version} with {len} bytes"));
    let version = WitnessVersion::try_from(version).map_err(|_| unsupported())?;
    let program = WitnessProgram::new(version, program).map_err(|_| unsupported())?;
    match version {
        WitnessVersion::V0 => {}
        WitnessVersion::V1 if program.is_p2tr() => {}
        _ => return Err(unsupported()),
    }
    Ok(ScriptBuf::new_witness_program(&program))
}
