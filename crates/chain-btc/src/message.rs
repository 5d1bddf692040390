//! Plain-text message signing used for custody approvals.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bitcoin::consensus::encode::{serialize, VarInt};
use bitcoin::hashes::{sha256d, Hash};

use crate::error::BtcError;
use crate::network::BtcNetwork;
use crate::signer::{parse_private_key, sign_digest, verify_signature_der};

/// `sha256d(varstr(prefix) || varstr(message))` with the chain's signed
/// message prefix.
pub fn hash_message_for_signature(message: &str, network: BtcNetwork) -> [u8; 32] {
    let prefix = network.params().message_prefix.as_bytes();
    let mut buf = serialize(&VarInt(prefix.len() as u64));
    buf.extend_from_slice(prefix);
    buf.extend(serialize(&VarInt(message.len() as u64)));
    buf.extend_from_slice(message.as_bytes());
    sha256d::Hash::hash(&buf).to_byte_array()
}

/// Sign a message, returning the DER signature as URL-safe unpadded base64.
pub fn sign_message(message: &str, private_key: &str, network: BtcNetwork) -> Result<String, BtcError> {
    let key = parse_private_key(private_key)?;
    let digest = hash_message_for_signature(message, network);
    Ok(URL_SAFE_NO_PAD.encode(sign_digest(digest, &key)))
}

/// Verify a base64url DER signature over a message.
pub fn verify_message(
    public_key: &str,
    message: &str,
    signature: &str,
    network: BtcNetwork,
) -> Result<(), BtcError> {
    let sig = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|e| BtcError::InvalidSignature(format!("invalid base64: {e}")))?;
    let digest = hash_message_for_signature(message, network);
    verify_signature_der(public_key, &digest, &sig)
}

/// Message signed by an owner to approve a newly proposed account.
pub fn approve_account_message(account_id: &str, address: &str) -> String {
    format!("APPROVE:{account_id}:{address}")
}

pub fn approve_transaction_message(transaction_id: &str, transaction_hash: &str) -> String {
    format!("APPROVE:{transaction_id}:{transaction_hash}")
}

pub fn revoke_transaction_message(transaction_id: &str, transaction_hash: &str) -> String {
    format!("REVOKE:{transaction_id}:{transaction_hash}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVATE_KEY: &str = "e66cdf44cb43927c3dd9288f5d3efb11f37fe68d791430c13a3a17492baa4724";
    const PUBLIC_KEY: &str = "031121149e5dff5a247144c7c3b37a5a8efe4c97bfa13e70db909ab3a1d465d31c";

    #[test]
    fn hello_crypto_signature() {
        let sig = sign_message("hello crypto", PRIVATE_KEY, BtcNetwork::Bitcoin).unwrap();
        assert_eq!(
            sig,
            "MEQCIDy5QeU_AjIMWZcZSA564scbrOipplGVjrSyh_xF-2qUAiAff7_Rb0MViZQe4sQ5_Aai0WMQiI40vqQ3RrU1FmlW9A"
        );
        verify_message(PUBLIC_KEY, "hello crypto", &sig, BtcNetwork::Bitcoin).unwrap();
    }

    #[test]
    fn long_message_uses_three_byte_length() {
        let message = "m".repeat(300);
        let prefix = BtcNetwork::Bitcoin.params().message_prefix.as_bytes();
        let mut buf = vec![prefix.len() as u8];
        buf.extend_from_slice(prefix);
        buf.extend([0xfd, 0x2c, 0x01]);
        buf.extend_from_slice(message.as_bytes());
        assert_eq!(
            hash_message_for_signature(&message, BtcNetwork::Bitcoin),
            sha256d::Hash::hash(&buf).to_byte_array()
        );
    }

    #[test]
    fn prefix_separates_chains() {
        let btc = hash_message_for_signature("hello crypto", BtcNetwork::Bitcoin);
        let ltc = hash_message_for_signature("hello crypto", BtcNetwork::Litecoin);
        assert_ne!(btc, ltc);

        let sig = sign_message("hello crypto", PRIVATE_KEY, BtcNetwork::Litecoin).unwrap();
        verify_message(PUBLIC_KEY, "hello crypto", &sig, BtcNetwork::Litecoin).unwrap();
        assert!(verify_message(PUBLIC_KEY, "hello crypto", &sig, BtcNetwork::Bitcoin).is_err());
    }

    #[test]
    fn account_approval_signature() {
        let message = approve_account_message(
            "8aef8130-aa9c-418a-871d-e920fed2f0e4",
            "bc1qd4qjpy8n3gksd56aqc9pz36tpy26ev2sq93xwkz3qjk64dra8ruq5p5hyv",
        );
        verify_message(
            "0339af9aed5542535f1c609d45847ddc56d0d469cb59a3bcddf6555e028e42457e",
            &message,
            "MEUCIQDpVx9JXZDNTp17E1LVBbD7BSkrNxw4V5Y00z0jsY2oDQIgKGk7RVIjO2NEvoLn5fotX7j4Kc4YdYI3ueq7GlmAWyc",
            BtcNetwork::Bitcoin,
        )
        .unwrap();
    }

    #[test]
    fn transaction_approval_signature() {
        let message = approve_transaction_message(
            "3ec57759-4bc9-4084-99f2-c712f1da31db",
            "eaac19b6879b99cfab35b6f7f52d421eebaf2256f7ec4b3cdde2c1240bbe63ff",
        );
        verify_message(
            "02b06814acd1b5993450c3732e4d8d5be8a19bf102461a5ccdfcc4926bed504b0a",
            &message,
            "MEQCIE5JQAc8yY6RtN1WXl4FpSSKT66ck1Vs397g-BoGPHVAAiByaZ5hviSmsN1wiWPUhyetsC4wqpPiYFOlplWfylzRVA",
            BtcNetwork::Bitcoin,
        )
        .unwrap();
    }

    #[test]
    fn revoke_message_differs_from_approval() {
        let approve = approve_transaction_message("id", "hash");
        let revoke = revoke_transaction_message("id", "hash");
        assert_eq!(revoke, "REVOKE:id:hash");
        assert_ne!(
            hash_message_for_signature(&approve, BtcNetwork::Bitcoin),
            hash_message_for_signature(&revoke, BtcNetwork::Bitcoin)
        );
    }

    #[test]
    fn wrong_message_fails_verification() {
        let sig = sign_message("hello crypto", PRIVATE_KEY, BtcNetwork::Bitcoin).unwrap();
        let err = verify_message(PUBLIC_KEY, "hello world", &sig, BtcNetwork::Bitcoin).unwrap_err();
        assert!(matches!(err, BtcError::SignatureMismatch(_)));
        assert!(verify_message(PUBLIC_KEY, "hello crypto", "***", BtcNetwork::Bitcoin).is_err());
    }
}
