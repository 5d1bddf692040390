use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use zeroize::Zeroizing;

use crate::error::BtcError;
use crate::network::BtcNetwork;
use crate::psbt::PartiallySignedTransaction;

/// Parse a hex-encoded 32-byte secp256k1 private key.
pub fn parse_private_key(private_key: &str) -> Result<SecretKey, BtcError> {
    let bytes = Zeroizing::new(
        hex::decode(private_key)
            .map_err(|e| BtcError::InvalidPrivateKey(format!("invalid hex: {e}")))?,
    );
    SecretKey::from_slice(&bytes)
        .map_err(|e| BtcError::InvalidPrivateKey(format!("invalid secret key: {e}")))
}

/// Parse a hex-encoded 33-byte compressed public key.
pub fn parse_public_key(public_key: &str) -> Result<PublicKey, BtcError> {
    let bytes = hex::decode(public_key)
        .map_err(|e| BtcError::InvalidPublicKey(format!("invalid hex: {e}")))?;
    if bytes.len() != 33 {
        return Err(BtcError::InvalidPublicKey(format!(
            "expected 33 compressed bytes, got {}",
            bytes.len()
        )));
    }
    PublicKey::from_slice(&bytes).map_err(|e| BtcError::InvalidPublicKey(e.to_string()))
}

/// Parse a DER signature, tolerating one trailing sighash byte.
pub fn parse_der_signature(signature: &[u8]) -> Result<Signature, BtcError> {
    let mut sig = match Signature::from_der(signature) {
        Ok(sig) => sig,
        Err(e) => match signature.split_last() {
            Some((_, der)) if !der.is_empty() => Signature::from_der(der)
                .map_err(|_| BtcError::InvalidSignature(format!("malformed DER: {e}")))?,
            _ => return Err(BtcError::InvalidSignature(format!("malformed DER: {e}"))),
        },
    };
    sig.normalize_s();
    Ok(sig)
}

/// Sign a 32-byte digest, returning the DER encoding.
pub fn sign_digest(digest: [u8; 32], key: &SecretKey) -> Vec<u8> {
    let secp = Secp256k1::signing_only();
    let msg = Message::from_digest(digest);
    secp.sign_ecdsa(&msg, key).serialize_der().to_vec()
}

/// Verify a DER signature over a 32-byte digest against a hex compressed
/// public key.
pub fn verify_signature_der(public_key: &str, hash: &[u8], signature: &[u8]) -> Result<(), BtcError> {
    let public_key = parse_public_key(public_key)?;
    verify_signature(&public_key, hash, signature)
}

pub fn verify_signature(public_key: &PublicKey, hash: &[u8], signature: &[u8]) -> Result<(), BtcError> {
    let msg = Message::from_digest_slice(hash)
        .map_err(|e| BtcError::InvalidSignature(format!("invalid digest: {e}")))?;
    let sig = parse_der_signature(signature)?;
    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(&msg, &sig, public_key).map_err(|_| {
        BtcError::SignatureMismatch(format!("{public_key} over {}", hex::encode(hash)))
    })
}

impl PartiallySignedTransaction {
    /// Sign every input with `key`, recording the bare DER signature under
    /// the compressed public key.
    pub fn sign(&mut self, key: &SecretKey) -> Result<(), BtcError> {
        let secp = Secp256k1::signing_only();
        let public_key = PublicKey::from_secret_key(&secp, key).serialize().to_vec();
        for index in 0..self.inputs.len() {
            let digest = self.sighash(index)?;
            let signature = sign_digest(digest, key);
            self.insert_partial_signature(index, public_key.clone(), signature)?;
        }
        log::debug!(
            "signed {} inputs of {} with {}",
            self.inputs.len(),
            self.hash(),
            hex::encode(&public_key)
        );
        Ok(())
    }

    /// Check that `public_key` left a valid signature on every input.
    pub fn verify_partial_signatures(&self, public_key: &PublicKey) -> Result<(), BtcError> {
        if self.inputs.is_empty() {
            return Err(BtcError::Psbt("packet has no inputs".into()));
        }
        let key = public_key.serialize();
        for index in 0..self.inputs.len() {
            let signature = self
                .partial_signature(index, &key)
                .ok_or(BtcError::MissingPartialSignature(index))?;
            let digest = self.sighash(index)?;
            verify_signature(public_key, &digest, signature)?;
        }
        Ok(())
    }

    pub fn partially_signed_by(&self, public_key: &PublicKey) -> bool {
        self.verify_partial_signatures(public_key).is_ok()
    }
}

/// Decode a packet from hex or URL-safe base64, sign all inputs and return
/// the marshaled packet as hex.
pub fn sign_transaction(raw: &str, private_key: &str, network: BtcNetwork) -> Result<String, BtcError> {
    let mut psbt = PartiallySignedTransaction::decode(raw.as_bytes())?;
    let key = parse_private_key(private_key)?;
    psbt.sign(&key)?;
    log::debug!("{network} transaction {} signed", psbt.hash());
    psbt.to_hex()
}

/// Whether the hex packet carries a verifying signature by `public_key` on
/// every input. Any decoding failure yields `false`.
pub fn check_transaction_partially_signed_by(raw: &str, public_key: &str) -> bool {
    let Ok(bytes) = hex::decode(raw) else {
        return false;
    };
    let Ok(psbt) = PartiallySignedTransaction::parse(&bytes) else {
        return false;
    };
    let Ok(public_key) = parse_public_key(public_key) else {
        return false;
    };
    psbt.partially_signed_by(&public_key)
}
