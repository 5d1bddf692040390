use crate::error::BtcError;

/// Length of a compressed secp256k1 public key.
pub const SINGLE_KEY_LENGTH: usize = 33;

/// Serialized multisig witness scripts are always longer than this.
pub const MULTISIG_SCRIPT_MIN_LENGTH: usize = 100;

/// Role an input plays in the custody scheme, derived from its script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputRole {
    /// Accountant key spending a P2WPKH output.
    SingleKeySigner,
    /// Holder and signer spending the P2WSH multisig immediately.
    MultisigHolderSigner,
    /// Observer and signer spending the P2WSH multisig through the
    /// time-locked recovery route.
    MultisigObserverSigner,
}

impl InputRole {
    pub fn is_multisig(self) -> bool {
        !matches!(self, InputRole::SingleKeySigner)
    }
}

/// Classify a key or witness script blob by its length.
///
/// The backup flag forces the observer role, but only for a blob that is a
/// multisig witness script.
pub fn classify_script(script: &[u8], route_backup: bool) -> Result<InputRole, BtcError> {
    let multisig = script.len() > MULTISIG_SCRIPT_MIN_LENGTH;
    match (script.len(), multisig, route_backup) {
        (_, true, true) => Ok(InputRole::MultisigObserverSigner),
        (_, true, false) => Ok(InputRole::MultisigHolderSigner),
        (SINGLE_KEY_LENGTH, false, false) => Ok(InputRole::SingleKeySigner),
        (len, _, backup) => Err(BtcError::InvalidScript(format!(
            "{} bytes (route backup {backup}): {}",
            len,
            hex::encode(script)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_key_is_single_key_signer() {
        let role = classify_script(&[0x02; 33], false).unwrap();
        assert_eq!(role, InputRole::SingleKeySigner);
        assert!(!role.is_multisig());
    }

    #[test]
    fn long_script_is_holder_signer() {
        let role = classify_script(&[0x51; 120], false).unwrap();
        assert_eq!(role, InputRole::MultisigHolderSigner);
    }

    #[test]
    fn backup_flag_forces_observer() {
        let role = classify_script(&[0x51; 120], true).unwrap();
        assert_eq!(role, InputRole::MultisigObserverSigner);
        assert!(role.is_multisig());
    }

    #[test]
    fn backup_flag_on_single_key_is_rejected() {
        let err = classify_script(&[0x02; 33], true).unwrap_err();
        assert!(matches!(err, BtcError::InvalidScript(_)));
    }

    #[test]
    fn boundary_length_is_rejected() {
        assert!(classify_script(&[0x51; 100], false).is_err());
        assert!(classify_script(&[0x51; 101], false).is_ok());
    }

    #[test]
    fn other_lengths_are_rejected() {
        for len in [0usize, 20, 32, 34, 65] {
            let err = classify_script(&vec![0x02; len], false).unwrap_err();
            assert!(err.to_string().contains("unrecognized script shape"));
        }
    }
}
