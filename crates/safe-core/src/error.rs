use chain_btc::BtcError;
use safe_operation::OperationError;
use thiserror::Error;

/// Errors raised across the FFI boundary.
#[derive(Debug, Error, uniffi::Error)]
pub enum SafeError {
    #[error("Unsupported chain: {reason}")]
    UnsupportedChain { reason: String },

    #[error("Invalid key: {reason}")]
    InvalidKey { reason: String },

    #[error("Invalid address: {reason}")]
    InvalidAddress { reason: String },

    /// Main or fee inputs do not cover the transaction.
    #[error("Insufficient funds: required {required} available {available} shortfall {shortfall}")]
    InsufficientFunds {
        required: u64,
        available: u64,
        shortfall: u64,
    },

    #[error("Transaction build failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Signing failed: {reason}")]
    SigningFailed { reason: String },

    #[error("Invalid operation: {reason}")]
    InvalidOperation { reason: String },
}

impl From<BtcError> for SafeError {
    fn from(e: BtcError) -> Self {
        let shortfall = e.shortfall();
        let reason = e.to_string();
        match e {
            BtcError::UnsupportedChain(_) => SafeError::UnsupportedChain { reason },
            BtcError::InvalidPrivateKey(_) | BtcError::InvalidPublicKey(_) => {
                SafeError::InvalidKey { reason }
            }
            BtcError::InvalidAddress(_) => SafeError::InvalidAddress { reason },
            BtcError::InvalidSignature(_)
            | BtcError::SignatureMismatch(_)
            | BtcError::SigningError(_)
            | BtcError::MissingPartialSignature(_) => SafeError::SigningFailed { reason },
            BtcError::InsufficientMain { input, output } => SafeError::InsufficientFunds {
                required: output,
                available: input,
                shortfall,
            },
            BtcError::InsufficientFee {
                required,
                available,
            } => SafeError::InsufficientFunds {
                required,
                available,
                shortfall,
            },
            _ => SafeError::TransactionFailed { reason },
        }
    }
}

impl From<OperationError> for SafeError {
    fn from(e: OperationError) -> Self {
        let reason = e.to_string();
        match e {
            OperationError::UnsupportedChain(_) => SafeError::UnsupportedChain { reason },
            _ => SafeError::InvalidOperation { reason },
        }
    }
}
