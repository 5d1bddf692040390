use thiserror::Error;

/// Bitcoin-family chain operation errors.
#[derive(Debug, Error)]
pub enum BtcError {
    #[error("unsupported chain: {0}")]
    UnsupportedChain(u8),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unrecognized script shape: {0}")]
    InvalidScript(String),

    #[error("invalid sequence: {0}")]
    InvalidSequence(u32),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("mixed input address: {expected} {found}")]
    MixedInputAddress { expected: String, found: String },

    #[error("insufficient main: input {input} output {output}")]
    InsufficientMain { input: u64, output: u64 },

    #[error("insufficient fee: required {required} available {available}")]
    InsufficientFee { required: u64, available: u64 },

    #[error("payload too large: {len} > {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("transaction too large: serialized {actual} bytes exceeds estimate {estimate}")]
    EstimationExceeded { actual: usize, estimate: usize },

    #[error("transaction too large: weight {weight} exceeds {max}")]
    WeightExceeded { weight: usize, max: usize },

    #[error("transaction sanity check failed: {0}")]
    Sanity(String),

    #[error("transaction not standard: {0}")]
    NonStandard(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("psbt error: {0}")]
    Psbt(String),

    #[error("psbt round trip mismatch: {0}")]
    PsbtRoundTrip(String),

    #[error("missing partial signature for input {0}")]
    MissingPartialSignature(usize),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("signature verification failed: {0}")]
    SignatureMismatch(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("rpc error: {0}")]
    Rpc(String),
}

impl BtcError {
    /// Whether this error reports missing funds, so the caller can top up
    /// inputs and retry instead of rejecting the proposal.
    pub fn is_insufficient_input(&self) -> bool {
        matches!(
            self,
            BtcError::InsufficientMain { .. } | BtcError::InsufficientFee { .. }
        )
    }

    /// Amount missing from the fee inputs, zero for any other error.
    pub fn shortfall(&self) -> u64 {
        match self {
            BtcError::InsufficientFee {
                required,
                available,
            } => required.saturating_sub(*available),
            BtcError::InsufficientMain { input, output } => output.saturating_sub(*input),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unsupported_chain() {
        let err = BtcError::UnsupportedChain(42);
        assert_eq!(err.to_string(), "unsupported chain: 42");
    }

    #[test]
    fn display_insufficient_main_carries_both_totals() {
        let err = BtcError::InsufficientMain {
            input: 1_000,
            output: 5_000,
        };
        assert_eq!(err.to_string(), "insufficient main: input 1000 output 5000");
    }

    #[test]
    fn display_insufficient_fee() {
        let err = BtcError::InsufficientFee {
            required: 1_810,
            available: 1_000,
        };
        assert_eq!(
            err.to_string(),
            "insufficient fee: required 1810 available 1000"
        );
    }

    #[test]
    fn shortfall_for_fee_error() {
        let err = BtcError::InsufficientFee {
            required: 1_810,
            available: 1_000,
        };
        assert_eq!(err.shortfall(), 810);
        assert!(err.is_insufficient_input());
    }

    #[test]
    fn shortfall_for_other_errors_is_zero() {
        let err = BtcError::InvalidSequence(0);
        assert_eq!(err.shortfall(), 0);
        assert!(!err.is_insufficient_input());
    }

    #[test]
    fn display_estimation_exceeded() {
        let err = BtcError::EstimationExceeded {
            actual: 500,
            estimate: 437,
        };
        assert_eq!(
            err.to_string(),
            "transaction too large: serialized 500 bytes exceeds estimate 437"
        );
    }

    #[test]
    fn display_signing_error() {
        let err = BtcError::SigningError("sighash failed".into());
        assert_eq!(err.to_string(), "signing error: sighash failed");
    }

    #[test]
    fn error_trait_is_implemented() {
        let err: Box<dyn std::error::Error> = Box::new(BtcError::InvalidPrivateKey("test".into()));
        assert!(err.to_string().contains("test"));
    }

    #[test]
    fn debug_format_works() {
        let err = BtcError::MissingPartialSignature(3);
        let debug = format!("{:?}", err);
        assert!(debug.contains("MissingPartialSignature"));
    }
}
