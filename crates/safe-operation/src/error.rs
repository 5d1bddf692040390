use thiserror::Error;

/// Operation encoding and decoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OperationError {
    #[error("{field} too large: {len} bytes exceeds {max}")]
    FieldTooLarge {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("truncated {field}: need {needed} bytes, {remaining} remaining")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("too many owners: {count} exceeds {max}")]
    TooManyOwners { count: usize, max: usize },

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid uuid: {0}")]
    InvalidUuid(String),

    #[error("invalid chain: {0}")]
    UnsupportedChain(u8),

    #[error("action {action} is not available on chain {chain}")]
    UnsupportedAction { action: &'static str, chain: u8 },

    #[error("invalid base64: {0}")]
    InvalidBase64(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_field_too_large() {
        let err = OperationError::FieldTooLarge {
            field: "extra",
            len: 201,
            max: 200,
        };
        assert_eq!(err.to_string(), "extra too large: 201 bytes exceeds 200");
    }

    #[test]
    fn display_truncated() {
        let err = OperationError::Truncated {
            field: "public key",
            needed: 33,
            remaining: 10,
        };
        assert_eq!(
            err.to_string(),
            "truncated public key: need 33 bytes, 10 remaining"
        );
    }

    #[test]
    fn display_unsupported_chain() {
        assert_eq!(
            OperationError::UnsupportedChain(3).to_string(),
            "invalid chain: 3"
        );
    }

    #[test]
    fn error_trait_is_implemented() {
        let err: Box<dyn std::error::Error> =
            Box::new(OperationError::InvalidUuid("nope".into()));
        assert!(err.to_string().contains("nope"));
    }
}
