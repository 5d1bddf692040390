use crate::error::OperationError;

pub const BITCOIN_ASSET_ID: &str = "c6d0c728-2624-429b-8e0d-d9d19b6592fa";
pub const PUSD_ASSET_ID: &str = "31d2ea9c-95eb-3355-b65b-ba096853bc18";

pub const OPERATION_TYPE_WRAPPER: u8 = 0;
pub const OPERATION_TYPE_KEYGEN_INPUT: u8 = 1;
pub const OPERATION_TYPE_SIGN_INPUT: u8 = 2;
pub const OPERATION_TYPE_KEYGEN_OUTPUT: u8 = 11;
pub const OPERATION_TYPE_SIGN_OUTPUT: u8 = 12;

pub const CURVE_SECP256K1_ECDSA_BITCOIN: u8 = 1;
pub const CURVE_SECP256K1_ECDSA_ETHEREUM: u8 = 2;
pub const CURVE_SECP256K1_SCHNORR_BITCOIN: u8 = 3;
pub const CURVE_EDWARDS25519_DEFAULT: u8 = 11;
pub const CURVE_EDWARDS25519_MIXIN: u8 = 12;
pub const CURVE_SECP256K1_ECDSA_LITECOIN: u8 = 100 + CURVE_SECP256K1_ECDSA_BITCOIN;
pub const CURVE_SECP256K1_ECDSA_MVM: u8 = 100 + CURVE_SECP256K1_ECDSA_ETHEREUM;
pub const CURVE_SECP256K1_ECDSA_POLYGON: u8 = 110 + CURVE_SECP256K1_ECDSA_ETHEREUM;

/// Action codes for all Bitcoin-like chains start here.
pub const ACTION_BITCOIN_SAFE_BASE: u8 = 110;

/// Action codes for all Ethereum-like chains start here.
pub const ACTION_ETHEREUM_SAFE_BASE: u8 = 130;

pub const TRANSACTION_TYPE_NORMAL: u8 = 0;
pub const TRANSACTION_TYPE_RECOVERY: u8 = 1;

/// A chain the custody network manages accounts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SafeChain {
    Bitcoin,
    Ethereum,
    Mvm,
    Litecoin,
    Polygon,
}

impl SafeChain {
    pub fn from_code(code: u8) -> Result<Self, OperationError> {
        match code {
            1 => Ok(SafeChain::Bitcoin),
            2 => Ok(SafeChain::Ethereum),
            4 => Ok(SafeChain::Mvm),
            5 => Ok(SafeChain::Litecoin),
            6 => Ok(SafeChain::Polygon),
            other => Err(OperationError::UnsupportedChain(other)),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            SafeChain::Bitcoin => 1,
            SafeChain::Ethereum => 2,
            SafeChain::Mvm => 4,
            SafeChain::Litecoin => 5,
            SafeChain::Polygon => 6,
        }
    }

    /// Signing curve of the chain's custody keys.
    pub fn curve(self) -> u8 {
        match self {
            SafeChain::Bitcoin => CURVE_SECP256K1_ECDSA_BITCOIN,
            SafeChain::Litecoin => CURVE_SECP256K1_ECDSA_LITECOIN,
            SafeChain::Ethereum => CURVE_SECP256K1_ECDSA_ETHEREUM,
            SafeChain::Mvm => CURVE_SECP256K1_ECDSA_MVM,
            SafeChain::Polygon => CURVE_SECP256K1_ECDSA_POLYGON,
        }
    }

    pub fn is_bitcoin_family(self) -> bool {
        matches!(self, SafeChain::Bitcoin | SafeChain::Litecoin)
    }

    /// Operation type code of `action` on this chain.
    pub fn action_code(self, action: SafeAction) -> Result<u8, OperationError> {
        let offset = match action {
            SafeAction::ProposeAccount => 0,
            SafeAction::ApproveAccount => 1,
            SafeAction::ProposeTransaction => 2,
            SafeAction::ApproveTransaction => 3,
            SafeAction::RevokeTransaction => 4,
            SafeAction::CloseAccount => 5,
            SafeAction::RefundTransaction => 6,
        };
        if self.is_bitcoin_family() {
            if action == SafeAction::RefundTransaction {
                return Err(OperationError::UnsupportedAction {
                    action: action.name(),
                    chain: self.code(),
                });
            }
            Ok(ACTION_BITCOIN_SAFE_BASE + offset)
        } else {
            Ok(ACTION_ETHEREUM_SAFE_BASE + offset)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SafeAction {
    ProposeAccount,
    ApproveAccount,
    ProposeTransaction,
    ApproveTransaction,
    RevokeTransaction,
    CloseAccount,
    /// Ethereum-like chains only.
    RefundTransaction,
}

impl SafeAction {
    pub fn name(self) -> &'static str {
        match self {
            SafeAction::ProposeAccount => "propose account",
            SafeAction::ApproveAccount => "approve account",
            SafeAction::ProposeTransaction => "propose transaction",
            SafeAction::ApproveTransaction => "approve transaction",
            SafeAction::RevokeTransaction => "revoke transaction",
            SafeAction::CloseAccount => "close account",
            SafeAction::RefundTransaction => "refund transaction",
        }
    }
}
