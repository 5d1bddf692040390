//! Safe custody operations.
//!
//! An [`Operation`] is the instruction a client attaches to a transfer into
//! the custody network: which action to take, on which curve, for which key.
//! It travels as a short binary record, base64url encoded into the memo.

pub mod codec;
pub mod codes;
pub mod error;
pub mod extra;
pub mod propose;

pub use codec::{Operation, MAX_FIELD_LEN};
pub use codes::{SafeAction, SafeChain};
pub use error::OperationError;
pub use extra::encode_mixin_extra;
pub use propose::{propose_account, propose_batch_transaction, propose_transaction};
