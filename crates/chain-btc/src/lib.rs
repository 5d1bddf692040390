//! Bitcoin-family chain support for Safe custody.
//!
//! Builds unsigned multisig transactions from typed inputs and outputs,
//! carries them through the PSBT lifecycle, attaches one party's signature
//! and verifies the partial signatures of the others. Bitcoin and Litecoin
//! share the code paths and differ only in their [`network::NetworkParams`].

pub mod address;
pub mod error;
pub mod fee;
pub mod message;
pub mod network;
pub mod psbt;
pub mod rpc;
pub mod script;
pub mod signer;
pub mod standard;
pub mod transaction;
pub mod units;
pub mod utxo;

pub use error::BtcError;
pub use network::{network_params, BtcNetwork, NetworkParams};
pub use psbt::PartiallySignedTransaction;
pub use utxo::{Input, Output};
