//! Virtual-size estimation for custody transactions.
//!
//! The estimator is deliberately coarse: every input is charged as a worst
//! case multisig spend and one spare output is always budgeted.

/// Weight charged for version, locktime and counts.
pub const BASE_WEIGHT: usize = 40;

/// Weight charged per input.
pub const INPUT_WEIGHT: usize = 300;

/// Weight charged per output, plus one spare output.
pub const OUTPUT_WEIGHT: usize = 128;

/// Standardness ceiling on transaction weight.
pub const MAX_STANDARD_TX_WEIGHT: usize = 300_000;

/// Largest OP_RETURN payload a custody transaction may carry.
pub const MAX_PAYLOAD_SIZE: usize = 64;

/// `(40 + 300 * inputs + 128 * (outputs + 1)) / 4`, plus the payload length
/// when a payload is attached.
pub fn estimate_virtual_size(inputs: usize, outputs: usize, payload_len: usize) -> usize {
    let mut vsize = (BASE_WEIGHT + inputs * INPUT_WEIGHT + (outputs + 1) * OUTPUT_WEIGHT) / 4;
    if payload_len > 0 && payload_len <= MAX_PAYLOAD_SIZE {
        vsize += payload_len;
    }
    vsize
}

/// Fee for an estimated virtual size at `fee_rate` sat/vbyte.
pub fn estimate_fee(vsize: usize, fee_rate: u64) -> u64 {
    fee_rate.saturating_mul(vsize as u64)
}

/// Outcome of a successful fee check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub virtual_size: usize,
    /// Fee the transaction will consume.
    pub fee: u64,
    /// Total of the fee inputs.
    pub available: u64,
}
