//! Default values for the non-script parameters.

/// Default number of parent-chain confirmations before a peg-in claim is accepted into the
/// mempool.
pub const PEGIN_CONFIRMATION_DEPTH: u32 = 8;

/// Default offset added to [`PEGIN_CONFIRMATION_DEPTH`] before a claim is treated as
/// wallet-safe (settled).
pub const PEGIN_SAFE_DEPTH_OFFSET: u32 = 2;

/// Peg-in validation is on unless explicitly disabled (`validatepegin=0`).
pub const VALIDATE_PEGIN: bool = true;
