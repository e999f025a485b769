//! Error types for peg-in handling.

use thiserror::Error;

/// Error while decoding a peg-in claim transaction from its hex wire format.
#[derive(Debug, Error)]
pub enum ClaimCodecError {
    /// The hex string could not be decoded.
    #[error("invalid claim hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The decoded bytes are not a valid claim serialization.
    #[error("invalid claim serialization: {0}")]
    InvalidBytes(#[from] bincode::Error),
}
