//! Errors for the shared primitives.

use thiserror::Error;

/// Error while constructing or parsing a [`crate::policy::ScriptPolicy`].
#[derive(Debug, Clone, Error)]
pub enum PolicyError {
    /// The `m`-of-`n` parameters are out of range.
    #[error("invalid policy: {threshold}-of-{total} is not a valid multisig")]
    InvalidPolicy {
        /// The required number of signers (`m`).
        threshold: u32,

        /// The total number of keys (`n`).
        total: u32,
    },

    /// A public key inside the script could not be parsed.
    #[error("malformed public key in policy script: {0}")]
    MalformedKey(String),

    /// The script is not an `OP_m <keys> OP_n OP_CHECKMULTISIG` template.
    #[error("script is not a bare multisig policy script")]
    MalformedScript,
}

/// Error while encoding or decoding a sidechain block.
#[derive(Debug, Error)]
pub enum BlockCodecError {
    /// The hex string could not be decoded.
    #[error("invalid block hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The decoded bytes are not a valid block serialization.
    #[error("invalid block serialization: {0}")]
    InvalidBytes(#[from] bincode::Error),
}
