//! Error types for the consensus crate.

use std::fmt::Display;

use fedchain_primitives::{block::SidechainBlockHash, types::SignerIdx};
use thiserror::Error;

/// Error while feeding a partial signature to a [`crate::SignatureCollector`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectorError {
    /// The signature is bound to a different candidate block.
    #[error("signature is for block {got}, collector is bound to {expected}")]
    WrongBlock {
        /// The candidate hash this collector is bound to.
        expected: SidechainBlockHash,

        /// The hash the signature was produced over.
        got: SidechainBlockHash,
    },

    /// The signer index already contributed a different signature.
    #[error("signer {0} already contributed a signature for this block")]
    DuplicateSigner(SignerIdx),

    /// The signer index is outside the block-signing policy.
    #[error("signer {0} is not part of the block-signing policy")]
    UnknownSigner(SignerIdx),

    /// The signature does not verify against the signer's policy key.
    #[error("signature from signer {0} does not verify against the policy key")]
    InvalidSignature(SignerIdx),
}

/// An invalid state machine transition was attempted.
///
/// "Not yet complete" is never one of these; polling an incomplete round is normal flow.
#[derive(Debug, Clone)]
pub struct TransitionErr(pub String);

impl Display for TransitionErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransitionErr: {}", self.0)
    }
}

impl std::error::Error for TransitionErr {}

/// Unified error type for the per-height finalization round.
#[derive(Debug, Error)]
pub enum FinalizerError {
    /// An operation was attempted in the wrong state.
    #[error(transparent)]
    Transition(#[from] TransitionErr),

    /// A partial signature was rejected.
    #[error(transparent)]
    Collector(#[from] CollectorError),

    /// Submission to the chain failed.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Error while mutating the chain state.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// Submission of a block that does not satisfy the block-signing policy or extends a stale
    /// parent. Fatal for the current height only.
    #[error("rejected block: {0}")]
    RejectedBlock(String),

    /// The referenced block hash was never connected to this chain.
    #[error("unknown block {0}")]
    UnknownBlock(SidechainBlockHash),
}
