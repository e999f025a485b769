//! Error types for the node's command surface.
//!
//! The peg-in variants carry the exact user-facing messages callers match on; changing their
//! wording breaks wallet integrations.

use bitcoin::Txid;
use fedchain_consensus::errors::{ChainError, CollectorError, FinalizerError, TransitionErr};
use fedchain_params::errors::ParamsError;
use fedchain_pegin::errors::ClaimCodecError;
use fedchain_primitives::{errors::BlockCodecError, types::SignerIdx};
use thiserror::Error;

/// Unified error type for every node command.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The deposit is real but not buried deep enough on the parent chain. Retryable: the caller
    /// waits and resubmits the identical claim.
    #[error("Peg-in Bitcoin transaction needs more confirmations to be sent. (have {got}, need {required})")]
    NeedsMoreConfirmations {
        /// Parent-chain confirmations of the deposit right now.
        got: u64,

        /// Confirmations required for mempool acceptance.
        required: u32,
    },

    /// The claim script does not correspond to any output of the deposit transaction.
    #[error("Given claim_script does not match the given Bitcoin transaction.")]
    ClaimScriptMismatch,

    /// The deposit transaction or its txout proof is malformed or does not verify.
    #[error("Peg-in transaction or txout proof is invalid.")]
    InvalidProof,

    /// The configured signer index is not a slot in the block-signing policy.
    #[error("signer index {0} is not part of the block-signing policy")]
    SignerNotInPolicy(SignerIdx),

    /// The configured signing key does not match the policy key at the configured index.
    #[error("signing key does not match the policy key for signer {0}")]
    SigningKeyMismatch(SignerIdx),

    /// The referenced txid is not in the peg-in ledger.
    #[error("transaction {0} is not in the peg-in ledger")]
    UnknownTransaction(Txid),

    /// A hex argument could not be decoded.
    #[error("invalid hex argument: {0}")]
    BadHex(#[from] hex::FromHexError),

    /// A block hex argument did not decode to a block.
    #[error(transparent)]
    BlockCodec(#[from] BlockCodecError),

    /// A transaction hex argument did not decode to a claim.
    #[error(transparent)]
    ClaimCodec(#[from] ClaimCodecError),

    /// The configured scripts are not valid policy scripts.
    #[error(transparent)]
    Params(#[from] ParamsError),

    /// A partial signature was rejected.
    #[error(transparent)]
    Collector(#[from] CollectorError),

    /// A finalization-round operation was attempted in the wrong state.
    #[error(transparent)]
    Transition(#[from] TransitionErr),

    /// The local finalization round failed.
    #[error(transparent)]
    Finalizer(#[from] FinalizerError),

    /// The chain rejected a block or does not know the referenced hash. Fatal for the current
    /// height only.
    #[error(transparent)]
    Chain(#[from] ChainError),
}
