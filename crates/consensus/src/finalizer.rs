//! The per-height block finalization state machine.
//!
//! One [`BlockFinalizer`] instance lives for exactly one height's attempt:
//! `AwaitingProposal -> Proposed -> PartiallySigned -> Complete -> Submitted`. A failed round is
//! abandoned, never repaired; the next height starts a fresh instance.

use fedchain_primitives::{
    block::{SidechainBlock, SidechainBlockHash},
    policy::ScriptPolicy,
    types::{SidechainBlockHeight, SignerIdx},
};
use tracing::{debug, info};

use crate::{
    chain::{ChainEvent, ChainState},
    errors::{FinalizerError, TransitionErr},
    sig_collector::{BlockSignature, CombineResult, SignatureCollector},
};

/// Deterministic round-robin proposer selection.
///
/// `height` is the chain height at which the round starts (the candidate extends it), so an
/// abandoned round re-elects the same proposer until a block lands and the index advances with
/// the height. Free of hidden state on purpose.
pub fn proposer(height: SidechainBlockHeight, participant_count: usize) -> SignerIdx {
    (height % participant_count as u64) as SignerIdx
}

/// The states of a finalization round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizerState {
    /// No candidate exists yet; waiting on the elected proposer.
    AwaitingProposal,

    /// A candidate block is fixed and signatures may be collected.
    Proposed,

    /// At least one partial signature has been accepted.
    PartiallySigned,

    /// The threshold has been reached; the combined witness is available.
    Complete,

    /// The finalized block has been accepted by the chain.
    Submitted,
}

/// Drives one candidate block from proposal to submission.
#[derive(Debug)]
pub struct BlockFinalizer {
    state: FinalizerState,
    candidate: Option<SidechainBlock>,
    collector: Option<SignatureCollector>,
    policy: ScriptPolicy,
}

impl BlockFinalizer {
    /// A fresh round with no candidate.
    pub fn new(policy: ScriptPolicy) -> Self {
        Self {
            state: FinalizerState::AwaitingProposal,
            candidate: None,
            collector: None,
            policy,
        }
    }

    /// The current state of the round.
    pub fn state(&self) -> FinalizerState {
        self.state
    }

    /// Fixes the candidate block for this round and binds the signature collector to its hash.
    ///
    /// Only valid from `AwaitingProposal`; the candidate is immutable afterwards since any
    /// mutation would orphan the collected signatures.
    pub fn propose(&mut self, candidate: SidechainBlock) -> Result<SidechainBlockHash, TransitionErr> {
        if self.state != FinalizerState::AwaitingProposal {
            return Err(TransitionErr(format!(
                "propose is not valid in {:?}",
                self.state
            )));
        }

        let hash = candidate.block_hash();
        debug!(height = candidate.header.height, %hash, "fixed candidate block");

        self.collector = Some(SignatureCollector::new(self.policy.clone(), hash));
        self.candidate = Some(candidate);
        self.state = FinalizerState::Proposed;
        Ok(hash)
    }

    /// Accepts one partial signature collected from a participant.
    ///
    /// Still valid in `Complete`: combination is repeatable with growing signature sets, so
    /// re-supplied (idempotent) or surplus signatures after the threshold are accepted rather
    /// than rejected.
    pub fn add_signature(
        &mut self,
        block_hash: SidechainBlockHash,
        sig: BlockSignature,
    ) -> Result<(), FinalizerError> {
        let collector = match self.state {
            FinalizerState::Proposed
            | FinalizerState::PartiallySigned
            | FinalizerState::Complete => self
                .collector
                .as_mut()
                .expect("collector exists in signing states"),
            state => {
                return Err(TransitionErr(format!(
                    "add_signature is not valid in {state:?}"
                ))
                .into())
            }
        };

        collector.add(block_hash, sig)?;
        if self.state == FinalizerState::Proposed {
            self.state = FinalizerState::PartiallySigned;
        }
        Ok(())
    }

    /// Polls the combination step.
    ///
    /// Incomplete results are normal flow. On completeness the round moves to `Complete`.
    pub fn poll(&mut self) -> Result<CombineResult, TransitionErr> {
        let collector = match self.state {
            FinalizerState::Proposed
            | FinalizerState::PartiallySigned
            | FinalizerState::Complete => self
                .collector
                .as_ref()
                .expect("collector exists in signing states"),
            state => return Err(TransitionErr(format!("poll is not valid in {state:?}"))),
        };

        let result = collector.combined();
        if result.complete {
            self.state = FinalizerState::Complete;
        }
        Ok(result)
    }

    /// Attaches the combined witness and submits the finalized block to the chain.
    ///
    /// The chain re-verifies the witness against the policy on its own; a forged "complete"
    /// report or a stale parent surfaces as [`crate::errors::ChainError::RejectedBlock`] here and
    /// aborts only this height's attempt.
    pub fn submit(&mut self, chain: &mut ChainState) -> Result<ChainEvent, FinalizerError> {
        if self.state != FinalizerState::Complete {
            return Err(TransitionErr(format!("submit is not valid in {:?}", self.state)).into());
        }

        let result = self
            .collector
            .as_ref()
            .expect("collector exists in Complete")
            .combined();
        let witness = result.witness.unwrap_or_default();

        let mut block = self
            .candidate
            .clone()
            .expect("candidate exists in Complete");
        block.witness = witness;

        let event = chain.connect(block)?;
        info!(?event, "submitted finalized block");
        self.state = FinalizerState::Submitted;
        Ok(event)
    }
}
