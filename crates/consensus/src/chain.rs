//! The sidechain chain-state: connected blocks, best-chain selection and the
//! invalidate/reconsider reorg edges.
//!
//! Blocks are never deleted. Invalidation only flips a flag and the best chain is recomputed
//! from scratch, so a reconsidered branch restores exactly the state it had before. Downstream
//! consumers (the peg-in ledger) replay the best chain rather than patching incrementally.

use bitcoin::{hashes::Hash, Txid};
use fedchain_primitives::{
    block::{SidechainBlock, SidechainBlockHash},
    policy::ScriptPolicy,
    types::SidechainBlockHeight,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::errors::ChainError;

/// Emitted after every successful chain mutation so observers can react to tip changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// A block was connected on top of the previous tip.
    Connected {
        /// Height of the connected block.
        height: SidechainBlockHeight,

        /// Hash of the connected block.
        hash: SidechainBlockHash,
    },

    /// The best chain changed other than by a simple extension (invalidate or reconsider).
    Reorged {
        /// The new tip height.
        tip_height: SidechainBlockHeight,

        /// The new tip hash.
        tip_hash: SidechainBlockHash,
    },
}

/// A block plus its local bookkeeping.
#[derive(Debug, Clone)]
struct StoredBlock {
    block: SidechainBlock,
    /// Connection order, used to break ties between equally long branches.
    seq: u64,
    invalidated: bool,
}

/// One block of the current best chain, as exposed to replay consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalBlock {
    /// Height of the block.
    pub height: SidechainBlockHeight,

    /// Hash of the block.
    pub hash: SidechainBlockHash,

    /// Sidechain txids of the peg-in claims the block contains.
    pub claim_txids: Vec<Txid>,
}

/// The full local view of the sidechain.
#[derive(Debug, Clone)]
pub struct ChainState {
    policy: ScriptPolicy,
    blocks: BTreeMap<SidechainBlockHash, StoredBlock>,
    next_seq: u64,
}

impl ChainState {
    /// The parent hash of the first block, standing in for a genesis block at height 0.
    pub fn genesis_hash() -> SidechainBlockHash {
        SidechainBlockHash::all_zeros()
    }

    /// A fresh chain containing only the implicit genesis.
    pub fn new(policy: ScriptPolicy) -> Self {
        Self {
            policy,
            blocks: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Height of the current best tip (0 for a fresh chain).
    pub fn height(&self) -> SidechainBlockHeight {
        self.best_chain().last().map(|b| b.height).unwrap_or(0)
    }

    /// Hash of the current best tip.
    pub fn tip_hash(&self) -> SidechainBlockHash {
        self.best_chain()
            .last()
            .map(|b| b.hash)
            .unwrap_or_else(Self::genesis_hash)
    }

    /// Submits a finalized block to the chain.
    ///
    /// The witness is re-verified against the block-signing policy here, independently of
    /// whatever collector reported completeness, and the parent must be the current best tip.
    /// Both failures are [`ChainError::RejectedBlock`] and abort only this height's attempt.
    pub fn connect(&mut self, block: SidechainBlock) -> Result<ChainEvent, ChainError> {
        let hash = block.block_hash();

        if let Some(known) = self.blocks.get(&hash) {
            if !known.invalidated {
                debug!(%hash, "ignoring resubmission of known block");
                return Ok(ChainEvent::Connected {
                    height: block.header.height,
                    hash,
                });
            }
            return Err(ChainError::RejectedBlock(format!(
                "block {hash} was invalidated"
            )));
        }

        let tip_hash = self.tip_hash();
        if block.header.parent != tip_hash {
            return Err(ChainError::RejectedBlock(format!(
                "stale parent {} (tip is {tip_hash})",
                block.header.parent
            )));
        }

        let expected_height = self.height() + 1;
        if block.header.height != expected_height {
            return Err(ChainError::RejectedBlock(format!(
                "height {} does not extend tip (expected {expected_height})",
                block.header.height
            )));
        }

        if !self
            .policy
            .validate_witness(&hash.to_byte_array(), &block.witness)
        {
            return Err(ChainError::RejectedBlock(
                "witness does not satisfy the block-signing policy".to_string(),
            ));
        }

        let height = block.header.height;
        self.blocks.insert(
            hash,
            StoredBlock {
                block,
                seq: self.next_seq,
                invalidated: false,
            },
        );
        self.next_seq += 1;

        info!(%height, %hash, "connected block");
        Ok(ChainEvent::Connected { height, hash })
    }

    /// Marks a block invalid, removing it (and every descendant) from the best chain.
    pub fn invalidate(&mut self, hash: &SidechainBlockHash) -> Result<ChainEvent, ChainError> {
        let stored = self
            .blocks
            .get_mut(hash)
            .ok_or(ChainError::UnknownBlock(*hash))?;

        if stored.invalidated {
            warn!(%hash, "block is already invalidated");
        }
        stored.invalidated = true;

        let tip_hash = self.tip_hash();
        info!(%hash, new_tip = %tip_hash, "invalidated block");
        Ok(ChainEvent::Reorged {
            tip_height: self.height(),
            tip_hash,
        })
    }

    /// Clears the invalid flag, letting the branch compete for best chain again.
    pub fn reconsider(&mut self, hash: &SidechainBlockHash) -> Result<ChainEvent, ChainError> {
        let stored = self
            .blocks
            .get_mut(hash)
            .ok_or(ChainError::UnknownBlock(*hash))?;
        stored.invalidated = false;

        let tip_hash = self.tip_hash();
        info!(%hash, new_tip = %tip_hash, "reconsidered block");
        Ok(ChainEvent::Reorged {
            tip_height: self.height(),
            tip_hash,
        })
    }

    /// The current best chain from the first block to the tip, recomputed from scratch.
    ///
    /// Longest valid branch wins; equally long branches are broken by connection order.
    pub fn best_chain(&self) -> Vec<CanonicalBlock> {
        let mut best: Option<(usize, u64, SidechainBlockHash)> = None;

        for (hash, stored) in &self.blocks {
            let Some(len) = self.branch_len(hash) else {
                continue;
            };

            let candidate = (len, u64::MAX - stored.seq, *hash);
            let better = match best {
                None => true,
                Some((best_len, best_seq, _)) => (len, u64::MAX - stored.seq) > (best_len, best_seq),
            };
            if better {
                best = Some(candidate);
            }
        }

        let Some((_, _, tip)) = best else {
            return Vec::new();
        };

        let mut chain = Vec::new();
        let mut cursor = tip;
        while cursor != Self::genesis_hash() {
            let stored = &self.blocks[&cursor];
            chain.push(CanonicalBlock {
                height: stored.block.header.height,
                hash: cursor,
                claim_txids: stored.block.claim_txids.clone(),
            });
            cursor = stored.block.header.parent;
        }
        chain.reverse();
        chain
    }

    /// Length of the branch ending at `hash`, or [`None`] if the branch passes through an
    /// invalidated block or does not reach genesis.
    fn branch_len(&self, hash: &SidechainBlockHash) -> Option<usize> {
        let mut len = 0;
        let mut cursor = *hash;
        while cursor != Self::genesis_hash() {
            let stored = self.blocks.get(&cursor)?;
            if stored.invalidated {
                return None;
            }
            len += 1;
            cursor = stored.block.header.parent;
        }
        Some(len)
    }
}
