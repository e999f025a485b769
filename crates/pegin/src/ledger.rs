//! Confirmation tracking for accepted peg-in claims.
//!
//! The ledger never patches confirmation counts incrementally: every chain change is applied by
//! replaying the entire best chain, so invalidation and reconsideration cannot drift. Claims are
//! never deleted; a reorged-out claim drops to zero confirmations and re-grows.

use std::collections::BTreeMap;

use bitcoin::Txid;
use fedchain_consensus::chain::CanonicalBlock;
use tracing::{debug, info};

use crate::claim::PeginClaim;

/// Confirmation state of one claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    /// Verified and accepted but not yet included in a sidechain block.
    AcceptedUnconfirmed,

    /// Included in a best-chain block with the given number of confirmations.
    ///
    /// `Confirming(0)` is the distinguished post-reorg state: the claim had confirmations and
    /// its containing block was invalidated.
    Confirming(u32),

    /// Buried past the wallet-safe depth. Not terminal: a reorg can reopen it.
    Settled(u32),
}

impl ClaimState {
    /// The confirmation count observers see.
    pub fn confirmations(&self) -> u32 {
        match self {
            ClaimState::AcceptedUnconfirmed => 0,
            ClaimState::Confirming(count) => *count,
            ClaimState::Settled(count) => *count,
        }
    }
}

/// A ledger entry: the claim plus its current confirmation state.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    /// The claim itself.
    pub claim: PeginClaim,

    /// Current confirmation state.
    pub state: ClaimState,
}

/// Tracks confirmation state for every claim ever accepted.
#[derive(Debug, Clone)]
pub struct PeginLedger {
    /// Depth at which a confirming claim is treated as settled.
    safe_depth: u32,
    entries: BTreeMap<Txid, LedgerEntry>,
}

impl PeginLedger {
    /// An empty ledger with the given wallet-safe depth.
    pub fn new(safe_depth: u32) -> Self {
        Self {
            safe_depth,
            entries: BTreeMap::new(),
        }
    }

    /// Registers an accepted claim and returns its sidechain txid.
    ///
    /// Idempotent: a duplicate registration returns the existing txid and leaves the entry
    /// (including its confirmation state) untouched, so a claim can never be double counted.
    pub fn register(&mut self, claim: PeginClaim) -> Txid {
        let txid = claim.sidechain_txid();

        if self.entries.contains_key(&txid) {
            debug!(%txid, "ignoring duplicate claim registration");
            return txid;
        }

        info!(%txid, parent_txid = %claim.parent_txid, "registered peg-in claim");
        self.entries.insert(
            txid,
            LedgerEntry {
                claim,
                state: ClaimState::AcceptedUnconfirmed,
            },
        );
        txid
    }

    /// Looks up an entry by sidechain txid.
    pub fn get(&self, txid: &Txid) -> Option<&LedgerEntry> {
        self.entries.get(txid)
    }

    /// Number of claims ever registered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger has any entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Claim txids not included in the given best chain, i.e. eligible for the next block.
    pub fn mempool(&self, best_chain: &[CanonicalBlock]) -> Vec<Txid> {
        let included: BTreeMap<&Txid, ()> = best_chain
            .iter()
            .flat_map(|block| block.claim_txids.iter().map(|txid| (txid, ())))
            .collect();

        self.entries
            .keys()
            .filter(|txid| !included.contains_key(txid))
            .copied()
            .collect()
    }

    /// Replays the best chain and reassesses every claim.
    ///
    /// Each claim's state is assigned exactly once per sync, so an observer sees the reorg edge
    /// `Confirming(c) -> Confirming(0)` as a single transition and never a partial decrement.
    pub fn sync(&mut self, best_chain: &[CanonicalBlock]) {
        let tip_height = best_chain.last().map(|block| block.height).unwrap_or(0);

        let mut containing_height: BTreeMap<Txid, u64> = BTreeMap::new();
        for block in best_chain {
            for txid in &block.claim_txids {
                containing_height.entry(*txid).or_insert(block.height);
            }
        }

        for (txid, entry) in self.entries.iter_mut() {
            let new_state = match containing_height.get(txid) {
                Some(height) => {
                    let count = (tip_height - height + 1) as u32;
                    if count >= self.safe_depth {
                        ClaimState::Settled(count)
                    } else {
                        ClaimState::Confirming(count)
                    }
                }
                // Not on the best chain. A claim that had confirmations was reorged out and sits
                // at zero until re-included; one that never had any is still awaiting inclusion.
                None => match entry.state {
                    ClaimState::AcceptedUnconfirmed => ClaimState::AcceptedUnconfirmed,
                    ClaimState::Confirming(_) | ClaimState::Settled(_) => ClaimState::Confirming(0),
                },
            };

            if new_state != entry.state {
                debug!(%txid, from = ?entry.state, to = ?new_state, "claim state change");
            }
            entry.state = new_state;
        }
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::{hashes::Hash, ScriptBuf};
    use fedchain_primitives::block::SidechainBlockHash;

    use super::*;

    fn claim(tag: u8) -> PeginClaim {
        PeginClaim {
            parent_txid: Txid::from_byte_array([tag; 32]),
            claim_script: ScriptBuf::from_bytes(vec![0x51, tag]),
            raw_tx: vec![],
            proof: vec![],
            destination: ScriptBuf::new(),
            amount_sats: 1_000,
        }
    }

    fn chain_with(claims_per_height: &[Vec<Txid>]) -> Vec<CanonicalBlock> {
        claims_per_height
            .iter()
            .enumerate()
            .map(|(i, txids)| CanonicalBlock {
                height: i as u64 + 1,
                hash: SidechainBlockHash::hash(&[i as u8]),
                claim_txids: txids.clone(),
            })
            .collect()
    }

    #[test]
    fn registration_is_idempotent() {
        let mut ledger = PeginLedger::new(10);

        let txid = ledger.register(claim(1));
        let again = ledger.register(claim(1));

        assert_eq!(txid, again);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn confirmations_track_descendants() {
        let mut ledger = PeginLedger::new(10);
        let txid = ledger.register(claim(1));

        assert_eq!(ledger.get(&txid).unwrap().state.confirmations(), 0);

        // Included in block 1, chain grows to height 6.
        let blocks = chain_with(&[vec![txid], vec![], vec![], vec![], vec![], vec![]]);
        ledger.sync(&blocks);

        let entry = ledger.get(&txid).unwrap();
        assert_eq!(entry.state, ClaimState::Confirming(6));
        assert!(ledger.mempool(&blocks).is_empty());
    }

    #[test]
    fn settles_at_safe_depth_and_reopens_on_reorg() {
        let mut ledger = PeginLedger::new(3);
        let txid = ledger.register(claim(1));

        let blocks = chain_with(&[vec![txid], vec![], vec![]]);
        ledger.sync(&blocks);
        assert_eq!(ledger.get(&txid).unwrap().state, ClaimState::Settled(3));

        // Containing block invalidated: single transition to zero, back into the mempool.
        ledger.sync(&[]);
        assert_eq!(ledger.get(&txid).unwrap().state, ClaimState::Confirming(0));
        assert_eq!(ledger.mempool(&[]), vec![txid]);
    }

    #[test]
    fn reorg_round_trip_restores_the_exact_count() {
        let mut ledger = PeginLedger::new(10);
        let txid = ledger.register(claim(1));

        let original = chain_with(&[vec![txid], vec![], vec![], vec![], vec![], vec![]]);
        ledger.sync(&original);
        assert_eq!(ledger.get(&txid).unwrap().state.confirmations(), 6);

        ledger.sync(&[]);
        assert_eq!(ledger.get(&txid).unwrap().state.confirmations(), 0);

        // Re-included on a one-block side branch.
        let side = chain_with(&[vec![txid]]);
        ledger.sync(&side);
        assert_eq!(ledger.get(&txid).unwrap().state.confirmations(), 1);

        // Original branch reconsidered.
        ledger.sync(&original);
        assert_eq!(ledger.get(&txid).unwrap().state.confirmations(), 6);
    }

    #[test]
    fn unrelated_claims_keep_their_own_counts() {
        let mut ledger = PeginLedger::new(10);
        let a = ledger.register(claim(1));
        let b = ledger.register(claim(2));

        let blocks = chain_with(&[vec![a], vec![b], vec![]]);
        ledger.sync(&blocks);

        assert_eq!(ledger.get(&a).unwrap().state.confirmations(), 3);
        assert_eq!(ledger.get(&b).unwrap().state.confirmations(), 2);
    }
}
