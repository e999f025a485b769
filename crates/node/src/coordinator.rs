//! The synchronous per-height block production round.
//!
//! The coordinator queries peers one at a time: collect a signature, try to combine, repeat
//! until the threshold is reached. There is no push protocol. A round that exceeds its timeout
//! is abandoned and retried at the next height; liveness only, no fairness beyond round-robin.

use std::time::{Duration, Instant};

use fedchain_consensus::{proposer, BlockSignature};
use fedchain_primitives::block::{SidechainBlock, SidechainBlockHash};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{errors::NodeError, node::Node};

/// A federation peer that signs candidate blocks out-of-band.
///
/// In-process nodes implement this directly; an RPC client implementation lets the coordinator
/// drive remote signers the same way.
pub trait BlockSigner {
    /// Produces this peer's partial signature over a candidate block.
    fn sign_block(&mut self, block_hex: &str) -> Result<BlockSignature, NodeError>;
}

impl BlockSigner for Node {
    fn sign_block(&mut self, block_hex: &str) -> Result<BlockSignature, NodeError> {
        self.signblock(block_hex)
    }
}

/// Knobs for one production round.
#[derive(Debug, Clone)]
pub struct RoundOptions {
    /// Wall-clock budget for collecting signatures before the round is abandoned.
    pub timeout: Duration,
}

impl Default for RoundOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

/// Failure of a production round or a convergence wait.
#[derive(Debug, Error)]
pub enum RoundError {
    /// The timeout elapsed before the round (or convergence) completed. Operational, never a
    /// protocol failure; no ledger or chain state was corrupted.
    #[error("timed out waiting for signature collection or state propagation")]
    PropagationTimeout,

    /// Every signer was polled and the threshold was still not reached.
    #[error("signature threshold not reached after polling every signer")]
    Incomplete,

    /// A node command failed during the round.
    #[error(transparent)]
    Node(#[from] NodeError),
}

/// Collects partial signatures round-robin starting at `start` until `needed` are gathered.
pub fn collect_signatures<S: BlockSigner>(
    signers: &mut [S],
    block_hex: &str,
    needed: usize,
    deadline: Instant,
    start: usize,
) -> Result<Vec<BlockSignature>, RoundError> {
    let mut sigs = Vec::with_capacity(needed);

    for step in 0..signers.len() {
        if sigs.len() == needed {
            break;
        }
        if Instant::now() > deadline {
            warn!("abandoning signature collection round");
            return Err(RoundError::PropagationTimeout);
        }

        let idx = (start + step) % signers.len();
        sigs.push(signers[idx].sign_block(block_hex)?);
        debug!(signer = idx, collected = sigs.len(), needed, "collected signature");
    }

    if sigs.len() < needed {
        return Err(RoundError::Incomplete);
    }
    Ok(sigs)
}

/// Drives one full height: elect the proposer, collect signatures, combine, submit everywhere.
///
/// Returns the hash of the produced block. A failed round leaves every node's chain untouched;
/// the caller simply retries at the same height (which re-elects the same proposer).
pub fn produce_block(nodes: &mut [Node], opts: &RoundOptions) -> Result<SidechainBlockHash, RoundError> {
    if nodes.is_empty() {
        return Err(RoundError::Incomplete);
    }

    let deadline = Instant::now() + opts.timeout;
    let height = nodes[0].block_count();

    // Election runs over the federation size fixed by the policy; the caller must drive the
    // whole federation for the elected slot to be addressable.
    let federation = nodes[0].federation_size();
    if nodes.len() < federation {
        return Err(RoundError::Incomplete);
    }
    let miner = proposer(height, federation) as usize;

    let block_hex = nodes[miner].getnewblockhex()?;
    let needed = nodes[miner].policy().threshold() as usize;

    let sigs = collect_signatures(nodes, &block_hex, needed, deadline, miner)?;

    let combined = nodes[miner].combineblocksigs(&block_hex, &sigs)?;
    if !combined.complete {
        return Err(RoundError::Incomplete);
    }

    for node in nodes.iter_mut() {
        node.submitblock(&combined.hex)?;
    }

    let hash = SidechainBlock::from_hex(&combined.hex)
        .map_err(NodeError::from)?
        .block_hash();
    info!(height = height + 1, %hash, proposer = miner, "produced block");
    Ok(hash)
}

/// Polls until every node reports the expected height, failing hard on timeout.
///
/// Cross-node propagation is asynchronous; callers that need convergence poll with a bounded
/// timeout and treat non-convergence as a failure, never proceed silently.
pub fn await_height(
    nodes: &[Node],
    expected: u64,
    timeout: Duration,
) -> Result<(), RoundError> {
    let deadline = Instant::now() + timeout;
    loop {
        if nodes.iter().all(|node| node.block_count() == expected) {
            return Ok(());
        }
        if Instant::now() > deadline {
            return Err(RoundError::PropagationTimeout);
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::Network;
    use fedchain_params::Params;
    use fedchain_primitives::{policy::ScriptPolicy, types::SignerIdx};
    use fedchain_test_utils::keys::seeded_keypairs;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn federation(n: usize, m: u32) -> Vec<Node> {
        let block_keys: Vec<_> = seeded_keypairs(n, 0xfed).into_iter().map(|(_, pk)| pk).collect();
        let fedpeg_keys: Vec<_> = seeded_keypairs(1, 0x9e9).into_iter().map(|(_, pk)| pk).collect();
        let params = Params {
            network: Network::Regtest,
            signblockscript: ScriptPolicy::new(block_keys, m).unwrap().to_script(),
            fedpegscript: ScriptPolicy::new(fedpeg_keys, 1).unwrap().to_script(),
            validatepegin: false,
            peginconfirmationdepth: 8,
            peginsafedepthoffset: 2,
        };

        seeded_keypairs(n, 0xfed)
            .into_iter()
            .enumerate()
            .map(|(idx, (sk, _))| {
                Node::new(
                    params.clone(),
                    idx as SignerIdx,
                    sk,
                    StdRng::seed_from_u64(idx as u64),
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn rounds_advance_every_node_in_lockstep() {
        let mut nodes = federation(3, 2);
        let opts = RoundOptions::default();

        for expected in 1..=5 {
            produce_block(&mut nodes, &opts).unwrap();
            await_height(&nodes, expected, Duration::from_secs(1)).unwrap();
        }
    }

    #[test]
    fn collection_stops_at_the_threshold() {
        let mut nodes = federation(3, 2);
        let hex = nodes[0].getnewblockhex().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let sigs = collect_signatures(&mut nodes, &hex, 2, deadline, 0).unwrap();
        assert_eq!(sigs.len(), 2);
        assert_eq!(sigs[0].signer, 0);
        assert_eq!(sigs[1].signer, 1);
    }

    #[test]
    fn collection_wraps_around_from_the_proposer() {
        let mut nodes = federation(3, 2);
        let hex = nodes[2].getnewblockhex().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let sigs = collect_signatures(&mut nodes, &hex, 2, deadline, 2).unwrap();
        assert_eq!(sigs[0].signer, 2);
        assert_eq!(sigs[1].signer, 0);
    }

    #[test]
    fn an_expired_deadline_abandons_the_round() {
        let mut nodes = federation(3, 3);
        let opts = RoundOptions {
            timeout: Duration::from_secs(0),
        };

        let err = produce_block(&mut nodes, &opts).unwrap_err();
        assert!(matches!(err, RoundError::PropagationTimeout));

        // Nothing landed; the next round at the same height succeeds.
        assert!(nodes.iter().all(|node| node.block_count() == 0));
        produce_block(&mut nodes, &RoundOptions::default()).unwrap();
        assert!(nodes.iter().all(|node| node.block_count() == 1));
    }

    #[test]
    fn a_partial_federation_cannot_run_a_round() {
        let mut nodes = federation(3, 2);
        nodes.truncate(2);

        let err = produce_block(&mut nodes, &RoundOptions::default()).unwrap_err();
        assert!(matches!(err, RoundError::Incomplete));
    }

    #[test]
    fn convergence_polling_fails_hard_on_timeout() {
        let nodes = federation(2, 2);
        let err = await_height(&nodes, 3, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, RoundError::PropagationTimeout));
    }
}
