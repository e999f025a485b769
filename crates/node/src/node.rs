//! The sidechain participant node and its command surface.
//!
//! One [`Node`] owns the full local state of a federation member: chain state, peg-in ledger,
//! peg wallet, parent-chain view and the in-flight finalization round. Every command is a
//! synchronous method; the RPC layer is a thin mapping over these.

use bitcoin::{consensus, ScriptBuf, Transaction, Txid};
use fedchain_consensus::{
    chain::CanonicalBlock, errors::ChainError, sign_block_hash, BlockFinalizer, BlockSignature,
    ChainState, FinalizerState, SignatureCollector,
};
use fedchain_params::Params;
use fedchain_pegin::{
    verifier::{deposit_amount_sats, verify},
    ParentChainView, PeginClaim, PeginLedger, Verdict,
};
use fedchain_primitives::{
    block::{SidechainBlock, SidechainBlockHash},
    policy::ScriptPolicy,
    signer_table::SignerTable,
    types::SignerIdx,
};
use rand::rngs::StdRng;
use secp256k1::{PublicKey, SecretKey, SECP256K1};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    errors::NodeError,
    wallet::{PegWallet, PeginAddressInfo},
};

/// Result of `combineblocksigs`: the (possibly still unsigned) block plus a completeness flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedBlock {
    /// Whether the signing threshold has been reached.
    pub complete: bool,

    /// The block hex, with the combined witness attached iff `complete`.
    pub hex: String,
}

/// Result of `gettransaction` for a peg-in claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    /// The claim's sidechain txid.
    pub txid: Txid,

    /// Best-chain confirmations of the claim.
    pub confirmations: u32,

    /// Claimed amount in satoshis.
    pub amount_sats: u64,

    /// The claim in its hex wire format.
    pub hex: String,
}

/// Result of `decoderawtransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedTransaction {
    /// The transaction's sidechain txid.
    pub txid: Txid,

    /// Decoded inputs.
    pub vin: Vec<DecodedInput>,
}

/// One decoded input with its peg provenance fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedInput {
    /// Whether this input claims pegged funds from the parent chain.
    pub is_pegin: bool,

    /// Peg provenance: parent txid, claim script, raw deposit tx, txout proof. Empty when
    /// `is_pegin` is false.
    pub pegin_witness: Vec<String>,
}

/// One federation member's node.
#[derive(Debug)]
pub struct Node {
    params: Params,
    block_policy: ScriptPolicy,
    signers: SignerTable,
    signing_key: SecretKey,
    wallet: PegWallet,
    chain: ChainState,
    ledger: PeginLedger,
    parent_view: ParentChainView,
    round: Option<(SidechainBlockHash, BlockFinalizer)>,
    clock: u64,
}

impl Node {
    /// Builds a node from its parameters, federation slot and signing key.
    ///
    /// Fails if the configured scripts do not parse, the slot is outside the block-signing
    /// policy, or the signing key does not match the policy key at that slot.
    pub fn new(
        params: Params,
        signer_idx: SignerIdx,
        signing_key: SecretKey,
        rng: StdRng,
    ) -> Result<Self, NodeError> {
        let block_policy = params.block_policy()?;
        // Peg validation needs a parseable fedpegscript even though the policy itself is only
        // enforced on the parent chain.
        params.fedpeg_policy()?;

        let entries = block_policy
            .pubkeys()
            .iter()
            .enumerate()
            .map(|(idx, key)| (idx as SignerIdx, *key))
            .collect();
        let signers = SignerTable::new(entries, signer_idx)
            .ok_or(NodeError::SignerNotInPolicy(signer_idx))?;

        if PublicKey::from_secret_key(SECP256K1, &signing_key) != signers.pov_key() {
            return Err(NodeError::SigningKeyMismatch(signer_idx));
        }

        let wallet = PegWallet::new(params.fedpegscript.clone(), params.network, rng);
        let ledger = PeginLedger::new(params.safe_depth());
        let chain = ChainState::new(block_policy.clone());

        info!(signer_idx, network = %params.network, "node initialized");
        Ok(Self {
            params,
            block_policy,
            signers,
            signing_key,
            wallet,
            chain,
            ledger,
            parent_view: ParentChainView::new(),
            round: None,
            clock: 0,
        })
    }

    /// The block-signing policy this node enforces.
    pub fn policy(&self) -> &ScriptPolicy {
        &self.block_policy
    }

    /// This node's slot in the block-signing policy.
    pub fn signer_idx(&self) -> SignerIdx {
        self.signers.pov_idx()
    }

    /// Number of signers in the federation.
    pub fn federation_size(&self) -> usize {
        self.signers.cardinality()
    }

    /// Height of the best tip.
    pub fn block_count(&self) -> u64 {
        self.chain.height()
    }

    /// Hash of the best tip.
    pub fn tip_hash(&self) -> SidechainBlockHash {
        self.chain.tip_hash()
    }

    /// The current best chain.
    pub fn best_chain(&self) -> Vec<CanonicalBlock> {
        self.chain.best_chain()
    }

    /// Claim txids accepted but not yet included in a best-chain block.
    pub fn raw_mempool(&self) -> Vec<Txid> {
        self.ledger.mempool(&self.chain.best_chain())
    }

    /// Replaces the trusted parent-chain view.
    pub fn set_parent_view(&mut self, view: ParentChainView) {
        self.parent_view = view;
    }

    /// Mutable access to the trusted parent-chain view.
    pub fn parent_view_mut(&mut self) -> &mut ParentChainView {
        &mut self.parent_view
    }

    /// Produces the candidate block for the next height and starts a fresh finalization round.
    ///
    /// Sweeps every mempool claim into the candidate. Any previous round is abandoned, never
    /// repaired.
    pub fn getnewblockhex(&mut self) -> Result<String, NodeError> {
        let height = self.chain.height() + 1;
        let claim_txids = self.raw_mempool();
        self.clock += 1;

        let candidate =
            SidechainBlock::candidate(height, self.chain.tip_hash(), self.clock, claim_txids);
        let hex = candidate.to_hex();

        let mut round = BlockFinalizer::new(self.block_policy.clone());
        let hash = round.propose(candidate)?;
        self.round = Some((hash, round));

        debug!(height, %hash, "proposed candidate block");
        Ok(hex)
    }

    /// Signs a candidate block with this node's federation key.
    ///
    /// Refuses candidates that do not extend the local tip; a signer never endorses a block it
    /// would reject at submission.
    pub fn signblock(&self, block_hex: &str) -> Result<BlockSignature, NodeError> {
        let block = SidechainBlock::from_hex(block_hex)?;

        let tip_hash = self.chain.tip_hash();
        if block.header.parent != tip_hash || block.header.height != self.chain.height() + 1 {
            return Err(ChainError::RejectedBlock(format!(
                "candidate at height {} with parent {} does not extend the local tip {tip_hash}",
                block.header.height, block.header.parent
            ))
            .into());
        }

        Ok(sign_block_hash(
            &block.block_hash(),
            self.signers.pov_idx(),
            &self.signing_key,
        ))
    }

    /// Combines the given partial signatures over a candidate block.
    ///
    /// Callable repeatedly with growing signature sets; re-supplying already combined signatures
    /// is a no-op. When the candidate is this node's own in-flight round the signatures also feed
    /// the round's state machine.
    pub fn combineblocksigs(
        &mut self,
        block_hex: &str,
        sigs: &[BlockSignature],
    ) -> Result<CombinedBlock, NodeError> {
        let mut block = SidechainBlock::from_hex(block_hex)?;
        let hash = block.block_hash();

        let result = match &mut self.round {
            Some((round_hash, round)) if *round_hash == hash => {
                for sig in sigs {
                    round.add_signature(hash, *sig)?;
                }
                round.poll()?
            }
            _ => {
                let mut collector = SignatureCollector::new(self.block_policy.clone(), hash);
                for sig in sigs {
                    collector.add(hash, *sig)?;
                }
                collector.combined()
            }
        };

        if let Some(witness) = result.witness {
            block.witness = witness;
        }
        Ok(CombinedBlock {
            complete: result.complete,
            hex: block.to_hex(),
        })
    }

    /// Submits a finalized block and reassesses every peg-in claim against the new best chain.
    ///
    /// The proposer's own completed round goes through the finalization state machine; blocks
    /// received from peers connect directly. Resubmission of a known block is a no-op.
    pub fn submitblock(&mut self, block_hex: &str) -> Result<(), NodeError> {
        let block = SidechainBlock::from_hex(block_hex)?;
        let hash = block.block_hash();

        let event = match self.round.take() {
            Some((round_hash, mut round))
                if round_hash == hash && round.state() == FinalizerState::Complete =>
            {
                round.submit(&mut self.chain)?
            }
            stale => {
                self.round = stale;
                self.chain.connect(block)?
            }
        };

        debug!(?event, "submitted block");
        self.sync_ledger();
        Ok(())
    }

    /// Derives a fresh federation deposit address and its claim script.
    pub fn getpeginaddress(&mut self) -> PeginAddressInfo {
        self.wallet.new_pegin_address()
    }

    /// Validates a peg-in claim and, on acceptance, registers it in the ledger.
    ///
    /// The claim script may be omitted when this node's own wallet issued the deposit address.
    /// Idempotent: resubmitting an accepted claim returns the same sidechain txid.
    pub fn claimpegin(
        &mut self,
        raw_tx_hex: &str,
        proof_hex: &str,
        claim_script_hex: Option<&str>,
    ) -> Result<Txid, NodeError> {
        let raw_tx = hex::decode(raw_tx_hex)?;
        let proof = hex::decode(proof_hex)?;
        let explicit = claim_script_hex
            .map(hex::decode)
            .transpose()?
            .map(ScriptBuf::from_bytes);

        let Ok(tx) = consensus::deserialize::<Transaction>(&raw_tx) else {
            return Err(NodeError::InvalidProof);
        };

        // An explicit claim script wins; the verifier checks it actually corresponds to the
        // deposit. Without one, this node's wallet must have issued the address.
        let claim_script = explicit
            .or_else(|| self.wallet.find_claim_script(&tx))
            .ok_or(NodeError::ClaimScriptMismatch)?;

        if self.params.validatepegin {
            match verify(
                &raw_tx,
                &proof,
                &claim_script,
                &self.params.fedpegscript,
                &self.parent_view,
                self.params.peginconfirmationdepth,
            ) {
                Verdict::Accepted { confirmations } => {
                    debug!(confirmations, "peg-in claim accepted");
                }
                Verdict::InsufficientConfirmations { got, required } => {
                    return Err(NodeError::NeedsMoreConfirmations { got, required })
                }
                Verdict::ClaimScriptMismatch => return Err(NodeError::ClaimScriptMismatch),
                Verdict::ProofInvalid => return Err(NodeError::InvalidProof),
            }
        }

        let amount_sats = deposit_amount_sats(&raw_tx, &claim_script, &self.params.fedpegscript)
            .ok_or(NodeError::ClaimScriptMismatch)?;

        let claim = PeginClaim {
            parent_txid: tx.compute_txid(),
            claim_script: claim_script.clone(),
            raw_tx,
            proof,
            destination: claim_script,
            amount_sats,
        };
        Ok(self.ledger.register(claim))
    }

    /// Looks up a peg-in claim by its sidechain txid.
    pub fn gettransaction(&self, txid: &Txid) -> Result<TransactionInfo, NodeError> {
        let entry = self
            .ledger
            .get(txid)
            .ok_or(NodeError::UnknownTransaction(*txid))?;

        Ok(TransactionInfo {
            txid: *txid,
            confirmations: entry.state.confirmations(),
            amount_sats: entry.claim.amount_sats,
            hex: entry.claim.to_hex(),
        })
    }

    /// Decodes a claim transaction and exposes its peg provenance fields.
    pub fn decoderawtransaction(&self, tx_hex: &str) -> Result<DecodedTransaction, NodeError> {
        let claim = PeginClaim::from_hex(tx_hex)?;
        Ok(DecodedTransaction {
            txid: claim.sidechain_txid(),
            vin: vec![DecodedInput {
                is_pegin: true,
                pegin_witness: claim.pegin_witness(),
            }],
        })
    }

    /// Marks a block invalid and reassesses every claim against the shortened best chain.
    pub fn invalidateblock(&mut self, hash: &SidechainBlockHash) -> Result<(), NodeError> {
        let event = self.chain.invalidate(hash)?;
        debug!(?event, "invalidated block");
        self.sync_ledger();
        Ok(())
    }

    /// Restores an invalidated block and reassesses every claim against the restored chain.
    pub fn reconsiderblock(&mut self, hash: &SidechainBlockHash) -> Result<(), NodeError> {
        let event = self.chain.reconsider(hash)?;
        debug!(?event, "reconsidered block");
        self.sync_ledger();
        Ok(())
    }

    // The ledger replays the whole best chain on every transition, so a reorg is one atomic
    // reassessment per claim.
    fn sync_ledger(&mut self) {
        let best = self.chain.best_chain();
        self.ledger.sync(&best);
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::Network;
    use fedchain_pegin::verifier::deposit_script_pubkey;
    use fedchain_test_utils::{keys::seeded_keypairs, parent_chain::MockParentChain};
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn make_params(n: usize, m: u32, validatepegin: bool, depth: u32) -> Params {
        let block_keys: Vec<_> = seeded_keypairs(n, 0xfed).into_iter().map(|(_, pk)| pk).collect();
        let fedpeg_keys: Vec<_> = seeded_keypairs(2, 0x9e9).into_iter().map(|(_, pk)| pk).collect();
        Params {
            network: Network::Regtest,
            signblockscript: ScriptPolicy::new(block_keys, m).unwrap().to_script(),
            fedpegscript: ScriptPolicy::new(fedpeg_keys, 2).unwrap().to_script(),
            validatepegin,
            peginconfirmationdepth: depth,
            peginsafedepthoffset: 2,
        }
    }

    fn federation(n: usize, m: u32, validatepegin: bool, depth: u32) -> Vec<Node> {
        let params = make_params(n, m, validatepegin, depth);
        seeded_keypairs(n, 0xfed)
            .into_iter()
            .enumerate()
            .map(|(idx, (sk, _))| {
                Node::new(
                    params.clone(),
                    idx as SignerIdx,
                    sk,
                    StdRng::seed_from_u64(100 + idx as u64),
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn rejects_a_key_that_does_not_match_the_slot() {
        let params = make_params(3, 2, false, 8);
        let keys = seeded_keypairs(3, 0xfed);

        // Wrong slot for this key.
        let err = Node::new(params.clone(), 1, keys[0].0, StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, NodeError::SigningKeyMismatch(1)));

        // Slot outside the policy.
        let err = Node::new(params, 5, keys[0].0, StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, NodeError::SignerNotInPolicy(5)));
    }

    #[test]
    fn single_node_produces_a_block_end_to_end() {
        let mut nodes = federation(1, 1, false, 8);
        let node = &mut nodes[0];

        let hex = node.getnewblockhex().unwrap();
        let sig = node.signblock(&hex).unwrap();

        let partial = node.combineblocksigs(&hex, &[]).unwrap();
        assert!(!partial.complete);

        let combined = node.combineblocksigs(&hex, &[sig]).unwrap();
        assert!(combined.complete);

        node.submitblock(&combined.hex).unwrap();
        assert_eq!(node.block_count(), 1);

        // Resubmission of the same block is a no-op.
        node.submitblock(&combined.hex).unwrap();
        assert_eq!(node.block_count(), 1);
    }

    #[test]
    fn signers_refuse_candidates_that_do_not_extend_their_tip() {
        let mut nodes = federation(1, 1, false, 8);
        let node = &mut nodes[0];

        let stale_hex = node.getnewblockhex().unwrap();
        let sig = node.signblock(&stale_hex).unwrap();
        let combined = node.combineblocksigs(&stale_hex, &[sig]).unwrap();
        node.submitblock(&combined.hex).unwrap();

        // The old candidate now extends a stale parent.
        let fresh_hex = node.getnewblockhex().unwrap();
        assert!(node.signblock(&stale_hex).is_err());
        assert!(node.signblock(&fresh_hex).is_ok());
    }

    #[test]
    fn combineblocksigs_grows_across_calls() {
        let mut nodes = federation(3, 2, false, 8);
        let keys = seeded_keypairs(3, 0xfed);

        let hex = nodes[0].getnewblockhex().unwrap();
        let block = SidechainBlock::from_hex(&hex).unwrap();
        let hash = block.block_hash();

        let sig0 = sign_block_hash(&hash, 0, &keys[0].0);
        let sig2 = sign_block_hash(&hash, 2, &keys[2].0);

        let partial = nodes[0].combineblocksigs(&hex, &[sig0]).unwrap();
        assert!(!partial.complete);

        // The earlier signature is re-supplied with the grown set.
        let full = nodes[0].combineblocksigs(&hex, &[sig0, sig2]).unwrap();
        assert!(full.complete);

        for node in nodes.iter_mut() {
            node.submitblock(&full.hex).unwrap();
            assert_eq!(node.block_count(), 1);
        }
    }

    #[test]
    fn combineblocksigs_repeats_byte_identically_after_completion() {
        let mut nodes = federation(3, 2, false, 8);
        let keys = seeded_keypairs(3, 0xfed);

        let hex = nodes[0].getnewblockhex().unwrap();
        let hash = SidechainBlock::from_hex(&hex).unwrap().block_hash();
        let sigs = [
            sign_block_hash(&hash, 0, &keys[0].0),
            sign_block_hash(&hash, 1, &keys[1].0),
        ];

        let first = nodes[0].combineblocksigs(&hex, &sigs).unwrap();
        assert!(first.complete);

        // The identical complete set again: same verdict, same bytes.
        let second = nodes[0].combineblocksigs(&hex, &sigs).unwrap();
        assert!(second.complete);
        assert_eq!(second.hex, first.hex);

        nodes[0].submitblock(&second.hex).unwrap();
        assert_eq!(nodes[0].block_count(), 1);
    }

    #[test]
    fn claimpegin_accepts_and_is_idempotent() {
        let mut nodes = federation(1, 1, true, 8);
        let node = &mut nodes[0];
        let mut parent = MockParentChain::new();

        let info = node.getpeginaddress();
        let spk = deposit_script_pubkey(&node.params.fedpegscript, &info.claim_script);
        let (deposit_txid, raw) = parent.deposit(&spk, 150_000);
        parent.mine(8);
        node.set_parent_view(parent.view());

        let proof = parent.txout_proof(&deposit_txid);
        let txid = node
            .claimpegin(&hex::encode(&raw), &hex::encode(&proof), None)
            .unwrap();

        // Identical resubmission yields the same txid and no second entry.
        let again = node
            .claimpegin(&hex::encode(&raw), &hex::encode(&proof), None)
            .unwrap();
        assert_eq!(txid, again);

        let tx_info = node.gettransaction(&txid).unwrap();
        assert_eq!(tx_info.confirmations, 0);
        assert_eq!(tx_info.amount_sats, 150_000);
        assert_eq!(node.raw_mempool(), vec![txid]);

        let decoded = node.decoderawtransaction(&tx_info.hex).unwrap();
        assert_eq!(decoded.txid, txid);
        assert!(decoded.vin[0].is_pegin);
        assert_eq!(decoded.vin[0].pegin_witness.len(), 4);
    }

    #[test]
    fn shallow_claim_reports_needs_more_confirmations() {
        let mut nodes = federation(1, 1, true, 8);
        let node = &mut nodes[0];
        let mut parent = MockParentChain::new();

        let info = node.getpeginaddress();
        let spk = deposit_script_pubkey(&node.params.fedpegscript, &info.claim_script);
        let (deposit_txid, raw) = parent.deposit(&spk, 50_000);
        parent.mine(3);
        node.set_parent_view(parent.view());

        let proof = parent.txout_proof(&deposit_txid);
        let err = node
            .claimpegin(&hex::encode(&raw), &hex::encode(&proof), None)
            .unwrap_err();
        assert!(err.to_string().contains("needs more confirmations"));
        assert!(node.raw_mempool().is_empty());

        // The identical claim goes through once the deposit is buried.
        parent.mine(5);
        node.set_parent_view(parent.view());
        node.claimpegin(&hex::encode(&raw), &hex::encode(&proof), None)
            .unwrap();
    }

    #[test]
    fn wrong_claim_script_reports_does_not_match() {
        let mut nodes = federation(1, 1, true, 8);
        let node = &mut nodes[0];
        let mut parent = MockParentChain::new();

        let info = node.getpeginaddress();
        let spk = deposit_script_pubkey(&node.params.fedpegscript, &info.claim_script);
        let (deposit_txid, raw) = parent.deposit(&spk, 50_000);
        parent.mine(8);
        node.set_parent_view(parent.view());
        let proof = parent.txout_proof(&deposit_txid);

        let other = node.getpeginaddress().claim_script;
        let err = node
            .claimpegin(
                &hex::encode(&raw),
                &hex::encode(&proof),
                Some(&hex::encode(other.as_bytes())),
            )
            .unwrap_err();
        assert!(err.to_string().contains("does not match the given"));

        // The failed claim registered nothing.
        assert!(node.raw_mempool().is_empty());
        assert_eq!(node.ledger.len(), 0);
    }

    #[test]
    fn explicit_claim_script_lets_another_node_claim() {
        let mut nodes = federation(2, 2, true, 8);
        let mut parent = MockParentChain::new();

        // The address comes from node 0's wallet; node 1 claims with the explicit script.
        let info = nodes[0].getpeginaddress();
        let spk = deposit_script_pubkey(&nodes[0].params.fedpegscript, &info.claim_script);
        let (deposit_txid, raw) = parent.deposit(&spk, 75_000);
        parent.mine(8);
        let proof = parent.txout_proof(&deposit_txid);

        nodes[1].set_parent_view(parent.view());
        let txid = nodes[1]
            .claimpegin(
                &hex::encode(&raw),
                &hex::encode(&proof),
                Some(&hex::encode(info.claim_script.as_bytes())),
            )
            .unwrap();
        assert!(nodes[1].gettransaction(&txid).is_ok());

        // Without the script, node 1's wallet has nothing to derive from.
        let err = nodes[1]
            .claimpegin(&hex::encode(&raw), &hex::encode(&proof), None)
            .unwrap_err();
        assert!(err.to_string().contains("does not match the given"));
    }

    #[test]
    fn disabled_validation_skips_parent_chain_checks() {
        let mut nodes = federation(1, 1, false, 8);
        let node = &mut nodes[0];
        let mut parent = MockParentChain::new();

        let info = node.getpeginaddress();
        let spk = deposit_script_pubkey(&node.params.fedpegscript, &info.claim_script);
        let (_, raw) = parent.deposit(&spk, 10_000);

        // No mined proof, no parent view: accepted anyway.
        let txid = node
            .claimpegin(&hex::encode(&raw), "00", None)
            .unwrap();
        assert_eq!(node.gettransaction(&txid).unwrap().confirmations, 0);
    }
}
