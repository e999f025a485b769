//! Stateless peg-in claim verification.
//!
//! [`verify`] is a pure function of its inputs and is re-run identically on every re-evaluation,
//! including after reorgs. Nothing here touches ledger state.

use bitcoin::{
    consensus,
    hashes::{sha256, Hash},
    opcodes::all::OP_DROP,
    script::Builder,
    Address, MerkleBlock, Network, Script, ScriptBuf, Transaction,
};
use fedchain_primitives::types::ParentBlockHeight;
use std::collections::BTreeMap;
use tracing::trace;

/// Outcome of verifying one peg-in claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// All checks passed.
    Accepted {
        /// Parent-chain confirmations of the deposit at verification time.
        confirmations: u64,
    },

    /// The deposit has not been buried deep enough on the parent chain yet. Retryable.
    InsufficientConfirmations {
        /// Confirmations the deposit currently has.
        got: u64,

        /// Confirmations required for mempool acceptance.
        required: u32,
    },

    /// The claim script does not correspond to any output of the deposit transaction.
    ClaimScriptMismatch,

    /// The transaction or its inclusion proof is malformed or does not verify.
    ProofInvalid,
}

/// The set of parent-chain headers this node accepts as history, with enough depth information
/// to compute confirmations.
///
/// Kept as an explicit value so the verifier stays pure; whoever talks to the parent chain owns
/// keeping it current.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentChainView {
    headers: BTreeMap<bitcoin::BlockHash, ParentBlockHeight>,
    tip_height: ParentBlockHeight,
}

impl ParentChainView {
    /// An empty view that trusts nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts a header into the trusted set.
    pub fn accept_header(&mut self, hash: bitcoin::BlockHash, height: ParentBlockHeight) {
        self.headers.insert(hash, height);
        self.tip_height = self.tip_height.max(height);
    }

    /// Advances the known tip height without accepting a new header (headers between the last
    /// interesting one and the tip need not be tracked).
    pub fn advance_tip(&mut self, height: ParentBlockHeight) {
        self.tip_height = self.tip_height.max(height);
    }

    /// Confirmations of a block, or [`None`] if the header is not trusted.
    pub fn confirmations(&self, hash: &bitcoin::BlockHash) -> Option<u64> {
        let height = self.headers.get(hash)?;
        Some(self.tip_height.saturating_sub(*height) + 1)
    }
}

/// The parent-chain script that locks a deposit to the federation for a specific claim.
///
/// The claim script is committed with a hash push that the federation script never inspects
/// (`<sha256(claim_script)> OP_DROP <fedpegscript>`), which ties each deposit to exactly one
/// claim without changing the spending conditions.
pub fn deposit_script(fedpeg_script: &Script, claim_script: &Script) -> ScriptBuf {
    let commitment = sha256::Hash::hash(claim_script.as_bytes());
    let mut bytes = Builder::new()
        .push_slice(commitment.to_byte_array())
        .push_opcode(OP_DROP)
        .into_script()
        .into_bytes();
    bytes.extend_from_slice(fedpeg_script.as_bytes());
    ScriptBuf::from_bytes(bytes)
}

/// The script pubkey a deposit for `claim_script` must pay.
pub fn deposit_script_pubkey(fedpeg_script: &Script, claim_script: &Script) -> ScriptBuf {
    deposit_script(fedpeg_script, claim_script).to_p2wsh()
}

/// The parent-chain address a depositor sends funds to.
pub fn deposit_address(
    fedpeg_script: &Script,
    claim_script: &Script,
    network: Network,
) -> Address {
    Address::p2wsh(&deposit_script(fedpeg_script, claim_script), network)
}

/// Validates one peg-in claim against the federation policy and the trusted parent-chain view.
///
/// Checks run in a fixed order and the first failure wins: transaction shape, inclusion proof,
/// claim-script correspondence, confirmation depth.
///
/// The shape check only requires *some* P2WSH output: the federation's deposit script pubkey
/// depends on the claim script, so whether an output actually pays the federation cannot be
/// decided until step 3 and a deposit to an unrelated P2WSH address deliberately surfaces as
/// [`Verdict::ClaimScriptMismatch`] there.
pub fn verify(
    raw_tx: &[u8],
    proof: &[u8],
    claim_script: &Script,
    fedpeg_script: &Script,
    view: &ParentChainView,
    required_depth: u32,
) -> Verdict {
    // 1. The deposit transaction must parse and have at least one P2WSH output (the shape every
    //    federation deposit has).
    let Ok(tx) = consensus::deserialize::<Transaction>(raw_tx) else {
        return Verdict::ProofInvalid;
    };
    if !tx.output.iter().any(|out| out.script_pubkey.is_p2wsh()) {
        return Verdict::ProofInvalid;
    }

    // 2. The txout proof must commit the deposit's txid under a header we trust.
    let Ok(merkle_block) = consensus::deserialize::<MerkleBlock>(proof) else {
        return Verdict::ProofInvalid;
    };
    let mut matched_txids = Vec::new();
    let mut match_indexes = Vec::new();
    if merkle_block
        .extract_matches(&mut matched_txids, &mut match_indexes)
        .is_err()
    {
        return Verdict::ProofInvalid;
    }
    let txid = tx.compute_txid();
    if !matched_txids.contains(&txid) {
        return Verdict::ProofInvalid;
    }
    let header_hash = merkle_block.header.block_hash();
    let Some(confirmations) = view.confirmations(&header_hash) else {
        return Verdict::ProofInvalid;
    };

    // 3. The claim script must correspond to an actual output of the deposit.
    let expected_spk = deposit_script_pubkey(fedpeg_script, claim_script);
    if !tx.output.iter().any(|out| out.script_pubkey == expected_spk) {
        return Verdict::ClaimScriptMismatch;
    }

    // 4. Confirmation depth gate.
    if confirmations < required_depth as u64 {
        return Verdict::InsufficientConfirmations {
            got: confirmations,
            required: required_depth,
        };
    }

    trace!(%txid, confirmations, "peg-in claim verified");
    Verdict::Accepted { confirmations }
}

/// The deposited amount for a verified claim: the value of the output paying the claim's
/// deposit script pubkey.
pub fn deposit_amount_sats(
    raw_tx: &[u8],
    claim_script: &Script,
    fedpeg_script: &Script,
) -> Option<u64> {
    let tx = consensus::deserialize::<Transaction>(raw_tx).ok()?;
    let expected_spk = deposit_script_pubkey(fedpeg_script, claim_script);
    tx.output
        .iter()
        .find(|out| out.script_pubkey == expected_spk)
        .map(|out| out.value.to_sat())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_script_commits_the_claim_script() {
        let fedpeg = ScriptBuf::from_bytes(vec![0x51]);
        let claim = ScriptBuf::from_bytes(vec![0x00, 0x14, 0x11, 0x22, 0x33]);

        let script = deposit_script(&fedpeg, &claim);
        let bytes = script.to_bytes();

        // <sha256(claim)> OP_DROP <fedpegscript>
        let commitment = sha256::Hash::hash(claim.as_bytes());
        assert_eq!(bytes[0], 32);
        assert_eq!(&bytes[1..33], commitment.as_byte_array());
        assert_eq!(bytes[33], OP_DROP.to_u8());
        assert_eq!(&bytes[34..], fedpeg.as_bytes());

        // Different claim scripts lock to different addresses.
        let other = ScriptBuf::from_bytes(vec![0x00, 0x14, 0x99]);
        assert_ne!(
            deposit_script_pubkey(&fedpeg, &claim),
            deposit_script_pubkey(&fedpeg, &other)
        );
    }
}
