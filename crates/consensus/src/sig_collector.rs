//! Accumulates partial block signatures against one candidate block.

use std::collections::BTreeMap;

use bitcoin::hashes::Hash;
use fedchain_primitives::{
    block::SidechainBlockHash, policy::ScriptPolicy, types::SignerIdx,
};
use secp256k1::{ecdsa, Message, SECP256K1};
use serde::{Deserialize, Serialize};

use crate::errors::CollectorError;

/// A partial block signature: one signer's ECDSA signature over a candidate block hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSignature {
    /// Index of the signer within the block-signing policy.
    pub signer: SignerIdx,

    /// The signature over the candidate block hash.
    pub sig: ecdsa::Signature,
}

/// Outcome of combining the signatures collected so far.
///
/// `complete == false` is a valid intermediate poll, not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineResult {
    /// Whether the threshold has been reached.
    pub complete: bool,

    /// The multisig witness, present iff `complete`. Signatures are DER-encoded and ordered by
    /// signer index so repeated combination yields byte-identical output.
    pub witness: Option<Vec<Vec<u8>>>,
}

/// Collects partial signatures for exactly one candidate block.
///
/// Every accepted signature has already been verified, so completeness is a pure count against
/// the policy threshold.
#[derive(Debug, Clone)]
pub struct SignatureCollector {
    policy: ScriptPolicy,
    block_hash: SidechainBlockHash,
    sigs: BTreeMap<SignerIdx, ecdsa::Signature>,
}

impl SignatureCollector {
    /// Binds a new collector to a candidate block hash under the given policy.
    pub fn new(policy: ScriptPolicy, block_hash: SidechainBlockHash) -> Self {
        Self {
            policy,
            block_hash,
            sigs: BTreeMap::new(),
        }
    }

    /// The candidate hash this collector is bound to.
    pub fn block_hash(&self) -> SidechainBlockHash {
        self.block_hash
    }

    /// Number of valid signatures collected so far.
    pub fn count(&self) -> usize {
        self.sigs.len()
    }

    /// Adds one partial signature.
    ///
    /// Re-adding the identical signature for a signer is an idempotent no-op; a *different*
    /// signature from the same signer is rejected so nothing is ever double counted.
    pub fn add(
        &mut self,
        block_hash: SidechainBlockHash,
        signature: BlockSignature,
    ) -> Result<(), CollectorError> {
        if block_hash != self.block_hash {
            return Err(CollectorError::WrongBlock {
                expected: self.block_hash,
                got: block_hash,
            });
        }

        let key = self
            .policy
            .key_at(signature.signer)
            .ok_or(CollectorError::UnknownSigner(signature.signer))?;

        let msg = Message::from_digest(self.block_hash.to_byte_array());
        if SECP256K1.verify_ecdsa(&msg, &signature.sig, key).is_err() {
            return Err(CollectorError::InvalidSignature(signature.signer));
        }

        match self.sigs.get(&signature.signer) {
            Some(existing) if *existing == signature.sig => Ok(()),
            Some(_) => Err(CollectorError::DuplicateSigner(signature.signer)),
            None => {
                self.sigs.insert(signature.signer, signature.sig);
                Ok(())
            }
        }
    }

    /// Pure, deterministic combination of the signatures collected so far.
    pub fn combined(&self) -> CombineResult {
        let complete = self.sigs.len() as u32 >= self.policy.threshold();

        let witness = complete.then(|| {
            // BTreeMap iteration is signer-index order, which keeps the witness stable across
            // insertion orders.
            self.sigs
                .values()
                .map(|sig| sig.serialize_der().to_vec())
                .collect()
        });

        CombineResult { complete, witness }
    }
}

/// Produces one partial signature over a candidate block hash.
pub fn sign_block_hash(
    block_hash: &SidechainBlockHash,
    signer: SignerIdx,
    secret_key: &secp256k1::SecretKey,
) -> BlockSignature {
    let msg = Message::from_digest(block_hash.to_byte_array());
    BlockSignature {
        signer,
        sig: SECP256K1.sign_ecdsa(&msg, secret_key),
    }
}
