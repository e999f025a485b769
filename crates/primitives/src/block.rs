//! The sidechain block representation and its hex wire format.
//!
//! Blocks are signed, not mined: the hash commitment covers the header and body but *not* the
//! witness, so attaching signatures never invalidates signatures already collected while any
//! other mutation does.

use bitcoin::{
    hashes::{sha256d, Hash},
    Txid,
};
use serde::{Deserialize, Serialize};

use crate::{errors::BlockCodecError, types::SidechainBlockHeight};

/// Hash commitment over a sidechain block's signed content.
pub type SidechainBlockHash = sha256d::Hash;

/// Header of a sidechain block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidechainHeader {
    /// Height of this block.
    pub height: SidechainBlockHeight,

    /// Hash of the block this one extends.
    pub parent: SidechainBlockHash,

    /// Proposer-supplied timestamp. Distinguishes competing candidates with identical bodies.
    pub time: u64,
}

/// A sidechain block: header, swept claim transaction ids, and (once finalized) the multisig
/// witness that satisfies the block-signing policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidechainBlock {
    /// The block header.
    pub header: SidechainHeader,

    /// Sidechain txids of the peg-in claims included in this block.
    pub claim_txids: Vec<Txid>,

    /// DER-encoded signatures ordered by signer index. Empty until finalized.
    pub witness: Vec<Vec<u8>>,
}

impl SidechainBlock {
    /// Builds an unsigned candidate block extending `parent`.
    pub fn candidate(
        height: SidechainBlockHeight,
        parent: SidechainBlockHash,
        time: u64,
        claim_txids: Vec<Txid>,
    ) -> Self {
        Self {
            header: SidechainHeader {
                height,
                parent,
                time,
            },
            claim_txids,
            witness: Vec::new(),
        }
    }

    /// The hash commitment signed by the federation.
    ///
    /// Covers header and body only; the witness is excluded so that signature accumulation does
    /// not move the commitment.
    pub fn block_hash(&self) -> SidechainBlockHash {
        let preimage = bincode::serialize(&(&self.header, &self.claim_txids))
            .expect("in-memory block serialization is infallible");
        sha256d::Hash::hash(&preimage)
    }

    /// Serializes the block to the hex wire format used by the command surface.
    pub fn to_hex(&self) -> String {
        let bytes = bincode::serialize(self).expect("in-memory block serialization is infallible");
        hex::encode(bytes)
    }

    /// Parses a block from the hex wire format.
    pub fn from_hex(s: &str) -> Result<Self, BlockCodecError> {
        let bytes = hex::decode(s)?;
        Ok(bincode::deserialize(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> SidechainBlock {
        SidechainBlock::candidate(4, sha256d::Hash::hash(b"parent"), 1_700_000_000, vec![])
    }

    #[test]
    fn hex_round_trip() {
        let block = sample_block();
        let parsed = SidechainBlock::from_hex(&block.to_hex()).unwrap();
        assert_eq!(parsed, block);
    }

    #[test]
    fn witness_does_not_move_the_hash() {
        let mut block = sample_block();
        let unsigned_hash = block.block_hash();

        block.witness = vec![vec![0xde, 0xad]];
        assert_eq!(block.block_hash(), unsigned_hash);
    }

    #[test]
    fn body_mutation_moves_the_hash() {
        let mut block = sample_block();
        let hash = block.block_hash();

        block.header.height += 1;
        assert_ne!(block.block_hash(), hash);
    }
}
