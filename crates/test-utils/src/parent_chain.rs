//! A minimal in-memory parent chain.
//!
//! Produces structurally real [`bitcoin::Block`]s so that txout proofs built from them are
//! genuine partial merkle trees, exercised by the peg-in verifier exactly as proofs from a real
//! `gettxoutproof` call would be. Proof-of-work is never checked anywhere in these tests, so
//! headers carry trivial difficulty.

use bitcoin::{
    absolute::LockTime,
    block::{Header, Version},
    consensus,
    hashes::Hash,
    transaction, Amount, Block, BlockHash, CompactTarget, MerkleBlock, OutPoint, Script,
    ScriptBuf, Sequence, Transaction, TxIn, TxMerkleNode, Txid, TxOut, Witness,
};
use fedchain_pegin::verifier::ParentChainView;

/// An in-memory parent chain with a mempool.
#[derive(Debug, Default)]
pub struct MockParentChain {
    blocks: Vec<Block>,
    mempool: Vec<Transaction>,
    tx_counter: u64,
}

impl MockParentChain {
    /// An empty chain at height 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current chain height.
    pub fn height(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// Creates a deposit transaction paying `sats` to `script_pubkey` and leaves it in the
    /// mempool. Returns the txid and the raw consensus-encoded transaction.
    pub fn deposit(&mut self, script_pubkey: &Script, sats: u64) -> (Txid, Vec<u8>) {
        self.tx_counter += 1;
        let tx = Transaction {
            version: transaction::Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint {
                    txid: {
                        let mut seed = [0u8; 32];
                        seed[..8].copy_from_slice(&self.tx_counter.to_le_bytes());
                        Txid::from_byte_array(seed)
                    },
                    vout: 0,
                },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(sats),
                script_pubkey: script_pubkey.to_owned(),
            }],
        };

        let txid = tx.compute_txid();
        let raw = consensus::serialize(&tx);
        self.mempool.push(tx);
        (txid, raw)
    }

    /// Mines `n` blocks; the first one sweeps the mempool.
    pub fn mine(&mut self, n: usize) {
        for _ in 0..n {
            let prev_blockhash = self
                .blocks
                .last()
                .map(|b| b.block_hash())
                .unwrap_or_else(BlockHash::all_zeros);

            let mut txdata = vec![self.coinbase()];
            txdata.append(&mut self.mempool);

            let mut block = Block {
                header: Header {
                    version: Version::TWO,
                    prev_blockhash,
                    merkle_root: TxMerkleNode::all_zeros(),
                    time: 1_700_000_000 + self.blocks.len() as u32,
                    bits: CompactTarget::from_consensus(0x207f_ffff),
                    nonce: 0,
                },
                txdata,
            };
            block.header.merkle_root = block
                .compute_merkle_root()
                .expect("block always has a coinbase");

            self.blocks.push(block);
        }
    }

    /// Builds a `gettxoutproof`-format proof for a mined transaction.
    ///
    /// # Panics
    ///
    /// Panics if the txid was never mined; tests construct proofs only for mined deposits.
    pub fn txout_proof(&self, txid: &Txid) -> Vec<u8> {
        let block = self
            .blocks
            .iter()
            .find(|b| b.txdata.iter().any(|tx| tx.compute_txid() == *txid))
            .expect("txid must be mined before building a proof");

        let merkle_block = MerkleBlock::from_block_with_predicate(block, |t| t == txid);
        consensus::serialize(&merkle_block)
    }

    /// The trusted-header view a sidechain node would hold for this chain.
    pub fn view(&self) -> ParentChainView {
        let mut view = ParentChainView::new();
        for (i, block) in self.blocks.iter().enumerate() {
            view.accept_header(block.block_hash(), i as u64 + 1);
        }
        view
    }

    fn coinbase(&mut self) -> Transaction {
        self.tx_counter += 1;
        Transaction {
            version: transaction::Version::ONE,
            lock_time: LockTime::from_consensus(self.tx_counter as u32),
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::from_bytes(self.tx_counter.to_le_bytes().to_vec()),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(50 * 100_000_000),
                script_pubkey: ScriptBuf::new(),
            }],
        }
    }
}
