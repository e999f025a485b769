//! Traits for the RPC server.

use bitcoin::Txid;
use fedchain_consensus::BlockSignature;
use fedchain_primitives::block::SidechainBlockHash;
use jsonrpsee::{core::RpcResult, proc_macros::rpc};

use crate::types::{
    RpcCombinedBlock, RpcDecodedTransaction, RpcPeginAddress, RpcTransactionInfo,
};

/// RPCs related to information about the node itself.
#[cfg_attr(not(feature = "client"), rpc(server, namespace = "fedchain"))]
#[cfg_attr(feature = "client", rpc(server, client, namespace = "fedchain"))]
pub trait FedchainControlApi {
    /// Get the uptime for the node in seconds assuming the clock is strictly monotonically
    /// increasing.
    #[method(name = "uptime")]
    async fn get_uptime(&self) -> RpcResult<u64>;
}

/// The block-signing command surface: one round of proposal, signing, combination and
/// submission per height.
#[cfg_attr(not(feature = "client"), rpc(server, namespace = "fedchain"))]
#[cfg_attr(feature = "client", rpc(server, client, namespace = "fedchain"))]
pub trait FedchainBlockSignApi {
    /// Produce the candidate block for the next height.
    #[method(name = "getnewblockhex")]
    async fn get_new_block_hex(&self) -> RpcResult<String>;

    /// Sign a candidate block with this node's federation key.
    #[method(name = "signblock")]
    async fn sign_block(&self, block_hex: String) -> RpcResult<BlockSignature>;

    /// Combine partial signatures over a candidate block. Callable repeatedly with growing
    /// signature sets.
    #[method(name = "combineblocksigs")]
    async fn combine_block_sigs(
        &self,
        block_hex: String,
        signatures: Vec<BlockSignature>,
    ) -> RpcResult<RpcCombinedBlock>;

    /// Submit a finalized block.
    #[method(name = "submitblock")]
    async fn submit_block(&self, block_hex: String) -> RpcResult<()>;

    /// Height of the best tip.
    #[method(name = "getblockcount")]
    async fn get_block_count(&self) -> RpcResult<u64>;

    /// Hash of the best tip.
    #[method(name = "getbestblockhash")]
    async fn get_best_block_hash(&self) -> RpcResult<SidechainBlockHash>;

    /// Mark a block invalid, removing it and its descendants from the best chain.
    #[method(name = "invalidateblock")]
    async fn invalidate_block(&self, block_hash: SidechainBlockHash) -> RpcResult<()>;

    /// Restore an invalidated block, letting its branch compete for best chain again.
    #[method(name = "reconsiderblock")]
    async fn reconsider_block(&self, block_hash: SidechainBlockHash) -> RpcResult<()>;
}

/// The peg-in command surface: deposit addresses, claim submission and claim inspection.
#[cfg_attr(not(feature = "client"), rpc(server, namespace = "fedchain"))]
#[cfg_attr(feature = "client", rpc(server, client, namespace = "fedchain"))]
pub trait FedchainPeginApi {
    /// Derive a fresh federation deposit address and its claim script.
    #[method(name = "getpeginaddress")]
    async fn get_pegin_address(&self) -> RpcResult<RpcPeginAddress>;

    /// Validate a peg-in claim and register it in the ledger. The claim script may be omitted
    /// when this node's wallet issued the deposit address.
    #[method(name = "claimpegin")]
    async fn claim_pegin(
        &self,
        raw_tx: String,
        txout_proof: String,
        claim_script: Option<String>,
    ) -> RpcResult<Txid>;

    /// Look up a peg-in claim by its sidechain txid.
    #[method(name = "gettransaction")]
    async fn get_transaction(&self, txid: Txid) -> RpcResult<RpcTransactionInfo>;

    /// Decode a claim transaction and expose its peg provenance fields.
    #[method(name = "decoderawtransaction")]
    async fn decode_raw_transaction(&self, tx_hex: String) -> RpcResult<RpcDecodedTransaction>;

    /// Claim txids accepted but not yet included in a best-chain block.
    #[method(name = "getrawmempool")]
    async fn get_raw_mempool(&self) -> RpcResult<Vec<Txid>>;
}
