//! Bootstraps the RPC server for the node.

use std::{sync::Arc, time::Instant};

use anyhow::Context;
use async_trait::async_trait;
use bitcoin::Txid;
use fedchain_consensus::BlockSignature;
use fedchain_node_core::{Node, NodeError};
use fedchain_primitives::block::SidechainBlockHash;
use fedchain_rpc::{
    traits::{FedchainBlockSignApiServer, FedchainControlApiServer, FedchainPeginApiServer},
    types::{RpcCombinedBlock, RpcDecodedTransaction, RpcPeginAddress, RpcTransactionInfo, RpcVin},
};
use jsonrpsee::{
    core::RpcResult,
    types::{ErrorCode, ErrorObjectOwned},
    RpcModule,
};
use tokio::sync::{oneshot, RwLock};
use tracing::{debug, info, warn};

/// Starts the RPC server for the node.
pub(crate) async fn start_rpc<T>(rpc_impl: &T, rpc_addr: &str) -> anyhow::Result<()>
where
    T: FedchainControlApiServer
        + FedchainBlockSignApiServer
        + FedchainPeginApiServer
        + Clone
        + Sync
        + Send,
{
    let mut rpc_module = RpcModule::new(rpc_impl.clone());

    let control_api = FedchainControlApiServer::into_rpc(rpc_impl.clone());
    let blocksign_api = FedchainBlockSignApiServer::into_rpc(rpc_impl.clone());
    let pegin_api = FedchainPeginApiServer::into_rpc(rpc_impl.clone());

    rpc_module.merge(control_api).context("merge control api")?;
    rpc_module
        .merge(blocksign_api)
        .context("merge blocksign api")?;
    rpc_module.merge(pegin_api).context("merge pegin api")?;

    info!("starting node rpc server at {rpc_addr}");
    let rpc_server = jsonrpsee::server::ServerBuilder::new()
        .build(&rpc_addr)
        .await
        .context("build node rpc server")?;

    let rpc_handle = rpc_server.start(rpc_module);

    // Using `_` for `_stop_tx` as the variable causes it to be dropped immediately!
    let (_stop_tx, stop_rx): (oneshot::Sender<bool>, oneshot::Receiver<bool>) = oneshot::channel();
    debug!("node rpc server started");

    let _ = stop_rx.await;
    info!("stopping rpc server");

    if rpc_handle.stop().is_err() {
        warn!("rpc server already stopped");
    }

    Ok(())
}

/// The RPC server implementation over one in-process [`Node`].
#[derive(Debug, Clone)]
pub(crate) struct NodeRpc {
    node: Arc<RwLock<Node>>,
    start_time: Instant,
}

impl NodeRpc {
    pub(crate) fn new(node: Node) -> Self {
        Self {
            node: Arc::new(RwLock::new(node)),
            start_time: Instant::now(),
        }
    }
}

/// Maps a node error to an RPC error object, preserving the stable user-facing message.
fn to_rpc_error(err: NodeError) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(ErrorCode::ServerError(-32000).code(), err.to_string(), None::<()>)
}

#[async_trait]
impl FedchainControlApiServer for NodeRpc {
    async fn get_uptime(&self) -> RpcResult<u64> {
        Ok(self.start_time.elapsed().as_secs())
    }
}

#[async_trait]
impl FedchainBlockSignApiServer for NodeRpc {
    async fn get_new_block_hex(&self) -> RpcResult<String> {
        self.node
            .write()
            .await
            .getnewblockhex()
            .map_err(to_rpc_error)
    }

    async fn sign_block(&self, block_hex: String) -> RpcResult<BlockSignature> {
        self.node
            .read()
            .await
            .signblock(&block_hex)
            .map_err(to_rpc_error)
    }

    async fn combine_block_sigs(
        &self,
        block_hex: String,
        signatures: Vec<BlockSignature>,
    ) -> RpcResult<RpcCombinedBlock> {
        let combined = self
            .node
            .write()
            .await
            .combineblocksigs(&block_hex, &signatures)
            .map_err(to_rpc_error)?;

        Ok(RpcCombinedBlock {
            complete: combined.complete,
            hex: combined.hex,
        })
    }

    async fn submit_block(&self, block_hex: String) -> RpcResult<()> {
        self.node
            .write()
            .await
            .submitblock(&block_hex)
            .map_err(to_rpc_error)
    }

    async fn get_block_count(&self) -> RpcResult<u64> {
        Ok(self.node.read().await.block_count())
    }

    async fn get_best_block_hash(&self) -> RpcResult<SidechainBlockHash> {
        Ok(self.node.read().await.tip_hash())
    }

    async fn invalidate_block(&self, block_hash: SidechainBlockHash) -> RpcResult<()> {
        self.node
            .write()
            .await
            .invalidateblock(&block_hash)
            .map_err(to_rpc_error)
    }

    async fn reconsider_block(&self, block_hash: SidechainBlockHash) -> RpcResult<()> {
        self.node
            .write()
            .await
            .reconsiderblock(&block_hash)
            .map_err(to_rpc_error)
    }
}

#[async_trait]
impl FedchainPeginApiServer for NodeRpc {
    async fn get_pegin_address(&self) -> RpcResult<RpcPeginAddress> {
        let info = self.node.write().await.getpeginaddress();
        Ok(RpcPeginAddress {
            mainchain_address: info.mainchain_address,
            claim_script: hex::encode(info.claim_script.as_bytes()),
        })
    }

    async fn claim_pegin(
        &self,
        raw_tx: String,
        txout_proof: String,
        claim_script: Option<String>,
    ) -> RpcResult<Txid> {
        self.node
            .write()
            .await
            .claimpegin(&raw_tx, &txout_proof, claim_script.as_deref())
            .map_err(to_rpc_error)
    }

    async fn get_transaction(&self, txid: Txid) -> RpcResult<RpcTransactionInfo> {
        let info = self
            .node
            .read()
            .await
            .gettransaction(&txid)
            .map_err(to_rpc_error)?;

        Ok(RpcTransactionInfo {
            txid: info.txid,
            confirmations: info.confirmations,
            amount_sats: info.amount_sats,
            hex: info.hex,
        })
    }

    async fn decode_raw_transaction(&self, tx_hex: String) -> RpcResult<RpcDecodedTransaction> {
        let decoded = self
            .node
            .read()
            .await
            .decoderawtransaction(&tx_hex)
            .map_err(to_rpc_error)?;

        Ok(RpcDecodedTransaction {
            txid: decoded.txid,
            vin: decoded
                .vin
                .into_iter()
                .map(|vin| RpcVin {
                    is_pegin: vin.is_pegin,
                    pegin_witness: vin.pegin_witness,
                })
                .collect(),
        })
    }

    async fn get_raw_mempool(&self) -> RpcResult<Vec<Txid>> {
        Ok(self.node.read().await.raw_mempool())
    }
}
